//! Pure verification state machine.
//!
//! Holds no clock and performs no IO. Callers pass `now` in unix seconds and
//! apply the returned [`Command`]s; the async driver in the parent module
//! does both.

use super::code::VerificationCode;
use super::Channel;
use crate::error::{Error, Result};

/// Lifetime of a dispatched code, in seconds.
pub const CODE_TTL_SECS: u64 = 600;
/// Number of digit slots collected before comparison.
pub const CODE_LENGTH: usize = 6;

pub(crate) const SMS_UNAVAILABLE_NOTICE: &str =
    "SMS em desenvolvimento. Use WhatsApp por enquanto.";
pub(crate) const CODE_MISMATCH_NOTICE: &str = "Código incorreto. Tente novamente.";
pub(crate) const CODE_EXPIRED_NOTICE: &str = "Código expirado. Solicite um novo código.";

/// Where a verification session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Stage {
    /// Waiting for the user to pick a dispatch channel.
    AwaitingChannelChoice,
    /// A dispatch request is in flight.
    Dispatching,
    /// Collecting digits while the countdown runs.
    AwaitingCode,
    /// All six digits collected, comparing against the dispatched code.
    Verifying,
    /// A commit request is in flight.
    Committing,
    /// The backend reported a duplicate; waiting for the user's choice.
    ResolvingDuplicate,
    /// The session is over; see the outcome.
    Terminal,
}

/// How a finished session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum TerminalKind {
    /// The record was committed, or an existing record was adopted.
    Success,
    /// The user abandoned the session at a decision point.
    Failure,
    /// The code expired before the session could commit.
    Expired,
}

/// Render-ready view of a verification session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct FlowSnapshot {
    /// Current stage.
    pub stage: Stage,
    /// Outcome, present once `stage` is [`Stage::Terminal`].
    pub outcome: Option<TerminalKind>,
    /// Seconds left on the countdown; the full TTL before first dispatch.
    pub remaining_secs: u64,
    /// The six digit slots in entry order.
    pub slots: Vec<Option<u8>>,
    /// Index of the slot digit entry writes to next.
    pub focus: u8,
    /// Whether the countdown has run out.
    pub expired: bool,
    /// Message to surface to the user, if any.
    pub notice: Option<String>,
}

/// Side effect the driver must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    /// Send the current code over the given channel.
    Dispatch(Channel),
    /// Commit the verified record to the backend.
    Commit,
}

/// State of one verification session.
pub(crate) struct SessionCore {
    channel: Option<Channel>,
    code: VerificationCode,
    previous_code: Option<VerificationCode>,
    expires_at: u64,
    slots: [Option<u8>; CODE_LENGTH],
    focus: u8,
    stage: Stage,
    outcome: Option<TerminalKind>,
    notice: Option<String>,
}

impl SessionCore {
    pub(crate) const fn new(code: VerificationCode) -> Self {
        Self {
            channel: None,
            code,
            previous_code: None,
            expires_at: 0,
            slots: [None; CODE_LENGTH],
            focus: 0,
            stage: Stage::AwaitingChannelChoice,
            outcome: None,
            notice: None,
        }
    }

    pub(crate) const fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) const fn outcome(&self) -> Option<TerminalKind> {
        self.outcome
    }

    pub(crate) const fn code(&self) -> &VerificationCode {
        &self.code
    }

    /// Picks a dispatch channel. Unavailable channels leave the stage
    /// unchanged and set a notice instead.
    pub(crate) fn choose_channel(&mut self, channel: Channel) -> Result<Option<Command>> {
        if self.stage != Stage::AwaitingChannelChoice {
            return Err(flow_state("canal já escolhido"));
        }
        if !channel.is_available() {
            self.notice = Some(SMS_UNAVAILABLE_NOTICE.to_string());
            return Ok(None);
        }
        self.channel = Some(channel);
        self.notice = None;
        self.stage = Stage::Dispatching;
        Ok(Some(Command::Dispatch(channel)))
    }

    /// Starts the countdown once the code reached the client.
    pub(crate) fn dispatch_succeeded(&mut self, now: u64) {
        if self.stage != Stage::Dispatching {
            return;
        }
        self.previous_code = None;
        self.expires_at = now + CODE_TTL_SECS;
        self.clear_slots();
        self.notice = None;
        self.stage = Stage::AwaitingCode;
    }

    /// Records a failed dispatch. A failed resend falls back to the code the
    /// client already holds; a failed first dispatch returns to the channel
    /// choice.
    pub(crate) fn dispatch_failed(&mut self, message: String) {
        if self.stage != Stage::Dispatching {
            return;
        }
        self.notice = Some(message);
        if let Some(previous) = self.previous_code.take() {
            self.code = previous;
            self.stage = Stage::AwaitingCode;
        } else {
            self.stage = Stage::AwaitingChannelChoice;
        }
    }

    /// Records a digit in the focused slot. Returns [`Command::Commit`] when
    /// the sixth digit completes a matching code.
    pub(crate) fn enter_digit(&mut self, digit: u8, now: u64) -> Result<Option<Command>> {
        if digit > 9 {
            return Err(Error::InvalidInput {
                attribute: "digit".to_string(),
                reason: "apenas dígitos de 0 a 9".to_string(),
            });
        }
        match self.stage {
            Stage::AwaitingCode | Stage::Verifying => {}
            Stage::Committing | Stage::ResolvingDuplicate => return Ok(None),
            _ => return Err(flow_state("não está aguardando o código")),
        }
        if self.expired(now) {
            self.expire();
            return Err(Error::CodeExpired);
        }
        self.notice = None;
        self.slots[usize::from(self.focus)] = Some(digit);
        if usize::from(self.focus) < CODE_LENGTH - 1 {
            self.focus += 1;
        }
        let Some(entered) = self.entered_digits() else {
            return Ok(None);
        };
        self.stage = Stage::Verifying;
        if self.code.matches(&entered) {
            self.stage = Stage::Committing;
            Ok(Some(Command::Commit))
        } else {
            self.clear_slots();
            self.notice = Some(CODE_MISMATCH_NOTICE.to_string());
            self.stage = Stage::AwaitingCode;
            Ok(None)
        }
    }

    /// Clears the focused slot, or steps focus back and clears that slot.
    pub(crate) fn backspace(&mut self, now: u64) -> Result<()> {
        match self.stage {
            Stage::AwaitingCode | Stage::Verifying => {}
            Stage::Committing | Stage::ResolvingDuplicate => return Ok(()),
            _ => return Err(flow_state("não está aguardando o código")),
        }
        if self.expired(now) {
            self.expire();
            return Err(Error::CodeExpired);
        }
        let focus = usize::from(self.focus);
        if self.slots[focus].is_some() {
            self.slots[focus] = None;
        } else if self.focus > 0 {
            self.focus -= 1;
            self.slots[usize::from(self.focus)] = None;
        }
        Ok(())
    }

    /// Replaces the code and asks for a fresh dispatch over the same
    /// channel. The countdown restarts when the dispatch succeeds.
    pub(crate) fn begin_resend(&mut self, new_code: VerificationCode, now: u64) -> Result<Command> {
        if self.stage != Stage::AwaitingCode {
            return Err(flow_state("não há código aguardando reenvio"));
        }
        if self.expired(now) {
            self.expire();
            return Err(Error::CodeExpired);
        }
        let channel = self
            .channel
            .ok_or_else(|| flow_state("nenhum canal escolhido"))?;
        self.previous_code = Some(std::mem::replace(&mut self.code, new_code));
        self.clear_slots();
        self.notice = None;
        self.stage = Stage::Dispatching;
        Ok(Command::Dispatch(channel))
    }

    /// Moves an expired countdown to the terminal stage. Does nothing while
    /// a commit is in flight; the commit outcome wins that race.
    pub(crate) fn poll_expiry(&mut self, now: u64) {
        if matches!(self.stage, Stage::AwaitingCode | Stage::Verifying) && self.expired(now) {
            self.expire();
        }
    }

    pub(crate) fn commit_succeeded(&mut self) {
        if self.stage != Stage::Committing {
            return;
        }
        self.notice = None;
        self.outcome = Some(TerminalKind::Success);
        self.stage = Stage::Terminal;
    }

    pub(crate) fn commit_duplicate(&mut self) {
        if self.stage != Stage::Committing {
            return;
        }
        self.stage = Stage::ResolvingDuplicate;
    }

    /// Ends the session on a backend error. Recovery means restarting the
    /// capture flow from scratch.
    pub(crate) fn commit_failed(&mut self, message: String) {
        if self.stage != Stage::Committing {
            return;
        }
        self.notice = Some(message);
        self.outcome = Some(TerminalKind::Failure);
        self.stage = Stage::Terminal;
    }

    /// Settles a duplicate conflict: adopt the existing record or abandon
    /// the session.
    pub(crate) fn resolve_duplicate(&mut self, accept: bool) -> Result<()> {
        if self.stage != Stage::ResolvingDuplicate {
            return Err(flow_state("não há conflito a resolver"));
        }
        self.outcome = Some(if accept {
            TerminalKind::Success
        } else {
            TerminalKind::Failure
        });
        self.stage = Stage::Terminal;
        Ok(())
    }

    pub(crate) fn snapshot(&self, now: u64) -> FlowSnapshot {
        FlowSnapshot {
            stage: self.stage,
            outcome: self.outcome,
            remaining_secs: self.remaining(now),
            slots: self.slots.to_vec(),
            focus: self.focus,
            expired: self.expired(now),
            notice: self.notice.clone(),
        }
    }

    const fn remaining(&self, now: u64) -> u64 {
        if self.expires_at == 0 {
            CODE_TTL_SECS
        } else {
            self.expires_at.saturating_sub(now)
        }
    }

    const fn expired(&self, now: u64) -> bool {
        self.expires_at != 0 && now >= self.expires_at
    }

    fn expire(&mut self) {
        self.notice = Some(CODE_EXPIRED_NOTICE.to_string());
        self.outcome = Some(TerminalKind::Expired);
        self.stage = Stage::Terminal;
    }

    fn clear_slots(&mut self) {
        self.slots = [None; CODE_LENGTH];
        self.focus = 0;
    }

    fn entered_digits(&self) -> Option<String> {
        self.slots
            .iter()
            .map(|slot| slot.map(|digit| char::from(b'0' + digit)))
            .collect()
    }
}

fn flow_state(reason: &str) -> Error {
    Error::FlowState {
        reason: reason.to_string(),
    }
}
