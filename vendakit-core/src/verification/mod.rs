//! Out-of-band verification of clients and sales.
//!
//! A session generates a six-digit code on the device, dispatches it to the
//! client over WhatsApp, collects the digits the client reads back, and only
//! commits the record to the backend after a local match. The state machine
//! in [`machine`] is pure; [`VerificationFlow`] drives it with a clock and a
//! [`CommitStrategy`] for the network work.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::api::Client;
use crate::error::{Error, Result};
use crate::time::TimeSource;

pub(crate) mod code;
mod flows;
mod machine;

pub use flows::{
    ClientRegistrationFlow, ClientRegistrationResult, SaleDocumentOffer, SalePrefill,
    SaleRegistrationFlow, SaleRegistrationResult,
};
pub use machine::{FlowSnapshot, Stage, TerminalKind, CODE_LENGTH, CODE_TTL_SECS};

use code::VerificationCode;
use machine::{Command, SessionCore};

pub(crate) const CONNECTION_NOTICE: &str = "Erro de conexão. Verifique sua internet.";

/// Channel a verification code can be dispatched over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Channel {
    /// WhatsApp message to the client's phone.
    Whatsapp,
    /// SMS. Carrier integration has not shipped; selecting it only shows a
    /// notice.
    Sms,
}

impl Channel {
    /// Whether this channel can actually deliver a code today.
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Whatsapp)
    }
}

/// What a commit attempt produced.
pub(crate) enum CommitOutcome<R> {
    /// The backend accepted the record.
    Committed(R),
    /// The backend already holds a client with this documento.
    DuplicateClient(Client),
}

/// How a finished session settled.
#[derive(Clone)]
pub(crate) enum Resolution<R> {
    /// A fresh record was committed.
    Committed(R),
    /// The user adopted the client the backend already held.
    ExistingClient(Client),
}

/// Network side of a verification session: code dispatch and the final
/// commit.
#[async_trait]
pub(crate) trait CommitStrategy: Send + Sync {
    type Payload: Send + Sync;
    type Record: Clone + Send + Sync;

    async fn dispatch(
        &self,
        channel: Channel,
        code: &VerificationCode,
        payload: &Self::Payload,
    ) -> Result<()>;

    async fn commit(&self, payload: &Self::Payload) -> Result<CommitOutcome<Self::Record>>;
}

struct Inner<R> {
    core: SessionCore,
    conflict: Option<Client>,
    resolution: Option<Resolution<R>>,
}

/// Drives one verification session over a [`CommitStrategy`].
///
/// The lock is never held across a network await, so the machine stays
/// responsive to digit entry and expiry polls while a request is in flight.
pub(crate) struct VerificationFlow<S: CommitStrategy> {
    strategy: S,
    payload: S::Payload,
    time: Arc<dyn TimeSource>,
    state: Mutex<Inner<S::Record>>,
}

impl<S: CommitStrategy> VerificationFlow<S> {
    pub(crate) fn new(strategy: S, payload: S::Payload, time: Arc<dyn TimeSource>) -> Self {
        Self {
            strategy,
            payload,
            time,
            state: Mutex::new(Inner {
                core: SessionCore::new(VerificationCode::generate()),
                conflict: None,
                resolution: None,
            }),
        }
    }

    pub(crate) async fn choose_channel(&self, channel: Channel) -> Result<FlowSnapshot> {
        let command = self.state.lock().await.core.choose_channel(channel)?;
        if let Some(command) = command {
            self.run(command).await;
        }
        Ok(self.snapshot().await)
    }

    pub(crate) async fn enter_digit(&self, digit: u8) -> Result<FlowSnapshot> {
        let now = self.time.now_secs();
        let command = self.state.lock().await.core.enter_digit(digit, now)?;
        if let Some(command) = command {
            self.run(command).await;
        }
        Ok(self.snapshot().await)
    }

    pub(crate) async fn backspace(&self) -> Result<FlowSnapshot> {
        let now = self.time.now_secs();
        self.state.lock().await.core.backspace(now)?;
        Ok(self.snapshot().await)
    }

    pub(crate) async fn poll_expiry(&self) -> FlowSnapshot {
        let now = self.time.now_secs();
        let mut state = self.state.lock().await;
        state.core.poll_expiry(now);
        state.core.snapshot(now)
    }

    /// Replaces the code and dispatches the new one over the original
    /// channel.
    pub(crate) async fn resend(&self) -> Result<FlowSnapshot> {
        let now = self.time.now_secs();
        let command = self
            .state
            .lock()
            .await
            .core
            .begin_resend(VerificationCode::generate(), now)?;
        self.run(command).await;
        Ok(self.snapshot().await)
    }

    pub(crate) async fn resolve_duplicate(&self, accept: bool) -> Result<FlowSnapshot> {
        let now = self.time.now_secs();
        let mut state = self.state.lock().await;
        state.core.resolve_duplicate(accept)?;
        if accept {
            if let Some(client) = state.conflict.clone() {
                state.resolution = Some(Resolution::ExistingClient(client));
            }
        }
        Ok(state.core.snapshot(now))
    }

    pub(crate) async fn snapshot(&self) -> FlowSnapshot {
        let now = self.time.now_secs();
        self.state.lock().await.core.snapshot(now)
    }

    pub(crate) async fn conflict(&self) -> Option<Client> {
        self.state.lock().await.conflict.clone()
    }

    pub(crate) async fn resolution(&self) -> Option<Resolution<S::Record>> {
        self.state.lock().await.resolution.clone()
    }

    async fn run(&self, command: Command) {
        match command {
            Command::Dispatch(channel) => {
                let code = self.state.lock().await.core.code().clone();
                let sent = self.strategy.dispatch(channel, &code, &self.payload).await;
                let now = self.time.now_secs();
                let mut state = self.state.lock().await;
                match sent {
                    Ok(()) => state.core.dispatch_succeeded(now),
                    Err(error) => state.core.dispatch_failed(notice_for(&error)),
                }
            }
            Command::Commit => {
                let committed = self.strategy.commit(&self.payload).await;
                let mut state = self.state.lock().await;
                match committed {
                    Ok(CommitOutcome::Committed(record)) => {
                        state.resolution = Some(Resolution::Committed(record));
                        state.core.commit_succeeded();
                    }
                    Ok(CommitOutcome::DuplicateClient(client)) => {
                        state.conflict = Some(client);
                        state.core.commit_duplicate();
                    }
                    Err(error) => state.core.commit_failed(notice_for(&error)),
                }
            }
        }
    }
}

/// Message shown to the user for a failed dispatch or commit.
fn notice_for(error: &Error) -> String {
    match error {
        Error::Network { .. } => CONNECTION_NOTICE.to_string(),
        Error::Api { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::test_support::{sample_client, ManualTimeSource};

    #[derive(Default)]
    struct MockStrategy {
        dispatches: AtomicUsize,
        commits: AtomicUsize,
        sent_code: StdMutex<Option<String>>,
        fail_next_dispatch: AtomicBool,
        duplicate_of: Option<Client>,
        clock_jump_on_commit: Option<(Arc<ManualTimeSource>, u64)>,
    }

    #[async_trait]
    impl CommitStrategy for MockStrategy {
        type Payload = ();
        type Record = i64;

        async fn dispatch(
            &self,
            _channel: Channel,
            code: &VerificationCode,
            _payload: &Self::Payload,
        ) -> Result<()> {
            self.dispatches.fetch_add(1, Ordering::SeqCst);
            if self.fail_next_dispatch.swap(false, Ordering::SeqCst) {
                return Err(Error::Network {
                    url: "http://localhost:3000/api".to_string(),
                    error: "connection refused".to_string(),
                });
            }
            *self.sent_code.lock().unwrap() = Some(code.as_str().to_string());
            Ok(())
        }

        async fn commit(&self, _payload: &Self::Payload) -> Result<CommitOutcome<i64>> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            if let Some((time, to)) = &self.clock_jump_on_commit {
                time.set(*to);
            }
            if let Some(existing) = &self.duplicate_of {
                return Ok(CommitOutcome::DuplicateClient(existing.clone()));
            }
            Ok(CommitOutcome::Committed(7))
        }
    }

    fn flow_with(
        strategy: MockStrategy,
        time: Arc<ManualTimeSource>,
    ) -> VerificationFlow<MockStrategy> {
        VerificationFlow::new(strategy, (), time)
    }

    fn sent_code(flow: &VerificationFlow<MockStrategy>) -> String {
        flow.strategy.sent_code.lock().unwrap().clone().unwrap()
    }

    async fn enter_code(flow: &VerificationFlow<MockStrategy>, code: &str) -> FlowSnapshot {
        let mut snapshot = flow.snapshot().await;
        for byte in code.bytes() {
            snapshot = flow.enter_digit(byte - b'0').await.unwrap();
        }
        snapshot
    }

    fn with_wrong_last_digit(code: &str) -> String {
        let mut digits: Vec<u8> = code.bytes().collect();
        digits[5] = b'0' + ((digits[5] - b'0') + 1) % 10;
        String::from_utf8(digits).unwrap()
    }

    #[tokio::test]
    async fn wrong_code_then_correct_code_commits_once() {
        let time = Arc::new(ManualTimeSource::new(1_000));
        let flow = flow_with(MockStrategy::default(), Arc::clone(&time));
        flow.choose_channel(Channel::Whatsapp).await.unwrap();
        let code = sent_code(&flow);

        let snapshot = enter_code(&flow, &with_wrong_last_digit(&code)).await;
        assert_eq!(snapshot.stage, Stage::AwaitingCode);
        assert_eq!(
            snapshot.notice.as_deref(),
            Some("Código incorreto. Tente novamente.")
        );
        assert!(snapshot.slots.iter().all(Option::is_none));
        assert_eq!(flow.strategy.commits.load(Ordering::SeqCst), 0);

        let snapshot = enter_code(&flow, &code).await;
        assert_eq!(snapshot.stage, Stage::Terminal);
        assert_eq!(snapshot.outcome, Some(TerminalKind::Success));
        assert_eq!(flow.strategy.commits.load(Ordering::SeqCst), 1);
        assert!(matches!(
            flow.resolution().await,
            Some(Resolution::Committed(7))
        ));
    }

    #[tokio::test]
    async fn resend_restarts_countdown_and_dispatches_again() {
        let time = Arc::new(ManualTimeSource::new(1_000));
        let flow = flow_with(MockStrategy::default(), Arc::clone(&time));
        flow.choose_channel(Channel::Whatsapp).await.unwrap();
        time.set(1_400);
        assert_eq!(flow.snapshot().await.remaining_secs, 200);

        let snapshot = flow.resend().await.unwrap();
        assert_eq!(flow.strategy.dispatches.load(Ordering::SeqCst), 2);
        assert_eq!(snapshot.remaining_secs, CODE_TTL_SECS);
        assert_eq!(snapshot.stage, Stage::AwaitingCode);

        let snapshot = enter_code(&flow, &sent_code(&flow)).await;
        assert_eq!(snapshot.outcome, Some(TerminalKind::Success));
    }

    #[tokio::test]
    async fn commit_in_flight_wins_over_expiry() {
        let time = Arc::new(ManualTimeSource::new(1_000));
        let strategy = MockStrategy {
            clock_jump_on_commit: Some((Arc::clone(&time), 2_000)),
            ..MockStrategy::default()
        };
        let flow = flow_with(strategy, Arc::clone(&time));
        flow.choose_channel(Channel::Whatsapp).await.unwrap();
        time.set(1_599);

        let snapshot = enter_code(&flow, &sent_code(&flow)).await;
        assert_eq!(snapshot.stage, Stage::Terminal);
        assert_eq!(snapshot.outcome, Some(TerminalKind::Success));
        assert!(snapshot.expired);
    }

    #[tokio::test]
    async fn expiry_poll_ends_an_idle_session() {
        let time = Arc::new(ManualTimeSource::new(1_000));
        let flow = flow_with(MockStrategy::default(), Arc::clone(&time));
        flow.choose_channel(Channel::Whatsapp).await.unwrap();
        time.set(1_600);

        let snapshot = flow.poll_expiry().await;
        assert_eq!(snapshot.stage, Stage::Terminal);
        assert_eq!(snapshot.outcome, Some(TerminalKind::Expired));
        assert!(matches!(
            flow.enter_digit(1).await,
            Err(Error::FlowState { .. })
        ));
    }

    #[tokio::test]
    async fn failed_dispatch_returns_to_channel_choice_with_notice() {
        let time = Arc::new(ManualTimeSource::new(1_000));
        let strategy = MockStrategy {
            fail_next_dispatch: AtomicBool::new(true),
            ..MockStrategy::default()
        };
        let flow = flow_with(strategy, Arc::clone(&time));

        let snapshot = flow.choose_channel(Channel::Whatsapp).await.unwrap();
        assert_eq!(snapshot.stage, Stage::AwaitingChannelChoice);
        assert_eq!(snapshot.notice.as_deref(), Some(CONNECTION_NOTICE));

        let snapshot = flow.choose_channel(Channel::Whatsapp).await.unwrap();
        assert_eq!(snapshot.stage, Stage::AwaitingCode);
    }

    #[tokio::test]
    async fn duplicate_commit_waits_for_resolution() {
        let time = Arc::new(ManualTimeSource::new(1_000));
        let strategy = MockStrategy {
            duplicate_of: Some(sample_client()),
            ..MockStrategy::default()
        };
        let flow = flow_with(strategy, Arc::clone(&time));
        flow.choose_channel(Channel::Whatsapp).await.unwrap();

        let snapshot = enter_code(&flow, &sent_code(&flow)).await;
        assert_eq!(snapshot.stage, Stage::ResolvingDuplicate);
        let conflict = flow.conflict().await.unwrap();
        assert_eq!(conflict.nome, sample_client().nome);

        let snapshot = flow.resolve_duplicate(true).await.unwrap();
        assert_eq!(snapshot.outcome, Some(TerminalKind::Success));
        assert!(matches!(
            flow.resolution().await,
            Some(Resolution::ExistingClient(_))
        ));
    }

    #[tokio::test]
    async fn sms_stays_on_channel_choice() {
        let time = Arc::new(ManualTimeSource::new(1_000));
        let flow = flow_with(MockStrategy::default(), time);
        let snapshot = flow.choose_channel(Channel::Sms).await.unwrap();
        assert_eq!(snapshot.stage, Stage::AwaitingChannelChoice);
        assert!(snapshot.notice.is_some());
        assert_eq!(flow.strategy.dispatches.load(Ordering::SeqCst), 0);
    }
}
