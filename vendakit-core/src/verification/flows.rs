//! The two exported verification flows: client registration and sale
//! registration.
//!
//! Each wraps a [`VerificationFlow`] around a concrete [`CommitStrategy`]
//! over the [`ApiClient`], and adds the post-commit surface the host renders
//! after a success.

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{
    ApiClient, Client, ClientCommitOutcome, ClientVerificationDispatch, SaleVerificationDispatch,
    User,
};
use crate::client_form::{CandidateClient, ClientForm};
use crate::error::Result;
use crate::sale_form::{CandidateSale, SaleForm, SaleKind};
use crate::time::{SystemTimeSource, TimeSource};
use crate::verification::code::VerificationCode;
use crate::verification::{
    Channel, CommitOutcome, CommitStrategy, FlowSnapshot, Resolution, VerificationFlow,
};

/// Seed for a sale form, handed out after a client registration so the
/// follow-up sale starts with the client already filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct SalePrefill {
    /// Backend id of the client, when known.
    pub cliente_id: Option<i64>,
    /// Client name.
    pub nome: String,
    /// Digits-only tax id.
    pub documento: String,
    /// Digits-only phone.
    pub telefone: String,
}

/// Outcome of a finished client registration flow.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ClientRegistrationResult {
    /// The committed record, or the existing record the user adopted.
    pub client: Client,
    /// Whether the record came from duplicate resolution rather than a
    /// fresh commit.
    pub used_existing: bool,
}

/// Pointer to the promissory document generated for an installment sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct SaleDocumentOffer {
    /// Sale the document belongs to.
    pub venda_id: i64,
}

/// Outcome of a finished sale registration flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct SaleRegistrationResult {
    /// Backend id of the committed sale, when the backend provided one.
    pub venda_id: Option<i64>,
    /// Document offer, present only after an installment sale with a known
    /// id.
    pub document: Option<SaleDocumentOffer>,
}

pub(crate) struct ClientCommitStrategy {
    api: Arc<ApiClient>,
    seller: User,
}

#[async_trait]
impl CommitStrategy for ClientCommitStrategy {
    type Payload = CandidateClient;
    type Record = Client;

    async fn dispatch(
        &self,
        channel: Channel,
        code: &VerificationCode,
        payload: &CandidateClient,
    ) -> Result<()> {
        let body = ClientVerificationDispatch {
            nome_cliente: &payload.nome,
            nome_vendedor: &self.seller.nome,
            documento: &payload.documento,
            telefone: &payload.telefone,
            endereco: &payload.endereco,
            codigo_verificacao: code.as_str(),
            metodo: channel,
        };
        self.api.dispatch_client_verification(&body).await
    }

    async fn commit(&self, payload: &CandidateClient) -> Result<CommitOutcome<Client>> {
        match self.api.create_client(payload, &self.seller).await? {
            ClientCommitOutcome::Created(client) => Ok(CommitOutcome::Committed(client)),
            ClientCommitOutcome::Duplicate(existing) => Ok(CommitOutcome::DuplicateClient(
                existing.unwrap_or_else(|| conflict_placeholder(payload)),
            )),
        }
    }
}

/// Stands in for the existing record when a 409 body carries no client.
fn conflict_placeholder(candidate: &CandidateClient) -> Client {
    Client {
        id: None,
        nome: candidate.nome.clone(),
        documento: Some(candidate.documento.clone()),
        telefone: Some(candidate.telefone.clone()),
        endereco: Some(candidate.endereco.clone()),
        email: None,
    }
}

pub(crate) struct SaleCommitStrategy {
    api: Arc<ApiClient>,
    seller: User,
}

#[async_trait]
impl CommitStrategy for SaleCommitStrategy {
    type Payload = CandidateSale;
    type Record = Option<i64>;

    async fn dispatch(
        &self,
        channel: Channel,
        code: &VerificationCode,
        payload: &CandidateSale,
    ) -> Result<()> {
        let body = SaleVerificationDispatch {
            cliente_id: payload.cliente_id,
            cliente_nome: &payload.cliente_nome,
            cliente_telefone: &payload.cliente_telefone,
            nome_vendedor: &self.seller.nome,
            codigo_verificacao: code.as_str(),
            metodo: channel,
            valor: payload.valor_wire(),
            tipo_venda: payload.tipo,
        };
        self.api.dispatch_sale_verification(&body).await
    }

    async fn commit(&self, payload: &CandidateSale) -> Result<CommitOutcome<Option<i64>>> {
        let venda_id = self.api.create_sale(payload, &self.seller).await?;
        Ok(CommitOutcome::Committed(venda_id))
    }
}

/// One client registration session, from channel choice to committed record.
#[cfg_attr(feature = "ffi", derive(uniffi::Object))]
pub struct ClientRegistrationFlow {
    flow: VerificationFlow<ClientCommitStrategy>,
    candidate: CandidateClient,
}

#[cfg_attr(feature = "ffi", uniffi::export(async_runtime = "tokio"))]
impl ClientRegistrationFlow {
    /// Validates the form and opens a verification session for it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] when the form does not
    /// validate.
    #[cfg_attr(feature = "ffi", uniffi::constructor)]
    pub fn new(api: Arc<ApiClient>, seller: User, form: ClientForm) -> Result<Self> {
        Self::with_time_source(api, seller, form, Arc::new(SystemTimeSource))
    }

    /// Picks the dispatch channel and sends the code when it is available.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FlowState`] when a channel was already
    /// chosen.
    pub async fn choose_channel(&self, channel: Channel) -> Result<FlowSnapshot> {
        self.flow.choose_channel(channel).await
    }

    /// Records one digit; the sixth matching digit triggers the commit.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CodeExpired`] past the deadline,
    /// [`crate::Error::InvalidInput`] for a non-digit, and
    /// [`crate::Error::FlowState`] outside digit entry.
    pub async fn enter_digit(&self, digit: u8) -> Result<FlowSnapshot> {
        self.flow.enter_digit(digit).await
    }

    /// Clears the focused slot, or steps back one slot.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::enter_digit`].
    pub async fn backspace(&self) -> Result<FlowSnapshot> {
        self.flow.backspace().await
    }

    /// Applies the countdown; call once a second while rendering it.
    pub async fn poll_expiry(&self) -> FlowSnapshot {
        self.flow.poll_expiry().await
    }

    /// Regenerates the code and dispatches it again over the same channel.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CodeExpired`] past the deadline and
    /// [`crate::Error::FlowState`] outside digit entry.
    pub async fn resend(&self) -> Result<FlowSnapshot> {
        self.flow.resend().await
    }

    /// Settles a duplicate conflict: adopt the existing record or abandon.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FlowState`] when no conflict is pending.
    pub async fn resolve_duplicate(&self, accept_existing: bool) -> Result<FlowSnapshot> {
        self.flow.resolve_duplicate(accept_existing).await
    }

    /// Current render-ready view of the session.
    pub async fn snapshot(&self) -> FlowSnapshot {
        self.flow.snapshot().await
    }

    /// The existing client the backend reported, once in conflict.
    pub async fn conflict(&self) -> Option<Client> {
        self.flow.conflict().await
    }

    /// The settled record, once the session ended in success.
    pub async fn result(&self) -> Option<ClientRegistrationResult> {
        match self.flow.resolution().await? {
            Resolution::Committed(client) => Some(ClientRegistrationResult {
                client,
                used_existing: false,
            }),
            Resolution::ExistingClient(client) => Some(ClientRegistrationResult {
                client,
                used_existing: true,
            }),
        }
    }

    /// Seed for the follow-up sale offer, once the session ended in
    /// success. Fields the settled record left blank fall back to the form
    /// input.
    pub async fn sale_prefill(&self) -> Option<SalePrefill> {
        let result = self.result().await?;
        Some(SalePrefill {
            cliente_id: result.client.id,
            nome: pick(Some(result.client.nome.as_str()), &self.candidate.nome),
            documento: pick(result.client.documento.as_deref(), &self.candidate.documento),
            telefone: pick(result.client.telefone.as_deref(), &self.candidate.telefone),
        })
    }
}

impl ClientRegistrationFlow {
    /// Like [`Self::new`] with an explicit clock, for hosts that control
    /// time under test.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] when the form does not
    /// validate.
    pub fn with_time_source(
        api: Arc<ApiClient>,
        seller: User,
        form: ClientForm,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self> {
        let candidate = form.validate()?;
        let strategy = ClientCommitStrategy { api, seller };
        Ok(Self {
            flow: VerificationFlow::new(strategy, candidate.clone(), time),
            candidate,
        })
    }
}

fn pick(primary: Option<&str>, fallback: &str) -> String {
    match primary {
        Some(value) if !value.trim().is_empty() => value.to_string(),
        _ => fallback.to_string(),
    }
}

/// One sale registration session, from channel choice to committed sale.
#[cfg_attr(feature = "ffi", derive(uniffi::Object))]
pub struct SaleRegistrationFlow {
    flow: VerificationFlow<SaleCommitStrategy>,
    tipo: SaleKind,
}

#[cfg_attr(feature = "ffi", uniffi::export(async_runtime = "tokio"))]
impl SaleRegistrationFlow {
    /// Validates the form and opens a verification session for it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] when the form does not
    /// validate.
    #[cfg_attr(feature = "ffi", uniffi::constructor)]
    pub fn new(api: Arc<ApiClient>, seller: User, form: SaleForm) -> Result<Self> {
        Self::with_time_source(api, seller, form, Arc::new(SystemTimeSource))
    }

    /// Picks the dispatch channel and sends the code when it is available.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FlowState`] when a channel was already
    /// chosen.
    pub async fn choose_channel(&self, channel: Channel) -> Result<FlowSnapshot> {
        self.flow.choose_channel(channel).await
    }

    /// Records one digit; the sixth matching digit triggers the commit.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CodeExpired`] past the deadline,
    /// [`crate::Error::InvalidInput`] for a non-digit, and
    /// [`crate::Error::FlowState`] outside digit entry.
    pub async fn enter_digit(&self, digit: u8) -> Result<FlowSnapshot> {
        self.flow.enter_digit(digit).await
    }

    /// Clears the focused slot, or steps back one slot.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::enter_digit`].
    pub async fn backspace(&self) -> Result<FlowSnapshot> {
        self.flow.backspace().await
    }

    /// Applies the countdown; call once a second while rendering it.
    pub async fn poll_expiry(&self) -> FlowSnapshot {
        self.flow.poll_expiry().await
    }

    /// Regenerates the code and dispatches it again over the same channel.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CodeExpired`] past the deadline and
    /// [`crate::Error::FlowState`] outside digit entry.
    pub async fn resend(&self) -> Result<FlowSnapshot> {
        self.flow.resend().await
    }

    /// Current render-ready view of the session.
    pub async fn snapshot(&self) -> FlowSnapshot {
        self.flow.snapshot().await
    }

    /// The committed sale and its document offer, once the session ended in
    /// success.
    pub async fn result(&self) -> Option<SaleRegistrationResult> {
        match self.flow.resolution().await? {
            Resolution::Committed(venda_id) => Some(SaleRegistrationResult {
                venda_id,
                document: document_offer(self.tipo, venda_id),
            }),
            // Sales never resolve through a duplicate.
            Resolution::ExistingClient(_) => None,
        }
    }
}

/// A document is offered only for installment sales whose id is known.
fn document_offer(tipo: SaleKind, venda_id: Option<i64>) -> Option<SaleDocumentOffer> {
    let venda_id = venda_id?;
    tipo.offers_document().then_some(SaleDocumentOffer { venda_id })
}

impl SaleRegistrationFlow {
    /// Like [`Self::new`] with an explicit clock, for hosts that control
    /// time under test.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] when the form does not
    /// validate.
    pub fn with_time_source(
        api: Arc<ApiClient>,
        seller: User,
        form: SaleForm,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self> {
        let candidate = form.validate()?;
        let strategy = SaleCommitStrategy { api, seller };
        let tipo = candidate.tipo;
        Ok(Self {
            flow: VerificationFlow::new(strategy, candidate, time),
            tipo,
        })
    }
}
