//! Typed gateway to the AgroVendas backend REST surface.
//!
//! Owns the base URL and attaches the bearer token from the
//! [`SessionManager`] to every authenticated call. Requests are never
//! retried; a 409 on client commit is reported as a duplicate conflict
//! rather than an error.

use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde::de::DeserializeOwned;

use crate::client_form::CandidateClient;
use crate::error::{Error, Result};
use crate::http::Request;
use crate::photo::CapturedPhoto;
use crate::sale_form::CandidateSale;
use crate::session::SessionManager;
use crate::Environment;

mod types;

pub use types::{AuthenticatedSession, Client, User};
pub(crate) use types::{ClientVerificationDispatch, SaleVerificationDispatch};

use types::{
    ClientListResponse, ClientResponse, DuplicateResponse, Envelope, LoginRequest,
    LoginResponse, RegisterRequest, SaleCreatedResponse,
};

const LOGIN_FALLBACK: &str = "Credenciais inválidas";
const REGISTER_FALLBACK: &str = "Erro ao realizar cadastro";
const DISPATCH_FALLBACK: &str = "Erro ao enviar código";
const CLIENT_COMMIT_FALLBACK: &str = "Erro ao cadastrar cliente";
const SALE_COMMIT_FALLBACK: &str = "Erro ao cadastrar venda";
const CLIENT_LIST_FALLBACK: &str = "Erro ao carregar clientes";
const CLIENT_GET_FALLBACK: &str = "Erro ao carregar cliente";
const DOCUMENT_FALLBACK: &str = "Erro ao baixar PDF do servidor";

/// Result of submitting a new client to the backend.
#[derive(Debug)]
pub(crate) enum ClientCommitOutcome {
    /// The client was created; the server-assigned record is returned.
    Created(Client),
    /// The backend matched an existing client (HTTP 409). The record is
    /// `None` when the conflict body carried no usable client.
    Duplicate(Option<Client>),
}

/// Typed client for the AgroVendas backend.
#[cfg_attr(feature = "ffi", derive(uniffi::Object))]
pub struct ApiClient {
    base_url: String,
    http: Request,
    session: Arc<SessionManager>,
}

#[cfg_attr(feature = "ffi", uniffi::export(async_runtime = "tokio"))]
impl ApiClient {
    /// Creates a client for the given environment.
    #[cfg_attr(feature = "ffi", uniffi::constructor)]
    #[must_use]
    pub fn new(environment: Environment, session: Arc<SessionManager>) -> Self {
        Self::with_base_url(environment.base_url().to_string(), session)
    }

    /// Creates a client against an explicit base URL (tests, staging hosts).
    #[cfg_attr(feature = "ffi", uniffi::constructor)]
    #[must_use]
    pub fn with_base_url(base_url: String, session: Arc<SessionManager>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Request::new(),
            session,
        }
    }

    /// Exchanges credentials for a bearer token and the seller identity.
    ///
    /// Does not activate the session; call
    /// [`SessionManager::sign_in`] with the result to do that.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] with the backend `mensagem` (or "Credenciais
    /// inválidas") when the login is refused, or [`Error::Network`] when the
    /// request never completes.
    pub async fn authenticate(
        &self,
        email: String,
        senha: String,
    ) -> Result<AuthenticatedSession> {
        let url = self.endpoint("auth/login");
        let body = LoginRequest {
            email: &email,
            senha: &senha,
        };
        let response = self.http.send(&url, self.http.post(&url).json(&body)).await?;
        let (status, text) = read_body(&url, response).await?;
        if !is_success(status) {
            return Err(api_error(status, &text, LOGIN_FALLBACK));
        }
        let parsed: LoginResponse = decode(&url, status, &text)?;
        match (parsed.sucesso, parsed.token, parsed.usuario) {
            (true, Some(token), Some(user)) => Ok(AuthenticatedSession { token, user }),
            (_, _, _) => Err(Error::Api {
                status,
                message: parsed.mensagem.unwrap_or_else(|| LOGIN_FALLBACK.to_string()),
            }),
        }
    }

    /// Creates a seller account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the password has fewer than 6
    /// characters (checked locally, before any network call), or
    /// [`Error::Api`]/[`Error::Network`] when the backend refuses it.
    pub async fn register(
        &self,
        nome: String,
        email: String,
        senha: String,
        tipo_usuario: String,
    ) -> Result<()> {
        if senha.chars().count() < 6 {
            return Err(Error::InvalidInput {
                attribute: "senha".to_string(),
                reason: "deve ter no mínimo 6 caracteres".to_string(),
            });
        }
        let url = self.endpoint("auth/register");
        let body = RegisterRequest {
            nome: &nome,
            email: &email,
            senha: &senha,
            tipo_usuario: &tipo_usuario,
        };
        let response = self.http.send(&url, self.http.post(&url).json(&body)).await?;
        self.expect_envelope(&url, response, REGISTER_FALLBACK).await
    }

    /// Lists registered clients, optionally filtered by a search term
    /// (name or tax id, matched backend-side).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] without an active session, or
    /// [`Error::Api`]/[`Error::Network`] when the call fails.
    pub async fn list_clients(&self, busca: Option<String>) -> Result<Vec<Client>> {
        let url = self.endpoint("clientes");
        let mut builder = self.http.get(&url).bearer_auth(self.bearer().await?);
        if let Some(term) = busca.filter(|term| !term.is_empty()) {
            builder = builder.query(&[("busca", term)]);
        }
        let response = self.http.send(&url, builder).await?;
        let (status, text) = read_body(&url, response).await?;
        if !is_success(status) {
            return Err(api_error(status, &text, CLIENT_LIST_FALLBACK));
        }
        let parsed: ClientListResponse = decode(&url, status, &text)?;
        if parsed.sucesso {
            Ok(parsed.clientes.unwrap_or_default())
        } else {
            Err(Error::Api {
                status,
                message: parsed
                    .mensagem
                    .unwrap_or_else(|| CLIENT_LIST_FALLBACK.to_string()),
            })
        }
    }

    /// Fetches a single client by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] without an active session, or
    /// [`Error::Api`]/[`Error::Network`] when the call fails.
    pub async fn get_client(&self, id: i64) -> Result<Client> {
        let url = self.endpoint(&format!("clientes/{id}"));
        let builder = self.http.get(&url).bearer_auth(self.bearer().await?);
        let response = self.http.send(&url, builder).await?;
        let (status, text) = read_body(&url, response).await?;
        if !is_success(status) {
            return Err(api_error(status, &text, CLIENT_GET_FALLBACK));
        }
        let parsed: ClientResponse = decode(&url, status, &text)?;
        match (parsed.sucesso, parsed.cliente) {
            (true, Some(client)) => Ok(client),
            (true, None) => Err(Error::Serialization {
                error: format!("response from {url} is missing the cliente record"),
            }),
            (false, _) => Err(Error::Api {
                status,
                message: parsed
                    .mensagem
                    .unwrap_or_else(|| CLIENT_GET_FALLBACK.to_string()),
            }),
        }
    }

    /// Downloads the generated installment-plan document for a sale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] without an active session, or
    /// [`Error::Api`]/[`Error::Network`] when the download fails.
    pub async fn fetch_sale_document(&self, venda_id: i64) -> Result<Vec<u8>> {
        let url = self.endpoint(&format!("vendas/{venda_id}/pdf"));
        let builder = self.http.get(&url).bearer_auth(self.bearer().await?);
        let response = self.http.send(&url, builder).await?;
        let status = response.status().as_u16();
        if !is_success(status) {
            let text = response.text().await.unwrap_or_default();
            return Err(api_error(status, &text, DOCUMENT_FALLBACK));
        }
        let bytes = response.bytes().await.map_err(|err| Error::Network {
            url: url.clone(),
            error: err.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

impl ApiClient {
    /// Sends the out-of-band verification code for a client registration.
    /// This endpoint is unauthenticated: it runs before the client exists.
    pub(crate) async fn dispatch_client_verification(
        &self,
        body: &ClientVerificationDispatch<'_>,
    ) -> Result<()> {
        let url = self.endpoint("clientes/enviar-verificacao");
        tracing::debug!(metodo = %body.metodo, "dispatching client verification code");
        let response = self.http.send(&url, self.http.post(&url).json(body)).await?;
        self.expect_envelope(&url, response, DISPATCH_FALLBACK).await
    }

    /// Sends the out-of-band verification code for a sale.
    pub(crate) async fn dispatch_sale_verification(
        &self,
        body: &SaleVerificationDispatch<'_>,
    ) -> Result<()> {
        let url = self.endpoint("vendas/enviar-codigo-verificacao");
        tracing::debug!(metodo = %body.metodo, cliente_id = body.cliente_id, "dispatching sale verification code");
        let response = self.http.send(&url, self.http.post(&url).json(body)).await?;
        self.expect_envelope(&url, response, DISPATCH_FALLBACK).await
    }

    /// Commits a verified client. 409 responses are surfaced as
    /// [`ClientCommitOutcome::Duplicate`], never as errors.
    pub(crate) async fn create_client(
        &self,
        candidate: &CandidateClient,
        seller: &User,
    ) -> Result<ClientCommitOutcome> {
        let url = self.endpoint("clientes");
        let form = Form::new()
            .text("nome", candidate.nome.clone())
            .text("documento", candidate.documento.clone())
            .text("telefone", candidate.telefone.clone())
            .text("endereco", candidate.endereco.clone())
            .text("verificado", "true")
            .text("vendedorId", seller.id.to_string())
            .text("vendedorNome", seller.nome.clone())
            .part("fotoDocumento", photo_part(&candidate.foto)?);
        let builder = self
            .http
            .post(&url)
            .bearer_auth(self.bearer().await?)
            .multipart(form);
        tracing::debug!(documento = %candidate.documento, "committing verified client");
        let response = self.http.send(&url, builder).await?;
        let (status, text) = read_body(&url, response).await?;
        if status == 409 {
            let existing = serde_json::from_str::<DuplicateResponse>(&text)
                .ok()
                .and_then(|body| body.cliente.or(body.data));
            return Ok(ClientCommitOutcome::Duplicate(existing));
        }
        if !is_success(status) {
            return Err(api_error(status, &text, CLIENT_COMMIT_FALLBACK));
        }
        let parsed: ClientResponse = decode(&url, status, &text)?;
        match (parsed.sucesso, parsed.cliente) {
            (true, Some(client)) => Ok(ClientCommitOutcome::Created(client)),
            (true, None) => Err(Error::Serialization {
                error: format!("response from {url} is missing the created cliente"),
            }),
            (false, _) => Err(Error::Api {
                status,
                message: parsed
                    .mensagem
                    .unwrap_or_else(|| CLIENT_COMMIT_FALLBACK.to_string()),
            }),
        }
    }

    /// Commits a verified sale. Returns the created sale id when the backend
    /// provides one (`vendaId`, falling back to `id`).
    pub(crate) async fn create_sale(
        &self,
        candidate: &CandidateSale,
        seller: &User,
    ) -> Result<Option<i64>> {
        let url = self.endpoint("vendas");
        let form = Form::new()
            .text("clienteId", candidate.cliente_id.to_string())
            .text("valor", candidate.valor_wire())
            .text("parcelas", candidate.parcelas.to_string())
            .text("dataVencimento", candidate.data_vencimento_wire())
            .text("descricao", candidate.descricao.clone())
            .text("numeroFicha", candidate.numero_ficha.clone())
            .text("vendedorId", seller.id.to_string())
            .text("tipoVenda", candidate.tipo.to_string())
            .text("rotaId", candidate.rota_id.to_string())
            .text("codigoVerificado", "true")
            .part("fotoFicha", photo_part(&candidate.foto)?);
        let builder = self
            .http
            .post(&url)
            .bearer_auth(self.bearer().await?)
            .multipart(form);
        tracing::debug!(
            cliente_id = candidate.cliente_id,
            tipo = %candidate.tipo,
            "committing verified sale"
        );
        let response = self.http.send(&url, builder).await?;
        let (status, text) = read_body(&url, response).await?;
        if !is_success(status) {
            return Err(api_error(status, &text, SALE_COMMIT_FALLBACK));
        }
        let parsed: SaleCreatedResponse = decode(&url, status, &text)?;
        if parsed.sucesso {
            Ok(parsed.venda_id.or(parsed.id))
        } else {
            Err(Error::Api {
                status,
                message: parsed
                    .mensagem
                    .unwrap_or_else(|| SALE_COMMIT_FALLBACK.to_string()),
            })
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn bearer(&self) -> Result<String> {
        self.session
            .bearer_token()
            .await
            .ok_or(Error::NotAuthenticated)
    }

    /// Reads a `{sucesso, mensagem}` envelope and requires `sucesso`.
    async fn expect_envelope(
        &self,
        url: &str,
        response: Response,
        fallback: &str,
    ) -> Result<()> {
        let (status, text) = read_body(url, response).await?;
        if !is_success(status) {
            return Err(api_error(status, &text, fallback));
        }
        let parsed: Envelope = decode(url, status, &text)?;
        if parsed.sucesso {
            Ok(())
        } else {
            Err(Error::Api {
                status,
                message: parsed.mensagem.unwrap_or_else(|| fallback.to_string()),
            })
        }
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn api_error(status: u16, text: &str, fallback: &str) -> Error {
    let message = serde_json::from_str::<Envelope>(text)
        .ok()
        .and_then(|body| body.mensagem)
        .unwrap_or_else(|| fallback.to_string());
    Error::Api { status, message }
}

async fn read_body(url: &str, response: Response) -> Result<(u16, String)> {
    let status = response.status().as_u16();
    let text = response.text().await.map_err(|err| Error::Network {
        url: url.to_string(),
        error: err.to_string(),
    })?;
    Ok((status, text))
}

fn decode<T: DeserializeOwned>(url: &str, status: u16, text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|err| {
        let snippet: String = text.chars().take(20).collect();
        Error::Serialization {
            error: format!(
                "failed to parse response from {url} (status {status}): {err}. First 20 chars: {snippet}"
            ),
        }
    })
}

fn photo_part(photo: &CapturedPhoto) -> Result<Part> {
    Part::bytes(photo.bytes.clone())
        .file_name(photo.file_name.clone())
        .mime_str(&photo.content_type)
        .map_err(|err| Error::InvalidInput {
            attribute: "content_type".to_string(),
            reason: err.to_string(),
        })
}
