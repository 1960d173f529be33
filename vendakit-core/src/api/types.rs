//! Wire types for the AgroVendas backend.
//!
//! Response envelopes follow the backend convention of a `sucesso` flag plus
//! an optional `mensagem`; a call only counts as successful when the HTTP
//! status is 2xx AND `sucesso` is true.

use serde::{Deserialize, Serialize};

use crate::sale_form::SaleKind;
use crate::verification::Channel;

/// Authenticated seller identity as returned by `auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct User {
    /// Server-assigned seller id.
    pub id: i64,
    /// Display name, also sent to clients inside verification messages.
    pub nome: String,
    /// Login e-mail.
    pub email: String,
    /// Account kind (e.g. `vendedor`).
    pub tipo: String,
}

/// A registered client record.
///
/// `id` is absent only on the synthetic record built from locally captured
/// fields when a duplicate conflict arrives without a body (see
/// [`crate::verification::ClientRegistrationFlow`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Client {
    /// Server-assigned client id.
    pub id: Option<i64>,
    /// Full name.
    pub nome: String,
    /// Tax id, digits only. Some backend routes name this field `cpf`.
    #[serde(alias = "cpf")]
    pub documento: Option<String>,
    /// Contact phone, digits only.
    pub telefone: Option<String>,
    /// Street address.
    pub endereco: Option<String>,
    /// Contact e-mail.
    pub email: Option<String>,
}

/// Token and seller identity produced by a successful login.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct AuthenticatedSession {
    /// Bearer token for subsequent calls.
    pub token: String,
    /// The seller the token belongs to.
    pub user: User,
}

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub senha: &'a str,
}

// The register route is the one endpoint using snake_case field names.
#[derive(Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub nome: &'a str,
    pub email: &'a str,
    pub senha: &'a str,
    pub tipo_usuario: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClientVerificationDispatch<'a> {
    pub nome_cliente: &'a str,
    pub nome_vendedor: &'a str,
    pub documento: &'a str,
    pub telefone: &'a str,
    pub endereco: &'a str,
    pub codigo_verificacao: &'a str,
    pub metodo: Channel,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaleVerificationDispatch<'a> {
    pub cliente_id: i64,
    pub cliente_nome: &'a str,
    pub cliente_telefone: &'a str,
    pub nome_vendedor: &'a str,
    pub codigo_verificacao: &'a str,
    pub metodo: Channel,
    /// Decimal string with a dot separator, e.g. `"1234.56"`.
    pub valor: String,
    pub tipo_venda: SaleKind,
}

#[derive(Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub sucesso: bool,
    pub mensagem: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(default)]
    pub sucesso: bool,
    pub token: Option<String>,
    pub usuario: Option<User>,
    pub mensagem: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct ClientListResponse {
    #[serde(default)]
    pub sucesso: bool,
    pub clientes: Option<Vec<Client>>,
    pub mensagem: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct ClientResponse {
    #[serde(default)]
    pub sucesso: bool,
    pub cliente: Option<Client>,
    pub mensagem: Option<String>,
}

/// Body of a 409 on `POST clientes`. Routes disagree on where the matched
/// record lives (`cliente` vs `data`), so both are tried.
#[derive(Deserialize)]
pub(crate) struct DuplicateResponse {
    pub cliente: Option<Client>,
    pub data: Option<Client>,
    pub mensagem: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaleCreatedResponse {
    #[serde(default)]
    pub sucesso: bool,
    pub venda_id: Option<i64>,
    pub id: Option<i64>,
    pub mensagem: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_accepts_cpf_alias_and_missing_fields() {
        let parsed: Client =
            serde_json::from_str(r#"{"id": 7, "nome": "Maria", "cpf": "11144477735"}"#)
                .unwrap();
        assert_eq!(parsed.id, Some(7));
        assert_eq!(parsed.documento.as_deref(), Some("11144477735"));
        assert!(parsed.telefone.is_none());
    }

    #[test]
    fn client_dispatch_serializes_camel_case() {
        let body = ClientVerificationDispatch {
            nome_cliente: "Maria",
            nome_vendedor: "João",
            documento: "11144477735",
            telefone: "11987654321",
            endereco: "Rua A, 1",
            codigo_verificacao: "482913",
            metodo: Channel::Whatsapp,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["nomeCliente"], "Maria");
        assert_eq!(json["codigoVerificacao"], "482913");
        assert_eq!(json["metodo"], "whatsapp");
    }

    #[test]
    fn sale_created_reads_venda_id_or_id() {
        let with_venda_id: SaleCreatedResponse =
            serde_json::from_str(r#"{"sucesso": true, "vendaId": 31}"#).unwrap();
        assert_eq!(with_venda_id.venda_id, Some(31));

        let with_plain_id: SaleCreatedResponse =
            serde_json::from_str(r#"{"sucesso": true, "id": 32}"#).unwrap();
        assert_eq!(with_plain_id.id, Some(32));
        assert!(with_plain_id.venda_id.is_none());
    }

    #[test]
    fn envelope_defaults_sucesso_to_false() {
        let parsed: Envelope = serde_json::from_str(r#"{"mensagem": "nope"}"#).unwrap();
        assert!(!parsed.sucesso);
        assert_eq!(parsed.mensagem.as_deref(), Some("nope"));
    }
}
