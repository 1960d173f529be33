//! Sale registration form, the sale-kind catalog, and its validated
//! candidate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::photo::CapturedPhoto;

/// Route every device sale is filed under until route management ships.
pub const DEFAULT_ROTA_ID: i64 = 1;
/// Display name of the default route.
pub const DEFAULT_ROTA_NOME: &str = "Rota Padrão";

/// Payment arrangement of a sale.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SaleKind {
    /// Paid in full, in cash, at the time of sale.
    VistaDinheiro,
    /// Paid in full on a scheduled date.
    VistaAgendado,
    /// Paid in installments against a signed ficha.
    Parcelado,
}

impl SaleKind {
    /// Whether a committed sale of this kind has a promissory document to
    /// download.
    #[must_use]
    pub const fn offers_document(self) -> bool {
        matches!(self, Self::Parcelado)
    }

    /// Whether the sale settles in a single payment regardless of the
    /// installment field.
    #[must_use]
    pub const fn is_cash_variant(self) -> bool {
        !matches!(self, Self::Parcelado)
    }

    /// Whether hosts currently offer this kind. The cash variants stay in
    /// the wire contract but are not sold through the app yet.
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Parcelado)
    }
}

/// Raw sale registration input as typed on the device.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct SaleForm {
    /// Backend id of the client the sale belongs to.
    pub cliente_id: Option<i64>,
    /// Client name shown in the verification message.
    pub cliente_nome: String,
    /// Phone the verification code is dispatched to.
    pub cliente_telefone: String,
    /// Payment arrangement.
    pub tipo: SaleKind,
    /// Sale amount as typed, `"R$ 1.234,56"` or `"1234.56"`.
    pub valor: String,
    /// Installment count as typed; ignored for single-payment kinds.
    pub parcelas: String,
    /// First due date as typed, `dd/mm/yyyy`.
    pub data_vencimento: String,
    /// Free-form description of what was sold.
    pub descricao: String,
    /// Number of the paper ficha backing the sale.
    pub numero_ficha: String,
    /// Photo of the signed ficha.
    pub foto: Option<CapturedPhoto>,
}

/// A sale form that passed validation and may enter verification.
#[derive(Debug, Clone)]
pub struct CandidateSale {
    /// Backend id of the client.
    pub cliente_id: i64,
    /// Client name shown in the verification message.
    pub cliente_nome: String,
    /// Canonical digits-only phone the code is dispatched to.
    pub cliente_telefone: String,
    /// Payment arrangement.
    pub tipo: SaleKind,
    /// Amount in centavos, always greater than zero.
    pub valor_centavos: u64,
    /// Installment count, forced to 1 for single-payment kinds.
    pub parcelas: u32,
    /// First due date.
    pub data_vencimento: NaiveDate,
    /// Free-form description of what was sold.
    pub descricao: String,
    /// Number of the paper ficha.
    pub numero_ficha: String,
    /// Route the sale is filed under.
    pub rota_id: i64,
    /// Photo of the signed ficha.
    pub foto: CapturedPhoto,
}

impl SaleForm {
    /// Validates the form and produces a candidate for verification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first offending field: a
    /// missing client id, blank name or phone, an unparseable amount or
    /// amount of zero, a bad installment count, a date not in `dd/mm/yyyy`,
    /// a blank description or ficha number, or a missing photo.
    pub fn validate(&self) -> Result<CandidateSale> {
        let cliente_id = self
            .cliente_id
            .ok_or_else(|| missing("cliente_id", "venda exige um cliente cadastrado"))?;
        let cliente_nome = require_filled("cliente_nome", &self.cliente_nome)?;
        let cliente_telefone: String = self
            .cliente_telefone
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        if cliente_telefone.is_empty() {
            return Err(missing("cliente_telefone", "campo obrigatório"));
        }
        let valor_centavos = parse_valor_centavos(&self.valor)?;
        let parcelas = if self.tipo.is_cash_variant() {
            1
        } else {
            parse_parcelas(&self.parcelas)?
        };
        let data_vencimento = NaiveDate::parse_from_str(self.data_vencimento.trim(), "%d/%m/%Y")
            .map_err(|_| missing("data_vencimento", "use o formato dd/mm/aaaa"))?;
        let descricao = require_filled("descricao", &self.descricao)?;
        let numero_ficha = require_filled("numero_ficha", &self.numero_ficha)?;
        let foto = self
            .foto
            .clone()
            .ok_or_else(|| missing("foto", "campo obrigatório"))?;
        Ok(CandidateSale {
            cliente_id,
            cliente_nome,
            cliente_telefone,
            tipo: self.tipo,
            valor_centavos,
            parcelas,
            data_vencimento,
            descricao,
            numero_ficha,
            rota_id: DEFAULT_ROTA_ID,
            foto,
        })
    }
}

impl CandidateSale {
    /// Amount in the dot-decimal form the backend expects.
    pub(crate) fn valor_wire(&self) -> String {
        format!("{}.{:02}", self.valor_centavos / 100, self.valor_centavos % 100)
    }

    /// Due date in the `dd/mm/yyyy` form the backend expects.
    pub(crate) fn data_vencimento_wire(&self) -> String {
        self.data_vencimento.format("%d/%m/%Y").to_string()
    }
}

/// Parses an amount into centavos.
///
/// A comma is the decimal mark and dots are thousands separators; without a
/// comma a single dot is read as the decimal mark.
fn parse_valor_centavos(raw: &str) -> Result<u64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.'))
        .collect();
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };
    let (inteiro, fracao) = normalized
        .split_once('.')
        .unwrap_or((normalized.as_str(), ""));
    if inteiro.is_empty() && fracao.is_empty() {
        return Err(missing("valor", "informe um valor"));
    }
    if fracao.len() > 2 || fracao.contains('.') {
        return Err(missing("valor", "use no máximo duas casas decimais"));
    }
    let reais: u64 = if inteiro.is_empty() {
        0
    } else {
        inteiro
            .parse()
            .map_err(|_| missing("valor", "valor inválido"))?
    };
    let centavos: u64 = match fracao.len() {
        0 => 0,
        len => {
            let parsed: u64 = fracao
                .parse()
                .map_err(|_| missing("valor", "valor inválido"))?;
            if len == 1 {
                parsed * 10
            } else {
                parsed
            }
        }
    };
    let total = reais
        .checked_mul(100)
        .and_then(|r| r.checked_add(centavos))
        .ok_or_else(|| missing("valor", "valor inválido"))?;
    if total == 0 {
        return Err(missing("valor", "valor deve ser maior que zero"));
    }
    Ok(total)
}

fn parse_parcelas(raw: &str) -> Result<u32> {
    let parcelas: u32 = raw
        .trim()
        .parse()
        .map_err(|_| missing("parcelas", "informe o número de parcelas"))?;
    if parcelas == 0 {
        return Err(missing("parcelas", "deve ser ao menos 1"));
    }
    Ok(parcelas)
}

fn require_filled(attribute: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(missing(attribute, "campo obrigatório"));
    }
    Ok(trimmed.to_string())
}

fn missing(attribute: &str, reason: &str) -> Error {
    Error::InvalidInput {
        attribute: attribute.to_string(),
        reason: reason.to_string(),
    }
}
