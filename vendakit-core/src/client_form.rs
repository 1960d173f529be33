//! Client registration form and its validated candidate.

use crate::documento::{strip_non_digits, validate_documento};
use crate::error::{Error, Result};
use crate::photo::CapturedPhoto;

/// Raw client registration input as typed on the device.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ClientForm {
    /// Full client name.
    pub nome: String,
    /// CPF or CNPJ, with or without punctuation.
    pub documento: String,
    /// Contact phone, with or without punctuation.
    pub telefone: String,
    /// Street address.
    pub endereco: String,
    /// Photo of the identity document.
    pub foto: Option<CapturedPhoto>,
}

/// A client form that passed validation and may enter verification.
#[derive(Debug, Clone)]
pub struct CandidateClient {
    /// Full client name.
    pub nome: String,
    /// Canonical digits-only tax id, checksum verified when 11 digits.
    pub documento: String,
    /// Canonical digits-only phone.
    pub telefone: String,
    /// Street address.
    pub endereco: String,
    /// Photo of the identity document.
    pub foto: CapturedPhoto,
}

impl ClientForm {
    /// Validates the form and produces a candidate for verification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first offending field:
    /// any blank field, a tax id failing [`validate_documento`], or a
    /// missing photo.
    pub fn validate(&self) -> Result<CandidateClient> {
        let nome = require_filled("nome", &self.nome)?;
        let documento = validate_documento(&self.documento)?;
        let telefone = strip_non_digits(&self.telefone);
        if telefone.is_empty() {
            return Err(missing("telefone"));
        }
        let endereco = require_filled("endereco", &self.endereco)?;
        let foto = self.foto.clone().ok_or_else(|| missing("foto"))?;
        Ok(CandidateClient {
            nome,
            documento,
            telefone,
            endereco,
            foto,
        })
    }
}

fn require_filled(attribute: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(missing(attribute));
    }
    Ok(trimmed.to_string())
}

fn missing(attribute: &str) -> Error {
    Error::InvalidInput {
        attribute: attribute.to_string(),
        reason: "campo obrigatório".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_photo;

    fn filled_form() -> ClientForm {
        ClientForm {
            nome: "Maria da Silva".to_string(),
            documento: "111.444.777-35".to_string(),
            telefone: "(11) 98765-4321".to_string(),
            endereco: "Sítio Boa Vista, km 12".to_string(),
            foto: Some(sample_photo()),
        }
    }

    #[test]
    fn candidate_carries_canonical_digits() {
        let candidate = filled_form().validate().unwrap();
        assert_eq!(candidate.documento, "11144477735");
        assert_eq!(candidate.telefone, "11987654321");
    }

    #[test]
    fn blank_nome_is_rejected() {
        let mut form = filled_form();
        form.nome = "   ".to_string();
        let err = form.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidInput { attribute, .. } if attribute == "nome"));
    }

    #[test]
    fn bad_checksum_is_rejected() {
        let mut form = filled_form();
        form.documento = "111.444.777-36".to_string();
        assert!(form.validate().is_err());
    }

    #[test]
    fn missing_photo_is_rejected() {
        let mut form = filled_form();
        form.foto = None;
        let err = form.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidInput { attribute, .. } if attribute == "foto"));
    }
}
