//! Tax-id handling: digit stripping and the CPF check-digit algorithm.
//!
//! 14-digit ids (CNPJ) are accepted on length alone; the backend owns their
//! validation rules.

use crate::error::{Error, Result};

/// Strips every non-digit character.
#[must_use]
pub fn strip_non_digits(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// Validates a documento and returns its canonical digits-only form.
///
/// 11 digits must pass the CPF checksum; 14 digits are accepted without a
/// checksum; any other length is rejected.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when the id has the wrong length or fails
/// the checksum.
pub fn validate_documento(raw: &str) -> Result<String> {
    let digits = strip_non_digits(raw);
    match digits.len() {
        11 => {
            if is_valid_cpf(&digits) {
                Ok(digits)
            } else {
                Err(invalid("CPF inválido"))
            }
        }
        14 => Ok(digits),
        _ => Err(invalid("deve ter 11 (CPF) ou 14 (CNPJ) dígitos")),
    }
}

/// Runs the two-pass CPF checksum over an 11-digit string.
///
/// A string of 11 identical digits is always rejected, even though such
/// strings satisfy the arithmetic.
#[must_use]
pub fn is_valid_cpf(digits: &str) -> bool {
    let values: Vec<u32> = digits
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| u32::from(b - b'0'))
        .collect();
    if values.len() != 11 {
        return false;
    }
    if values.windows(2).all(|pair| pair[0] == pair[1]) {
        return false;
    }
    check_digit(&values[..9], 10) == values[9] && check_digit(&values[..10], 11) == values[10]
}

/// Weighted sum with weights `start..=2` over the leading digits, times 10,
/// modulo 11, with remainders 10 and 11 mapped to 0.
fn check_digit(values: &[u32], start: u32) -> u32 {
    let soma: u32 = values
        .iter()
        .zip((2..=start).rev())
        .map(|(value, weight)| value * weight)
        .sum();
    let resto = (soma * 10) % 11;
    if resto >= 10 {
        0
    } else {
        resto
    }
}

fn invalid(reason: &str) -> Error {
    Error::InvalidInput {
        attribute: "documento".to_string(),
        reason: reason.to_string(),
    }
}
