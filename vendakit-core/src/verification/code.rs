//! Six-digit verification codes generated on the device.

use rand::Rng;

/// A generated verification code.
///
/// Codes never leave the 100000..=999999 range, so the string form is
/// always six digits with no leading zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Draws a fresh code from the thread RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::thread_rng().gen_range(100_000..1_000_000_u32).to_string())
    }

    /// Compares the collected digits against this code.
    #[must_use]
    pub fn matches(&self, entered: &str) -> bool {
        self.0 == entered
    }

    /// The code as dispatched to the client.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
