//! Error types shared across the crate.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by VendaKit operations.
///
/// Duplicate conflicts and code mismatches are not errors: they are ordinary
/// workflow outcomes and travel through [`crate::verification::FlowSnapshot`]
/// and the flow resolution types instead.
#[derive(Debug, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum Error {
    /// A locally validated field was rejected before any network call.
    #[error("invalid {attribute}: {reason}")]
    InvalidInput {
        /// Name of the offending field.
        attribute: String,
        /// Human-readable reason for the rejection.
        reason: String,
    },

    /// A device capability request (camera, gallery) was refused.
    #[error("permission denied for {capability}")]
    PermissionDenied {
        /// The capability that was refused.
        capability: String,
    },

    /// The request never produced an HTTP response.
    #[error("network failure calling {url}: {error}")]
    Network {
        /// URL of the failed request.
        url: String,
        /// Underlying transport error.
        error: String,
    },

    /// The backend rejected the request (non-2xx, or a 2xx envelope with
    /// `sucesso: false`). The message is the backend-provided `mensagem`
    /// when present, otherwise an operation-specific fallback.
    #[error("{message}")]
    Api {
        /// HTTP status code of the response.
        status: u16,
        /// User-facing message describing the rejection.
        message: String,
    },

    /// A response body could not be decoded into the expected shape.
    #[error("serialization error: {error}")]
    Serialization {
        /// Underlying decode error, with response context.
        error: String,
    },

    /// The host session store failed or timed out.
    #[error("session store error: {error}")]
    Storage {
        /// Underlying store error.
        error: String,
    },

    /// An authenticated call was attempted with no active session.
    #[error("no active session")]
    NotAuthenticated,

    /// The verification code's TTL elapsed.
    #[error("verification code expired")]
    CodeExpired,

    /// An operation was invoked in a workflow stage that does not accept it.
    #[error("invalid operation for the current stage: {reason}")]
    FlowState {
        /// What was attempted and which stage rejected it.
        reason: String,
    },
}

#[cfg(feature = "ffi")]
impl From<uniffi::UnexpectedUniFFICallbackError> for Error {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::Storage {
            error: error.reason,
        }
    }
}
