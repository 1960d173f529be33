//! Host-provided persistence for the authenticated session.

use crate::error::Error;

/// Storage key for the bearer token.
pub const TOKEN_KEY: &str = "@AgroVendas:token";

/// Storage key for the serialized seller record.
pub const USER_KEY: &str = "@AgroVendas:user";

/// Key-value store holding the persisted session, implemented by the host
/// platform (device key-value storage on mobile, a JSON file in the CLI).
///
/// Implementations should be fast: the [`crate::session::SessionManager`]
/// bounds every call with a short timeout and treats a slow or failing store
/// as absent data rather than blocking startup.
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
pub trait SessionStore: Send + Sync {
    /// Reads the value at `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    fn read(&self, key: String) -> Result<Option<String>, Error>;

    /// Writes `value` at `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be written.
    fn write(&self, key: String, value: String) -> Result<(), Error>;

    /// Deletes the value at `key`. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be written.
    fn delete(&self, key: String) -> Result<(), Error>;
}
