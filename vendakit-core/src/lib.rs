//! Device-side core of the AgroVendas sales app.
//!
//! Field sellers register clients and sales from their phones; every record
//! is confirmed out of band before it reaches the backend. The core owns
//! that workflow: it validates the capture forms, generates a six-digit
//! code, dispatches it to the client over WhatsApp, collects the digits the
//! client reads back, and commits the record only after a local match.
//! Hosts plug in their camera, storage, and clock through small traits and
//! render the state the flows expose.

use strum::EnumString;

/// Backend environment the core talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Environment {
    /// Local development backend.
    Development,
    /// Production backend.
    Production,
}

impl Environment {
    /// Base URL of the REST API for this environment.
    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Development => "http://localhost:3000/api",
            Self::Production => "https://api.agrosystemapp.com/api",
        }
    }
}

mod api;
pub use api::*;

mod client_form;
pub use client_form::*;

mod document;
pub use document::*;

mod documento;
pub use documento::*;

mod error;
pub use error::*;

mod photo;
pub use photo::*;

mod sale_form;
pub use sale_form::*;

mod session;
pub use session::*;

mod time;
pub use time::*;

mod verification;
pub use verification::*;

// private modules
mod http;

#[cfg(test)]
mod test_support;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!("vendakit_core");
