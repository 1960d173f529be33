//! Photo capture seam between the core and the host platform.
//!
//! The host implements [`PhotoLibrary`] over its camera and gallery pickers;
//! the core only ever sees the resulting [`CapturedPhoto`].

use crate::error::Error;

/// An image captured on the device, ready for multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct CapturedPhoto {
    /// File name reported by the picker, used as the multipart part name.
    pub file_name: String,
    /// MIME type of the image payload.
    pub content_type: String,
    /// Raw image bytes.
    pub bytes: Vec<u8>,
}

impl CapturedPhoto {
    /// Builds a photo, deriving the MIME type from the file extension.
    #[must_use]
    pub fn from_file_name(file_name: String, bytes: Vec<u8>) -> Self {
        let content_type = content_type_for(&file_name).to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }
}

/// Where the host should source the image from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum PhotoSource {
    /// Open the device camera.
    Camera,
    /// Open the photo gallery picker.
    Gallery,
}

/// Host-side access to the camera and gallery.
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
pub trait PhotoLibrary: Send + Sync {
    /// Acquires an image from the given source.
    ///
    /// Returns `Ok(None)` when the user dismisses the picker without
    /// choosing an image.
    ///
    /// # Errors
    ///
    /// Implementations return [`Error::PermissionDenied`] when the platform
    /// permission for the source was refused.
    fn acquire(&self, source: PhotoSource) -> Result<Option<CapturedPhoto>, Error>;
}

fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name.rsplit('.').next().unwrap_or_default();
    if extension.eq_ignore_ascii_case("png") {
        "image/png"
    } else if extension.eq_ignore_ascii_case("gif") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}
