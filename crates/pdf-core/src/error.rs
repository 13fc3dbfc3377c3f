//! The error taxonomy (spec §7). Every top-level entry point in
//! [`crate::ops`] returns `Result<_, PdfError>`; internal helpers that
//! cannot fail meaningfully (e.g. pure data-structure bookkeeping) stay
//! infallible rather than wrapping a variant that never fires.

use pdf_crypto::CryptoError;
use pdf_filters::FilterError;
use pdf_object::ObjectError;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PdfError {
    #[error("document is encrypted and no supplied password authenticates it")]
    AuthenticationRequired,

    #[error("cross-reference table could not be located or reconstructed: {0}")]
    CorruptXref(String),

    #[error("could not produce an object at offset {offset}: {reason}")]
    InvalidObject { offset: usize, reason: String },

    #[error("required entry `{entry}` is missing from `{context}`")]
    MissingRequired { context: String, entry: String },

    #[error("`{feature}` requires PDF {required} but file is {actual}")]
    VersionTooLow {
        feature: String,
        required: String,
        actual: String,
    },

    #[error("unsupported filter on decode: {0}")]
    UnsupportedFilter(String),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("operation blocked by permission bits under the user password")]
    PermissionDenied,

    #[error("dict entry `{entry}` failed validation: {reason}")]
    InvalidValue { entry: String, reason: String },
}

impl From<ObjectError> for PdfError {
    fn from(e: ObjectError) -> Self {
        PdfError::InvalidObject {
            offset: 0,
            reason: e.to_string(),
        }
    }
}

impl From<FilterError> for PdfError {
    fn from(e: FilterError) -> Self {
        match e {
            FilterError::UnsupportedFilter(name) => PdfError::UnsupportedFilter(name),
            other => PdfError::InvalidObject {
                offset: 0,
                reason: other.to_string(),
            },
        }
    }
}

impl From<CryptoError> for PdfError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::AuthenticationFailed => PdfError::AuthenticationRequired,
            other => PdfError::UnsupportedFeature(other.to_string()),
        }
    }
}

impl From<std::io::Error> for PdfError {
    fn from(e: std::io::Error) -> Self {
        PdfError::IoError(e.to_string())
    }
}
