//! Callback bridge errors

use thiserror::Error;

/// Callback bridge errors
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("invalid callback signature '{signature}': {reason}")]
    InvalidSignature { signature: String, reason: String },

    #[error("unsupported callback signature '{signature}': {detail} (supported: {})", .supported.join(", "))]
    UnsupportedSignature {
        signature: String,
        detail: String,
        supported: Vec<String>,
    },

    #[error("function {0} not found")]
    FunctionNotFound(String),

    #[error("stale or unknown callback handle 0x{0:x}")]
    StaleHandle(usize),

    #[error("closure creation failed for '{signature}': {reason}")]
    ClosureFailed { signature: String, reason: String },

    #[error("callback handle space exhausted")]
    ArenaExhausted,

    #[error(transparent)]
    Core(#[from] autobind_core::Error),
}

pub type Result<T> = std::result::Result<T, CallbackError>;

impl CallbackError {
    pub(crate) fn unsupported(signature: &str, detail: impl Into<String>) -> Self {
        CallbackError::UnsupportedSignature {
            signature: signature.to_string(),
            detail: detail.into(),
            supported: crate::trampolines::SHAPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<CallbackError> for autobind_core::Error {
    fn from(err: CallbackError) -> Self {
        match err {
            CallbackError::Core(e) => e,
            CallbackError::FunctionNotFound(name) => autobind_core::Error::FunctionNotFound(name),
            other => autobind_core::Error::Invocation(other.to_string()),
        }
    }
}
