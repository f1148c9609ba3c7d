//! Top-level error type for [`Client`](crate::client::Client) operations.
//!
//! Each module keeps its own error enum; [`SdkError`] wraps them so callers
//! that go through the client deal with a single type.

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::params::ParamError;
use crate::session::ConfigError;
use crate::status::PollError;
use crate::transaction::{BuildError, ValidationError};
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Poll(#[from] PollError),

    /// A required input is missing or malformed.
    #[error("{field} params invalid: {reason}")]
    InvalidInput { field: String, reason: String },

    /// The node's reply made no sense.
    #[error("unexpected node response: {0}")]
    UnexpectedResponse(String),
}

impl SdkError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        SdkError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
