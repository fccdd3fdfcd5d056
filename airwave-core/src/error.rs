//! Error types for Airwave core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Incomplete identity from {provider}: {reason}")]
    IncompleteIdentity { provider: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
