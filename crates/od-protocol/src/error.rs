//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding server responses
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Response body is not the expected JSON document
    #[error("Malformed response")]
    Decode(#[from] serde_json::Error),
}
