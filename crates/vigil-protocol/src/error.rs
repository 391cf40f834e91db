use std::result::Result as StdResult;

use thiserror::Error;

/// Convenient result type for the protocol crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for structure parsing and wire framing.
#[derive(Debug, Error)]
pub enum Error {
    /// A structure line could not be parsed.
    #[error("malformed structure: {0}")]
    Malformed(String),

    /// A frame body could not be serialized or deserialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A frame byte stream was truncated or carried a bad length prefix.
    #[error("bad frame: {0}")]
    BadFrame(String),
}
