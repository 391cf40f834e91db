use std::result::Result as StdResult;

use thiserror::Error;

/// Convenient result type for the report crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the reporting subsystem.
#[derive(Debug, Error)]
pub enum Error {
    /// An issue key was registered twice.
    #[error("issue `{0}` is already registered")]
    DuplicateIssue(String),

    /// An issue key is not of the `area::name` shape.
    #[error("issue key `{0}` is not of the `area::name` form")]
    BadIssueKey(String),

    /// A policy or level string did not parse.
    #[error("unknown {what} `{value}`")]
    UnknownName {
        /// What kind of name was expected.
        what: &'static str,
        /// The offending input.
        value: String,
    },

    /// The remote controller URL was unusable.
    #[error("invalid remote URL `{url}`: {message}")]
    BadRemoteUrl {
        /// The URL as configured.
        url: String,
        /// Why it was rejected.
        message: String,
    },
}
