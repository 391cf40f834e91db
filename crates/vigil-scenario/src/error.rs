use std::result::Result as StdResult;

use thiserror::Error;

/// Convenient result type for the scenario crate.
pub type Result<T> = StdResult<T, Error>;

/// Fatal scenario-construction failures. These abort before execution;
/// anything that happens *during* execution is raised as a report
/// instead.
#[derive(Debug, Error)]
pub enum Error {
    /// No file could be resolved for a scenario name.
    #[error("scenario `{0}` not found")]
    NotFound(String),

    /// A scenario file could not be read.
    #[error("could not read scenario file `{file}`: {source}")]
    Io {
        /// The file that failed.
        file: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A line of a scenario file did not parse.
    #[error("malformed scenario file `{file}`: {message}")]
    Malformed {
        /// The file that failed.
        file: String,
        /// What went wrong.
        message: String,
    },

    /// A structure names an action type nobody registered.
    #[error("we do not handle action type `{0}`")]
    UnknownActionType(String),

    /// A mandatory parameter is missing.
    #[error("mandatory field `{field}` not present in structure `{structure}`")]
    MissingParameter {
        /// The missing field.
        field: String,
        /// The offending structure, rendered.
        structure: String,
    },

    /// `optional=true` used on an action type that cannot be optional.
    #[error("action type `{0}` can't be optional")]
    CannotBeOptional(String),

    /// More than one action scenario in a single run.
    #[error(
        "you can set at most one action scenario; config scenarios (is-config=true) can be layered"
    )]
    MultipleActionScenarios,

    /// The scenario's `pipeline-name` does not match the pipeline.
    #[error("scenario only applies to pipelines named `{expected}`, not `{actual}`")]
    PipelineMismatch {
        /// The glob from the scenario description.
        expected: String,
        /// The actual pipeline name.
        actual: String,
    },

    /// An expression failed to parse or evaluate at load time.
    #[error(transparent)]
    Expr(#[from] timexpr::Error),

    /// A value failed to parse at load time.
    #[error(transparent)]
    Pipeline(#[from] vigil_pipeline::Error),
}
