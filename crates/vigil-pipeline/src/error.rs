use std::result::Result as StdResult;

use thiserror::Error;

/// Convenient result type for the pipeline crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for pipeline interactions.
#[derive(Debug, Error)]
pub enum Error {
    /// A property read or write targeted a property the element lacks.
    #[error("no property `{property}` on element `{element}`")]
    NoSuchProperty {
        /// The element that was targeted.
        element: String,
        /// The missing property name.
        property: String,
    },

    /// A property write was rejected by the element.
    #[error("could not set `{property}` on `{element}`: {message}")]
    PropertyRejected {
        /// The element that was targeted.
        element: String,
        /// The property name.
        property: String,
        /// Why the write failed.
        message: String,
    },

    /// A signal name did not resolve on the target element.
    #[error("no signal `{0}` on this element")]
    NoSuchSignal(String),

    /// The element does not implement the requested operation.
    #[error("operation `{0}` not supported by this element")]
    Unsupported(&'static str),

    /// A symbolic name did not parse into the expected enum or flag set.
    #[error("unknown {what} `{value}`")]
    UnknownName {
        /// What kind of name was expected (state, seek flag, ...).
        what: &'static str,
        /// The offending input.
        value: String,
    },
}
