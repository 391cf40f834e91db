//! Shared vocabulary types for the vigil workspace.
//!
//! This crate defines the pieces that every other crate speaks:
//! - [`Value`]: the tagged field value carried by scenario structures
//! - [`Structure`]: an ordered, named bag of typed fields plus its
//!   text-format parser
//! - the controller wire frames and the length-prefixed JSON codec used
//!   for the one-way TCP stream to a remote controller
#![warn(missing_docs)]

mod error;
mod frame;
mod structure;
mod value;

pub use error::{Error, Result};
pub use frame::{
    ActionDoneFrame, ActionFrame, ReportFrame, StartupFrame, decode_frames, encode_frame,
};
pub use structure::Structure;
pub use value::Value;
