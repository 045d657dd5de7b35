//! Request handlers for authoring operations.

mod manifest;
mod package;
mod quiz;

pub use manifest::*;
pub use package::*;
pub use quiz::*;
