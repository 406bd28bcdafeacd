//! Data model shared by the composition engine and its callers.
//!
//! Nothing in here performs I/O: positions, request parameters, response
//! headers and the [`content::Content`] sum type are plain immutable values
//! that can be handed across tasks freely.

pub mod content;
pub mod headers;
pub mod parameters;
pub mod position;
pub mod setting;

pub use content::{CompositeContent, Content, ContentError, ErrorContent, SingleContent};
pub use headers::Headers;
pub use parameters::Parameters;
pub use position::Position;
