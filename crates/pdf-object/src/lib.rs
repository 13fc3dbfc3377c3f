//! The PDF object model: tagged-variant values, dict accessors, indirect
//! references, and string escaping.
//!
//! This crate has no notion of a document or a cross-reference table — it
//! only knows how to represent and serialize a single value. `pdf-core`
//! owns the graph these values live in.

pub mod dict;
pub mod error;
pub mod escape;
pub mod object;
pub mod reference;
pub mod stream;
pub mod text;

pub use dict::Dict;
pub use error::ObjectError;
pub use object::{Name, Object};
pub use reference::ObjectId;
pub use stream::{Stream, StreamData};
