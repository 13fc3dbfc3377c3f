//! The PDF document engine: cross-reference table, parser/reader,
//! validator, optimizer, writer, and the page-selection mini-language,
//! plus the top-level operations in [`ops`] that wire them together.
//!
//! This crate owns the object *graph* — `pdf-object` only knows how to
//! represent and serialize a single value, `pdf-filters` only knows how to
//! decode/encode stream bytes, and `pdf-crypto` only knows how to
//! authenticate and run the cipher. Everything that ties an `ObjectId` to
//! a live value, a file offset, or another object lives here.

pub mod config;
pub mod error;
pub mod lexer;
pub mod nametree;
pub mod ops;
pub mod optimizer;
pub mod pagetree;
pub mod parser;
pub mod reader;
pub mod selection;
pub mod stats;
pub mod validator;
pub mod writer;
pub mod xref;

pub use config::{Config, Eol, Tristate, ValidationMode};
pub use error::PdfError;
pub use nametree::{Node, TreeKey};
pub use ops::{Attachment, DocumentInfo};
pub use optimizer::{OptimizeOptions, OptimizeReport};
pub use pagetree::InheritedAttrs;
pub use reader::ReadResult;
pub use stats::{ReadStats, StageTimings, WriteStats};
pub use validator::ValidationReport;
pub use xref::{EntryKind, XRefTable};
