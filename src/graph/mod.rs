//! The document graph: folders, notes, tags and their links.

pub mod builder;
pub mod document;

pub use builder::DocumentBuilder;
pub use document::{Document, DocumentEvent, DocumentProperties};
