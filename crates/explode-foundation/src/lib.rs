//! Foundation layer - protocol types, position mapping and collaborator traits
//!
//! This crate provides the building blocks shared by every explode crate:
//! - Extraction plan types produced by the planner (`protocol`)
//! - The active document and language identifiers (`protocol::document`)
//! - Capability traits for refactor invocation and reporting (`protocol::refactor`)
//! - Byte offset / LSP position mapping (`position`)
//! - The shared error type (`error`)

pub mod error;
pub mod position;
pub mod protocol;

// Re-export commonly used types for convenience
pub use error::*;
pub use position::{LineIndex, OffsetMap};
pub use protocol::*;
