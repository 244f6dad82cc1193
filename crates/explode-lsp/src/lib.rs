//! Language server integration for explode
//!
//! Starts a language server over stdio and uses its "Move to a new file" code
//! action to consume an extraction plan.

pub mod client;
pub mod move_to_file;
pub mod workspace_edit;

pub use client::LspClient;
pub use move_to_file::{choose_move_action, LspMoveInvoker};
pub use workspace_edit::{apply_workspace_edit, EditJournal, SharedJournal};
