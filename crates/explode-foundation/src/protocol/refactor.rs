//! Capability traits for the collaborators that consume an extraction plan

use super::{ActiveDocument, ExtractionTarget, TextRange};
use crate::error::ExplodeResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Selection handed to a refactor invoker: the target's byte range plus the
/// same range as LSP line / UTF-16 character positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRange {
    pub bytes: TextRange,
    pub range: lsp_types::Range,
}

/// What an invoker reports back after a successful move
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    /// Files created by the move (empty when the invoker cannot tell)
    pub created_files: Vec<PathBuf>,
    /// Free-form note for the output log
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl MoveOutcome {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            created_files: vec![path.into()],
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// "Move declaration to a new file" capability.
///
/// Called once per target, strictly in plan order. A returned error fails only
/// that target; the caller logs it and moves on.
#[async_trait]
pub trait RefactorInvoker: Send + Sync {
    /// Short name used in logs (`lsp`, `local`, `dry-run`)
    fn name(&self) -> &'static str;

    async fn move_to_new_file(
        &self,
        document: &ActiveDocument,
        target: &ExtractionTarget,
        selection: &SelectionRange,
    ) -> ExplodeResult<MoveOutcome>;

    /// Release resources once the plan has been consumed
    async fn finish(&self) -> ExplodeResult<()> {
        Ok(())
    }
}

/// Final tally of one explode run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplodeSummary {
    pub found: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub log: Vec<String>,
    pub status: String,
}

impl ExplodeSummary {
    pub fn new(found: usize) -> Self {
        Self {
            found,
            ..Default::default()
        }
    }

    /// Terminal user-facing status line
    pub fn status_message(&self) -> String {
        if self.cancelled {
            format!(
                "Cancelled after {} of {} declarations ({} moved, {} failed)",
                self.attempted, self.found, self.succeeded, self.failed
            )
        } else if self.failed == 0 {
            format!("Moved {} of {} declarations", self.succeeded, self.found)
        } else {
            format!(
                "Moved {} of {} declarations, {} failed (see output log)",
                self.succeeded, self.found, self.failed
            )
        }
    }
}

/// Notification and output-log sink
pub trait Reporter: Send + Sync {
    /// Informational, non-failure notification
    fn info(&self, message: &str);

    /// User-visible error notification
    fn error(&self, message: &str);

    /// Progress before the `index`-th (1-based) of `total` targets
    fn progress(&self, index: usize, total: usize, label: &str);

    /// One line of the textual output log
    fn log_line(&self, line: &str);

    /// Final summary of a run that got past planning
    fn summary(&self, summary: &ExplodeSummary);
}
