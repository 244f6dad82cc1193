//! Dry-run invoker
//!
//! Records the selection each target would be moved from without touching any
//! file, so a plan can be previewed end to end.

use crate::services::local_split::destination_stem;
use async_trait::async_trait;
use explode_foundation::{
    ActiveDocument, DeclarationKind, ExplodeResult, ExtractionTarget, MoveOutcome,
    RefactorInvoker, SelectionRange,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Mutex;

/// One selection the dry run would have acted on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunSelection {
    pub label: String,
    pub kind: DeclarationKind,
    pub selection: SelectionRange,
    /// Where the local splitter would put the declaration
    pub proposed_file: PathBuf,
}

#[derive(Default)]
pub struct DryRunInvoker {
    selections: Mutex<Vec<DryRunSelection>>,
}

impl DryRunInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selections recorded so far, in call order
    pub fn selections(&self) -> Vec<DryRunSelection> {
        self.selections
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RefactorInvoker for DryRunInvoker {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn move_to_new_file(
        &self,
        document: &ActiveDocument,
        target: &ExtractionTarget,
        selection: &SelectionRange,
    ) -> ExplodeResult<MoveOutcome> {
        let extension = document
            .file_name
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("ts");
        let proposed_file = PathBuf::from(format!("{}.{}", destination_stem(target), extension));

        if let Ok(mut selections) = self.selections.lock() {
            selections.push(DryRunSelection {
                label: target.label.clone(),
                kind: target.kind,
                selection: *selection,
                proposed_file: proposed_file.clone(),
            });
        }

        Ok(MoveOutcome::created(proposed_file).with_note("dry run, nothing written"))
    }
}
