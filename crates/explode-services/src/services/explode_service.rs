//! Plan consumer
//!
//! Gates the active document, plans it and hands each target to the refactor
//! invoker in plan order. Collaborator errors never escape: a refused document,
//! an empty plan and a completed run are all ordinary outcomes.

use crate::services::cancel::CancelFlag;
use explode_ast::plan_document;
use explode_config::logging::run_span;
use explode_config::ExplodeConfig;
use explode_foundation::{
    ActiveDocument, ExplodeError, ExplodeSummary, ExtractionPlan, ExtractionTarget, LineIndex,
    RefactorInvoker, Reporter, SelectionRange,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};

/// Message shown for an empty plan
pub const NO_DECLARATIONS_MESSAGE: &str = "No top-level declarations found";

/// Why a document was turned away before planning
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Refusal {
    #[error("No active document")]
    NoDocument,

    #[error("Explode does not support '{language_id}' documents (accepted: {})", .accepted.join(", "))]
    UnsupportedLanguage {
        language_id: String,
        accepted: Vec<String>,
    },

    #[error("Could not analyse {document}: {reason}")]
    Unparseable { document: String, reason: String },
}

/// Result of one explode request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ExplodeOutcome {
    /// The document was rejected before planning
    Refused { reason: String },
    /// Nothing to move
    Empty,
    /// The plan was consumed, possibly partially
    Completed(ExplodeSummary),
}

impl ExplodeOutcome {
    pub fn is_refused(&self) -> bool {
        matches!(self, ExplodeOutcome::Refused { .. })
    }

    pub fn summary(&self) -> Option<&ExplodeSummary> {
        match self {
            ExplodeOutcome::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}

pub struct ExplodeService {
    config: ExplodeConfig,
    invoker: Arc<dyn RefactorInvoker>,
    reporter: Arc<dyn Reporter>,
    cancel: CancelFlag,
}

impl ExplodeService {
    pub fn new(
        config: ExplodeConfig,
        invoker: Arc<dyn RefactorInvoker>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            config,
            invoker,
            reporter,
            cancel: CancelFlag::new(),
        }
    }

    /// Share an externally owned cancellation flag
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Gate and plan a document without touching it
    pub fn plan(&self, document: Option<&ActiveDocument>) -> Result<ExtractionPlan, Refusal> {
        self.gate(document).map(|(_, plan)| plan)
    }

    /// Split every top-level declaration of `document` into its own file
    pub async fn explode_document(&self, document: Option<&ActiveDocument>) -> ExplodeOutcome {
        let (document, plan) = match self.gate(document) {
            Ok(gated) => gated,
            Err(refusal) => {
                let reason = refusal.to_string();
                warn!(reason = %reason, "Explode request refused");
                self.reporter.error(&reason);
                return ExplodeOutcome::Refused { reason };
            }
        };

        if plan.is_empty() {
            info!(document = %document.display_name(), "Nothing to explode");
            self.reporter.info(NO_DECLARATIONS_MESSAGE);
            return ExplodeOutcome::Empty;
        }

        let span = run_span(&document.display_name(), self.invoker.name());
        let summary = self.consume(document, &plan).instrument(span).await;
        ExplodeOutcome::Completed(summary)
    }

    fn gate<'a>(
        &self,
        document: Option<&'a ActiveDocument>,
    ) -> Result<(&'a ActiveDocument, ExtractionPlan), Refusal> {
        let document = document.ok_or(Refusal::NoDocument)?;

        let language_id = document.language_id.as_str();
        if !self.config.accepts_language(language_id) {
            return Err(Refusal::UnsupportedLanguage {
                language_id: language_id.to_string(),
                accepted: self.config.accepted_languages.clone(),
            });
        }

        let plan = plan_document(document).map_err(|e| Refusal::Unparseable {
            document: document.display_name(),
            reason: e.to_string(),
        })?;
        Ok((document, plan))
    }

    async fn consume(&self, document: &ActiveDocument, plan: &ExtractionPlan) -> ExplodeSummary {
        let total = plan.len();
        let mut summary = ExplodeSummary::new(total);
        let index = LineIndex::new(&document.text);
        let timeout = Duration::from_millis(self.config.target_timeout_ms);

        info!(targets = total, "Exploding document");

        for (position, target) in plan.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(
                    remaining = total - position,
                    "Cancellation requested, abandoning remaining targets"
                );
                summary.cancelled = true;
                break;
            }

            self.reporter.progress(position + 1, total, &target.label);
            summary.attempted += 1;

            let selection = SelectionRange {
                bytes: target.name_span(),
                range: index.range(target.name_span()),
            };
            debug!(label = %target.label, kind = %target.kind, range = ?selection.range, "Moving target");

            let result = tokio::time::timeout(
                timeout,
                self.invoker.move_to_new_file(document, target, &selection),
            )
            .await
            .unwrap_or_else(|_| {
                Err(ExplodeError::timeout(format!(
                    "moving '{}' after {} ms",
                    target.label, self.config.target_timeout_ms
                )))
            });

            let line = match result {
                Ok(outcome) => {
                    summary.succeeded += 1;
                    if let Some(note) = &outcome.note {
                        debug!(label = %target.label, note = %note, "Invoker note");
                    }
                    moved_line(target, &outcome.created_files)
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(label = %target.label, error = %e, "Failed to move declaration");
                    format!("Failed to move {}: {}", target.label, e)
                }
            };
            self.reporter.log_line(&line);
            summary.log.push(line);
        }

        if let Err(e) = self.invoker.finish().await {
            warn!(invoker = self.invoker.name(), error = %e, "Failed to release invoker");
        }

        summary.status = summary.status_message();
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Explode finished"
        );
        self.reporter.summary(&summary);
        summary
    }
}

fn moved_line(target: &ExtractionTarget, files: &[PathBuf]) -> String {
    let destination = if files.is_empty() {
        "a new file".to_string()
    } else {
        files
            .iter()
            .map(|file| file.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("Moved {} ({}) to {}", target.label, target.kind, destination)
}
