//! Builds the refactor invoker for a configured mode

use crate::services::dry_run::DryRunInvoker;
use crate::services::local_split::LocalSplitInvoker;
use explode_config::{AppConfig, InvokerMode};
use explode_foundation::RefactorInvoker;
use explode_lsp::LspMoveInvoker;
use std::sync::Arc;
use tracing::debug;

pub fn build_invoker(mode: InvokerMode, config: &AppConfig) -> Arc<dyn RefactorInvoker> {
    debug!(mode = ?mode, "Building refactor invoker");
    match mode {
        InvokerMode::Lsp => Arc::new(LspMoveInvoker::new(config.lsp.clone())),
        InvokerMode::Local => Arc::new(LocalSplitInvoker::new(config.explode.out_dir.clone())),
        InvokerMode::DryRun => Arc::new(DryRunInvoker::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_mode_maps_to_its_invoker() {
        let config = AppConfig::default();
        assert_eq!(build_invoker(InvokerMode::Lsp, &config).name(), "lsp");
        assert_eq!(build_invoker(InvokerMode::Local, &config).name(), "local");
        assert_eq!(build_invoker(InvokerMode::DryRun, &config).name(), "dry-run");
    }
}
