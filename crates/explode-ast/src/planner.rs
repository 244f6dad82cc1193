//! Extraction planner
//!
//! Walks a syntax tree once, keeps the nodes the classifier accepts and turns
//! each into an [`ExtractionTarget`] anchored on its name span. The resulting
//! plan is ordered bottom of file first.

use crate::classifier::is_top_level_declaration;
use crate::error::{AstError, AstResult};
use crate::parser::parse_source;
use crate::syntax::{Binding, NodeKind, SyntaxNode, SyntaxTree};
use explode_foundation::{
    ActiveDocument, ExtractionPlan, ExtractionTarget, TextRange, ANONYMOUS_LABEL, PATTERN_LABEL,
};
use tracing::debug;

/// Build the extraction plan for a parsed file
pub fn plan(tree: &SyntaxTree) -> ExtractionPlan {
    let source_file = tree.root();
    let mut targets = Vec::new();

    // Depth-first, source order. Accepted nodes are not descended into.
    let mut stack: Vec<_> = tree.children(source_file).iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        if is_top_level_declaration(node, source_file) {
            if let Some(target) = extraction_target(node) {
                targets.push(target);
            }
            continue;
        }
        stack.extend(tree.children(id).iter().rev().copied());
    }

    let plan = ExtractionPlan::new(targets);
    debug!(
        file = %tree.file_name(),
        targets = plan.len(),
        "Planned extraction"
    );
    plan
}

/// Parse the document's text and plan it.
///
/// Fails when the language has no parser dialect or the text cannot be parsed
/// at all.
pub fn plan_document(document: &ActiveDocument) -> AstResult<ExtractionPlan> {
    let dialect = document.language_id.dialect().ok_or_else(|| {
        AstError::unsupported_syntax(format!("language '{}'", document.language_id))
    })?;
    let tree = parse_source(&document.display_name(), &document.text, dialect)?;
    Ok(plan(&tree))
}

fn extraction_target(node: &SyntaxNode) -> Option<ExtractionTarget> {
    let kind = node.kind().declaration_kind()?;

    let (span, label) = match node.kind() {
        NodeKind::VariableStatement(list) => {
            // Only the first binding anchors a multi-binding statement
            let first = list.declarators.first()?;
            match &first.binding {
                Binding::Identifier(ident) => (ident.range, ident.text.clone()),
                Binding::Pattern => (first.range, PATTERN_LABEL.to_string()),
            }
        }
        other => match other.name() {
            Some(ident) => (ident.range, ident.text.clone()),
            None => (node.range(), ANONYMOUS_LABEL.to_string()),
        },
    };

    Some(ExtractionTarget {
        start: span.start,
        end: span.end,
        label,
        kind,
        declaration: node.range(),
    })
}

/// Ranges of the plan's targets, in plan order
pub fn name_spans(plan: &ExtractionPlan) -> Vec<TextRange> {
    plan.iter().map(ExtractionTarget::name_span).collect()
}
