//! Human-readable rendering of plans and outcomes

use explode_foundation::{ExtractionPlan, LineIndex};

/// One row per target: position, kind, label and 1-based line:column
pub fn format_plan(plan: &ExtractionPlan, text: &str) -> String {
    let index = LineIndex::new(text);
    let label_width = plan
        .iter()
        .map(|target| target.label.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (position, target) in plan.iter().enumerate() {
        let at = index.position(target.start);
        out.push_str(&format!(
            "{:>3}. {:<9} {:<width$}  {}:{}\n",
            position + 1,
            target.kind.as_str(),
            target.label,
            at.line + 1,
            at.character + 1,
            width = label_width
        ));
    }
    out.push_str(&format!(
        "{} top-level declaration{} (bottom of file first)\n",
        plan.len(),
        if plan.len() == 1 { "" } else { "s" }
    ));
    out
}
