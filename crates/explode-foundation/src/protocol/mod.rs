//! Protocol types exchanged between the planner and its collaborators

pub mod document;
pub mod refactor;

pub use document::{ActiveDocument, LanguageId, SourceDialect};
pub use refactor::{
    ExplodeSummary, MoveOutcome, RefactorInvoker, Reporter, SelectionRange,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label used when a declaration has no name (e.g. `export default class {}`)
pub const ANONYMOUS_LABEL: &str = "<anonymous>";

/// Label used when the first binding of a variable statement is a destructuring pattern
pub const PATTERN_LABEL: &str = "<pattern>";

/// Half-open byte range `[start, end)` over one source text snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "range start {} past end {}", start, end);
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when `other` lies entirely within `self`
    pub fn contains_range(&self, other: TextRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// True when the two ranges share at least one byte
    pub fn overlaps(&self, other: TextRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Kind tag carried by every extraction target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Class,
    Interface,
    Enum,
    Function,
    #[serde(rename = "type")]
    TypeAlias,
    Variable,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Class => "class",
            DeclarationKind::Interface => "interface",
            DeclarationKind::Enum => "enum",
            DeclarationKind::Function => "function",
            DeclarationKind::TypeAlias => "type",
            DeclarationKind::Variable => "variable",
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One independently movable top-level declaration.
///
/// `start..end` is the name span used to anchor the move. `declaration` is the
/// full statement range; it is only read by invokers that copy text themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionTarget {
    pub start: usize,
    pub end: usize,
    pub label: String,
    pub kind: DeclarationKind,
    pub declaration: TextRange,
}

impl ExtractionTarget {
    pub fn name_span(&self) -> TextRange {
        TextRange::new(self.start, self.end)
    }

    /// Whether the label is a placeholder rather than a real identifier
    pub fn has_placeholder_label(&self) -> bool {
        self.label == ANONYMOUS_LABEL || self.label == PATTERN_LABEL
    }
}

/// Targets ordered by descending start offset (bottom of the file first).
///
/// Applying destructive edits in this order never invalidates the offsets of the
/// targets still waiting, since each of them lies strictly before the one just
/// processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionPlan {
    targets: Vec<ExtractionTarget>,
}

impl ExtractionPlan {
    /// Build a plan, sorting targets bottom-up. The sort is stable.
    pub fn new(mut targets: Vec<ExtractionTarget>) -> Self {
        targets.sort_by(|a, b| b.start.cmp(&a.start));
        Self { targets }
    }

    pub fn targets(&self) -> &[ExtractionTarget] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExtractionTarget> {
        self.targets.iter()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.label.as_str()).collect()
    }
}

impl IntoIterator for ExtractionPlan {
    type Item = ExtractionTarget;
    type IntoIter = std::vec::IntoIter<ExtractionTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.into_iter()
    }
}

impl<'a> IntoIterator for &'a ExtractionPlan {
    type Item = &'a ExtractionTarget;
    type IntoIter = std::slice::Iter<'a, ExtractionTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn target(start: usize, label: &str) -> ExtractionTarget {
        ExtractionTarget {
            start,
            end: start + label.len(),
            label: label.to_string(),
            kind: DeclarationKind::Class,
            declaration: TextRange::new(start, start + label.len()),
        }
    }

    #[test]
    fn test_plan_sorts_bottom_up() {
        let plan = ExtractionPlan::new(vec![target(0, "A"), target(40, "C"), target(20, "B")]);
        assert_eq!(plan.labels(), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_range_overlap() {
        let a = TextRange::new(0, 10);
        assert!(a.overlaps(TextRange::new(9, 12)));
        assert!(!a.overlaps(TextRange::new(10, 12)));
        assert!(a.contains_range(TextRange::new(2, 10)));
    }

    #[test]
    fn test_target_serializes_kind_as_tag() {
        let mut t = target(3, "Alias");
        t.kind = DeclarationKind::TypeAlias;
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["kind"], "type");
        assert_eq!(json["declaration"]["start"], 3);
    }
}
