//! The active document handed to explode by its host

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Language identifiers accepted out of the box
pub const DEFAULT_ACCEPTED_LANGUAGES: [&str; 4] = [
    "javascript",
    "javascriptreact",
    "typescript",
    "typescriptreact",
];

/// Editor-style language identifier (`typescript`, `javascriptreact`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageId(String);

impl LanguageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Guess the language identifier from a file extension
    pub fn from_path(path: &Path) -> Self {
        let id = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| match ext {
                "ts" | "mts" | "cts" => "typescript",
                "tsx" => "typescriptreact",
                "js" | "mjs" | "cjs" => "javascript",
                "jsx" => "javascriptreact",
                "py" => "python",
                "rs" => "rust",
                "go" => "go",
                _ => ext,
            })
            .unwrap_or("plaintext");
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parser dialect for this identifier, if it is one explode can parse
    pub fn dialect(&self) -> Option<SourceDialect> {
        match self.0.as_str() {
            "typescript" => Some(SourceDialect::TypeScript),
            "typescriptreact" => Some(SourceDialect::TypeScriptReact),
            "javascript" => Some(SourceDialect::JavaScript),
            "javascriptreact" => Some(SourceDialect::JavaScriptReact),
            _ => None,
        }
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Script or component-file dialect of the typed / untyped language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceDialect {
    TypeScript,
    TypeScriptReact,
    JavaScript,
    JavaScriptReact,
}

impl SourceDialect {
    pub fn is_component(&self) -> bool {
        matches!(
            self,
            SourceDialect::TypeScriptReact | SourceDialect::JavaScriptReact
        )
    }

    /// Extension used for files split out of a document in this dialect
    pub fn default_extension(&self) -> &'static str {
        match self {
            SourceDialect::TypeScript => "ts",
            SourceDialect::TypeScriptReact => "tsx",
            SourceDialect::JavaScript => "js",
            SourceDialect::JavaScriptReact => "jsx",
        }
    }
}

/// Snapshot of the document the user is working on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDocument {
    pub file_name: PathBuf,
    pub text: String,
    pub language_id: LanguageId,
}

impl ActiveDocument {
    pub fn new(file_name: impl Into<PathBuf>, text: impl Into<String>, language_id: LanguageId) -> Self {
        Self {
            file_name: file_name.into(),
            text: text.into(),
            language_id,
        }
    }

    /// Display name used in log lines
    pub fn display_name(&self) -> String {
        self.file_name.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_id_from_extension() {
        assert_eq!(LanguageId::from_path(Path::new("a/b.ts")).as_str(), "typescript");
        assert_eq!(LanguageId::from_path(Path::new("b.mts")).as_str(), "typescript");
        assert_eq!(LanguageId::from_path(Path::new("App.tsx")).as_str(), "typescriptreact");
        assert_eq!(LanguageId::from_path(Path::new("x.cjs")).as_str(), "javascript");
        assert_eq!(LanguageId::from_path(Path::new("View.jsx")).as_str(), "javascriptreact");
        assert_eq!(LanguageId::from_path(Path::new("main.py")).as_str(), "python");
        assert_eq!(LanguageId::from_path(Path::new("Makefile")).as_str(), "plaintext");
    }

    #[test]
    fn test_dialect_only_for_script_languages() {
        assert_eq!(
            LanguageId::new("typescriptreact").dialect(),
            Some(SourceDialect::TypeScriptReact)
        );
        assert_eq!(LanguageId::new("python").dialect(), None);
        assert!(SourceDialect::JavaScriptReact.is_component());
    }
}
