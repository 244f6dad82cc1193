//! Loading the active document from disk

use explode_foundation::{ActiveDocument, ExplodeError, ExplodeResult, LanguageId};
use std::path::Path;
use tracing::debug;

/// Read `path` into an [`ActiveDocument`].
///
/// The language identifier is taken from `language_id` when given, otherwise
/// guessed from the file extension.
pub async fn load_document(path: &Path, language_id: Option<&str>) -> ExplodeResult<ActiveDocument> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ExplodeError::not_found(path.display().to_string()),
        _ => ExplodeError::io(format!("Failed to read {}: {}", path.display(), e)),
    })?;

    let language_id = language_id
        .map(LanguageId::new)
        .unwrap_or_else(|| LanguageId::from_path(path));
    debug!(path = %path.display(), language_id = %language_id, bytes = text.len(), "Loaded document");

    Ok(ActiveDocument::new(path, text, language_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_language_from_extension_or_override() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("widget.tsx");
        std::fs::write(&file, "export const W = () => null;\n").unwrap();

        let document = load_document(&file, None).await.unwrap();
        assert_eq!(document.language_id.as_str(), "typescriptreact");
        assert_eq!(document.text, "export const W = () => null;\n");

        let document = load_document(&file, Some("javascript")).await.unwrap();
        assert_eq!(document.language_id.as_str(), "javascript");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_document(&dir.path().join("gone.ts"), None).await.unwrap_err();
        assert!(matches!(err, ExplodeError::NotFound { .. }));
    }
}
