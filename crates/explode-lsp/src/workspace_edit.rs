//! Applying workspace edits to disk
//!
//! Language servers describe a "move to new file" as a `WorkspaceEdit`: create
//! the new file, fill it, strip the declaration out of the source file and add
//! imports. Every edit that lands on the document being exploded is recorded in
//! an [`EditJournal`], so later targets (whose offsets refer to the original
//! text) can still be located.

use explode_foundation::{ExplodeError, ExplodeResult, LineIndex, OffsetMap, TextRange};
use lsp_types::{
    DocumentChangeOperation, DocumentChanges, OneOf, ResourceOp, TextDocumentEdit, TextEdit,
    Uri, WorkspaceEdit,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub type SharedJournal = Arc<Mutex<EditJournal>>;

/// Edits applied to the tracked document, and files created along the way
#[derive(Debug, Default)]
pub struct EditJournal {
    tracked: Option<PathBuf>,
    offsets: OffsetMap,
    created_files: Vec<PathBuf>,
}

impl EditJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedJournal {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Start tracking `path`, forgetting any earlier edits
    pub fn track(&mut self, path: &Path) {
        self.tracked = Some(canonical(path));
        self.offsets = OffsetMap::new();
        self.created_files.clear();
    }

    pub fn offsets(&self) -> &OffsetMap {
        &self.offsets
    }

    /// Map a range of the original text into the current text
    pub fn map_range(&self, range: TextRange) -> Option<TextRange> {
        self.offsets.map_range(range)
    }

    /// Files created since the last call
    pub fn take_created_files(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.created_files)
    }

    fn is_tracked(&self, path: &Path) -> bool {
        match &self.tracked {
            Some(tracked) => tracked == path || *tracked == canonical(path),
            None => false,
        }
    }

    fn note_created(&mut self, path: &Path) {
        let path = path.to_path_buf();
        if !self.created_files.contains(&path) {
            self.created_files.push(path);
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Convert a `file://` URI to a filesystem path
pub fn uri_to_path(uri: &Uri) -> ExplodeResult<PathBuf> {
    url::Url::parse(uri.as_str())
        .ok()
        .and_then(|url| url.to_file_path().ok())
        .ok_or_else(|| ExplodeError::invalid_request(format!("Unsupported URI: {}", uri.as_str())))
}

/// Convert an absolute path to a `file://` URI
pub fn path_to_uri(path: &Path) -> ExplodeResult<Uri> {
    let url = url::Url::from_file_path(path)
        .map_err(|_| ExplodeError::invalid_request(format!("Invalid file path: {}", path.display())))?;
    url.as_str()
        .parse::<Uri>()
        .map_err(|e| ExplodeError::invalid_request(format!("Invalid URI {}: {}", url, e)))
}

/// One text replacement as applied, in the coordinates of the text it was applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedEdit {
    pub start: usize,
    pub old_len: usize,
    pub new_len: usize,
}

/// Apply LSP text edits to `text`.
///
/// All edits refer to the original text. They are applied from the bottom up;
/// edits sharing a start position keep their array order in the result. Edits
/// with ranges that cannot be resolved are skipped.
pub fn apply_text_edits(text: &str, edits: &[TextEdit]) -> (String, Vec<AppliedEdit>) {
    let index = LineIndex::new(text);
    let mut resolved: Vec<(usize, TextRange, &str)> = edits
        .iter()
        .enumerate()
        .map(|(order, edit)| (order, index.text_range(edit.range), edit.new_text.as_str()))
        .collect();
    resolved.sort_by(|a, b| b.1.start.cmp(&a.1.start).then(b.0.cmp(&a.0)));

    let mut result = text.to_string();
    let mut applied = Vec::with_capacity(resolved.len());
    let mut floor = usize::MAX;
    for (_, range, new_text) in resolved {
        if range.end > floor {
            warn!(range = %range, "Overlapping text edit, skipping");
            continue;
        }
        result.replace_range(range.start..range.end, new_text);
        applied.push(AppliedEdit {
            start: range.start,
            old_len: range.len(),
            new_len: new_text.len(),
        });
        floor = range.start;
    }
    (result, applied)
}

/// Apply a workspace edit to disk, recording edits to the tracked document
pub async fn apply_workspace_edit(
    edit: &WorkspaceEdit,
    journal: &mut EditJournal,
) -> ExplodeResult<()> {
    if let Some(document_changes) = &edit.document_changes {
        match document_changes {
            DocumentChanges::Edits(edits) => {
                for edit in edits {
                    apply_text_document_edit(edit, journal).await?;
                }
            }
            DocumentChanges::Operations(operations) => {
                for operation in operations {
                    match operation {
                        DocumentChangeOperation::Op(op) => apply_resource_op(op, journal).await?,
                        DocumentChangeOperation::Edit(edit) => {
                            apply_text_document_edit(edit, journal).await?
                        }
                    }
                }
            }
        }
        return Ok(());
    }

    if let Some(changes) = &edit.changes {
        for (uri, edits) in changes {
            let path = uri_to_path(uri)?;
            apply_file_edits(&path, edits, journal).await?;
        }
        return Ok(());
    }

    debug!("Workspace edit carried no changes");
    Ok(())
}

async fn apply_text_document_edit(
    edit: &TextDocumentEdit,
    journal: &mut EditJournal,
) -> ExplodeResult<()> {
    let path = uri_to_path(&edit.text_document.uri)?;
    let edits: Vec<TextEdit> = edit
        .edits
        .iter()
        .map(|edit| match edit {
            OneOf::Left(edit) => edit.clone(),
            OneOf::Right(annotated) => annotated.text_edit.clone(),
        })
        .collect();
    apply_file_edits(&path, &edits, journal).await
}

async fn apply_file_edits(
    path: &Path,
    edits: &[TextEdit],
    journal: &mut EditJournal,
) -> ExplodeResult<()> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            create_parent_dirs(path).await?;
            journal.note_created(path);
            String::new()
        }
        Err(e) => {
            return Err(ExplodeError::io(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let (result, applied) = apply_text_edits(&content, edits);
    if journal.is_tracked(path) {
        for edit in &applied {
            journal.offsets.record(edit.start, edit.old_len, edit.new_len);
        }
    }

    info!(path = %path.display(), edits = applied.len(), "Writing workspace edit to file");
    tokio::fs::write(path, result)
        .await
        .map_err(|e| ExplodeError::io(format!("Failed to write {}: {}", path.display(), e)))
}

async fn apply_resource_op(op: &ResourceOp, journal: &mut EditJournal) -> ExplodeResult<()> {
    match op {
        ResourceOp::Create(create) => {
            let path = uri_to_path(&create.uri)?;
            let overwrite = create.options.as_ref().and_then(|o| o.overwrite).unwrap_or(false);
            let ignore_if_exists = create
                .options
                .as_ref()
                .and_then(|o| o.ignore_if_exists)
                .unwrap_or(false);

            if path.exists() && !overwrite {
                if ignore_if_exists {
                    debug!(path = %path.display(), "File exists, ignoring create");
                    return Ok(());
                }
                return Err(ExplodeError::invalid_request(format!(
                    "Refusing to overwrite existing file {}",
                    path.display()
                )));
            }

            info!(path = %path.display(), "Creating file via workspace edit");
            create_parent_dirs(&path).await?;
            tokio::fs::write(&path, "")
                .await
                .map_err(|e| ExplodeError::io(format!("Failed to create {}: {}", path.display(), e)))?;
            journal.note_created(&path);
        }
        ResourceOp::Rename(rename) => {
            let old_path = uri_to_path(&rename.old_uri)?;
            let new_path = uri_to_path(&rename.new_uri)?;
            if journal.is_tracked(&old_path) {
                warn!(path = %old_path.display(), "Workspace edit renames the document being exploded");
            }
            info!(from = %old_path.display(), to = %new_path.display(), "Renaming file via workspace edit");
            create_parent_dirs(&new_path).await?;
            tokio::fs::rename(&old_path, &new_path).await.map_err(|e| {
                ExplodeError::io(format!(
                    "Failed to rename {} to {}: {}",
                    old_path.display(),
                    new_path.display(),
                    e
                ))
            })?;
        }
        ResourceOp::Delete(delete) => {
            let path = uri_to_path(&delete.uri)?;
            info!(path = %path.display(), "Deleting file via workspace edit");
            let recursive = delete.options.as_ref().and_then(|o| o.recursive).unwrap_or(false);
            let result = if recursive && path.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            result.map_err(|e| ExplodeError::io(format!("Failed to delete {}: {}", path.display(), e)))?;
        }
    }
    Ok(())
}

async fn create_parent_dirs(path: &Path) -> ExplodeResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            ExplodeError::io(format!(
                "Failed to create parent directories for {}: {}",
                path.display(),
                e
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::{
        CreateFile, OptionalVersionedTextDocumentIdentifier, Position, Range,
    };
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn edit(start: (u32, u32), end: (u32, u32), new_text: &str) -> TextEdit {
        TextEdit {
            range: Range {
                start: Position::new(start.0, start.1),
                end: Position::new(end.0, end.1),
            },
            new_text: new_text.to_string(),
        }
    }

    #[test]
    fn test_apply_text_edits_bottom_up() {
        let text = "export class Foo {}\nexport const Qux = 7;\n";
        let (result, applied) = apply_text_edits(
            text,
            &[
                edit((0, 0), (0, 0), "import { Qux } from './Qux';\n"),
                edit((1, 0), (2, 0), ""),
            ],
        );
        assert_eq!(result, "import { Qux } from './Qux';\nexport class Foo {}\n");
        // later edit first
        assert_eq!(applied[0], AppliedEdit { start: 20, old_len: 22, new_len: 0 });
        assert_eq!(applied[1].start, 0);
    }

    #[test]
    fn test_insertions_at_same_position_keep_order() {
        let (result, _) = apply_text_edits(
            "body\n",
            &[edit((0, 0), (0, 0), "a;\n"), edit((0, 0), (0, 0), "b;\n")],
        );
        assert_eq!(result, "a;\nb;\nbody\n");
    }

    #[test]
    fn test_overlapping_edit_is_skipped() {
        let (result, applied) = apply_text_edits(
            "abcdef",
            &[edit((0, 1), (0, 4), "X"), edit((0, 2), (0, 5), "Y")],
        );
        assert_eq!(applied.len(), 1);
        assert_eq!(result, "abYf");
    }

    #[test]
    fn test_uri_path_roundtrip() {
        let path = std::env::temp_dir().join("explode dir").join("a.ts");
        let uri = path_to_uri(&path).unwrap();
        assert!(uri.as_str().starts_with("file://"));
        assert!(uri.as_str().contains("%20"));
        assert_eq!(uri_to_path(&uri).unwrap(), path);

        let http: Uri = "https://example.com/a.ts".parse().unwrap();
        assert!(uri_to_path(&http).is_err());
    }

    #[tokio::test]
    async fn test_workspace_edit_creates_file_and_tracks_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("index.ts");
        let new_file = dir.path().join("Qux.ts");
        let text = "export class Foo {}\nexport const Qux = 7;\n";
        std::fs::write(&source, text).unwrap();

        let mut journal = EditJournal::new();
        journal.track(&source);

        let workspace_edit = WorkspaceEdit {
            document_changes: Some(DocumentChanges::Operations(vec![
                DocumentChangeOperation::Op(ResourceOp::Create(CreateFile {
                    uri: path_to_uri(&new_file).unwrap(),
                    options: None,
                    annotation_id: None,
                })),
                DocumentChangeOperation::Edit(TextDocumentEdit {
                    text_document: OptionalVersionedTextDocumentIdentifier {
                        uri: path_to_uri(&new_file).unwrap(),
                        version: None,
                    },
                    edits: vec![OneOf::Left(edit((0, 0), (0, 0), "export const Qux = 7;\n"))],
                }),
                DocumentChangeOperation::Edit(TextDocumentEdit {
                    text_document: OptionalVersionedTextDocumentIdentifier {
                        uri: path_to_uri(&source).unwrap(),
                        version: Some(1),
                    },
                    edits: vec![
                        OneOf::Left(edit((0, 0), (0, 0), "import { Qux } from './Qux';\n")),
                        OneOf::Left(edit((1, 0), (2, 0), "")),
                    ],
                }),
            ])),
            ..Default::default()
        };

        apply_workspace_edit(&workspace_edit, &mut journal).await.unwrap();

        assert_eq!(std::fs::read_to_string(&new_file).unwrap(), "export const Qux = 7;\n");
        assert_eq!(
            std::fs::read_to_string(&source).unwrap(),
            "import { Qux } from './Qux';\nexport class Foo {}\n"
        );
        assert_eq!(journal.take_created_files(), vec![new_file]);
        assert!(journal.take_created_files().is_empty());

        // "Foo" at 13..16 moved down by the inserted import
        let mapped = journal.map_range(TextRange::new(13, 16)).unwrap();
        let current = std::fs::read_to_string(&source).unwrap();
        assert_eq!(&current[mapped.start..mapped.end], "Foo");
        // the removed declaration cannot be located anymore
        assert_eq!(journal.map_range(TextRange::new(33, 36)), None);
    }

    #[tokio::test]
    async fn test_changes_map_and_untracked_files() {
        let dir = TempDir::new().unwrap();
        let other = dir.path().join("other.ts");
        std::fs::write(&other, "let a = 1;\n").unwrap();

        let mut journal = EditJournal::new();
        journal.track(&dir.path().join("index.ts"));

        let mut changes = HashMap::new();
        changes.insert(path_to_uri(&other).unwrap(), vec![edit((0, 4), (0, 5), "b")]);
        let workspace_edit = WorkspaceEdit {
            changes: Some(changes),
            ..Default::default()
        };

        apply_workspace_edit(&workspace_edit, &mut journal).await.unwrap();
        assert_eq!(std::fs::read_to_string(&other).unwrap(), "let b = 1;\n");
        assert!(journal.offsets().is_identity());
    }

    #[tokio::test]
    async fn test_create_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("Foo.ts");
        std::fs::write(&existing, "keep me").unwrap();

        let mut journal = EditJournal::new();
        let workspace_edit = WorkspaceEdit {
            document_changes: Some(DocumentChanges::Operations(vec![DocumentChangeOperation::Op(
                ResourceOp::Create(CreateFile {
                    uri: path_to_uri(&existing).unwrap(),
                    options: None,
                    annotation_id: None,
                }),
            )])),
            ..Default::default()
        };

        assert!(apply_workspace_edit(&workspace_edit, &mut journal).await.is_err());
        assert_eq!(std::fs::read_to_string(&existing).unwrap(), "keep me");
    }
}
