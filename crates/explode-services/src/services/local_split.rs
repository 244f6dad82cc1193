//! Built-in splitter that moves declarations without a language server
//!
//! Each target's full declaration text is copied verbatim into its own file
//! and cut out of the source. Imports are not rewritten; the result is what a
//! plain cut and paste would give.

use async_trait::async_trait;
use explode_foundation::{
    ActiveDocument, ExplodeError, ExplodeResult, ExtractionTarget, MoveOutcome, OffsetMap,
    RefactorInvoker, SelectionRange, ANONYMOUS_LABEL, PATTERN_LABEL,
};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Source text as the splitter last wrote it
struct SplitState {
    source: PathBuf,
    /// Document text the plan was computed from
    snapshot: String,
    text: String,
    offsets: OffsetMap,
}

impl SplitState {
    fn new(document: &ActiveDocument) -> Self {
        Self {
            source: document.file_name.clone(),
            snapshot: document.text.clone(),
            text: document.text.clone(),
            offsets: OffsetMap::new(),
        }
    }

    fn belongs_to(&self, document: &ActiveDocument) -> bool {
        self.source == document.file_name && self.snapshot == document.text
    }
}

pub struct LocalSplitInvoker {
    out_dir: Option<PathBuf>,
    state: Mutex<Option<SplitState>>,
}

impl LocalSplitInvoker {
    /// Files are written to `out_dir`, or next to the source when `None`
    pub fn new(out_dir: Option<PathBuf>) -> Self {
        Self {
            out_dir,
            state: Mutex::new(None),
        }
    }

    fn destination(&self, document: &ActiveDocument, target: &ExtractionTarget) -> PathBuf {
        let dir = match &self.out_dir {
            Some(dir) => dir.clone(),
            None => document
                .file_name
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        dir.join(format!(
            "{}.{}",
            destination_stem(target),
            destination_extension(document)
        ))
    }
}

/// File stem for a target: its label, or a fixed word for placeholder labels
pub fn destination_stem(target: &ExtractionTarget) -> &str {
    match target.label.as_str() {
        ANONYMOUS_LABEL => "anonymous",
        PATTERN_LABEL => "pattern",
        label => label,
    }
}

fn destination_extension(document: &ActiveDocument) -> String {
    document
        .file_name
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_string)
        .or_else(|| {
            document
                .language_id
                .dialect()
                .map(|d| d.default_extension().to_string())
        })
        .unwrap_or_else(|| "ts".to_string())
}

/// Length of the line break right after `offset`, if any
fn trailing_line_break(text: &str, offset: usize) -> usize {
    let rest = &text[offset..];
    if rest.starts_with("\r\n") {
        2
    } else if rest.starts_with('\n') {
        1
    } else {
        0
    }
}

#[async_trait]
impl RefactorInvoker for LocalSplitInvoker {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn move_to_new_file(
        &self,
        document: &ActiveDocument,
        target: &ExtractionTarget,
        _selection: &SelectionRange,
    ) -> ExplodeResult<MoveOutcome> {
        let mut guard = self.state.lock().await;
        if guard
            .as_ref()
            .is_some_and(|state| !state.belongs_to(document))
        {
            *guard = None;
        }
        let state = guard.get_or_insert_with(|| SplitState::new(document));

        let range = state
            .offsets
            .map_range(target.declaration)
            .filter(|range| range.end <= state.text.len())
            .ok_or_else(|| {
                ExplodeError::not_found(format!(
                    "'{}' is no longer present in {}",
                    target.label,
                    document.display_name()
                ))
            })?;
        let declaration = state.text.get(range.start..range.end).ok_or_else(|| {
            ExplodeError::internal(format!("Declaration range {} is not on a char boundary", range))
        })?;

        let destination = self.destination(document, target);
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        write_new_file(&destination, &format!("{}\n", declaration)).await?;
        debug!(destination = %destination.display(), bytes = declaration.len(), "Wrote declaration");

        let removed = range.len() + trailing_line_break(&state.text, range.end);
        let mut remaining = String::with_capacity(state.text.len() - removed);
        remaining.push_str(&state.text[..range.start]);
        remaining.push_str(&state.text[range.start + removed..]);

        tokio::fs::write(&state.source, &remaining).await?;
        state.offsets.record(range.start, removed, 0);
        state.text = remaining;

        info!(
            label = %target.label,
            destination = %destination.display(),
            "Split declaration into its own file"
        );
        Ok(MoveOutcome::created(destination))
    }

    async fn finish(&self) -> ExplodeResult<()> {
        *self.state.lock().await = None;
        Ok(())
    }
}

/// Create `path` with `contents`, failing if it already exists
async fn write_new_file(path: &Path, contents: &str) -> ExplodeResult<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => {
                ExplodeError::invalid_request(format!("{} already exists", path.display()))
            }
            _ => ExplodeError::from(e),
        })?;
    file.write_all(contents.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use explode_foundation::{DeclarationKind, LanguageId, LineIndex, TextRange};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn target(text: &str, declaration: &str, label: &str, kind: DeclarationKind) -> ExtractionTarget {
        let start = text.find(declaration).unwrap();
        ExtractionTarget {
            start,
            end: start + declaration.len(),
            label: label.to_string(),
            kind,
            declaration: TextRange::new(start, start + declaration.len()),
        }
    }

    fn selection(text: &str, target: &ExtractionTarget) -> SelectionRange {
        SelectionRange {
            bytes: target.name_span(),
            range: LineIndex::new(text).range(target.name_span()),
        }
    }

    fn setup(text: &str) -> (TempDir, ActiveDocument) {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("index.ts");
        std::fs::write(&file, text).unwrap();
        let document = ActiveDocument::new(&file, text, LanguageId::new("typescript"));
        (dir, document)
    }

    #[tokio::test]
    async fn test_moves_declaration_and_trims_source() {
        let text = "export const A = 1;\nexport function b() {}\n";
        let (dir, document) = setup(text);
        let invoker = LocalSplitInvoker::new(None);

        let t = target(text, "export function b() {}", "b", DeclarationKind::Function);
        let outcome = invoker
            .move_to_new_file(&document, &t, &selection(text, &t))
            .await
            .unwrap();

        let created = dir.path().join("b.ts");
        assert_eq!(outcome.created_files, vec![created.clone()]);
        assert_eq!(std::fs::read_to_string(&created).unwrap(), "export function b() {}\n");
        assert_eq!(
            std::fs::read_to_string(&document.file_name).unwrap(),
            "export const A = 1;\n"
        );
    }

    #[tokio::test]
    async fn test_existing_destination_fails_target() {
        let text = "export class Foo {}\n";
        let (dir, document) = setup(text);
        std::fs::write(dir.path().join("Foo.ts"), "// taken\n").unwrap();
        let invoker = LocalSplitInvoker::new(None);

        let t = target(text, "export class Foo {}", "Foo", DeclarationKind::Class);
        let err = invoker
            .move_to_new_file(&document, &t, &selection(text, &t))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("already exists"));
        assert_eq!(std::fs::read_to_string(&document.file_name).unwrap(), text);
        assert_eq!(std::fs::read_to_string(dir.path().join("Foo.ts")).unwrap(), "// taken\n");
    }

    #[tokio::test]
    async fn test_placeholder_labels_and_out_dir() {
        let text = "export const { a } = obj;\r\nexport default class {}\n";
        let (dir, document) = setup(text);
        let out = dir.path().join("split");
        let invoker = LocalSplitInvoker::new(Some(out.clone()));

        let anon = target(text, "export default class {}", ANONYMOUS_LABEL, DeclarationKind::Class);
        let pattern = target(text, "export const { a } = obj;", PATTERN_LABEL, DeclarationKind::Variable);
        for t in [&anon, &pattern] {
            invoker
                .move_to_new_file(&document, t, &selection(text, t))
                .await
                .unwrap();
        }

        assert!(out.join("anonymous.ts").exists());
        assert_eq!(
            std::fs::read_to_string(out.join("pattern.ts")).unwrap(),
            "export const { a } = obj;\n"
        );
        // the CRLF after the pattern statement goes with it
        assert_eq!(std::fs::read_to_string(&document.file_name).unwrap(), "");
    }

    #[tokio::test]
    async fn test_rewritten_document_starts_from_fresh_text() {
        let first = "export const a = 1;\nexport const b = 2;\n";
        let (dir, document) = setup(first);
        let invoker = LocalSplitInvoker::new(None);

        let b = target(first, "export const b = 2;", "b", DeclarationKind::Variable);
        invoker
            .move_to_new_file(&document, &b, &selection(first, &b))
            .await
            .unwrap();

        // same path, new contents, no finish() in between
        let second = "export const x = 1;\nexport const y = 2;\n";
        std::fs::write(&document.file_name, second).unwrap();
        let rewritten = ActiveDocument::new(&document.file_name, second, LanguageId::new("typescript"));

        let y = target(second, "export const y = 2;", "y", DeclarationKind::Variable);
        invoker
            .move_to_new_file(&rewritten, &y, &selection(second, &y))
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("y.ts")).unwrap(),
            "export const y = 2;\n"
        );
        assert_eq!(
            std::fs::read_to_string(&document.file_name).unwrap(),
            "export const x = 1;\n"
        );
    }

    #[tokio::test]
    async fn test_finish_forgets_previous_run() {
        let text = "export const a = 1;\nexport const b = 2;\n";
        let (dir, document) = setup(text);
        let invoker = LocalSplitInvoker::new(None);

        let b = target(text, "export const b = 2;", "b", DeclarationKind::Variable);
        invoker
            .move_to_new_file(&document, &b, &selection(text, &b))
            .await
            .unwrap();
        invoker.finish().await.unwrap();
        assert!(invoker.state.lock().await.is_none());

        // restoring the original text is a new run, not a continuation
        std::fs::write(&document.file_name, text).unwrap();
        std::fs::remove_file(dir.path().join("b.ts")).unwrap();
        invoker
            .move_to_new_file(&document, &b, &selection(text, &b))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&document.file_name).unwrap(),
            "export const a = 1;\n"
        );
    }

    #[test]
    fn test_destination_stem() {
        let t = ExtractionTarget {
            start: 0,
            end: 3,
            label: "Foo".to_string(),
            kind: DeclarationKind::Class,
            declaration: TextRange::new(0, 3),
        };
        assert_eq!(destination_stem(&t), "Foo");
    }
}
