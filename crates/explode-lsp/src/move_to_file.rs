//! "Move to a new file" through a language server's code actions
//!
//! For each target the invoker syncs the current document text with the
//! server, asks for `refactor.move` code actions at the target's selection and
//! runs the one that moves to a new file. Servers either return the edit inline
//! or a command whose execution makes them send `workspace/applyEdit`.

use crate::client::LspClient;
use crate::workspace_edit::{apply_workspace_edit, path_to_uri, EditJournal, SharedJournal};
use async_trait::async_trait;
use explode_config::LspServerConfig;
use explode_foundation::{
    ActiveDocument, ExplodeError, ExplodeResult, ExtractionTarget, LineIndex, MoveOutcome,
    RefactorInvoker, SelectionRange,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Exact code action kind of "Move to a new file"
pub const MOVE_TO_NEW_FILE_KIND: &str = "refactor.move.newFile";

/// Title used by servers that do not set a specific kind
pub const MOVE_TO_NEW_FILE_TITLE: &str = "Move to a new file";

const REFACTOR_MOVE_KIND: &str = "refactor.move";

enum ClientState {
    NotStarted,
    Ready(Arc<LspClient>),
    Failed(String),
}

/// What the server last saw of the document
#[derive(Default)]
struct DocumentSync {
    path: Option<PathBuf>,
    version: i32,
    text: String,
}

/// Refactor invoker backed by a language server.
///
/// The server is started lazily for the first target, rooted at the configured
/// root or the document's directory. A failed start fails every target.
pub struct LspMoveInvoker {
    config: LspServerConfig,
    journal: SharedJournal,
    state: Mutex<ClientState>,
    sync: Mutex<DocumentSync>,
}

impl LspMoveInvoker {
    pub fn new(config: LspServerConfig) -> Self {
        Self {
            config,
            journal: EditJournal::shared(),
            state: Mutex::new(ClientState::NotStarted),
            sync: Mutex::new(DocumentSync::default()),
        }
    }

    async fn client(&self, document_path: &Path) -> ExplodeResult<Arc<LspClient>> {
        let mut state = self.state.lock().await;
        match &*state {
            ClientState::Ready(client) if client.is_alive().await => return Ok(client.clone()),
            ClientState::Ready(_) => {
                warn!("Language server exited, not restarting it for this run");
                *state = ClientState::Failed("the server process exited".to_string());
                return Err(ExplodeError::lsp(
                    "Language server unavailable: the server process exited",
                ));
            }
            ClientState::Failed(message) => {
                return Err(ExplodeError::lsp(format!(
                    "Language server unavailable: {}",
                    message
                )))
            }
            ClientState::NotStarted => {}
        }

        let root_dir = match &self.config.root_dir {
            Some(root) => root.clone(),
            None => document_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        self.journal.lock().await.track(document_path);
        match LspClient::start(self.config.clone(), &root_dir, self.journal.clone()).await {
            Ok(client) => {
                if !client.supports_code_actions().await {
                    warn!("Language server does not advertise code actions");
                }
                let client = Arc::new(client);
                *state = ClientState::Ready(client.clone());
                Ok(client)
            }
            Err(e) => {
                *state = ClientState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Make the server's view of the document match the file on disk
    async fn sync_document(
        &self,
        client: &LspClient,
        path: &Path,
        language_id: &str,
    ) -> ExplodeResult<String> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ExplodeError::io(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut sync = self.sync.lock().await;
        if sync.path.is_none() {
            sync.version = 1;
            client.did_open(path, language_id, sync.version, &text).await?;
            sync.path = Some(path.to_path_buf());
        } else if sync.text != text {
            sync.version += 1;
            client.did_change(path, sync.version, &text).await?;
        }
        sync.text = text.clone();
        Ok(text)
    }
}

/// Pick the action that moves a declaration to a new file.
///
/// Prefers the exact kind, then the well-known title, then any enabled
/// `refactor.move*` action that is not "move to an existing file".
pub fn choose_move_action(actions: &[Value]) -> Option<&Value> {
    let enabled = || actions.iter().filter(|action| is_enabled(action));

    enabled()
        .find(|action| field(action, "kind") == Some(MOVE_TO_NEW_FILE_KIND))
        .or_else(|| enabled().find(|action| field(action, "title") == Some(MOVE_TO_NEW_FILE_TITLE)))
        .or_else(|| {
            enabled().find(|action| {
                field(action, "kind").is_some_and(|kind| {
                    kind.starts_with(REFACTOR_MOVE_KIND) && kind != "refactor.move.file"
                })
            })
        })
}

fn is_enabled(action: &Value) -> bool {
    action.get("disabled").map_or(true, Value::is_null)
}

fn field<'a>(action: &'a Value, name: &str) -> Option<&'a str> {
    action.get(name).and_then(Value::as_str)
}

fn has_field(action: &Value, name: &str) -> bool {
    action.get(name).is_some_and(|value| !value.is_null())
}

#[async_trait]
impl RefactorInvoker for LspMoveInvoker {
    fn name(&self) -> &'static str {
        "lsp"
    }

    async fn move_to_new_file(
        &self,
        document: &ActiveDocument,
        target: &ExtractionTarget,
        selection: &SelectionRange,
    ) -> ExplodeResult<MoveOutcome> {
        let path = std::fs::canonicalize(&document.file_name).map_err(|e| {
            ExplodeError::not_found(format!("{} ({})", document.file_name.display(), e))
        })?;
        let client = self.client(&path).await?;
        let current_text = self
            .sync_document(&client, &path, document.language_id.as_str())
            .await?;

        let range = {
            let mut journal = self.journal.lock().await;
            journal.take_created_files();
            if journal.offsets().is_identity() {
                selection.range
            } else {
                let mapped = journal.map_range(selection.bytes).ok_or_else(|| {
                    ExplodeError::not_found(format!(
                        "'{}' is no longer present in the document",
                        target.label
                    ))
                })?;
                LineIndex::new(&current_text).range(mapped)
            }
        };

        let params = json!({
            "textDocument": { "uri": path_to_uri(&path)?.as_str() },
            "range": range,
            "context": {
                "diagnostics": [],
                "only": [REFACTOR_MOVE_KIND],
                "triggerKind": 1
            }
        });

        debug!(label = %target.label, range = ?range, "Requesting refactor.move code actions");
        let response = client.send_request("textDocument/codeAction", params).await?;
        let actions: Vec<Value> = match response {
            Value::Null => Vec::new(),
            other => serde_json::from_value(other).map_err(|e| {
                ExplodeError::lsp(format!("Failed to parse LSP code actions: {}", e))
            })?,
        };

        let mut action = choose_move_action(&actions).cloned().ok_or_else(|| {
            ExplodeError::not_supported(format!(
                "No \"move to a new file\" action offered for '{}' ({} actions)",
                target.label,
                actions.len()
            ))
        })?;
        let title = field(&action, "title")
            .unwrap_or(MOVE_TO_NEW_FILE_TITLE)
            .to_string();

        if !has_field(&action, "edit") && !has_field(&action, "command") && has_field(&action, "data") {
            debug!(title = %title, "Resolving code action");
            action = client.send_request("codeAction/resolve", action).await?;
        }

        if has_field(&action, "edit") {
            let edit: lsp_types::WorkspaceEdit = serde_json::from_value(action["edit"].clone())
                .map_err(|e| ExplodeError::lsp(format!("Failed to parse WorkspaceEdit: {}", e)))?;
            let mut journal = self.journal.lock().await;
            apply_workspace_edit(&edit, &mut journal).await?;
        } else if has_field(&action, "command") {
            let command: lsp_types::Command = serde_json::from_value(action["command"].clone())
                .map_err(|e| ExplodeError::lsp(format!("Failed to parse Command: {}", e)))?;
            let params = lsp_types::ExecuteCommandParams {
                command: command.command,
                arguments: command.arguments.unwrap_or_default(),
                work_done_progress_params: Default::default(),
            };
            let params = serde_json::to_value(&params)?;
            // The server applies the move through workspace/applyEdit before answering
            client.send_request("workspace/executeCommand", params).await?;
        } else {
            return Err(ExplodeError::not_supported(
                "CodeAction contained neither an edit nor a command",
            ));
        }

        let created_files = self.journal.lock().await.take_created_files();
        info!(
            label = %target.label,
            created = ?created_files,
            "Moved declaration via language server"
        );

        Ok(MoveOutcome {
            created_files,
            note: Some(title),
        })
    }

    async fn finish(&self) -> ExplodeResult<()> {
        let state = std::mem::replace(&mut *self.state.lock().await, ClientState::NotStarted);
        if let ClientState::Ready(client) = state {
            if let Some(path) = self.sync.lock().await.path.take() {
                if let Err(e) = client.did_close(&path).await {
                    warn!(path = %path.display(), error = %e, "Failed to close document on the language server");
                }
            }
            client.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use explode_foundation::{DeclarationKind, LanguageId, TextRange};

    fn action(kind: &str, title: &str) -> Value {
        json!({ "kind": kind, "title": title, "command": { "title": title, "command": "noop" } })
    }

    #[test]
    fn test_prefers_new_file_kind() {
        let actions = vec![
            action("refactor.move.file", "Move to file"),
            action("refactor.move", "Move to a new file"),
            action("refactor.move.newFile", "Move to a new file"),
        ];
        let chosen = choose_move_action(&actions).unwrap();
        assert_eq!(chosen["kind"], "refactor.move.newFile");
    }

    #[test]
    fn test_falls_back_to_title_then_kind_prefix() {
        let actions = vec![
            action("refactor.move.file", "Move to file"),
            action("refactor.move", "Move to a new file"),
        ];
        assert_eq!(choose_move_action(&actions).unwrap()["title"], "Move to a new file");

        let actions = vec![
            action("refactor.move.file", "Move to file"),
            action("refactor.move.other", "Relocate"),
        ];
        assert_eq!(choose_move_action(&actions).unwrap()["title"], "Relocate");
    }

    #[test]
    fn test_skips_disabled_and_unrelated_actions() {
        let mut disabled = action("refactor.move.newFile", "Move to a new file");
        disabled["disabled"] = json!({ "reason": "Selection is not a declaration" });
        let actions = vec![
            disabled,
            action("refactor.extract.function", "Extract function"),
            action("refactor.move.file", "Move to file"),
        ];
        assert!(choose_move_action(&actions).is_none());
    }

    #[tokio::test]
    async fn test_unavailable_server_fails_each_target() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("index.ts");
        std::fs::write(&file, "export const a = 1;\n").unwrap();

        let invoker = LspMoveInvoker::new(LspServerConfig {
            command: vec!["explode-definitely-not-a-language-server".to_string()],
            ..Default::default()
        });
        let document = ActiveDocument::new(&file, "export const a = 1;\n", LanguageId::new("typescript"));
        let target = ExtractionTarget {
            start: 13,
            end: 14,
            label: "a".to_string(),
            kind: DeclarationKind::Variable,
            declaration: TextRange::new(0, 19),
        };
        let selection = SelectionRange {
            bytes: target.name_span(),
            range: LineIndex::new(&document.text).range(target.name_span()),
        };

        let first = invoker.move_to_new_file(&document, &target, &selection).await;
        assert!(matches!(first, Err(ExplodeError::Lsp { .. })));
        let second = invoker.move_to_new_file(&document, &target, &selection).await;
        assert!(second.unwrap_err().to_string().contains("unavailable"));
        assert!(invoker.finish().await.is_ok());
    }

    /// Answers `initialize`, waits for `initialized`, then exits
    #[cfg(unix)]
    const SHORT_LIVED_SERVER: &str = r#"
len=0
while IFS= read -r line; do
  line=$(printf '%s' "$line" | tr -d '\r')
  [ -z "$line" ] && break
  case "$line" in Content-Length:*) len=${line#Content-Length: } ;; esac
done
head -c "$len" > /dev/null
body='{"jsonrpc":"2.0","id":1,"result":{"capabilities":{}}}'
printf 'Content-Length: %d\r\n\r\n%s' "${#body}" "$body"
IFS= read -r line
"#;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exited_server_is_not_reused() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("index.ts");
        std::fs::write(&file, "export const a = 1;\n").unwrap();

        let invoker = LspMoveInvoker::new(LspServerConfig {
            command: vec!["sh".to_string(), "-c".to_string(), SHORT_LIVED_SERVER.to_string()],
            root_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        });

        let client = match invoker.client(&file).await {
            Ok(client) => client,
            Err(e) => panic!("server should start: {}", e),
        };
        for _ in 0..50 {
            if !client.is_alive().await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        assert!(!client.is_alive().await);

        let err = match invoker.client(&file).await {
            Ok(_) => panic!("an exited server must not be handed out again"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("exited"));
        assert!(invoker.client(&file).await.is_err());
        assert!(invoker.finish().await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_finish_after_server_exit_still_shuts_down() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("index.ts");
        std::fs::write(&file, "export const a = 1;\n").unwrap();

        let invoker = LspMoveInvoker::new(LspServerConfig {
            command: vec!["sh".to_string(), "-c".to_string(), SHORT_LIVED_SERVER.to_string()],
            root_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        });
        let client = match invoker.client(&file).await {
            Ok(client) => client,
            Err(e) => panic!("server should start: {}", e),
        };
        invoker.sync_document(&client, &file, "typescript").await.unwrap();
        for _ in 0..50 {
            if !client.is_alive().await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        drop(client);

        // didClose goes to a dead server; the failure is logged and shutdown proceeds
        assert!(invoker.finish().await.is_ok());
        assert!(invoker.sync.lock().await.path.is_none());
        assert!(matches!(*invoker.state.lock().await, ClientState::NotStarted));
    }
}
