//! LSP client implementation for communicating with a single LSP server

use crate::workspace_edit::{apply_workspace_edit, path_to_uri, SharedJournal};
use explode_config::LspServerConfig;
use explode_foundation::{ExplodeError, ExplodeResult};
use lsp_types::ServerCapabilities;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

/// Buffer size for message channels
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Upper bound for the shutdown handshake and process exit
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Type alias for pending request responses
pub(crate) type PendingRequests = Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value, String>>>>>;

/// LSP client for communicating with a single LSP server process
pub struct LspClient {
    /// Child process handle
    process: Arc<Mutex<Child>>,
    /// Channel for sending messages (requests and notifications) to the LSP server
    message_tx: mpsc::Sender<LspMessage>,
    /// Pending requests waiting for responses
    pending_requests: PendingRequests,
    /// Next request ID
    next_id: Arc<Mutex<i64>>,
    /// Server configuration
    config: LspServerConfig,
    /// Workspace root announced to the server
    root_dir: PathBuf,
    /// Server capabilities (populated after initialization)
    server_capabilities: Arc<Mutex<Option<ServerCapabilities>>>,
}

/// Internal message types for LSP communication
#[derive(Debug)]
pub(crate) enum LspMessage {
    Request { id: i64, method: String, params: Value },
    Notification { method: String, params: Value },
    Response { id: Value, result: Value },
    ErrorResponse { id: Value, error: Value },
}

impl LspMessage {
    fn to_json(&self) -> Value {
        match self {
            LspMessage::Request { id, method, params } => json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params
            }),
            LspMessage::Notification { method, params } => json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params
            }),
            LspMessage::Response { id, result } => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": result
            }),
            LspMessage::ErrorResponse { id, error } => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": error
            }),
        }
    }
}

impl LspClient {
    /// Start the server process and run the initialize handshake.
    ///
    /// `workspace/applyEdit` requests from the server are applied to disk and
    /// recorded in `journal`.
    pub async fn start(
        config: LspServerConfig,
        root_dir: &Path,
        journal: SharedJournal,
    ) -> ExplodeResult<Self> {
        let (command, args) = config
            .command
            .split_first()
            .ok_or_else(|| ExplodeError::config("LSP server command cannot be empty"))?;

        debug!(
            command = %command,
            args = ?args,
            root_dir = %root_dir.display(),
            "Attempting to spawn LSP server"
        );

        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(root_dir)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!(command = %command, error = %e, "Failed to spawn LSP server");
                ExplodeError::lsp(format!(
                    "Failed to start LSP server '{}': {}",
                    config.command.join(" "),
                    e
                ))
            })?;

        debug!(command = %command, pid = child.id(), "LSP server process spawned");

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExplodeError::lsp("Failed to get stdin for LSP server"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExplodeError::lsp("Failed to get stdout for LSP server"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExplodeError::lsp("Failed to get stderr for LSP server"))?;

        let pending_requests: PendingRequests = Arc::new(Mutex::new(HashMap::new()));
        let (message_tx, mut message_rx) = mpsc::channel::<LspMessage>(CHANNEL_BUFFER_SIZE);

        // Writer task
        let write_pending = pending_requests.clone();
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(message) = message_rx.recv().await {
                let content = match serde_json::to_string(&message.to_json()) {
                    Ok(content) => content,
                    Err(e) => {
                        error!(error = %e, "Failed to serialize LSP message");
                        continue;
                    }
                };
                let frame = format!("Content-Length: {}\r\n\r\n{}", content.len(), content);

                let written = match stdin.write_all(frame.as_bytes()).await {
                    Ok(()) => stdin.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    error!(
                        error_category = "lsp_communication",
                        error = %e,
                        "Failed to write to LSP server"
                    );
                    if let LspMessage::Request { id, .. } = message {
                        if let Some(sender) = write_pending.lock().await.remove(&id) {
                            let _ = sender.send(Err(format!("Write error: {}", e)));
                        }
                    }
                    break;
                }

                match &message {
                    LspMessage::Request { method, id, .. } => {
                        debug!(method = %method, id = id, "Sent LSP request")
                    }
                    LspMessage::Notification { method, .. } => {
                        debug!(method = %method, "Sent LSP notification")
                    }
                    LspMessage::Response { id, .. } | LspMessage::ErrorResponse { id, .. } => {
                        debug!(id = ?id, "Sent LSP response to server request")
                    }
                }
            }
        });

        // Stderr reader task so the server never blocks on a full pipe
        let server_command = command.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(server = %server_command, stderr = %line.trim(), "LSP stderr");
            }
        });

        // Stdout reader task
        let read_pending = pending_requests.clone();
        let read_tx = message_tx.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            loop {
                match Self::read_frame(&mut reader).await {
                    Ok(Some(message)) => {
                        Self::handle_message(message, &read_pending, &read_tx, &journal).await
                    }
                    Ok(None) => {
                        debug!("LSP server stdout closed");
                        break;
                    }
                    Err(e) => {
                        error!(
                            error_category = "lsp_communication",
                            error = %e,
                            "Failed to read from LSP server"
                        );
                        break;
                    }
                }
            }
            // Fail whatever is still waiting
            for (_, sender) in read_pending.lock().await.drain() {
                let _ = sender.send(Err("LSP server closed the connection".to_string()));
            }
        });

        let client = Self {
            process: Arc::new(Mutex::new(child)),
            message_tx,
            pending_requests,
            next_id: Arc::new(Mutex::new(1)),
            config,
            root_dir: root_dir.to_path_buf(),
            server_capabilities: Arc::new(Mutex::new(None)),
        };

        client.initialize().await?;
        Ok(client)
    }

    /// Send a request to the LSP server and await the response
    pub async fn send_request(&self, method: &str, params: Value) -> ExplodeResult<Value> {
        let request_timeout = Duration::from_millis(self.config.request_timeout_ms);
        self.send_request_with_timeout(method, params, request_timeout)
            .await
    }

    async fn send_request_with_timeout(
        &self,
        method: &str,
        params: Value,
        request_timeout: Duration,
    ) -> ExplodeResult<Value> {
        let id = {
            let mut next_id = self.next_id.lock().await;
            let id = *next_id;
            *next_id += 1;
            id
        };

        let (response_tx, response_rx) = oneshot::channel();
        self.pending_requests.lock().await.insert(id, response_tx);

        debug!(lsp_method = %method, lsp_request_id = id, "Sending LSP request");

        let message = LspMessage::Request {
            id,
            method: method.to_string(),
            params,
        };
        if let Err(e) = self.message_tx.send(message).await {
            self.pending_requests.lock().await.remove(&id);
            return Err(ExplodeError::lsp(format!("Failed to send request: {}", e)));
        }

        let start_time = std::time::Instant::now();
        match timeout(request_timeout, response_rx).await {
            Ok(Ok(Ok(result))) => {
                debug!(
                    lsp_method = %method,
                    lsp_request_id = id,
                    duration_ms = start_time.elapsed().as_millis() as u64,
                    "Received LSP response"
                );
                Ok(result)
            }
            Ok(Ok(Err(error))) => {
                debug!(
                    lsp_method = %method,
                    lsp_request_id = id,
                    error = %error,
                    "Received LSP error response"
                );
                Err(ExplodeError::lsp(format!("{} failed: {}", method, error)))
            }
            Ok(Err(_)) => {
                self.pending_requests.lock().await.remove(&id);
                Err(ExplodeError::lsp("Response channel closed"))
            }
            Err(_) => {
                warn!(
                    lsp_method = %method,
                    lsp_request_id = id,
                    timeout_ms = request_timeout.as_millis() as u64,
                    "LSP request timeout"
                );
                self.pending_requests.lock().await.remove(&id);
                Err(ExplodeError::timeout(format!("LSP request {}", method)))
            }
        }
    }

    /// Send a notification to the LSP server (no response expected)
    pub async fn send_notification(&self, method: &str, params: Value) -> ExplodeResult<()> {
        let message = LspMessage::Notification {
            method: method.to_string(),
            params,
        };
        self.message_tx
            .send(message)
            .await
            .map_err(|e| ExplodeError::lsp(format!("Failed to send notification: {}", e)))?;
        debug!("Queued LSP notification: {}", method);
        Ok(())
    }

    /// Initialize the LSP server
    async fn initialize(&self) -> ExplodeResult<()> {
        let root_uri = path_to_uri(&self.root_dir)?;
        let mut initialize_params = json!({
            "processId": std::process::id(),
            "clientInfo": {
                "name": "explode",
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "textDocument": {
                    "synchronization": {
                        "didSave": false,
                        "dynamicRegistration": false
                    },
                    "codeAction": {
                        "dynamicRegistration": false,
                        "dataSupport": true,
                        "resolveSupport": { "properties": ["edit"] },
                        "codeActionLiteralSupport": {
                            "codeActionKind": {
                                "valueSet": ["refactor", "refactor.move"]
                            }
                        }
                    }
                },
                "workspace": {
                    "applyEdit": true,
                    "workspaceEdit": {
                        "documentChanges": true,
                        "resourceOperations": ["create", "rename", "delete"]
                    },
                    "executeCommand": { "dynamicRegistration": false },
                    "workspaceFolders": true,
                    "configuration": true
                }
            },
            "rootUri": root_uri.as_str(),
            "workspaceFolders": [{
                "uri": root_uri.as_str(),
                "name": "workspace"
            }]
        });

        if let Some(ref init_options) = self.config.initialization_options {
            if let Some(obj) = initialize_params.as_object_mut() {
                obj.insert("initializationOptions".to_string(), init_options.clone());
            }
        }

        info!(
            command = %self.config.command.join(" "),
            timeout_ms = self.config.init_timeout_ms,
            "Sending LSP initialize request"
        );

        let result = self
            .send_request_with_timeout(
                "initialize",
                initialize_params,
                Duration::from_millis(self.config.init_timeout_ms),
            )
            .await
            .map_err(|e| {
                error!(
                    command = %self.config.command.join(" "),
                    error = %e,
                    "LSP initialization failed"
                );
                e
            })?;

        match serde_json::from_value::<lsp_types::InitializeResult>(result) {
            Ok(init_result) => {
                *self.server_capabilities.lock().await = Some(init_result.capabilities);
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse InitializeResult - capability checks will be unavailable");
            }
        }

        self.send_notification("initialized", json!({})).await?;

        info!("LSP server initialized successfully: {}", self.config.command.join(" "));
        Ok(())
    }

    /// Whether the server advertises code actions.
    /// Returns true if capabilities are unknown.
    pub async fn supports_code_actions(&self) -> bool {
        match self.server_capabilities.lock().await.as_ref() {
            Some(c) => c.code_action_provider.is_some(),
            None => true,
        }
    }

    /// Check if the underlying LSP server process is still running.
    pub async fn is_alive(&self) -> bool {
        let mut process = self.process.lock().await;
        match process.try_wait() {
            Ok(Some(status)) => {
                warn!("LSP process found to be exited with status: {}", status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Error while checking LSP process status: {}", e);
                false
            }
        }
    }

    /// `textDocument/didOpen` with the given text
    pub async fn did_open(
        &self,
        path: &Path,
        language_id: &str,
        version: i32,
        text: &str,
    ) -> ExplodeResult<()> {
        let params = json!({
            "textDocument": {
                "uri": path_to_uri(path)?.as_str(),
                "languageId": language_id,
                "version": version,
                "text": text
            }
        });
        self.send_notification("textDocument/didOpen", params).await
    }

    /// Full-text `textDocument/didChange`
    pub async fn did_change(&self, path: &Path, version: i32, text: &str) -> ExplodeResult<()> {
        let params = json!({
            "textDocument": {
                "uri": path_to_uri(path)?.as_str(),
                "version": version
            },
            "contentChanges": [{ "text": text }]
        });
        self.send_notification("textDocument/didChange", params).await
    }

    pub async fn did_close(&self, path: &Path) -> ExplodeResult<()> {
        let params = json!({
            "textDocument": { "uri": path_to_uri(path)?.as_str() }
        });
        self.send_notification("textDocument/didClose", params).await
    }

    /// Gracefully shutdown the LSP server process.
    ///
    /// Sends `shutdown` and `exit`, then kills the process and waits for it.
    pub async fn shutdown(&self) -> ExplodeResult<()> {
        let pid = self.process.lock().await.id();

        if let Err(e) = self
            .send_request_with_timeout("shutdown", Value::Null, SHUTDOWN_TIMEOUT)
            .await
        {
            warn!(pid = pid, error = %e, "Failed to send LSP shutdown request, continuing with forceful shutdown");
        }
        if let Err(e) = self.send_notification("exit", Value::Null).await {
            warn!(pid = pid, error = %e, "Failed to send LSP exit notification");
        }

        let mut process = self.process.lock().await;
        if let Err(e) = process.start_kill() {
            debug!(pid = pid, error = %e, "LSP server already gone");
        }
        match timeout(SHUTDOWN_TIMEOUT, process.wait()).await {
            Ok(Ok(status)) => {
                debug!(pid = pid, exit_status = ?status, "LSP server process exited");
                Ok(())
            }
            Ok(Err(e)) => Err(ExplodeError::lsp(format!(
                "Failed to wait for LSP server process: {}",
                e
            ))),
            Err(_) => Err(ExplodeError::timeout("LSP server process exit")),
        }
    }

    /// Parse Content-Length header from LSP message
    fn parse_content_length(line: &str) -> Option<usize> {
        line.strip_prefix("Content-Length: ")
            .and_then(|stripped| stripped.trim().parse().ok())
    }

    /// Read one framed message. `Ok(None)` on end of stream.
    async fn read_frame(reader: &mut BufReader<ChildStdout>) -> Result<Option<Value>, String> {
        let mut content_length = None;
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .await
                .map_err(|e| format!("Failed to read header: {}", e))?;
            if read == 0 {
                return Ok(None);
            }
            let header = line.trim();
            if header.is_empty() {
                if content_length.is_some() {
                    break;
                }
                continue;
            }
            if let Some(length) = Self::parse_content_length(header) {
                content_length = Some(length);
            }
        }

        let content_length = content_length.unwrap_or(0);
        let mut json_buffer = vec![0u8; content_length];
        reader
            .read_exact(&mut json_buffer)
            .await
            .map_err(|e| format!("Failed to read JSON content: {}", e))?;
        serde_json::from_slice(&json_buffer)
            .map(Some)
            .map_err(|e| format!("Failed to parse JSON: {}", e))
    }

    /// Handle incoming message from LSP server
    async fn handle_message(
        message: Value,
        pending_requests: &PendingRequests,
        message_tx: &mpsc::Sender<LspMessage>,
        journal: &SharedJournal,
    ) {
        if message.get("method").is_some() {
            if message.get("id").is_some() {
                Self::handle_server_request(&message, message_tx, journal).await;
            } else {
                debug!(
                    method = ?message.get("method").and_then(|m| m.as_str()),
                    "Received notification from LSP server"
                );
            }
        } else if let Some(id_num) = message.get("id").and_then(|id| id.as_i64()) {
            let sender = pending_requests.lock().await.remove(&id_num);
            let Some(sender) = sender else {
                warn!(id = id_num, "Received response for unknown request ID (already handled or timeout)");
                return;
            };

            if let Some(error) = message.get("error") {
                let error_msg = error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("Unknown error")
                    .to_string();
                let _ = sender.send(Err(error_msg));
            } else if let Some(result) = message.get("result") {
                let _ = sender.send(Ok(result.clone()));
            } else {
                // A missing result is a null result
                let _ = sender.send(Ok(Value::Null));
            }
        } else {
            warn!(message = ?message, "Received unhandled message from LSP server");
        }
    }

    /// Handle server-initiated requests
    async fn handle_server_request(
        request: &Value,
        message_tx: &mpsc::Sender<LspMessage>,
        journal: &SharedJournal,
    ) {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request.get("method").and_then(|m| m.as_str());
        debug!(method = ?method, "Handling server request");

        let response = match method {
            Some("workspace/configuration") => {
                // One null per requested item means "use your defaults"
                let items_len = request
                    .get("params")
                    .and_then(|p| p.get("items"))
                    .and_then(|i| i.as_array())
                    .map(|a| a.len())
                    .unwrap_or(0);
                LspMessage::Response {
                    id,
                    result: json!(vec![Value::Null; items_len]),
                }
            }
            Some("client/registerCapability")
            | Some("client/unregisterCapability")
            | Some("window/workDoneProgress/create") => LspMessage::Response {
                id,
                result: Value::Null,
            },
            Some("workspace/workspaceFolders") => LspMessage::Response {
                id,
                result: json!([]),
            },
            Some("workspace/applyEdit") => {
                info!("Received workspace/applyEdit request from LSP server");
                match Self::apply_edit_request(request.get("params"), journal).await {
                    Ok(()) => LspMessage::Response {
                        id,
                        result: json!({ "applied": true }),
                    },
                    Err(e) => {
                        error!(error = %e, "Failed to apply workspace edit");
                        LspMessage::Response {
                            id,
                            result: json!({
                                "applied": false,
                                "failureReason": e.to_string()
                            }),
                        }
                    }
                }
            }
            _ => {
                warn!(method = ?method, "Received unsupported server request");
                LspMessage::ErrorResponse {
                    id,
                    error: json!({
                        "code": -32601,
                        "message": "Method not found"
                    }),
                }
            }
        };

        if let Err(e) = message_tx.send(response).await {
            error!(error = %e, "Failed to send response for server request");
        }
    }

    async fn apply_edit_request(params: Option<&Value>, journal: &SharedJournal) -> ExplodeResult<()> {
        let params = params.ok_or_else(|| ExplodeError::invalid_request("Missing params in workspace/applyEdit"))?;
        let params: lsp_types::ApplyWorkspaceEditParams = serde_json::from_value(params.clone())
            .map_err(|e| ExplodeError::invalid_request(format!("Invalid workspace/applyEdit params: {}", e)))?;
        let mut journal = journal.lock().await;
        apply_workspace_edit(&params.edit, &mut journal).await
    }
}
