//! Configuration management for explode

use explode_foundation::protocol::document::DEFAULT_ACCEPTED_LANGUAGES;
use explode_foundation::{ExplodeError, ExplodeResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config files tried (in order) when no explicit path is given
pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["explode.toml", ".explode/config.toml"];

/// Prefix of environment variable overrides (`EXPLODE__LSP__COMMAND`, ...)
pub const ENV_PREFIX: &str = "EXPLODE__";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Language server used by the `lsp` invoker
    #[serde(default)]
    pub lsp: LspServerConfig,
    /// Plan consumption settings
    #[serde(default)]
    pub explode: ExplodeConfig,
}

/// Log output format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format for development
    #[default]
    Pretty,
    /// Structured JSON format for tooling
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Language server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LspServerConfig {
    /// Command to run the LSP server
    pub command: Vec<String>,
    /// Timeout for a single LSP request in milliseconds
    pub request_timeout_ms: u64,
    /// Timeout for the initialize handshake in milliseconds
    pub init_timeout_ms: u64,
    /// Workspace root (defaults to the document's directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<PathBuf>,
    /// Sent as `initializationOptions` in the initialize request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initialization_options: Option<serde_json::Value>,
}

impl Default for LspServerConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "typescript-language-server".to_string(),
                "--stdio".to_string(),
            ],
            request_timeout_ms: 60_000,
            init_timeout_ms: 60_000,
            root_dir: None,
            initialization_options: None,
        }
    }
}

/// Which refactor invoker consumes the plan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InvokerMode {
    /// "Move to a new file" code action of the language server
    #[default]
    Lsp,
    /// Built-in verbatim splitter, no language server
    Local,
    /// Report the selections only
    DryRun,
}

impl std::str::FromStr for InvokerMode {
    type Err = ExplodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lsp" => Ok(InvokerMode::Lsp),
            "local" => Ok(InvokerMode::Local),
            "dry-run" => Ok(InvokerMode::DryRun),
            other => Err(ExplodeError::config(format!(
                "Unknown mode '{}' (expected lsp, local or dry-run)",
                other
            ))),
        }
    }
}

/// Plan consumption settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplodeConfig {
    /// Invoker used by `explode run`
    pub mode: InvokerMode,
    /// Upper bound for one "move to new file" attempt in milliseconds
    pub target_timeout_ms: u64,
    /// Language identifiers explode agrees to work on
    pub accepted_languages: Vec<String>,
    /// Directory for files written by the local invoker (defaults to the document's directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
}

impl Default for ExplodeConfig {
    fn default() -> Self {
        Self {
            mode: InvokerMode::Lsp,
            target_timeout_ms: 30_000,
            accepted_languages: DEFAULT_ACCEPTED_LANGUAGES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            out_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration with figment.
    ///
    /// Priority order: env vars > config file > defaults. When `explicit_path`
    /// is given it must exist; otherwise the first of [`CONFIG_FILE_CANDIDATES`]
    /// found in the working directory is used.
    pub fn load(explicit_path: Option<&Path>) -> ExplodeResult<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Toml},
            Figment,
        };

        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ExplodeError::config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                tracing::debug!(path = %path.display(), "Loading TOML configuration");
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = CONFIG_FILE_CANDIDATES
                    .iter()
                    .map(Path::new)
                    .find(|p| p.exists())
                {
                    tracing::debug!(path = %path.display(), "Loading TOML configuration");
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: AppConfig = figment
            .extract()
            .map_err(|e| ExplodeError::config(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;

        tracing::debug!(
            mode = ?config.explode.mode,
            lsp_command = %config.lsp.command.join(" "),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ExplodeResult<()> {
        if self.lsp.command.is_empty() {
            return Err(ExplodeError::config("LSP server command cannot be empty"));
        }
        if self.lsp.request_timeout_ms == 0 || self.lsp.init_timeout_ms == 0 {
            return Err(ExplodeError::config("LSP timeouts cannot be 0"));
        }
        if self.explode.target_timeout_ms == 0 {
            return Err(ExplodeError::config("Target timeout cannot be 0"));
        }
        if self.explode.accepted_languages.is_empty() {
            return Err(ExplodeError::config(
                "At least one accepted language must be configured",
            ));
        }
        Ok(())
    }

    /// Whether `language_id` is in the accepted set
    pub fn accepts_language(&self, language_id: &str) -> bool {
        self.explode.accepts_language(language_id)
    }
}

impl ExplodeConfig {
    /// Whether `language_id` is in the accepted set
    pub fn accepts_language(&self, language_id: &str) -> bool {
        self.accepted_languages
            .iter()
            .any(|accepted| accepted == language_id)
    }
}
