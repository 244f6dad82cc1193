//! Configuration and logging for explode

pub mod config;
pub mod logging;

pub use config::{AppConfig, ExplodeConfig, InvokerMode, LogFormat, LoggingConfig, LspServerConfig};
