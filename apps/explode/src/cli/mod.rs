//! CLI command handling for explode

mod format;

use anyhow::Context;
use clap::{Parser, Subcommand};
use explode_config::{AppConfig, InvokerMode};
use explode_foundation::{ActiveDocument, Reporter};
use explode_services::{
    build_invoker, load_document, CompositeReporter, ConsoleReporter, DryRunInvoker,
    ExplodeService, OutputChannel, NO_DECLARATIONS_MESSAGE,
};
use format::format_plan;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Exit status when the pipeline ran, fully or partially
const EXIT_OK: i32 = 0;
/// Exit status when the request was refused before running
const EXIT_REFUSED: i32 = 1;

/// The main CLI struct.
#[derive(Parser)]
#[command(name = "explode")]
#[command(about = "Split every top-level declaration of a script file into its own file")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to explode.toml or .explode/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// The available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Print the extraction plan of a file without changing anything
    Plan {
        /// File to analyse
        file: PathBuf,

        /// Language identifier (guessed from the extension by default)
        #[arg(long)]
        language_id: Option<String>,

        /// Output format
        #[arg(long, default_value = "pretty", value_parser = ["pretty", "json"])]
        format: String,
    },
    /// Move every top-level declaration into its own file
    Run {
        /// File to explode
        file: PathBuf,

        /// Language identifier (guessed from the extension by default)
        #[arg(long)]
        language_id: Option<String>,

        /// How declarations are moved (overrides `explode.mode`)
        #[arg(long, value_parser = ["lsp", "local", "dry-run"])]
        mode: Option<String>,

        /// Directory for files written in local mode (overrides `explode.out_dir`)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Only print errors and the final status
        #[arg(long)]
        quiet: bool,

        /// Also write the output log to this file
        #[arg(long)]
        output_log: Option<PathBuf>,

        /// Output format of the final outcome on stdout
        #[arg(long, default_value = "pretty", value_parser = ["pretty", "json"])]
        format: String,
    },
}

pub async fn run() -> i32 {
    let cli = Cli::parse();

    let config = match bootstrap(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return EXIT_REFUSED;
        }
    };

    match cli.command {
        Commands::Plan {
            file,
            language_id,
            format,
        } => handle_plan(&config, &file, language_id.as_deref(), &format).await,
        Commands::Run {
            file,
            language_id,
            mode,
            out_dir,
            quiet,
            output_log,
            format,
        } => {
            let mut config = config;
            if let Some(mode) = mode {
                match mode.parse::<InvokerMode>() {
                    Ok(mode) => config.explode.mode = mode,
                    Err(e) => {
                        eprintln!("error: {}", e);
                        return EXIT_REFUSED;
                    }
                }
            }
            if out_dir.is_some() {
                config.explode.out_dir = out_dir;
            }
            let options = RunOptions {
                quiet,
                output_log,
                json: format == "json",
            };
            handle_run(&config, &file, language_id.as_deref(), options).await
        }
    }
}

/// Load configuration and install logging
fn bootstrap(config_path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = AppConfig::load(config_path).context("Failed to load configuration")?;
    explode_config::logging::initialize(&config.logging);
    Ok(config)
}

/// A missing or unreadable file becomes "no active document"
async fn open_document(file: &Path, language_id: Option<&str>) -> Option<ActiveDocument> {
    match load_document(file, language_id).await {
        Ok(document) => Some(document),
        Err(e) => {
            warn!(file = %file.display(), error = %e, "Could not open document");
            None
        }
    }
}

async fn handle_plan(config: &AppConfig, file: &Path, language_id: Option<&str>, format: &str) -> i32 {
    let document = open_document(file, language_id).await;
    let service = ExplodeService::new(
        config.explode.clone(),
        Arc::new(DryRunInvoker::new()),
        Arc::new(ConsoleReporter::new(false)),
    );

    let plan = match service.plan(document.as_ref()) {
        Ok(plan) => plan,
        Err(refusal) => {
            eprintln!("error: {}", refusal);
            return EXIT_REFUSED;
        }
    };

    if format == "json" {
        match serde_json::to_string_pretty(&plan) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error: failed to serialize plan: {}", e);
                return EXIT_REFUSED;
            }
        }
    } else if plan.is_empty() {
        println!("{}", NO_DECLARATIONS_MESSAGE);
    } else {
        let text = document.as_ref().map(|d| d.text.as_str()).unwrap_or_default();
        print!("{}", format_plan(&plan, text));
    }
    EXIT_OK
}

struct RunOptions {
    quiet: bool,
    output_log: Option<PathBuf>,
    json: bool,
}

async fn handle_run(config: &AppConfig, file: &Path, language_id: Option<&str>, options: RunOptions) -> i32 {
    let document = open_document(file, language_id).await;

    let channel = OutputChannel::global();
    let console: Arc<dyn Reporter> = Arc::new(ConsoleReporter::new(options.quiet));
    let reporter = Arc::new(CompositeReporter::new(vec![console, channel.clone()]));
    let service = ExplodeService::new(
        config.explode.clone(),
        build_invoker(config.explode.mode, config),
        reporter,
    );

    let cancel = service.cancel_flag();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current declaration");
            cancel.cancel();
        }
    });

    let outcome = service.explode_document(document.as_ref()).await;
    interrupt.abort();

    if let Some(path) = &options.output_log {
        if let Err(e) = tokio::fs::write(path, channel.contents()).await {
            eprintln!("error: failed to write output log {}: {}", path.display(), e);
        }
    }

    if options.json {
        match serde_json::to_string_pretty(&outcome) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("error: failed to serialize outcome: {}", e),
        }
    }

    if config.explode.mode == InvokerMode::DryRun && outcome.summary().is_some() && !options.quiet {
        eprintln!("Dry run: no files were changed");
    }

    info!(refused = outcome.is_refused(), "explode run finished");
    if outcome.is_refused() {
        EXIT_REFUSED
    } else {
        EXIT_OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::try_parse_from([
            "explode", "--config", "custom.toml", "run", "src/index.ts", "--mode", "local",
            "--out-dir", "split", "--quiet",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Commands::Run {
                file,
                mode,
                out_dir,
                quiet,
                ..
            } => {
                assert_eq!(file, PathBuf::from("src/index.ts"));
                assert_eq!(mode.as_deref(), Some("local"));
                assert_eq!(out_dir, Some(PathBuf::from("split")));
                assert!(quiet);
            }
            Commands::Plan { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_unknown_mode_and_format_are_rejected() {
        assert!(Cli::try_parse_from(["explode", "run", "a.ts", "--mode", "teleport"]).is_err());
        assert!(Cli::try_parse_from(["explode", "plan", "a.ts", "--format", "yaml"]).is_err());
    }
}
