//! Reporter implementations
//!
//! - [`ConsoleReporter`] writes notifications to stderr
//! - [`MemoryReporter`] records every event, for tests and JSON output
//! - [`OutputChannel`] is the process-wide textual output log
//! - [`CompositeReporter`] fans events out to several reporters

use explode_foundation::{ExplodeSummary, Reporter};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

/// Writes notifications to stderr, keeping stdout for command output
pub struct ConsoleReporter {
    quiet: bool,
}

impl ConsoleReporter {
    /// With `quiet`, only errors and the final status are printed
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Reporter for ConsoleReporter {
    fn info(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", message);
        }
    }

    fn error(&self, message: &str) {
        eprintln!("error: {}", message);
    }

    fn progress(&self, index: usize, total: usize, label: &str) {
        if !self.quiet {
            eprintln!("[{}/{}] Moving {}...", index, total, label);
        }
    }

    fn log_line(&self, line: &str) {
        if !self.quiet {
            eprintln!("  {}", line);
        }
    }

    fn summary(&self, summary: &ExplodeSummary) {
        eprintln!("{}", summary.status);
    }
}

/// Everything a reporter can be told
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Info(String),
    Error(String),
    Progress {
        index: usize,
        total: usize,
        label: String,
    },
    LogLine(String),
    Summary(ExplodeSummary),
}

/// Records events in memory
#[derive(Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn infos(&self) -> Vec<String> {
        self.collect(|event| match event {
            ReportEvent::Info(message) => Some(message.clone()),
            _ => None,
        })
    }

    pub fn errors(&self) -> Vec<String> {
        self.collect(|event| match event {
            ReportEvent::Error(message) => Some(message.clone()),
            _ => None,
        })
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.collect(|event| match event {
            ReportEvent::LogLine(line) => Some(line.clone()),
            _ => None,
        })
    }

    /// Labels passed to `progress`, in order
    pub fn progress_labels(&self) -> Vec<String> {
        self.collect(|event| match event {
            ReportEvent::Progress { label, .. } => Some(label.clone()),
            _ => None,
        })
    }

    pub fn last_summary(&self) -> Option<ExplodeSummary> {
        self.collect(|event| match event {
            ReportEvent::Summary(summary) => Some(summary.clone()),
            _ => None,
        })
        .pop()
    }

    fn collect<T>(&self, pick: impl Fn(&ReportEvent) -> Option<T>) -> Vec<T> {
        self.events
            .lock()
            .map(|events| events.iter().filter_map(&pick).collect())
            .unwrap_or_default()
    }

    fn push(&self, event: ReportEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Reporter for MemoryReporter {
    fn info(&self, message: &str) {
        self.push(ReportEvent::Info(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(ReportEvent::Error(message.to_string()));
    }

    fn progress(&self, index: usize, total: usize, label: &str) {
        self.push(ReportEvent::Progress {
            index,
            total,
            label: label.to_string(),
        });
    }

    fn log_line(&self, line: &str) {
        self.push(ReportEvent::LogLine(line.to_string()));
    }

    fn summary(&self, summary: &ExplodeSummary) {
        self.push(ReportEvent::Summary(summary.clone()));
    }
}

static OUTPUT_CHANNEL: Lazy<Arc<OutputChannel>> =
    Lazy::new(|| Arc::new(OutputChannel::new("Explode")));

/// Named, append-only textual output log.
///
/// One instance per process is created on first use of [`OutputChannel::global`].
/// Progress notifications are not kept; everything else becomes a line.
pub struct OutputChannel {
    name: String,
    lines: Mutex<Vec<String>>,
}

impl OutputChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lines: Mutex::new(Vec::new()),
        }
    }

    /// The process-wide channel
    pub fn global() -> Arc<OutputChannel> {
        OUTPUT_CHANNEL.clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn append_line(&self, line: impl Into<String>) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.into());
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// The whole log, one line per entry
    pub fn contents(&self) -> String {
        self.lines()
            .iter()
            .map(|line| format!("{}\n", line))
            .collect()
    }
}

impl Reporter for OutputChannel {
    fn info(&self, message: &str) {
        self.append_line(format!("[info] {}", message));
    }

    fn error(&self, message: &str) {
        self.append_line(format!("[error] {}", message));
    }

    fn progress(&self, _index: usize, _total: usize, _label: &str) {}

    fn log_line(&self, line: &str) {
        self.append_line(line);
    }

    fn summary(&self, summary: &ExplodeSummary) {
        self.append_line(summary.status.clone());
    }
}

/// Forwards every event to each inner reporter in order
pub struct CompositeReporter {
    reporters: Vec<Arc<dyn Reporter>>,
}

impl CompositeReporter {
    pub fn new(reporters: Vec<Arc<dyn Reporter>>) -> Self {
        Self { reporters }
    }
}

impl Reporter for CompositeReporter {
    fn info(&self, message: &str) {
        self.reporters.iter().for_each(|r| r.info(message));
    }

    fn error(&self, message: &str) {
        self.reporters.iter().for_each(|r| r.error(message));
    }

    fn progress(&self, index: usize, total: usize, label: &str) {
        self.reporters
            .iter()
            .for_each(|r| r.progress(index, total, label));
    }

    fn log_line(&self, line: &str) {
        self.reporters.iter().for_each(|r| r.log_line(line));
    }

    fn summary(&self, summary: &ExplodeSummary) {
        self.reporters.iter().for_each(|r| r.summary(summary));
    }
}
