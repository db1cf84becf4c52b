//! Test-log sinks.
//!
//! The runner reports through [`TestLogger`] and never prints directly, so the
//! same script can log to the terminal, to memory, or to both.
//!
//! - [`TracingLogger`] prints `Start:` / `Pass:` / `Fail:` lines and mirrors
//!   each one as a `tracing` event.
//! - [`RecordingLogger`] keeps timestamped [`LogEntry`] values, which can be
//!   written out as JSON lines.
//! - A tuple `(A, B)` of loggers forwards every call to both.

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::element::UIElement;

/// Sink for test progress and results.
pub trait TestLogger: Send + Sync {
    /// Marks the start of a named test.
    fn log_start(&self, name: &str);

    fn log_pass(&self, message: &str);

    fn log_fail(&self, message: &str);

    /// Records a diagnostic snapshot of the element tree below `root`.
    fn log_element_tree(&self, root: &UIElement);
}

impl<A: TestLogger, B: TestLogger> TestLogger for (A, B) {
    fn log_start(&self, name: &str) {
        self.0.log_start(name);
        self.1.log_start(name);
    }

    fn log_pass(&self, message: &str) {
        self.0.log_pass(message);
        self.1.log_pass(message);
    }

    fn log_fail(&self, message: &str) {
        self.0.log_fail(message);
        self.1.log_fail(message);
    }

    fn log_element_tree(&self, root: &UIElement) {
        self.0.log_element_tree(root);
        self.1.log_element_tree(root);
    }
}

impl<T: TestLogger + ?Sized> TestLogger for &T {
    fn log_start(&self, name: &str) {
        (**self).log_start(name);
    }

    fn log_pass(&self, message: &str) {
        (**self).log_pass(message);
    }

    fn log_fail(&self, message: &str) {
        (**self).log_fail(message);
    }

    fn log_element_tree(&self, root: &UIElement) {
        (**self).log_element_tree(root);
    }
}

/// Prints results to stdout and emits matching tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger {
    quiet: bool,
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppresses stdout; tracing events are still emitted.
    pub fn quiet() -> Self {
        Self { quiet: true }
    }

    fn print(&self, line: &str) {
        if self.quiet {
            return;
        }
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        let _ = writeln!(out, "{}", line);
    }
}

impl TestLogger for TracingLogger {
    fn log_start(&self, name: &str) {
        info!(test = name, "test started");
        self.print(&format!("Start: {}", name));
    }

    fn log_pass(&self, message: &str) {
        info!(result = message, "pass");
        self.print(&format!("Pass: {}", message));
    }

    fn log_fail(&self, message: &str) {
        warn!(result = message, "fail");
        self.print(&format!("Fail: {}", message));
    }

    fn log_element_tree(&self, root: &UIElement) {
        info!(elements = root.subtree_len(), "element tree");
        self.print(&format!("Debug: element tree\n{}", root.outline().trim_end()));
    }
}

/// What a [`LogEntry`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Start,
    Pass,
    Fail,
    ElementTree,
}

/// One recorded logger call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    /// Test name, result message, or the rendered tree outline.
    pub message: String,
}

/// Logger that keeps every call in memory.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, kind: LogKind, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            kind,
            message: message.into(),
        };
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    /// A copy of everything recorded so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Entries of one kind, message only.
    pub fn messages(&self, kind: LogKind) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.message)
            .collect()
    }

    /// Writes every entry as one JSON object per line.
    pub fn write_jsonl(&self, path: &Path) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        for entry in self.entries() {
            let line = serde_json::to_string(&entry)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            writeln!(file, "{}", line)?;
        }
        file.flush()
    }
}

impl TestLogger for RecordingLogger {
    fn log_start(&self, name: &str) {
        self.push(LogKind::Start, name);
    }

    fn log_pass(&self, message: &str) {
        self.push(LogKind::Pass, message);
    }

    fn log_fail(&self, message: &str) {
        self.push(LogKind::Fail, message);
    }

    fn log_element_tree(&self, root: &UIElement) {
        self.push(LogKind::ElementTree, root.outline());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_logger_keeps_order() {
        let logger = RecordingLogger::new();
        logger.log_start("Test 1");
        logger.log_pass("ok");
        logger.log_fail("bad");

        let entries = logger.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, LogKind::Start);
        assert_eq!(entries[1].message, "ok");
        assert_eq!(entries[2].kind, LogKind::Fail);
        assert!(entries[0].timestamp <= entries[2].timestamp);
        assert_eq!(logger.messages(LogKind::Fail), vec!["bad".to_string()]);
    }

    #[test]
    fn tree_entry_holds_outline() {
        let logger = RecordingLogger::new();
        let tree = UIElement::new("Window")
            .with_label("Riemann Sum")
            .with_children(vec![UIElement::new("Button").with_label("x")]);
        logger.log_element_tree(&tree);
        let trees = logger.messages(LogKind::ElementTree);
        assert_eq!(trees.len(), 1);
        assert!(trees[0].contains("Button name:\"x\""));
    }

    #[test]
    fn pair_forwards_to_both() {
        let a = RecordingLogger::new();
        let b = RecordingLogger::new();
        let both = (&a, &b);
        both.log_start("Test 2");
        both.log_pass("Only 1 rectangle present.");
        assert_eq!(a.entries().len(), 2);
        assert_eq!(b.messages(LogKind::Pass), vec!["Only 1 rectangle present.".to_string()]);
    }

    #[test]
    fn quiet_tracing_logger_does_not_panic() {
        let logger = TracingLogger::quiet();
        logger.log_start("Test 1");
        logger.log_pass("fine");
        logger.log_fail("not fine");
        logger.log_element_tree(&UIElement::new("Window"));
    }

    #[test]
    fn jsonl_has_one_line_per_entry() {
        let logger = RecordingLogger::new();
        logger.log_start("Test 1");
        logger.log_fail("Rectangle 1 is NOT present.");

        let path = std::env::temp_dir().join(format!(
            "riemann_uitest_log_{}.jsonl",
            uuid::Uuid::new_v4()
        ));
        logger.write_jsonl(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: LogEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.kind, LogKind::Fail);
        assert_eq!(second.message, "Rectangle 1 is NOT present.");
        assert!(lines[0].contains("\"kind\":\"start\""));
    }
}
