//! Line-oriented run logging.
//!
//! The pipeline reports through an injected sink, so tests can capture the
//! exact lines a run produces. One `emit` call is one complete line; a sink
//! serializes concurrent emissions internally, which keeps lines from
//! different workers from interleaving.

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Destination for one formatted line per call.
pub trait LogSink: Send + Sync {
    fn emit(&self, line: &str);
}

/// Writes each line to stdout, whole lines at a time.
#[derive(Default)]
pub struct StdoutSink {
    lock: Mutex<()>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogSink for StdoutSink {
    fn emit(&self, line: &str) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = std::io::stdout();
        let _ = writeln!(out, "{line}");
    }
}

/// Captures lines in memory.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line.to_string());
    }
}

/// Cheap cloneable handle to the run's sink.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Emits one line.
    pub fn line(&self, line: impl AsRef<str>) {
        self.sink.emit(line.as_ref());
    }
}
