//! Output sinks for command output

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Destination for command output as it arrives
pub trait OutputSink: Send + Sync {
    /// Write stdout content followed by a line terminator
    fn write_line(&self, text: &str);

    /// Surface an error-level entry (non-empty stderr content)
    fn write_error(&self, text: &str);
}

/// Writes to the process stdout and stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn write_line(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        // a closed stdout has nowhere left to report to
        let _ = writeln!(out, "{text}");
    }

    fn write_error(&self, text: &str) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{text}");
    }
}

/// A line captured by [`BufferSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkLine {
    Out(String),
    Err(String),
}

/// Captures output in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    lines: Arc<Mutex<Vec<SinkLine>>>,
}

impl BufferSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured lines in arrival order
    #[must_use]
    pub fn lines(&self) -> Vec<SinkLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Captured stdout lines
    #[must_use]
    pub fn stdout(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                SinkLine::Out(text) => Some(text),
                SinkLine::Err(_) => None,
            })
            .collect()
    }

    /// Captured error entries
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                SinkLine::Err(text) => Some(text),
                SinkLine::Out(_) => None,
            })
            .collect()
    }

    fn push(&self, line: SinkLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl OutputSink for BufferSink {
    fn write_line(&self, text: &str) {
        self.push(SinkLine::Out(text.to_string()));
    }

    fn write_error(&self, text: &str) {
        self.push(SinkLine::Err(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_sink_clones_share_lines() {
        let sink = BufferSink::new();
        let other = sink.clone();

        sink.write_line("ok");
        other.write_error("boom");

        assert_eq!(
            sink.lines(),
            vec![SinkLine::Out("ok".to_string()), SinkLine::Err("boom".to_string())]
        );
        assert_eq!(other.stdout(), vec!["ok"]);
        assert_eq!(other.errors(), vec!["boom"]);
    }
}
