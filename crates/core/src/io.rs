//! Output handling with stdout/stderr separation contract
//!
//! Centralized output helpers that enforce the CLI's stdout/stderr
//! separation: machine-readable results (JSON status documents, drift
//! reports) go to stdout; logs and diagnostics go to stderr via `tracing`.
//! Commands use these helpers instead of direct `println!` so the two
//! streams never mix.

use serde::Serialize;
use std::io::{self, Write};

/// Output helper that enforces the stdout/stderr separation contract.
pub struct Output<W: Write = io::Stdout> {
    writer: W,
}

impl Output<io::Stdout> {
    /// Create an `Output` writing to the process's standard output.
    pub fn stdout() -> Self {
        Self {
            writer: io::stdout(),
        }
    }
}

impl<W: Write> Output<W> {
    /// Wrap an arbitrary writer (used in tests to capture output).
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a single line of user-facing text.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{line}")
    }

    /// Write a value as a single line of JSON.
    pub fn write_json<T: Serialize>(&mut self, value: &T) -> io::Result<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{json}")
    }

    /// Write a pretty-printed JSON document.
    pub fn write_json_pretty<T: Serialize>(&mut self, value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{json}")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
