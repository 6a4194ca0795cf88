//! Best-effort text output.
//!
//! Sink failures never reach the protocol layer: the node logs them at trace
//! level and carries on.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

/// Destination for diagnostic text.
pub trait DiagnosticSink {
    /// Emit `text` verbatim. Line breaks are part of `text`.
    fn write_text(&mut self, text: &str) -> io::Result<()>;
}

/// Writes to the process's standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl DiagnosticSink for StdoutSink {
    fn write_text(&mut self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn write_text(&mut self, _text: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Collects text into a shared buffer. Clones see the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    buf: Arc<Mutex<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return and clear the buffer.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buf.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl DiagnosticSink for MemorySink {
    fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
        Ok(())
    }
}

/// Emits each completed line as a `tracing` event.
///
/// Text without a trailing newline is held until the line is completed.
#[derive(Debug, Default)]
pub struct TracingSink {
    pending: String,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text held back waiting for a newline.
    pub fn pending(&self) -> &str {
        &self.pending
    }
}

impl DiagnosticSink for TracingSink {
    fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.pending.push_str(text);
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            info!(target: "nodebus::diag", "{}", line.trim_end_matches(['\r', '\n']));
        }
        Ok(())
    }
}

impl<D: DiagnosticSink + ?Sized> DiagnosticSink for Box<D> {
    fn write_text(&mut self, text: &str) -> io::Result<()> {
        (**self).write_text(text)
    }
}
