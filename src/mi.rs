//! Machine-interface output: line-oriented protocol records consumed by a
//! driving console or IDE.
//!
//! Records are written through a single synchronized sink so that concurrent
//! producers (the event dispatcher on the engine notification thread, any
//! component reporting asynchronous messages) never interleave mid-line.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Escape a value embedded into a quoted protocol field.
///
/// Backslash, double-quote and the standard control characters are replaced
/// by their two-character backslash forms, all other bytes pass through
/// unchanged.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0C' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0B' => out.push_str("\\v"),
            c => out.push(c),
        }
    }
    out
}

/// Serialized writer of protocol records.
///
/// Cloning returns a handle to the same underlying stream; every record is
/// written and flushed while an exclusive lock is held, so a record emitted
/// from one thread never splits a record emitted from another.
#[derive(Clone)]
pub struct OutputSink {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputSink {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Sink over the process standard output, the usual MI transport.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Write one newline-terminated record and flush it immediately.
    ///
    /// A write failure is logged and swallowed: notification handlers must
    /// finish and resume the debugee even when the consumer went away.
    pub fn line(&self, record: impl AsRef<str>) {
        let mut out = self.out.lock().unwrap();
        let res = writeln!(out, "{}", record.as_ref()).and_then(|_| out.flush());
        if let Err(e) = res {
            log::warn!(target: "mi", "protocol write failed: {e}");
        }
    }
}
