//! Tee multiplexer over output sinks
//!
//! `TeeWriter` presents a single writable surface that fans every write out
//! to an ordered list of sinks (console stream, log file, nested tee). A
//! sink that fails a write or flush is skipped for that call only; the
//! remaining sinks still receive the data, and nothing propagates to the
//! writer. Output must never be lost to one crashed sink.

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::warn;

use super::error::{LogFileError, LoggingError};

/// A writable target the tee fans out to.
///
/// `is_terminal` and `raw_fd` are capability probes with conservative
/// defaults; sinks that cannot answer simply inherit them.
pub trait Sink: Send {
    /// Write the full payload to this sink.
    fn write_str(&mut self, data: &str) -> io::Result<()>;

    /// Flush any buffered data.
    fn flush(&mut self) -> io::Result<()>;

    /// Whether this sink is attached to a terminal.
    fn is_terminal(&self) -> bool {
        false
    }

    /// The underlying file descriptor, if this sink has one.
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }
}

/// A sink shared behind a mutex, as installed in the process-wide slots.
///
/// The mutex makes each `write_str` call one atomic unit relative to other
/// writers, so concurrent threads never split a write mid-call.
pub type SharedSink = Arc<Mutex<Box<dyn Sink>>>;

/// Wrap a sink for installation into an output slot.
pub fn shared(sink: impl Sink + 'static) -> SharedSink {
    Arc::new(Mutex::new(Box::new(sink)))
}

impl Sink for SharedSink {
    fn write_str(&mut self, data: &str) -> io::Result<()> {
        lock_sink(self).write_str(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        lock_sink(self).flush()
    }

    fn is_terminal(&self) -> bool {
        lock_sink(self).is_terminal()
    }

    fn raw_fd(&self) -> Option<RawFd> {
        lock_sink(self).raw_fd()
    }
}

/// Lock a shared sink, recovering from poisoning.
///
/// A writer that panicked mid-write must not take the logging subsystem
/// down with it; the inner sink state is still usable for append-mode logs.
pub(crate) fn lock_sink(sink: &SharedSink) -> std::sync::MutexGuard<'_, Box<dyn Sink>> {
    sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fan-out writer over an ordered list of sinks
pub struct TeeWriter {
    sinks: Vec<Box<dyn Sink>>,
}

impl TeeWriter {
    /// Create a tee over `sinks`, written to in order.
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { sinks }
    }

    /// Write `data` to every sink, then flush every flushable sink.
    ///
    /// Per-sink failures are isolated: a sink that errors is skipped for
    /// this call and the rest still receive the write. Returns the byte
    /// length of `data` regardless of how many sinks succeeded.
    pub fn write(&mut self, data: &str) -> usize {
        for sink in &mut self.sinks {
            if let Err(e) = sink.write_str(data) {
                warn!(error = %e, "tee: sink write failed, skipping sink for this write");
            }
        }
        for sink in &mut self.sinks {
            if let Err(e) = sink.flush() {
                warn!(error = %e, "tee: sink flush failed");
            }
        }
        data.len()
    }

    /// Flush every sink, isolating per-sink failures.
    pub fn flush_all(&mut self) {
        for sink in &mut self.sinks {
            if let Err(e) = sink.flush() {
                warn!(error = %e, "tee: sink flush failed");
            }
        }
    }

    /// The file descriptor of the first sink that exposes one.
    pub fn descriptor(&self) -> Result<RawFd, LoggingError> {
        self.sinks
            .iter()
            .find_map(|s| s.raw_fd())
            .ok_or(LoggingError::NoDescriptor)
    }
}

impl Sink for TeeWriter {
    fn write_str(&mut self, data: &str) -> io::Result<()> {
        self.write(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_all();
        Ok(())
    }

    /// True iff any sink is a terminal, so interactivity detection stays
    /// meaningful when one sink is a plain file.
    fn is_terminal(&self) -> bool {
        self.sinks.iter().any(|s| s.is_terminal())
    }

    fn raw_fd(&self) -> Option<RawFd> {
        self.sinks.iter().find_map(|s| s.raw_fd())
    }
}

/// Sink over the real process stdout or stderr
pub struct ConsoleSink {
    stream: ConsoleStream,
}

enum ConsoleStream {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
}

impl ConsoleSink {
    /// Sink writing to the real process stdout.
    pub fn stdout() -> Self {
        Self {
            stream: ConsoleStream::Stdout(io::stdout()),
        }
    }

    /// Sink writing to the real process stderr.
    pub fn stderr() -> Self {
        Self {
            stream: ConsoleStream::Stderr(io::stderr()),
        }
    }
}

impl Sink for ConsoleSink {
    fn write_str(&mut self, data: &str) -> io::Result<()> {
        match &self.stream {
            ConsoleStream::Stdout(s) => s.lock().write_all(data.as_bytes()),
            ConsoleStream::Stderr(s) => s.lock().write_all(data.as_bytes()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &self.stream {
            ConsoleStream::Stdout(s) => s.lock().flush(),
            ConsoleStream::Stderr(s) => s.lock().flush(),
        }
    }

    fn is_terminal(&self) -> bool {
        match &self.stream {
            ConsoleStream::Stdout(s) => s.is_terminal(),
            ConsoleStream::Stderr(s) => s.is_terminal(),
        }
    }

    fn raw_fd(&self) -> Option<RawFd> {
        match &self.stream {
            ConsoleStream::Stdout(s) => Some(s.as_raw_fd()),
            ConsoleStream::Stderr(s) => Some(s.as_raw_fd()),
        }
    }
}

/// Append-mode file sink for `stdout.log` / `stderr.log`
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    /// Open `path` for append, creating it if needed.
    pub fn append(path: impl Into<PathBuf>) -> Result<Self, LogFileError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LogFileError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, file })
    }

    /// Path this sink appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn write_str(&mut self, data: &str) -> io::Result<()> {
        self.file.write_all(data.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }

    fn raw_fd(&self) -> Option<RawFd> {
        Some(self.file.as_raw_fd())
    }
}
