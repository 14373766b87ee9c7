//! Process-wide output streams
//!
//! The crate never prints through `println!` directly; all user-visible
//! output flows through the two handles here so a SessionLogger can swap a
//! tee in front of them for the duration of an iteration. Each slot holds
//! the currently installed sink; the default is the real console stream.
//!
//! Restoration puts back the exact sink object that was installed before
//! entry (pointer-identical), so unrelated code never observes a leaked
//! redirection after a scope exits.

use std::sync::{LazyLock, Mutex};

use super::tee::{ConsoleSink, SharedSink, lock_sink, shared};

static STDOUT_SLOT: LazyLock<Mutex<SharedSink>> =
    LazyLock::new(|| Mutex::new(shared(ConsoleSink::stdout())));

static STDERR_SLOT: LazyLock<Mutex<SharedSink>> =
    LazyLock::new(|| Mutex::new(shared(ConsoleSink::stderr())));

/// Which process-wide stream a handle writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Stdout,
    Stderr,
}

/// Cheap handle onto one of the process-wide output streams
///
/// Writes go to whatever sink is currently installed in the slot; handles
/// taken before a redirection see the redirected stream while it lasts.
#[derive(Debug, Clone, Copy)]
pub struct StreamHandle {
    kind: StreamKind,
}

impl StreamHandle {
    /// Write `data` through the currently installed sink.
    ///
    /// Returns the byte length of `data`; sink failures are isolated inside
    /// the tee and never surface to the writer.
    pub fn write_str(&self, data: &str) -> usize {
        let sink = self.current();
        let mut guard = lock_sink(&sink);
        if let Err(e) = guard.write_str(data) {
            tracing::warn!(error = %e, "output: write to installed sink failed");
        }
        let _ = guard.flush();
        data.len()
    }

    /// Write `line` followed by a newline.
    pub fn write_line(&self, line: &str) {
        let mut data = String::with_capacity(line.len() + 1);
        data.push_str(line);
        data.push('\n');
        self.write_str(&data);
    }

    /// Flush the currently installed sink.
    pub fn flush(&self) {
        let sink = self.current();
        let _ = lock_sink(&sink).flush();
    }

    /// Whether the installed sink reports a terminal.
    pub fn is_terminal(&self) -> bool {
        let sink = self.current();
        let guard = lock_sink(&sink);
        guard.is_terminal()
    }

    fn current(&self) -> SharedSink {
        let slot = match self.kind {
            StreamKind::Stdout => &STDOUT_SLOT,
            StreamKind::Stderr => &STDERR_SLOT,
        };
        slot.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Handle onto the process-wide stdout stream.
pub fn stdout() -> StreamHandle {
    StreamHandle {
        kind: StreamKind::Stdout,
    }
}

/// Handle onto the process-wide stderr stream.
pub fn stderr() -> StreamHandle {
    StreamHandle {
        kind: StreamKind::Stderr,
    }
}

/// Swap the stdout slot, building the replacement from the previous sink.
///
/// The constructor runs under the slot lock, so nothing can slip between
/// reading the previous sink and installing its replacement. Returns
/// `(previous, installed)`.
pub(crate) fn install_stdout(
    build: impl FnOnce(SharedSink) -> SharedSink,
) -> (SharedSink, SharedSink) {
    install(&STDOUT_SLOT, build)
}

/// Swap the stderr slot; see [`install_stdout`].
pub(crate) fn install_stderr(
    build: impl FnOnce(SharedSink) -> SharedSink,
) -> (SharedSink, SharedSink) {
    install(&STDERR_SLOT, build)
}

/// Put a previously installed stdout sink back.
pub(crate) fn restore_stdout(previous: SharedSink) {
    let mut slot = STDOUT_SLOT
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = previous;
}

/// Put a previously installed stderr sink back.
pub(crate) fn restore_stderr(previous: SharedSink) {
    let mut slot = STDERR_SLOT
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = previous;
}

/// The sink currently installed as stdout.
pub fn current_stdout() -> SharedSink {
    STDOUT_SLOT
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// The sink currently installed as stderr.
pub fn current_stderr() -> SharedSink {
    STDERR_SLOT
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

fn install(
    slot: &Mutex<SharedSink>,
    build: impl FnOnce(SharedSink) -> SharedSink,
) -> (SharedSink, SharedSink) {
    let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let previous = guard.clone();
    let installed = build(previous.clone());
    *guard = installed.clone();
    (previous, installed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::tee::Sink;
    use serial_test::serial;
    use std::io;
    use std::sync::{Arc, Mutex};

    struct CaptureSink(Arc<Mutex<String>>);

    impl Sink for CaptureSink {
        fn write_str(&mut self, data: &str) -> io::Result<()> {
            self.0.lock().unwrap().push_str(data);
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    #[serial]
    fn test_handle_writes_through_installed_sink() {
        let captured = Arc::new(Mutex::new(String::new()));
        let capture = shared(CaptureSink(captured.clone()));

        let (previous, _) = install_stdout(|_| capture);
        stdout().write_line("captured line");
        restore_stdout(previous);

        assert_eq!(*captured.lock().unwrap(), "captured line\n");
    }

    #[test]
    #[serial]
    fn test_restore_puts_back_exact_sink() {
        let before = current_stdout();

        let captured = Arc::new(Mutex::new(String::new()));
        let (previous, installed) = install_stdout(|_| shared(CaptureSink(captured)));
        assert!(Arc::ptr_eq(&previous, &before));
        assert!(!Arc::ptr_eq(&installed, &before));

        restore_stdout(previous);
        assert!(Arc::ptr_eq(&current_stdout(), &before));
    }

    #[test]
    #[serial]
    fn test_install_sees_previous_sink() {
        let before = current_stderr();

        let mut seen: Option<SharedSink> = None;
        let (previous, _) = install_stderr(|prev| {
            seen = Some(prev.clone());
            prev
        });
        restore_stderr(previous.clone());

        assert!(Arc::ptr_eq(&seen.unwrap(), &before));
        assert!(Arc::ptr_eq(&previous, &before));
    }
}
