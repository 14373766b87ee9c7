//! SessionLogger - scoped capture of process output per iteration
//!
//! One SessionLogger spans a whole automation session (one session id);
//! each call to [`SessionLogger::scope`] is one iteration. Entering the
//! scope creates a private 0700 iteration directory, opens `stdout.log`
//! and `stderr.log`, and installs a tee over the process-wide output
//! streams; leaving it restores the exact previous streams, persists
//! `metadata.json`, closes the log files, and deregisters from the global
//! slot. Restoration runs on every exit path, including panics.

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::directory;
use super::error::{DirectoryCreationError, LogFileError, LoggingError};
use super::output;
use super::registry::{self, ActiveSession};
use super::tee::{FileSink, SharedSink, TeeWriter, shared};
use super::timestamp;

/// Lifecycle state recorded in `metadata.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IterationStatus {
    Initialized,
    Completed,
    Failed,
}

/// Error details recorded when an iteration fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationError {
    /// Short type name of the error that left the scope
    #[serde(rename = "type")]
    pub kind: String,
    /// Its rendered message
    pub message: String,
}

/// Structured metadata persisted once per iteration, at scope exit
///
/// Caller-merged extra keys ride along in `extra` and round-trip verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationMetadata {
    pub session_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration_start_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    /// Present only on normal completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,

    pub status: IterationStatus,

    /// Present only on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<IterationError>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IterationMetadata {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            iteration_start_time: None,
            start_time: None,
            end_time: None,
            status: IterationStatus::Initialized,
            error: None,
            extra: Map::new(),
        }
    }
}

/// Scoped logger owning one session's iteration lifecycle
pub struct SessionLogger {
    session_id: String,
    log_root: PathBuf,
    metadata: IterationMetadata,
    iteration_dir: Option<PathBuf>,
}

/// Everything acquired at scope entry, released in order at exit
struct Entered {
    prev_stdout: SharedSink,
    prev_stderr: SharedSink,
    tee_stdout: SharedSink,
    tee_stderr: SharedSink,
    handle: Arc<ActiveSession>,
}

impl SessionLogger {
    /// Create a logger for a new session.
    ///
    /// Resolves the log root and generates the session id immediately, but
    /// touches neither the filesystem nor the output streams until
    /// [`scope`](Self::scope) is entered. The resolved root may not exist
    /// yet; that is not an error here.
    pub fn new(log_dir_override: Option<&Path>) -> Result<Self, LoggingError> {
        let log_root = directory::resolve(log_dir_override)?;
        let session_id = timestamp::session_id();
        debug!(%session_id, log_root = %log_root.display(), "SessionLogger::new");

        let metadata = IterationMetadata::new(session_id.clone());
        Ok(Self {
            session_id,
            log_root,
            metadata,
            iteration_dir: None,
        })
    }

    /// Session identifier, second resolution.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Resolved log root (may not exist until a scope is entered).
    pub fn log_root(&self) -> &Path {
        &self.log_root
    }

    /// Directory of the most recent iteration, if any scope ran.
    pub fn iteration_dir(&self) -> Option<&Path> {
        self.iteration_dir.as_deref()
    }

    /// Current metadata snapshot.
    pub fn metadata(&self) -> &IterationMetadata {
        &self.metadata
    }

    /// Merge a caller-supplied key into the metadata persisted at exit.
    ///
    /// Values pass through to `metadata.json` unchanged.
    pub fn merge_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.extra.insert(key.into(), value);
    }

    /// Run `body` inside a logged iteration scope.
    ///
    /// On `Ok`, metadata is finalized as `completed` with an `end_time`.
    /// On `Err`, metadata is finalized as `failed` with the error's type
    /// name and message, and the error still propagates — logging is
    /// observational, never suppressive. Stream restoration happens before
    /// any fallible release work, on every exit path including panics.
    pub fn scope<T, E>(&mut self, body: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: std::fmt::Display + From<LoggingError>,
    {
        let entered = self.enter().map_err(E::from)?;

        let mut unwind_guard = RestoreOnUnwind {
            streams: Some((entered.prev_stdout.clone(), entered.prev_stderr.clone())),
            handle: entered.handle.clone(),
        };
        let result = body();
        unwind_guard.streams = None;

        match &result {
            Ok(_) => self.release(entered, None),
            Err(err) => self.release(
                entered,
                Some(IterationError {
                    kind: short_type_name::<E>().to_string(),
                    message: err.to_string(),
                }),
            ),
        }

        result
    }

    /// Acquire everything for one iteration.
    ///
    /// Both log files are opened before either stream is redirected, so a
    /// failure here aborts entry with no partial state exposed.
    fn enter(&mut self) -> Result<Entered, LoggingError> {
        let iteration_id = timestamp::iteration_id();
        let dir = self.log_root.join(&iteration_id);
        debug!(%iteration_id, dir = %dir.display(), "SessionLogger::enter");

        create_iteration_dir(&dir).map_err(LogFileError::from)?;

        let stdout_file = FileSink::append(dir.join("stdout.log"))?;
        let stderr_file = FileSink::append(dir.join("stderr.log"))?;

        let (prev_stdout, tee_stdout) = output::install_stdout(|prev| {
            shared(TeeWriter::new(vec![Box::new(prev), Box::new(stdout_file)]))
        });
        let (prev_stderr, tee_stderr) = output::install_stderr(|prev| {
            shared(TeeWriter::new(vec![Box::new(prev), Box::new(stderr_file)]))
        });

        let handle = Arc::new(ActiveSession {
            session_id: self.session_id.clone(),
            iteration_id,
            iteration_dir: dir.clone(),
        });
        registry::set(Some(handle.clone()));

        let now = timestamp::iso_now();
        self.metadata.iteration_start_time = Some(now.clone());
        self.metadata.start_time = Some(now);
        self.metadata.end_time = None;
        self.metadata.error = None;
        self.iteration_dir = Some(dir);

        Ok(Entered {
            prev_stdout,
            prev_stderr,
            tee_stdout,
            tee_stderr,
            handle,
        })
    }

    /// Release in a fixed order: streams first, then metadata, then files,
    /// then the registry slot. Release failures are reported to the
    /// original stderr and swallowed so they can never mask the scope
    /// body's own error.
    fn release(&mut self, entered: Entered, error: Option<IterationError>) {
        output::restore_stdout(entered.prev_stdout);
        output::restore_stderr(entered.prev_stderr);

        match error {
            Some(info) => {
                self.metadata.status = IterationStatus::Failed;
                self.metadata.error = Some(info);
            }
            None => {
                self.metadata.status = IterationStatus::Completed;
                self.metadata.end_time = Some(timestamp::iso_now());
            }
        }

        if let Some(dir) = self.iteration_dir.clone()
            && let Err(e) = self.write_metadata(&dir)
        {
            warn!(error = %e, "failed to persist iteration metadata");
            eprintln!("warning: failed to persist iteration metadata: {e}");
        }

        drop(entered.tee_stdout);
        drop(entered.tee_stderr);

        registry::clear_if(&entered.handle);
        info!(
            session_id = %self.session_id,
            status = ?self.metadata.status,
            "iteration scope released"
        );
    }

    fn write_metadata(&self, dir: &Path) -> Result<(), LogFileError> {
        let path = dir.join("metadata.json");
        let json = serde_json::to_string_pretty(&self.metadata).map_err(|e| {
            LogFileError::Write {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            }
        })?;
        std::fs::write(&path, json).map_err(|source| LogFileError::Write { path, source })
    }
}

/// Restores the output slots and clears the registry if the scope body
/// panics. Disarmed on the normal and error paths, where `release` does
/// the full ordered teardown instead.
struct RestoreOnUnwind {
    streams: Option<(SharedSink, SharedSink)>,
    handle: Arc<ActiveSession>,
}

impl Drop for RestoreOnUnwind {
    fn drop(&mut self) {
        if let Some((prev_stdout, prev_stderr)) = self.streams.take() {
            output::restore_stdout(prev_stdout);
            output::restore_stderr(prev_stderr);
            registry::clear_if(&self.handle);
        }
    }
}

/// Create the iteration directory with owner-only permissions.
///
/// Missing parents are created along the way; a collision with an existing
/// file (or the directory itself already existing) is a creation failure,
/// never a silent reuse.
fn create_iteration_dir(dir: &Path) -> Result<(), DirectoryCreationError> {
    if let Some(parent) = dir.parent()
        && !parent.as_os_str().is_empty()
    {
        DirBuilder::new()
            .recursive(true)
            .create(parent)
            .map_err(|source| DirectoryCreationError {
                path: dir.to_path_buf(),
                source,
            })?;
    }

    DirBuilder::new()
        .mode(0o700)
        .create(dir)
        .map_err(|source| DirectoryCreationError {
            path: dir.to_path_buf(),
            source,
        })
}

fn short_type_name<E>() -> &'static str {
    let full = std::any::type_name::<E>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::output;
    use crate::logging::tee::Sink;
    use chrono::DateTime;
    use serial_test::serial;
    use std::io;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Mutex;
    use tempfile::tempdir;
    use thiserror::Error;

    #[derive(Debug, Error)]
    enum ScopeError {
        #[error("boom")]
        Boom,
        #[error(transparent)]
        Logging(#[from] LoggingError),
    }

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
    fn test_new_is_lazy() {
        let temp = tempdir().unwrap();
        let logger = SessionLogger::new(Some(temp.path())).unwrap();

        assert_eq!(logger.session_id().split('-').count(), 6);
        assert!(logger.iteration_dir().is_none());
        assert_eq!(logger.metadata().status, IterationStatus::Initialized);
        // Construction creates nothing on disk.
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    #[serial]
    fn test_default_root_ends_with_autoad_logs() {
        unsafe { std::env::remove_var(crate::logging::directory::LOG_DIR_ENV_VAR) };
        let logger = SessionLogger::new(None).unwrap();
        assert!(logger.log_root().ends_with(".autoad/logs"));
    }

    #[test]
    #[serial]
    fn test_scope_redirects_and_restores_streams() {
        let temp = tempdir().unwrap();
        let mut logger = SessionLogger::new(Some(temp.path())).unwrap();

        let before_stdout = output::current_stdout();
        let before_stderr = output::current_stderr();

        logger
            .scope(|| -> Result<(), LoggingError> {
                assert!(!Arc::ptr_eq(&output::current_stdout(), &before_stdout));
                assert!(!Arc::ptr_eq(&output::current_stderr(), &before_stderr));

                output::stdout().write_line("Test stdout");
                output::stderr().write_line("Test stderr");
                Ok(())
            })
            .unwrap();

        assert!(Arc::ptr_eq(&output::current_stdout(), &before_stdout));
        assert!(Arc::ptr_eq(&output::current_stderr(), &before_stderr));

        let dir = logger.iteration_dir().unwrap();
        let stdout_log = std::fs::read_to_string(dir.join("stdout.log")).unwrap();
        let stderr_log = std::fs::read_to_string(dir.join("stderr.log")).unwrap();
        assert!(stdout_log.contains("Test stdout"));
        assert!(stderr_log.contains("Test stderr"));
    }

    #[test]
    #[serial]
    fn test_iteration_directory_shape_and_permissions() {
        let temp = tempdir().unwrap();
        let mut logger = SessionLogger::new(Some(temp.path())).unwrap();

        logger.scope(|| -> Result<(), LoggingError> { Ok(()) }).unwrap();

        let dir = logger.iteration_dir().unwrap();
        assert!(dir.is_dir());

        let name = dir.file_name().unwrap().to_str().unwrap();
        let parts: Vec<&str> = name.split('-').collect();
        assert_eq!(parts.len(), 7);
        assert_eq!(parts[6].len(), 6);
        assert!(!name.contains("iter-"));

        let mode = std::fs::metadata(dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    #[serial]
    fn test_completed_metadata_round_trip() {
        let temp = tempdir().unwrap();
        let mut logger = SessionLogger::new(Some(temp.path())).unwrap();

        logger.merge_metadata("custom_field", serde_json::json!("custom_value"));
        logger.merge_metadata("branch_name", serde_json::json!("test-branch"));

        logger
            .scope(|| -> Result<(), LoggingError> {
                // Keep the scope open long enough that end_time lands on a
                // later microsecond than start_time.
                std::thread::sleep(std::time::Duration::from_millis(2));
                Ok(())
            })
            .unwrap();

        let path = logger.iteration_dir().unwrap().join("metadata.json");
        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(saved["session_id"], logger.session_id());
        assert_eq!(saved["status"], "completed");
        assert_eq!(saved["custom_field"], "custom_value");
        assert_eq!(saved["branch_name"], "test-branch");
        assert!(saved.get("error").is_none());

        let start = DateTime::parse_from_rfc3339(saved["start_time"].as_str().unwrap()).unwrap();
        let end = DateTime::parse_from_rfc3339(saved["end_time"].as_str().unwrap()).unwrap();
        assert!(end > start);
        DateTime::parse_from_rfc3339(saved["iteration_start_time"].as_str().unwrap()).unwrap();
    }

    #[test]
    #[serial]
    fn test_failed_scope_records_error_and_propagates() {
        let temp = tempdir().unwrap();
        let mut logger = SessionLogger::new(Some(temp.path())).unwrap();

        let before_stdout = output::current_stdout();

        let result = logger.scope(|| -> Result<(), ScopeError> { Err(ScopeError::Boom) });
        assert!(matches!(result, Err(ScopeError::Boom)));

        // Streams restored even on the failure path.
        assert!(Arc::ptr_eq(&output::current_stdout(), &before_stdout));

        let path = logger.iteration_dir().unwrap().join("metadata.json");
        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(saved["status"], "failed");
        assert_eq!(saved["error"]["type"], "ScopeError");
        assert_eq!(saved["error"]["message"], "boom");
        assert!(saved.get("end_time").is_none());
    }

    #[test]
    #[serial]
    fn test_entry_failure_exposes_no_partial_state() {
        let temp = tempdir().unwrap();

        // Block directory creation with a plain file where the root should be.
        let blocked = temp.path().join("blocked");
        std::fs::write(&blocked, "blocking file").unwrap();

        let mut logger = SessionLogger::new(Some(blocked.as_path())).unwrap();

        let before_stdout = output::current_stdout();
        let result = logger.scope(|| -> Result<(), LoggingError> { Ok(()) });

        // Directory-creation failures surface wrapped as LogFileError.
        assert!(matches!(result, Err(LoggingError::LogFile(_))));
        assert!(Arc::ptr_eq(&output::current_stdout(), &before_stdout));
        assert!(crate::logging::registry::get().is_none());
    }

    #[test]
    #[serial]
    fn test_registry_reflects_active_scope() {
        let temp = tempdir().unwrap();
        let mut logger = SessionLogger::new(Some(temp.path())).unwrap();
        let session_id = logger.session_id().to_string();

        assert!(registry::get().is_none());

        logger
            .scope(|| -> Result<(), LoggingError> {
                let active = registry::get().expect("scope should register itself");
                assert_eq!(active.session_id, session_id);
                assert_eq!(active.iteration_id.split('-').count(), 7);
                Ok(())
            })
            .unwrap();

        assert!(registry::get().is_none());
    }

    #[test]
    #[serial]
    fn test_sequential_scopes_use_distinct_directories() {
        let temp = tempdir().unwrap();
        let mut dirs = Vec::new();

        for i in 1..=3 {
            let mut logger = SessionLogger::new(Some(temp.path())).unwrap();
            logger
                .scope(|| -> Result<(), LoggingError> {
                    output::stdout().write_line(&format!("Iteration {i} output"));
                    Ok(())
                })
                .unwrap();
            dirs.push(logger.iteration_dir().unwrap().to_path_buf());
        }

        let unique: std::collections::HashSet<&PathBuf> = dirs.iter().collect();
        assert_eq!(unique.len(), 3);

        for (i, dir) in dirs.iter().enumerate() {
            let content = std::fs::read_to_string(dir.join("stdout.log")).unwrap();
            assert!(content.contains(&format!("Iteration {} output", i + 1)));
        }
    }

    #[test]
    #[serial]
    fn test_nested_loggers_are_independent() {
        let temp = tempdir().unwrap();
        let mut outer = SessionLogger::new(Some(temp.path())).unwrap();
        let mut inner = SessionLogger::new(Some(temp.path())).unwrap();

        outer
            .scope(|| -> Result<(), LoggingError> {
                inner.scope(|| -> Result<(), LoggingError> {
                    output::stdout().write_line("from inner");
                    Ok(())
                })
            })
            .unwrap();

        let outer_dir = outer.iteration_dir().unwrap();
        let inner_dir = inner.iteration_dir().unwrap();
        assert_ne!(outer_dir, inner_dir);

        // The inner tee wrapped the outer tee, so both logs saw the line.
        let inner_log = std::fs::read_to_string(inner_dir.join("stdout.log")).unwrap();
        let outer_log = std::fs::read_to_string(outer_dir.join("stdout.log")).unwrap();
        assert!(inner_log.contains("from inner"));
        assert!(outer_log.contains("from inner"));
    }

    #[test]
    #[serial]
    fn test_console_and_file_content_are_identical() {
        let temp = tempdir().unwrap();

        // Stand in for the console so its bytes can be compared.
        let captured = Arc::new(Mutex::new(String::new()));
        let (previous, _) = output::install_stdout({
            let captured = captured.clone();
            move |_| crate::logging::tee::shared(CaptureSink(captured))
        });

        let mut logger = SessionLogger::new(Some(temp.path())).unwrap();
        logger
            .scope(|| -> Result<(), LoggingError> {
                output::stdout().write_str("line one\n");
                output::stdout().write_str("line two\n");
                Ok(())
            })
            .unwrap();

        let file_content = std::fs::read_to_string(
            logger.iteration_dir().unwrap().join("stdout.log"),
        )
        .unwrap();
        let console_content = captured.lock().unwrap().clone();
        output::restore_stdout(previous);

        assert_eq!(console_content, file_content);
        assert_eq!(file_content, "line one\nline two\n");
    }

    #[test]
    #[serial]
    fn test_panic_in_scope_still_restores_streams() {
        let temp = tempdir().unwrap();
        let before_stdout = output::current_stdout();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut logger = SessionLogger::new(Some(temp.path())).unwrap();
            let _ = logger.scope(|| -> Result<(), LoggingError> {
                panic!("scope body panicked");
            });
        }));

        assert!(result.is_err());
        assert!(Arc::ptr_eq(&output::current_stdout(), &before_stdout));
        assert!(registry::get().is_none());
    }

    #[test]
    #[serial]
    fn test_metadata_hygiene_across_reuse() {
        let temp = tempdir().unwrap();
        let mut logger = SessionLogger::new(Some(temp.path())).unwrap();

        let result = logger.scope(|| -> Result<(), ScopeError> { Err(ScopeError::Boom) });
        assert!(result.is_err());
        let failed_dir = logger.iteration_dir().unwrap().to_path_buf();

        logger.scope(|| -> Result<(), LoggingError> { Ok(()) }).unwrap();
        let ok_dir = logger.iteration_dir().unwrap().to_path_buf();
        assert_ne!(failed_dir, ok_dir);

        let saved: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(ok_dir.join("metadata.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(saved["status"], "completed");
        assert!(saved.get("error").is_none());
        assert!(saved.get("end_time").is_some());
    }
}
