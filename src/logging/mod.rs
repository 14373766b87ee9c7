//! Session/iteration logging subsystem
//!
//! Captures all process output per automation iteration, durably and
//! concurrently: each iteration gets a private 0700 directory under the
//! resolved log root holding `stdout.log`, `stderr.log`, and a
//! `metadata.json` written exactly once at scope exit.
//!
//! - [`tee`] - fan-out writer with per-sink failure isolation
//! - [`output`] - the process-wide stdout/stderr slots the tee installs into
//! - [`directory`] - log-root resolution (override > env > `~/.autoad/logs`)
//! - [`timestamp`] - second-resolution session ids, microsecond iteration ids
//! - [`session`] - the scoped [`SessionLogger`] resource
//! - [`registry`] - process-wide active-logger slot for collaborators
//! - [`error`] - the `LoggingError` family

pub mod directory;
pub mod error;
pub mod output;
pub mod registry;
pub mod session;
pub mod tee;
pub mod timestamp;

pub use directory::LOG_DIR_ENV_VAR;
pub use error::{DirectoryCreationError, LogFileError, LoggingError};
pub use registry::ActiveSession;
pub use session::{IterationMetadata, IterationStatus, SessionLogger};
pub use tee::{ConsoleSink, FileSink, Sink, TeeWriter};
