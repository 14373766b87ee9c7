//! Error taxonomy for the session logging subsystem
//!
//! `LoggingError` is the family callers catch broadly; `DirectoryCreationError`
//! and `LogFileError` are the specific members. A directory-creation failure
//! at scope entry is surfaced wrapped inside `LogFileError`, so callers only
//! ever need to handle the family.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The filesystem could not create an iteration directory.
#[derive(Debug, Error)]
#[error("failed to create iteration directory {path}: {source}")]
pub struct DirectoryCreationError {
    /// Directory that could not be created
    pub path: PathBuf,
    /// Underlying filesystem error
    #[source]
    pub source: io::Error,
}

/// Failures touching the per-iteration log files
#[derive(Debug, Error)]
pub enum LogFileError {
    /// Could not open a log file for append
    #[error("failed to open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Could not write a file inside the iteration directory
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Directory-creation failure surfaced through the log-file pipeline
    #[error(transparent)]
    Directory(#[from] DirectoryCreationError),
}

/// Error family for the logging subsystem
///
/// Callers may match on the specific subtypes or treat any `LoggingError`
/// as "logging could not be set up".
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error(transparent)]
    DirectoryCreation(#[from] DirectoryCreationError),

    #[error(transparent)]
    LogFile(#[from] LogFileError),

    /// The default log root needs a home directory and none was found
    #[error("could not determine home directory for the default log root")]
    HomeDirUnavailable,

    /// Descriptor lookup on a multiplexer whose sinks expose none
    #[error("no sink exposes a file descriptor")]
    NoDescriptor,
}
