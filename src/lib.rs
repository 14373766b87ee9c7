//! autoad - automated coding-assistant iteration
//!
//! autoad wraps an external coding-assistant CLI in an iteration loop:
//! each iteration sends the improvement prompt plus the stated objectives
//! to the wrapped tool, tags the result in git, and captures everything
//! the process printed into a private per-iteration log directory.
//!
//! The load-bearing piece is the session logging subsystem: a scoped
//! resource that multiplexes process output to console and file
//! simultaneously, manages the on-disk iteration lifecycle under failure,
//! and restores the original streams on every exit path.
//!
//! # Modules
//!
//! - [`logging`] - session/iteration logging subsystem (the core)
//! - [`runner`] - wrapped-tool invocation and dry-run display
//! - [`prompt`] - JSONL prompt logging gated on the active session
//! - [`git`] - iteration tagging and remote sync
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod git;
pub mod logging;
pub mod prompt;
pub mod runner;

// Re-export commonly used types
pub use cli::{Cli, Objective};
pub use config::{AgentConfig, Config, GitConfig, LoggingConfig};
pub use git::GitError;
pub use logging::{
    ActiveSession, DirectoryCreationError, IterationMetadata, IterationStatus, LOG_DIR_ENV_VAR,
    LogFileError, LoggingError, SessionLogger, TeeWriter,
};
pub use prompt::{MAX_PROMPT_LENGTH, MAX_TURNS_PER_ITERATION, format_prompt_as_jsonl, log_prompt};
pub use runner::{Invocation, RunOutput, Runner, RunnerError};
