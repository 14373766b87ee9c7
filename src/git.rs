//! Git helpers for iteration tagging and remote sync
//!
//! Each completed iteration is tagged so the repository history can be
//! mapped back to iteration directories. `--sync-remote` wraps the run in
//! a fetch/push of all branches and tags.

use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

use crate::logging::output;

/// Errors from git operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run git {args}: {source}")]
    Io {
        args: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {args} failed: {stderr}")]
    CommandFailed { args: String, stderr: String },
}

/// Run git with `args`, returning trimmed stdout.
fn run_git(args: &[&str]) -> Result<String, GitError> {
    debug!(?args, "run_git");
    let output = Command::new("git").args(args).output().map_err(|source| GitError::Io {
        args: args.join(" "),
        source,
    })?;

    if !output.status.success() {
        return Err(GitError::CommandFailed {
            args: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Name of the currently checked-out branch.
pub fn current_branch() -> Result<String, GitError> {
    run_git(&["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Tag name for one iteration: `{prefix}-{session_id}-iter-{n}`.
pub fn iteration_tag_name(prefix: &str, session_id: &str, iteration: u32) -> String {
    format!("{prefix}-{session_id}-iter-{iteration}")
}

/// Create a lightweight tag at HEAD.
pub fn create_tag(name: &str) -> Result<(), GitError> {
    run_git(&["tag", name])?;
    info!(%name, "created iteration tag");
    Ok(())
}

/// Fetch all branches and tags from every remote.
///
/// Skipped with a notice in dry-run mode.
pub fn fetch_all(dry_run: bool) -> Result<(), GitError> {
    if dry_run {
        output::stdout().write_line("Dry-run mode: sync_remote (git fetch --all --tags) skipped");
        return Ok(());
    }
    run_git(&["fetch", "--all", "--tags"])?;
    Ok(())
}

/// Push all branches and tags, forced.
///
/// Skipped with a notice in dry-run mode.
pub fn push_all(dry_run: bool) -> Result<(), GitError> {
    if dry_run {
        output::stdout().write_line("Dry-run mode: sync_remote (git push --all --tags --force) skipped");
        return Ok(());
    }
    run_git(&["push", "--all", "--tags", "--force"])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_iteration_tag_name_shape() {
        let name = iteration_tag_name("autoad", "2026-08-07-10-00-00", 3);
        assert_eq!(name, "autoad-2026-08-07-10-00-00-iter-3");
    }

    #[test]
    #[serial]
    fn test_dry_run_sync_skips_git_entirely() {
        // These must not fail even outside a git repository.
        fetch_all(true).unwrap();
        push_all(true).unwrap();
    }

    #[test]
    fn test_command_failure_is_typed() {
        let err = run_git(&["not-a-git-subcommand-xyz"]).unwrap_err();
        assert!(matches!(err, GitError::CommandFailed { .. }));
    }
}
