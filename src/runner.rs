//! Wrapped-tool invocation
//!
//! Builds the argument vector for the external coding-assistant CLI and
//! runs it with both output streams pumped line-by-line through the
//! process-wide output handles, so an active session captures everything.
//! The tool's output is treated as an opaque line stream; a non-zero exit
//! is reported to the caller, never retried here.

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, warn};

use crate::logging::{output, registry};
use crate::prompt;

/// Errors from running the wrapped tool
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read output of `{command}`: {source}")]
    Output {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// One invocation of the wrapped tool
#[derive(Debug, Clone)]
pub struct Invocation {
    pub prompt: String,
    pub max_turns: u32,
    pub allowed_tools: Vec<String>,
    pub continue_conversation: bool,
}

impl Invocation {
    /// Argument vector passed to the wrapped program.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--verbose".to_string(),
            "--max-turns".to_string(),
            self.max_turns.to_string(),
        ];
        if !self.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(self.allowed_tools.join(","));
        }
        if self.continue_conversation {
            args.push("--continue".to_string());
        }
        args.push("-p".to_string());
        args.push(self.prompt.clone());
        args
    }

    /// Shell-quoted rendering of the full command, for dry-run display.
    pub fn display_command(&self, program: &str) -> String {
        self.render(program, true)
    }

    /// Same command without `-p '<prompt>'`, for running interactively.
    pub fn interactive_command(&self, program: &str) -> String {
        self.render(program, false)
    }

    fn render(&self, program: &str, with_prompt: bool) -> String {
        let mut parts = vec![program.to_string(), "--verbose".to_string()];
        parts.push("--max-turns".to_string());
        parts.push(self.max_turns.to_string());
        if !self.allowed_tools.is_empty() {
            parts.push("--allowedTools".to_string());
            parts.push(shell_quote(&self.allowed_tools.join(",")));
        }
        if self.continue_conversation {
            parts.push("--continue".to_string());
        }
        if with_prompt {
            parts.push("-p".to_string());
            parts.push(shell_quote(&self.prompt));
        }
        parts.join(" ")
    }
}

/// What one runner call produced
#[derive(Debug)]
pub struct RunOutput {
    /// Stdout lines of the wrapped tool (empty when skipped)
    pub lines: Vec<String>,
    /// Exit code, when the process ran and reported one
    pub exit_code: Option<i32>,
    /// True when dry-run skipped the invocation
    pub skipped: bool,
}

/// Runs the wrapped tool, or displays what would run in dry-run mode
#[derive(Debug, Clone)]
pub struct Runner {
    program: String,
    dry_run: bool,
}

impl Runner {
    pub fn new(program: impl Into<String>, dry_run: bool) -> Self {
        Self {
            program: program.into(),
            dry_run,
        }
    }

    /// Run one invocation.
    ///
    /// Logs the prompt as JSONL first (when a session is active), then in
    /// dry-run mode prints the planned command and returns without
    /// spawning anything. Otherwise the tool runs to completion with both
    /// streams mirrored through the output handles.
    pub fn run(&self, invocation: &Invocation) -> Result<RunOutput, RunnerError> {
        debug!(program = %self.program, dry_run = self.dry_run, "Runner::run");

        if registry::get().is_some() {
            prompt::log_prompt(
                &invocation.prompt,
                invocation.max_turns,
                &invocation.allowed_tools,
                invocation.continue_conversation,
            );
        }

        if self.dry_run {
            let out = output::stdout();
            out.write_line("Planned command:");
            out.write_line(&invocation.display_command(&self.program));
            out.write_line("To run interactively:");
            out.write_line(&invocation.interactive_command(&self.program));
            return Ok(RunOutput {
                lines: Vec::new(),
                exit_code: None,
                skipped: true,
            });
        }

        let mut child = Command::new(&self.program)
            .args(invocation.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                command: self.program.clone(),
                source,
            })?;

        let child_stdout = child.stdout.take().ok_or_else(|| RunnerError::Output {
            command: self.program.clone(),
            source: std::io::Error::other("stdout pipe missing"),
        })?;
        let child_stderr = child.stderr.take().ok_or_else(|| RunnerError::Output {
            command: self.program.clone(),
            source: std::io::Error::other("stderr pipe missing"),
        })?;

        let lines = std::thread::scope(|scope| {
            let stderr_pump = scope.spawn(move || {
                let err = output::stderr();
                for line in BufReader::new(child_stderr).lines().map_while(Result::ok) {
                    err.write_line(&line);
                }
            });

            let out = output::stdout();
            let mut collected = Vec::new();
            for line in BufReader::new(child_stdout).lines().map_while(Result::ok) {
                out.write_line(&line);
                collected.push(line);
            }

            let _ = stderr_pump.join();
            collected
        });

        let status = child.wait().map_err(|source| RunnerError::Output {
            command: self.program.clone(),
            source,
        })?;

        if !status.success() {
            warn!(program = %self.program, ?status, "wrapped tool exited non-zero");
        }

        Ok(RunOutput {
            lines,
            exit_code: status.code(),
            skipped: false,
        })
    }
}

/// Single-quote `s` for display, escaping embedded single quotes.
fn shell_quote(s: &str) -> String {
    if s.contains('\'') {
        format!("'{}'", s.replace('\'', r"'\''"))
    } else {
        format!("'{s}'")
    }
}
