//! autoad - CLI entry point and iteration loop

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, warn};

use autoad::cli::{Cli, Objective};
use autoad::config::Config;
use autoad::logging::{LoggingError, SessionLogger, output};
use autoad::git;
use autoad::runner::{Invocation, Runner};

/// Everything that can fail inside one iteration scope
#[derive(Debug, Error)]
enum IterationError {
    #[error(transparent)]
    Runner(#[from] autoad::runner::RunnerError),

    #[error(transparent)]
    Git(#[from] autoad::git::GitError),

    #[error(transparent)]
    Logging(#[from] LoggingError),
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Diagnostics go to a file so they never contaminate the captured
    // process output.
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("autoad");

    fs::create_dir_all(&log_dir).context("Failed to create diagnostics directory")?;

    let level_str = cli_log_level.or(config_log_level);
    let level = match level_str.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(log_dir.join("autoad.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(std::sync::Arc::new(log_file))
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Diagnostics logging initialized (level: {:?})", level);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load(cli.config.as_ref())
        .ok()
        .and_then(|c| c.logging.level);
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref())
        .context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    run(&cli, &config)
}

fn run(cli: &Cli, config: &Config) -> Result<()> {
    let out = output::stdout();

    let mut iterations = cli.iterations;
    if cli.dry_run {
        out.write_line(&format!("{}", "=== Dry-run mode ===".yellow().bold()));
        if iterations > 1 {
            out.write_line(&format!(
                "Warning: iterations={} was requested but dry-run mode overrides it to 1",
                iterations
            ));
            iterations = 1;
        }
    }

    let objectives = cli.objectives();
    let max_turns = cli.max_turns.unwrap_or(config.agent.max_turns);
    let allowed_tools = cli
        .allowed_tools
        .clone()
        .unwrap_or_else(|| config.agent.allowed_tools.clone());
    let tag_prefix = cli.tag_prefix.clone().unwrap_or_else(|| config.git.tag_prefix.clone());
    let sync_remote = cli.sync_remote || config.git.sync_remote;

    let runner = Runner::new(config.agent.command.clone(), cli.dry_run);

    // Dry-run never constructs the logging subsystem; --no-logging and the
    // config switch disable it explicitly.
    let logging_enabled = !cli.dry_run && !cli.no_logging && config.logging.enabled;

    // Tags need a session id even when logging is disabled.
    let fallback_session_id = autoad::logging::timestamp::session_id();

    let mut session = if logging_enabled {
        let override_dir = cli.log_dir.clone().or_else(|| config.logging.dir.clone());
        let session = SessionLogger::new(override_dir.as_deref())
            .context("Failed to initialize session logging")?;
        info!(session_id = %session.session_id(), "session logging enabled");
        Some(session)
    } else {
        debug!("session logging disabled");
        None
    };

    for iteration in 1..=iterations {
        out.write_line(&format!(
            "{}",
            format!("--- Iteration {iteration}/{iterations} ---").bold()
        ));

        match &mut session {
            Some(session) => {
                session.merge_metadata("iteration", serde_json::json!(iteration));
                if let Ok(branch) = git::current_branch() {
                    session.merge_metadata("branch_name", serde_json::json!(branch));
                }

                let session_id = session.session_id().to_string();
                session
                    .scope(|| {
                        run_single_iteration(
                            &runner,
                            &cli.improvement_prompt,
                            &objectives,
                            max_turns,
                            &allowed_tools,
                            cli.continue_conversation,
                            &tag_prefix,
                            &session_id,
                            iteration,
                            sync_remote,
                            cli.dry_run,
                        )
                    })
                    .context(format!("iteration {iteration} failed"))?;
            }
            None => {
                run_single_iteration(
                    &runner,
                    &cli.improvement_prompt,
                    &objectives,
                    max_turns,
                    &allowed_tools,
                    cli.continue_conversation,
                    &tag_prefix,
                    &fallback_session_id,
                    iteration,
                    sync_remote,
                    cli.dry_run,
                )
                .context(format!("iteration {iteration} failed"))?;
            }
        }
    }

    out.write_line("Done.");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_single_iteration(
    runner: &Runner,
    improvement_prompt: &str,
    objectives: &[Objective],
    max_turns: u32,
    allowed_tools: &[String],
    continue_conversation: bool,
    tag_prefix: &str,
    session_id: &str,
    iteration: u32,
    sync_remote: bool,
    dry_run: bool,
) -> Result<(), IterationError> {
    if sync_remote {
        git::fetch_all(dry_run)?;
    }

    for objective in objectives {
        let out = output::stdout();
        out.write_line(&format!("Objective: {}", objective.name));

        let invocation = Invocation {
            prompt: build_prompt(improvement_prompt, objective),
            max_turns,
            allowed_tools: allowed_tools.to_vec(),
            continue_conversation,
        };

        let result = runner.run(&invocation)?;
        if result.skipped {
            continue;
        }
        match result.exit_code {
            Some(0) => debug!(objective = %objective.name, "objective run completed"),
            code => warn!(objective = %objective.name, ?code, "wrapped tool exited non-zero"),
        }
    }

    if !dry_run {
        let tag = git::iteration_tag_name(tag_prefix, session_id, iteration);
        if let Err(e) = git::create_tag(&tag) {
            // A tagging failure should not abort the remaining iterations.
            warn!(%tag, error = %e, "failed to create iteration tag");
            output::stderr().write_line(&format!("Warning: failed to create tag {tag}: {e}"));
        }
    }

    if sync_remote {
        git::push_all(dry_run)?;
    }

    Ok(())
}

/// Assemble the prompt for one objective.
fn build_prompt(improvement_prompt: &str, objective: &Objective) -> String {
    format!(
        "{improvement_prompt}\n\nObjective ({name}):\n{text}",
        name = objective.name,
        text = objective.text
    )
}
