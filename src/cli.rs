//! CLI argument definitions

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// autoad - iterate a coding-assistant CLI toward stated objectives
#[derive(Debug, Parser)]
#[command(
    name = "autoad",
    about = "Automates repeated coding-assistant invocations against a git repository",
    version
)]
pub struct Cli {
    /// Improvement prompt prepended to every objective
    #[arg(long = "improvement-prompt")]
    pub improvement_prompt: String,

    /// Objective as a NAME TEXT pair; repeatable
    #[arg(
        long = "objective",
        num_args = 2,
        value_names = ["NAME", "TEXT"],
        action = ArgAction::Append,
        required = true
    )]
    pub objective: Vec<String>,

    /// Number of iterations to run
    #[arg(short, long, default_value_t = 1)]
    pub iterations: u32,

    /// Show the planned commands without executing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Disable the session logging subsystem entirely
    #[arg(long)]
    pub no_logging: bool,

    /// Log directory override (beats AUTOAD_LOG_DIR and the default)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Turn budget per wrapped-tool invocation
    #[arg(long)]
    pub max_turns: Option<u32>,

    /// Comma-separated tool allowlist passed to the wrapped tool
    #[arg(long = "allowed-tools", value_delimiter = ',')]
    pub allowed_tools: Option<Vec<String>>,

    /// Continue the wrapped tool's previous conversation
    #[arg(long = "continue")]
    pub continue_conversation: bool,

    /// Fetch/push all branches and tags around the run
    #[arg(long)]
    pub sync_remote: bool,

    /// Prefix for per-iteration git tags
    #[arg(long)]
    pub tag_prefix: Option<String>,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

/// One named objective from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Objective {
    pub name: String,
    pub text: String,
}

impl Cli {
    /// The `--objective NAME TEXT` pairs as typed objectives.
    pub fn objectives(&self) -> Vec<Objective> {
        self.objective
            .chunks_exact(2)
            .map(|pair| Objective {
                name: pair[0].clone(),
                text: pair[1].clone(),
            })
            .collect()
    }
}
