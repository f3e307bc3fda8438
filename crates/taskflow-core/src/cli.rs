use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskflow",
    version,
    about = "TaskFlow: categories, priorities and due dates over a pluggable store",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "taskflowrc", global = true)]
    pub taskflowrc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    /// Shorthand for `--rc backend=<name>`.
    #[arg(long = "backend", global = true)]
    pub backend: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the effective configuration.
    Config,

    #[command(flatten)]
    Board(BoardCommand),
}

impl Default for Command {
    fn default() -> Self {
        Self::Board(BoardCommand::default())
    }
}

/// Commands that run against a loaded task board.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum BoardCommand {
    /// Show the filtered, sorted task list.
    List {
        #[arg(long, default_value = "all")]
        category: String,

        #[arg(long, default_value = "")]
        search: String,
    },

    /// Create a task.
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long, default_value = "medium")]
        priority: String,

        /// `today`, `tomorrow`, `YYYY-MM-DD` or an RFC 3339 timestamp.
        #[arg(long)]
        due: Option<String>,
    },

    /// Mark a task completed.
    Done { id: String },

    /// Mark a completed task pending again.
    Reopen { id: String },

    Delete { id: String },

    /// List categories with their task counts.
    Categories,

    /// Print completion statistics.
    Stats,
}

impl Default for BoardCommand {
    fn default() -> Self {
        Self::List {
            category: "all".to_string(),
            search: String::new(),
        }
    }
}

impl GlobalCli {
    /// All `--rc` and `--backend` overrides, in the order they apply.
    pub fn overrides(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .rc_overrides
            .iter()
            .map(|kv| (kv.key.clone(), kv.value.clone()))
            .collect();
        if let Some(backend) = &self.backend {
            out.push(("backend".to_string(), backend.clone()));
        }
        out
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` and `rc.key:value` tokens out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> PreprocessedArgs {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest.split_once('=').or_else(|| rest.split_once(':'));
            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((format!("rc.{k}"), v.to_string()));
                continue;
            }
        }

        cleaned.push(arg);
    }

    PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    }
}
