use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
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
    name = "taskdeck",
    version,
    about = "Taskdeck: command-line client for the Taskdeck task service",
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

    #[arg(long = "taskdeckrc", global = true)]
    pub taskdeckrc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sign in and remember the session.
    Login {
        email: String,
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account and sign in.
    Signup {
        name: String,
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    Logout,
    /// Show the signed-in user, confirming the session with the server.
    Whoami,
    /// Change the name or email shown for the signed-in user.
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// List tasks (the default command).
    List(ListArgs),
    /// Show one task in full.
    Info { task: String },
    Add(AddArgs),
    /// Create a task from a built-in template; lists templates without an id.
    Template {
        id: Option<String>,
        #[arg(long)]
        variation: Option<String>,
    },
    Edit(EditArgs),
    /// Mark tasks completed.
    Done {
        #[arg(required = true)]
        tasks: Vec<String>,
    },
    /// Mark a task pending again.
    Undone { task: String },
    #[command(alias = "delete")]
    Rm { task: String },
    /// Move a pending task to another row; completed rows stay put.
    Move { task: String, to: usize },
    Stats,
    /// Tasks due within the next hours, from the server.
    Due {
        #[arg(long, default_value_t = 24)]
        hours: u32,
    },
    Export(ExportArgs),
    Bulk(BulkArgs),
    #[command(subcommand)]
    Todo(TodoCommand),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub priority: Option<String>,
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long)]
    pub sort: Option<String>,
    #[arg(long)]
    pub order: Option<String>,
    /// Keep the collection's own order instead of sorting.
    #[arg(long, conflicts_with_all = ["sort", "order"])]
    pub manual: bool,
    #[arg(long)]
    pub page: Option<u32>,
    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    pub title: String,
    #[arg(short, long, default_value = "")]
    pub description: String,
    #[arg(short, long, default_value = "medium")]
    pub priority: String,
    /// today, tomorrow, nextweek, +3d, +2w or YYYY-MM-DD.
    #[arg(long)]
    pub due: Option<String>,
    /// HH:MM
    #[arg(long)]
    pub time: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub task: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(short, long)]
    pub description: Option<String>,
    #[arg(short, long)]
    pub priority: Option<String>,
    #[arg(long, conflicts_with = "no_due")]
    pub due: Option<String>,
    #[arg(long)]
    pub no_due: bool,
    #[arg(long)]
    pub time: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Json,
    Csv,
    #[value(alias = "md")]
    Markdown,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: FormatArg,
    /// Write here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub priority: Option<String>,
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Complete,
    Delete,
    Export,
}

#[derive(Args, Debug, Clone)]
pub struct BulkArgs {
    #[arg(value_enum)]
    pub action: BulkAction,
    #[arg(required_unless_present = "all")]
    pub tasks: Vec<String>,
    /// Select every pending task.
    #[arg(long)]
    pub all: bool,
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: FormatArg,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TodoCommand {
    List,
    Add {
        #[arg(default_value = "")]
        text: String,
    },
    Edit { row: usize, text: String },
    Toggle { row: usize },
    Rm { row: usize },
    Move { from: usize, to: usize },
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

/// Pulls positional `rc.key=value` (or `rc.key:value`) overrides out of
/// the argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
