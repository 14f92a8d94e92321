mod app;
mod config;
mod error;
mod handler;
mod record;
mod tree;

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::app::Session;
use crate::config::{AppConfig, GeneralConfig, SaveConfig};
use crate::handler::Command;

/// Organise saved records into nested, user-named folders.
#[derive(Parser, Debug)]
#[command(name = "ftree", version, about)]
struct Cli {
    /// Path to a config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the folder and record files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Record category to work on
    #[arg(short, long)]
    category: Option<String>,

    /// Only save when asked to (deletions always save)
    #[arg(long)]
    no_autosave: bool,

    /// Start in this folder (unique path, e.g. base#0/Saves#1)
    #[arg(long, global = true)]
    at: Option<String>,

    #[command(subcommand)]
    command: Option<Action>,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Interactive shell (default)
    Shell,
    /// List folders and records in a folder
    Ls,
    /// Print the whole tree
    Tree {
        /// Include records
        #[arg(short, long)]
        verbose: bool,
    },
    /// Create a folder
    Mkdir { name: String },
    /// Rename the folder at a list position
    Rename { index: usize, name: String },
    /// Delete the folder at a list position, moving its records to the root
    Rm { index: usize },
    /// File a record into the folder
    Add { record: String },
    /// File a record into the folder at a unique path
    Mv { record: String, path: String },
    /// List every record of the category
    Records,
}

impl Action {
    fn into_command(self) -> Option<Command> {
        let command = match self {
            Action::Shell => return None,
            Action::Ls => Command::List,
            Action::Tree { verbose } => Command::Tree { verbose },
            Action::Mkdir { name } => Command::Mkdir(name),
            Action::Rename { index, name } => Command::Rename { index, name },
            Action::Rm { index } => Command::Remove(index),
            Action::Add { record } => Command::Add(record),
            Action::Mv { record, path } => Command::Move { record, path },
            Action::Records => Command::Records,
        };
        Some(command)
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();

    let overrides = AppConfig {
        general: GeneralConfig {
            data_dir: cli
                .data_dir
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            category: cli.category.clone(),
        },
        save: SaveConfig {
            autosave: if cli.no_autosave { Some(false) } else { None },
        },
        ..Default::default()
    };
    let config = AppConfig::load(cli.config.as_deref(), Some(&overrides));

    init_logging(&config);

    let mut session = Session::open(&config.data_dir(), config.category())?;
    if let Some(at) = &cli.at {
        session.navigate_to(at)?;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command.and_then(Action::into_command) {
        Some(command) => {
            handler::execute(&mut session, command, config.autosave(), &mut out)?;
        }
        None => {
            let stdin = io::stdin();
            handler::run_shell(&mut session, stdin.lock(), &mut out, config.autosave())?;
        }
    }
    Ok(())
}
