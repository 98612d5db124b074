use crate::commands::{ClearTarget, Command};
use crate::config::CodecKind;
use crate::tracing::LogLevel;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "memojar")]
#[command(about = "Inspect and clear memoized computation results")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        env = "MEMOJAR_CACHE_DIR",
        help = "Cache root directory"
    )]
    pub cache_root: Option<PathBuf>,

    #[arg(long, global = true, help = "Read defaults from a TOML file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Slot encoding", value_enum)]
    pub codec: Option<CodecKind>,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(long, global = true, help = "Output logs in JSON format")]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "List every slot under the cache root")]
    List,
    #[command(about = "Show the fingerprints and result stored for a computation")]
    Inspect {
        #[arg(help = "Computation name")]
        name: String,
        #[arg(long, help = "Explicit slot path instead of the derived one")]
        output: Option<PathBuf>,
        #[arg(long, help = "Print the whole result instead of a preview")]
        full: bool,
    },
    #[command(about = "Print the slot path derived for a computation")]
    Path {
        #[arg(help = "Computation name")]
        name: String,
    },
    #[command(about = "Delete slots")]
    Clear {
        #[arg(help = "Computation name", required_unless_present = "all")]
        name: Option<String>,
        #[arg(long, help = "Explicit slot path instead of the derived one")]
        output: Option<PathBuf>,
        #[arg(long, help = "Delete every slot under the cache root", conflicts_with = "name")]
        all: bool,
    },
}

impl From<Commands> for Command {
    fn from(cmd: Commands) -> Self {
        match cmd {
            Commands::List => Self::List,
            Commands::Inspect { name, output, full } => Self::Inspect { name, output, full },
            Commands::Path { name } => Self::Path { name },
            Commands::Clear { all: true, .. } => Self::Clear(ClearTarget::All),
            Commands::Clear { name, output, .. } => Self::Clear(ClearTarget::Slot {
                name: name.unwrap_or_default(),
                output,
            }),
        }
    }
}
