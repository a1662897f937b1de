use clap::{ArgAction, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "classpath-loader")]
#[command(about = "Resolve resources from an ordered classpath of JAR archives and directories")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Classpath roots, separated like PATH entries
    #[arg(long = "cp", value_name = "PATHS")]
    pub classpath: Option<OsString>,

    /// Directory whose archives are appended to the classpath
    #[arg(long, value_name = "DIR")]
    pub lib: Vec<PathBuf>,

    /// Roots will not change while running; keep their archives open
    #[arg(long)]
    pub lock: bool,

    /// Read small archives fully into memory
    #[arg(long)]
    pub preload: bool,

    #[arg(long, value_name = "BYTES")]
    pub preload_max_bytes: Option<u64>,

    #[arg(long, value_name = "N")]
    pub max_open_handles: Option<usize>,

    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Resolve {
        name: String,

        /// Report every root holding the name, not only the winning one
        #[arg(long)]
        all: bool,

        /// Write the winning resource's bytes to this file
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    Index,
    Roots,
    /// Resolve names read from stdin, then print handle metrics
    Metrics,
}
