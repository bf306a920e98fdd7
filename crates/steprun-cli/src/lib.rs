//! steprun CLI library

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// steprun - compile Tasks into Kubernetes Pods
#[derive(Parser, Debug)]
#[command(name = "steprun")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a TaskRun into a Pod and print it as YAML
    Compile(commands::compile::CompileArgs),
    /// Classify container names as steps or sidecars
    Names(commands::names::NamesArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Compile(args) => commands::compile::run(args).await,
            Commands::Names(args) => commands::names::run(args),
        }
    }
}
