//! CLI interface for bybit-intraday
//!
//! Provides subcommands for:
//! - `run`: Start the trading loop
//! - `status`: Show current state
//! - `config`: Show effective configuration

mod run;

pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bybit-intraday")]
#[command(about = "Intraday perpetual-futures trading bot for Bybit")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the trading loop
    Run(RunArgs),
    /// Show current state
    Status,
    /// Show effective configuration
    Config,
}
