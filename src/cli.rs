use std::path::PathBuf;

use clap::{Parser, Subcommand};

use fx_feed::config::RawSettings;

#[derive(Debug, Parser)]
#[command(name = "fx-feed")]
#[command(about = "Rate-limited EUR/USD feed with cached and synthetic fallback")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON settings file; a missing file is not an error
    #[arg(short, long, default_value = "fx-feed.json")]
    pub settings: PathBuf,

    /// development, production or test
    #[arg(short, long)]
    pub env: Option<String>,

    #[arg(long)]
    pub api_key: Option<String>,

    /// Currency pair, e.g. EUR/USD
    #[arg(short, long)]
    pub pair: Option<String>,

    /// Keep the cached rate in memory only
    #[arg(long)]
    pub no_persist: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Refresh the rate periodically until Ctrl-C
    Run {
        /// Stop after this many refresh cycles
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Print a single rate and exit
    Once,

    /// Print the resolved settings without secrets
    Config,
}

impl Cli {
    /// Command-line flags as the highest-precedence settings layer.
    pub fn overrides(&self) -> RawSettings {
        RawSettings {
            environment: self.env.clone(),
            api_key: self.api_key.clone(),
            pair: self.pair.clone(),
            ..RawSettings::default()
        }
    }
}
