//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use smartzipper_types::DeviceAddress;

/// Overrides applied on top of the configuration file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "SMARTZIPPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Sensor address, e.g. E3:D4:1E:79:7C:16
    #[arg(short, long, global = true, env = "SMARTZIPPER_DEVICE")]
    pub address: Option<DeviceAddress>,

    /// Seconds the zipper may stay open before alerting
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub threshold: Option<u64>,
}

/// Transport selection shared by commands that talk to the sensor.
#[derive(Debug, Clone, Copy, Default, Args)]
pub struct TransportArgs {
    /// Use a simulated sensor instead of Bluetooth
    #[arg(long)]
    pub mock: bool,
}

#[derive(Debug, Parser)]
#[command(name = "smartzipper")]
#[command(author, version, about = "Monitor a SmartZipper hall sensor over Bluetooth", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Connect and watch the sensor, alerting when it stays open too long
    Monitor {
        #[command(flatten)]
        transport: TransportArgs,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Connect, read the sensor once and disconnect
    Read {
        #[command(flatten)]
        transport: TransportArgs,

        /// Print the reading as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show what an alert looks like
    TestAlert {
        /// Print the alert event as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Configuration subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Show configuration file path
    Path,

    /// Show the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
