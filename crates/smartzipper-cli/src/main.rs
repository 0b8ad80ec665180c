//! Command-line monitor for the SmartZipper hall sensor.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `monitor` | Watch the sensor and alert when it stays open too long |
//! | `read` | Read the sensor once |
//! | `test-alert` | Show what an alert looks like |
//! | `config` | Manage the configuration file |
//! | `completions` | Generate shell completions |
//!
//! # Environment Variables
//!
//! - `SMARTZIPPER_DEVICE`: Sensor address (overridden by `--address`)
//! - `SMARTZIPPER_CONFIG`: Configuration file (overridden by `--config`)
//! - `NO_COLOR`: Disable colored output when set
//! - `RUST_LOG`: Log filter when neither `--verbose` nor `--quiet` is given

mod cli;
mod commands;
mod config;
mod format;
mod style;
mod util;

use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::{MonitorArgs, cmd_config, cmd_monitor, cmd_read, cmd_test_alert};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "smartzipper", &mut io::stdout());
        return Ok(());
    }

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let no_color = cli.no_color;
    match cli.command {
        Commands::Monitor { transport, json } => {
            let config = config::resolve(&cli.overrides)?;
            cmd_monitor(MonitorArgs {
                config,
                mock: transport.mock,
                json,
                no_color,
                quiet: cli.quiet,
            })
            .await
        }
        Commands::Read { transport, json } => {
            let config = config::resolve(&cli.overrides)?;
            cmd_read(config, transport.mock, json, no_color).await
        }
        Commands::TestAlert { json } => {
            let config = config::resolve(&cli.overrides)?;
            cmd_test_alert(config, json, no_color).await
        }
        Commands::Config { action } => cmd_config(action, &cli.overrides, no_color),
        Commands::Completions { .. } => Ok(()),
    }
}
