//! Config command implementation.

use anyhow::{Context, Result, bail};
use smartzipper_core::Config;

use crate::cli::{ConfigAction, ConfigOverrides};
use crate::config::{config_path, resolve};
use crate::style;
use crate::util::print_line;

pub fn cmd_config(action: ConfigAction, overrides: &ConfigOverrides, no_color: bool) -> Result<()> {
    let path = config_path(overrides);
    match action {
        ConfigAction::Path => print_line(&path.display().to_string()),
        ConfigAction::Show => {
            let config = resolve(overrides)?;
            let text = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            print_line(text.trim_end())
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "{} already exists. Use --force to overwrite.",
                    path.display()
                );
            }
            Config::default()
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{}",
                style::format_success(&format!("Wrote {}", path.display()), no_color)
            );
            Ok(())
        }
    }
}
