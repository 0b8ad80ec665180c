//! Command implementations for the CLI.

mod config;
mod monitor;
mod read;
mod test_alert;

pub use config::cmd_config;
pub use monitor::{MonitorArgs, cmd_monitor};
pub use read::cmd_read;
pub use test_alert::cmd_test_alert;
