//! Monitor command implementation.
//!
//! Keeps one service running for the lifetime of the command, prints every
//! event it publishes and accepts simple commands on stdin. Ctrl+C or `quit`
//! closes the link before exiting.

use anyhow::Result;
use owo_colors::OwoColorize;
use smartzipper_core::{Config, ServiceEvent, ServiceHandle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::format::{format_event_json, format_event_text, format_link_failure};
use crate::style;
use crate::util::{Session, print_line, start_service};

const HELP: &str = "Commands: connect, disconnect, read, clear, test, status, set <raw>, help, quit";

/// Arguments for the monitor command.
pub struct MonitorArgs {
    pub config: Config,
    pub mock: bool,
    pub json: bool,
    pub no_color: bool,
    pub quiet: bool,
}

/// A line typed at the monitor prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Connect,
    Disconnect,
    Read,
    Clear,
    Test,
    Status,
    Set(String),
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
fn parse_input(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(w, r)| (w, r.trim()));

    let input = match word.to_lowercase().as_str() {
        "" => return Ok(None),
        "connect" | "c" => Input::Connect,
        "disconnect" | "d" => Input::Disconnect,
        "read" | "r" => Input::Read,
        "clear" => Input::Clear,
        "test" | "t" => Input::Test,
        "status" | "s" => Input::Status,
        "set" if !rest.is_empty() => Input::Set(rest.to_string()),
        "set" => return Err("Usage: set <raw value>, e.g. set 0".to_string()),
        "help" | "h" | "?" => Input::Help,
        "quit" | "q" | "exit" => Input::Quit,
        other => return Err(format!("Unknown command '{other}'. {HELP}")),
    };
    Ok(Some(input))
}

pub async fn cmd_monitor(args: MonitorArgs) -> Result<()> {
    let MonitorArgs {
        config,
        mock,
        json,
        no_color,
        quiet,
    } = args;

    let address = config.link.address;
    let threshold = config.monitor.alert_threshold_secs;
    let session = start_service(config, mock).await?;
    let handle = session.handle.clone();
    let mut events = handle.subscribe();

    if !quiet {
        let target = if mock {
            "simulated sensor".to_string()
        } else {
            address.to_string()
        };
        let header = if no_color {
            format!("Monitoring: {target}")
        } else {
            format!("Monitoring: {}", target.cyan())
        };
        eprintln!("{}", header);
        eprintln!(
            "Alert after {} open | Type 'help' for commands | Press Ctrl+C to stop",
            style::format_duration_secs(threshold)
        );
        eprintln!("{}", "-".repeat(50));
    }

    handle.connect().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    // Clears arrive on every close; only report one that withdraws an alert.
    let mut alert_shown = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nShutting down...");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event, json, no_color, &mut alert_shown)?,
                Err(RecvError::Lagged(missed)) => warn!(missed, "Output fell behind, events dropped"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => match parse_input(&line) {
                    Ok(Some(Input::Quit)) => break,
                    Ok(Some(input)) => run_input(input, &session, json, no_color).await?,
                    Ok(None) => {}
                    Err(message) => eprintln!("{}", style::format_warning(&message, no_color)),
                },
                // Keep monitoring when stdin is closed or redirected from /dev/null.
                None => stdin_open = false,
            },
        }
    }

    handle.close().await;
    Ok(())
}

fn print_event(
    event: &ServiceEvent,
    json: bool,
    no_color: bool,
    alert_shown: &mut bool,
) -> Result<()> {
    if json {
        return print_line(&format_event_json(event)?);
    }
    match event {
        ServiceEvent::AlertRaised { .. } => *alert_shown = true,
        ServiceEvent::AlertCleared if !std::mem::take(alert_shown) => return Ok(()),
        _ => {}
    }
    match event {
        ServiceEvent::LinkFailed { kind, message } => {
            eprintln!("{}", format_link_failure(kind, message));
            Ok(())
        }
        other => match format_event_text(other, no_color) {
            Some(text) => print_line(&text),
            None => Ok(()),
        },
    }
}

async fn run_input(input: Input, session: &Session, json: bool, no_color: bool) -> Result<()> {
    let handle: &ServiceHandle = &session.handle;
    match input {
        Input::Connect => handle.connect().await?,
        Input::Disconnect => handle.disconnect().await?,
        Input::Read => handle.read_value_once().await?,
        Input::Clear => handle.clear_error().await?,
        Input::Test => handle.trigger_test_alert().await?,
        Input::Status => {
            let snapshot = handle.snapshot();
            if json {
                print_line(&serde_json::to_string(&snapshot)?)?;
            } else {
                let mut line = format!(
                    "Status: {} | Value: {}",
                    style::format_state(handle.current_state(), no_color),
                    snapshot.display_value
                );
                if let Some(error) = &snapshot.error_message {
                    line.push_str(&format!(" | Error: {error}"));
                }
                print_line(&line)?;
            }
        }
        Input::Set(raw) => match &session.mock {
            Some(mock) => {
                if !mock.set_value(raw.as_bytes()).await {
                    eprintln!(
                        "{}",
                        style::format_warning("Sensor not notifying; value stored", no_color)
                    );
                }
            }
            None => eprintln!(
                "{}",
                style::format_warning("'set' is only available with --mock", no_color)
            ),
        },
        Input::Help => eprintln!("{HELP}"),
        Input::Quit => {}
    }
    Ok(())
}
