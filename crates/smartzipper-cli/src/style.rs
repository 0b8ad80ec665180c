//! Visual styling utilities for the CLI.
//!
//! Every helper takes `no_color` and falls back to bracketed plain text, so
//! output stays readable when piped or when `NO_COLOR` is set.

use owo_colors::OwoColorize;
use smartzipper_types::{ConnectionState, SensorValue};

/// Terminal bell, rung with every alert.
pub const BELL: &str = "\x07";

/// Format a success message.
pub fn format_success(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[OK] {}", message)
    } else {
        format!("{} {}", "[OK]".green(), message)
    }
}

/// Format an info message.
pub fn format_info(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[--] {}", message)
    } else {
        format!("{} {}", "[--]".cyan(), message)
    }
}

/// Format a warning message.
pub fn format_warning(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[!!] {}", message)
    } else {
        format!("{} {}", "[!!]".yellow(), message)
    }
}

/// Format an error message in a styled box.
pub fn format_error_box(title: &str, message: &str, suggestions: &[&str]) -> String {
    let width = 60usize;
    let fill = width.saturating_sub(title.len() + 4).max(1);
    let border_top = format!("┌─ {} {}", title, "─".repeat(fill));
    let border_bottom = format!("└{}┘", "─".repeat(width - 2));

    let mut lines = vec![border_top, "│".to_string()];
    for line in message.lines() {
        lines.push(format!("│  {}", line));
    }

    if !suggestions.is_empty() {
        lines.push("│".to_string());
        lines.push("│  Troubleshooting:".to_string());
        for (i, suggestion) in suggestions.iter().enumerate() {
            lines.push(format!("│    {}. {}", i + 1, suggestion));
        }
    }

    lines.push("│".to_string());
    lines.push(border_bottom);
    lines.join("\n")
}

/// Format a connection state as a short badge.
pub fn format_state(state: ConnectionState, no_color: bool) -> String {
    let label = state.to_string();
    if no_color {
        return label;
    }
    match state {
        ConnectionState::Ready => label.green().to_string(),
        ConnectionState::Error => label.red().bold().to_string(),
        ConnectionState::Disconnected => label.dimmed().to_string(),
        _ => label.yellow().to_string(),
    }
}

/// Format the display value for a reading, colored by what it means.
pub fn format_display(display: &str, value: SensorValue, no_color: bool) -> String {
    if no_color {
        return display.to_string();
    }
    match value {
        SensorValue::Open => display.yellow().bold().to_string(),
        SensorValue::Closed => display.green().to_string(),
        SensorValue::Other => display.dimmed().to_string(),
    }
}

/// Format the alert banner.
///
/// `detail` is the second line, e.g. how long the zipper has been open.
pub fn format_alert_banner(detail: &str, no_color: bool) -> String {
    let title = "ZIPPER ALERT";
    let body = format!("  {title}  \n  {detail}  ");
    let width = body.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    let rule = "=".repeat(width);
    let lines: Vec<String> = body
        .lines()
        .map(|line| format!("{line:<width$}"))
        .collect();

    if no_color {
        format!("{rule}\n{}\n{rule}", lines.join("\n"))
    } else {
        let painted: Vec<String> = lines
            .iter()
            .map(|l| l.on_red().white().bold().to_string())
            .collect();
        format!("{}\n{}\n{}", rule.red(), painted.join("\n"), rule.red())
    }
}

/// Human-friendly duration such as `6m 5s`.
pub fn format_duration_secs(secs: u64) -> String {
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{s}s"),
        (0, m, 0) => format!("{m}m"),
        (0, m, s) => format!("{m}m {s}s"),
        (h, m, _) => format!("{h}h {m}m"),
    }
}
