//! Text and JSON rendering of service events.

use anyhow::Result;
use smartzipper_core::ServiceEvent;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::style;

/// Render one event as a JSON line.
pub fn format_event_json(event: &ServiceEvent) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}

fn clock(timestamp: OffsetDateTime) -> String {
    let fmt = format_description!("[hour]:[minute]:[second]");
    timestamp
        .format(&fmt)
        .unwrap_or_else(|_| timestamp.unix_timestamp().to_string())
}

/// Alert banner for an alert event, with the bell in front.
pub fn format_alert(event: &ServiceEvent, no_color: bool) -> Option<String> {
    let detail = match event {
        ServiceEvent::AlertRaised { open_for_secs } => format!(
            "Zipper has been open for {}",
            style::format_duration_secs(*open_for_secs)
        ),
        ServiceEvent::TestAlert => "This is a test alert".to_string(),
        _ => return None,
    };
    Some(format!(
        "{}{}",
        style::BELL,
        style::format_alert_banner(&detail, no_color)
    ))
}

/// Render one event for humans. Returns `None` for events that print nothing.
pub fn format_event_text(event: &ServiceEvent, no_color: bool) -> Option<String> {
    match event {
        ServiceEvent::StateChanged { state } => Some(style::format_info(
            &format!("Link: {}", style::format_state(*state, no_color)),
            no_color,
        )),
        ServiceEvent::Reading {
            value,
            display,
            timestamp,
            ..
        } => Some(format!(
            "{}  {}",
            clock(*timestamp),
            style::format_display(display, *value, no_color)
        )),
        ServiceEvent::AlertRaised { .. } | ServiceEvent::TestAlert => {
            format_alert(event, no_color)
        }
        ServiceEvent::AlertCleared => Some(style::format_success("Alert cleared", no_color)),
        ServiceEvent::LinkFailed { message, .. } => {
            Some(style::format_warning(&format!("Link failed: {message}"), no_color))
        }
        _ => None,
    }
}

/// Troubleshooting box for a failed link.
pub fn format_link_failure(kind: &str, message: &str) -> String {
    let suggestions: &[&str] = match kind {
        "radio_disabled" => &["Turn Bluetooth on and retry"],
        "transport_unavailable" => &["Check that a Bluetooth adapter is attached"],
        "service_not_found" => &[
            "Check that --address points at a SmartZipper",
            "Check the service and characteristic UUIDs in the configuration",
        ],
        _ => &[
            "Make sure the sensor is powered and in range",
            "Run with --verbose for details",
        ],
    };
    style::format_error_box("Connection failed", message, suggestions)
}
