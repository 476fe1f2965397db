//! Plain-text rendering of events and engine status

use std::fmt::Write;

use tailscope_core::{Event, EventStatus};
use tailscope_engine::{EngineStatus, PanelStatus, Projection};

pub fn format_event(event: &Event) -> String {
    let time = event
        .timestamp_utc()
        .map(|t| t.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| event.timestamp.to_string());
    let status = match event.status {
        EventStatus::Success => "ok ",
        EventStatus::Error => "ERR",
        EventStatus::Unknown => " - ",
    };

    let mut line = format!(
        "{} {:<11} {} {}",
        time,
        event.category.display_name(),
        status,
        event.summary()
    );
    if let Some(id) = &event.correlation_id {
        let _ = write!(line, "  [{}]", id);
    }
    line
}

pub fn format_window(projection: &Projection, status: &EngineStatus) -> String {
    match &status.status {
        PanelStatus::Loading => return "(waiting for first batch)".to_string(),
        PanelStatus::Disabled { reason } => {
            return format!("polling disabled: {} (type `retry`)", reason);
        }
        PanelStatus::Empty => return "(no matching events)".to_string(),
        PanelStatus::Ready => {}
    }

    let mut out = String::new();
    for event in &projection.rows {
        out.push_str(&format_event(event));
        out.push('\n');
    }
    let first = projection.offset + 1;
    let last = projection.offset + projection.rows.len();
    let _ = write!(
        out,
        "-- rows {}-{} of {} matching ({} buffered)",
        first.min(last),
        last,
        projection.total_matching,
        status.buffered
    );
    out
}

pub fn format_status(status: &EngineStatus) -> String {
    let cursor = status
        .cursor
        .as_ref()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut out = format!(
        "{} | view {:?} | {}/{} buffered, {} matching | cursor {} | failures {}",
        if status.live { "live" } else { "paused" },
        status.panel.active_view,
        status.buffered,
        status.capacity,
        status.matching,
        cursor,
        status.circuit.consecutive_failures,
    );
    if !status.live && status.unseen > 0 {
        let _ = write!(out, " | {} new while paused", status.unseen);
    }
    if let Some(reason) = status.trip_reason {
        let _ = write!(out, " | disabled: {}", reason);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tailscope_core::{EventCategory, EventPayload, FunctionCall};

    #[test]
    fn test_format_event_line() {
        let event = Event::new(
            1_700_000_000_123,
            EventCategory::Mutation,
            EventPayload::Function(FunctionCall {
                path: "orders:place".into(),
                message: None,
                error: Some("out of stock".into()),
                execution_time_ms: None,
            }),
        )
        .with_status(EventStatus::Error)
        .with_correlation_id("req-7");

        let line = format_event(&event);
        assert!(line.starts_with("22:13:20.123 mutation"));
        assert!(line.contains("ERR"));
        assert!(line.contains("orders:place failed: out of stock"));
        assert!(line.ends_with("[req-7]"));
    }
}
