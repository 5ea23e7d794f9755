//! Timeline rendering
//!
//! Pure formatting over a slice of events; holds no state and enforces no
//! ordering. Callers pass events in the order they want them shown
//! (newest-first by convention).

use std::fmt::Write;

use chrono::Local;
use trace_types::TraceEvent;

/// Shown when there are no events to render
pub const EMPTY_PLACEHOLDER: &str = "No events yet...";

/// Longest `data` preview, counted in characters
const PREVIEW_CHARS: usize = 100;

/// One timeline line: local time-of-day, actor, event type, payload preview.
///
/// The preview is the serialized `data` JSON hard-cut at [`PREVIEW_CHARS`]
/// characters, not word-aware.
pub fn format_event(event: &TraceEvent) -> String {
    let time = event.timestamp.with_timezone(&Local).format("%H:%M:%S");
    let preview: String = serde_json::Value::Object(event.data.clone())
        .to_string()
        .chars()
        .take(PREVIEW_CHARS)
        .collect();

    format!("[{time}] {}: {} — {preview}", event.actor, event.event_type)
}

/// Render the whole timeline, one line per event in the given order.
pub fn render_timeline(events: &[TraceEvent]) -> String {
    if events.is_empty() {
        return EMPTY_PLACEHOLDER.to_string();
    }

    let mut out = String::new();
    for event in events {
        let _ = writeln!(&mut out, "{}", format_event(event));
    }
    out
}
