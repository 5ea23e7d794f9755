//! Shared types for the Team Assistant trace-events API
//!
//! These types mirror the service wire format:
//! - `TraceEvent` rows returned by `GET /api/trace-events`
//! - the query parameters that endpoint accepts
//! - the status body returned by the control endpoints
//!
//! Serializable with serde for JSON over HTTP

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Trace Events
// ============================================================================

/// One observed action inside the monitored system.
///
/// The service returns these newest-first within a page. `id` is the only
/// identity; consumers never interpret `data` beyond a string preview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceEvent {
    /// Globally unique event ID (UUID on the service side); dedup and render key
    pub id: String,

    /// Category label (e.g., "message_received", "sim_started")
    pub event_type: String,

    /// Which component produced this event
    pub actor: String,

    /// Event-specific payload, opaque to consumers
    pub data: serde_json::Map<String, serde_json::Value>,

    /// When the event occurred (ISO-8601 on the wire)
    pub timestamp: DateTime<Utc>,
}

impl TraceEvent {
    /// Build an event with a fresh UUID and the current time.
    pub fn new(
        event_type: impl Into<String>,
        actor: impl Into<String>,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            actor: actor.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Filters accepted by `GET /api/trace-events`.
///
/// Unset fields are omitted from the query string. The service applies
/// `timestamp > after` (strict) and exact equality for the other filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TraceEventQuery {
    /// Only events strictly newer than this timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<DateTime<Utc>>,

    /// Page size cap (service falls back to DEFAULT_SERVER_LIMIT)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    /// Exact event-type filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    /// Exact actor filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

// ============================================================================
// Control Plane
// ============================================================================

/// Body returned by the control endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

// ============================================================================
// Constants
// ============================================================================

/// Event types emitted by the assistant pipeline
pub const EVENT_MESSAGE_RECEIVED: &str = "message_received";
pub const EVENT_MESSAGE_RESPONDED: &str = "message_responded";
pub const EVENT_OUTPUT_DELIVERED: &str = "output_delivered";
pub const EVENT_BUFFER_PUBLISHED: &str = "buffer_published";
pub const EVENT_BUS_MESSAGE_PUBLISHED: &str = "bus_message_published";

/// Event types emitted by the simulator
pub const EVENT_SIM_STARTED: &str = "sim_started";
pub const EVENT_SIM_COMPLETED: &str = "sim_completed";

/// Page size the console requests per poll
pub const DEFAULT_POLL_LIMIT: u32 = 50;

/// Page size the service applies when no limit is given
pub const DEFAULT_SERVER_LIMIT: u32 = 100;

// ============================================================================
// Tests
// ============================================================================
