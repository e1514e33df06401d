//! # Event Validation
//!
//! Turns an inbound event into a canonical `Record` or says why it cannot be one.
//! Rejected events are final; producers must fix and resend them.

use super::event::IngestEvent;
use crate::config::IngestConfig;
use shared_types::{EventType, Record, Timestamp};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("malformed event: {0}")]
    Malformed(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("{field} longer than {max} characters")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("event id must be printable with no whitespace")]
    InvalidEventId,

    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("timestamp must be non-zero")]
    ZeroTimestamp,

    #[error("timestamp {timestamp} is more than {max_skew_ms}ms ahead of {now}")]
    TimestampInFuture {
        timestamp: Timestamp,
        now: Timestamp,
        max_skew_ms: u64,
    },

    #[error("payload is {size} bytes, limit {max}")]
    PayloadTooLarge { size: usize, max: usize },
}

fn check_id(field: &'static str, value: &str, max: usize) -> Result<(), Rejection> {
    if value.is_empty() {
        return Err(Rejection::MissingField(field));
    }
    if value.chars().count() > max {
        return Err(Rejection::FieldTooLong { field, max });
    }
    Ok(())
}

/// Validate and canonicalise. The payload is re-encoded as compact JSON with
/// sorted keys so equal payloads hash equally.
pub fn validate(
    event: IngestEvent,
    config: &IngestConfig,
    now: Timestamp,
) -> Result<Record, Rejection> {
    check_id("event_id", &event.event_id, config.max_id_len)?;
    if event
        .event_id
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(Rejection::InvalidEventId);
    }
    check_id("actor_id", &event.actor_id, config.max_id_len)?;
    check_id("case_id", &event.case_id, config.max_id_len)?;

    let event_type: EventType = event
        .event_type
        .parse()
        .map_err(|_| Rejection::UnknownEventType(event.event_type.clone()))?;

    if event.timestamp == 0 {
        return Err(Rejection::ZeroTimestamp);
    }
    if event.timestamp > now.saturating_add(config.max_clock_skew_ms) {
        return Err(Rejection::TimestampInFuture {
            timestamp: event.timestamp,
            now,
            max_skew_ms: config.max_clock_skew_ms,
        });
    }

    let payload = if event.payload.is_null() {
        Vec::new()
    } else {
        serde_json::to_vec(&event.payload).map_err(|e| Rejection::Malformed(e.to_string()))?
    };
    if payload.len() > config.max_payload_bytes {
        return Err(Rejection::PayloadTooLarge {
            size: payload.len(),
            max: config.max_payload_bytes,
        });
    }

    Ok(Record::new(
        event.event_id,
        event.timestamp,
        event.actor_id,
        event.case_id,
        event_type,
        payload,
    ))
}

/// Decode an inbound JSON event.
pub fn decode(bytes: &[u8]) -> Result<IngestEvent, Rejection> {
    serde_json::from_slice(bytes).map_err(|e| Rejection::Malformed(e.to_string()))
}
