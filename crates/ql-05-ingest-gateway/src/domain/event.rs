use serde::{Deserialize, Serialize};
use shared_types::Timestamp;

/// An inbound event as producers send it.
///
/// `event_type` stays a string here so an unknown type is a validation
/// rejection rather than a decode failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestEvent {
    pub event_id: String,
    pub timestamp: Timestamp,
    pub actor_id: String,
    pub case_id: String,
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Result of a submission. `Duplicate` and `Rejected` are outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted(String),
    Duplicate,
    Rejected(super::validation::Rejection),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted(_))
    }
}
