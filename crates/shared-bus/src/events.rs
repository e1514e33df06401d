//! # Ledger Events
//!
//! Everything that flows through the shared bus.

use serde::{Deserialize, Serialize};
use shared_types::{Hash, IdentityId};

/// How loudly an alert should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    // =========================================================================
    // LEDGER CORE
    // =========================================================================
    /// A block became visible to readers.
    BlockCommitted {
        sequence: u64,
        block_hash: Hash,
        record_count: usize,
    },

    /// A block exhausted its signing retry budget and is parked.
    SigningUnavailable {
        sequence: u64,
        signer_id: IdentityId,
        attempts: u32,
        reason: String,
    },

    /// A parked block was signed on re-drive.
    PendingRecovered { sequence: u64 },

    /// The open buffer hit its hard limit.
    CapacityExhausted { buffered: usize, limit: usize },

    // =========================================================================
    // INTEGRITY VERIFIER
    // =========================================================================
    /// An audit found the first point where the chain diverges.
    ChainIntegrityViolation { sequence: u64, reason: String },

    /// An audit pass finished and moved the checkpoint.
    CheckpointAdvanced { sequence: u64, block_hash: Hash },

    // =========================================================================
    // LIFECYCLE
    // =========================================================================
    /// The ledger is shutting down; streams should end.
    LedgerClosed,
}

impl LedgerEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::BlockCommitted { .. } | Self::LedgerClosed => EventTopic::Commits,
            Self::SigningUnavailable { .. }
            | Self::PendingRecovered { .. }
            | Self::CapacityExhausted { .. } => EventTopic::Alerts,
            Self::ChainIntegrityViolation { .. } | Self::CheckpointAdvanced { .. } => {
                EventTopic::Audit
            }
        }
    }

    /// Operator alert severity, if this event is an alert.
    #[must_use]
    pub fn severity(&self) -> Option<AlertSeverity> {
        match self {
            Self::SigningUnavailable { .. } | Self::ChainIntegrityViolation { .. } => {
                Some(AlertSeverity::Critical)
            }
            Self::CapacityExhausted { .. } => Some(AlertSeverity::Warning),
            _ => None,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Committed blocks and lifecycle.
    Commits,
    /// Operator alerts from the write path.
    Alerts,
    /// Integrity verifier results.
    Audit,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Only events that carry an alert severity.
    pub alerts_only: bool,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            alerts_only: false,
        }
    }

    /// Create a filter for operator alerts on any topic.
    #[must_use]
    pub fn alerts() -> Self {
        Self {
            topics: Vec::new(),
            alerts_only: true,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &LedgerEvent) -> bool {
        let topic_match = self.topics.is_empty() || self.topics.contains(&event.topic());

        let alert_match = !self.alerts_only || event.severity().is_some();

        topic_match && alert_match
    }
}
