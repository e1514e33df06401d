//! # Shared Bus - Event Bus for Ledger Notifications
//!
//! Carries commit notifications to read-side consumers and operator alerts
//! (capacity exhaustion, signing unavailability, integrity divergence) to
//! whatever is watching the node.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Ledger Core  │                    │ Query/Export │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! Delivery is best-effort: a lagging subscriber skips events rather than
//! slowing the writer down. Anything that needs completeness (record export)
//! reads the block store and only uses the bus as a wake-up signal.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{AlertSeverity, EventFilter, EventTopic, LedgerEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
