//! Event system for the event-driven architecture.
//!
//! Every component communicates through the in-process [`EventBus`]
//! instead of calling its peers directly.
//!
//! # Event Flow
//!
//! 1. The webhook gateway publishes `GatheringChanged` ->
//!    `GatheringSynchronizer`
//! 2. The realtime client (or the relay webhook) publishes `OnFollow` /
//!    `OnStreamStart` / `OnStreamEnd` -> announcement consumers
//! 3. The community-platform gateway publishes `SessionStatusChanged`
//!    and `PresenceUpdate` -> `AttendanceTracker`
//! 4. `GatheringSynchronizer` publishes `CorrelationUpdated` once a
//!    platform assigns an id
//!
//! Events are ephemeral: a publish with no live subscriber is dropped,
//! and redelivery comes from the external sources (at-least-once), not
//! from the bus.

pub mod bus;
pub mod types;

pub use bus::{EventBus, DEFAULT_CHANNEL_CAPACITY};
pub use types::{
    CorrelationUpdated, OnFollow, OnStream, PresenceUpdate, SessionPhase, SessionStatusChanged,
};
