//! Event type definitions for the event-driven architecture.
//!
//! Payloads are small and cloneable; consumers that need fresh state
//! re-fetch it from the owning platform rather than trusting a stale
//! payload.

use gatherbot_sdk::objects::realtime::{StreamSnapshot, UserProfile};

use crate::entities::gathering::TargetPlatform;

/// A streaming-platform user followed the channel.
#[derive(Debug, Clone)]
pub struct OnFollow {
    pub user: UserProfile,
}

/// A live session started or ended; carries the resolved snapshot when
/// one could be fetched.
#[derive(Debug, Clone)]
pub struct OnStream {
    pub stream: Option<StreamSnapshot>,
}

/// A member moved in or out of a voice channel.
///
/// `channel_id` is the channel the member is now in; `None` means they
/// left voice entirely. The attendance tracker compares it against its
/// tracked channel to classify the change as a join or a leave.
#[derive(Debug, Clone)]
pub struct PresenceUpdate {
    pub member_id: String,
    pub channel_id: Option<String>,
}

/// Lifecycle phase of a platform scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    Completed,
}

/// A scheduled event on the community platform changed phase.
#[derive(Debug, Clone)]
pub struct SessionStatusChanged {
    /// Voice channel the event is hosted in.
    pub channel_id: String,
    /// Display name of the event, used in engagement entries.
    pub name: String,
    pub phase: SessionPhase,
}

/// A target platform assigned a correlation id to a gathering.
#[derive(Debug, Clone)]
pub struct CorrelationUpdated {
    pub gathering_id: String,
    pub platform: TargetPlatform,
    pub event_id: String,
}
