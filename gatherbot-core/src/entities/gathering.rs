//! The canonical gathering record and its reconciliation view.
//!
//! A gathering is owned by the content system; the bot only reads it
//! from change notifications and writes back learned correlation ids.
//! Cancellation is a status, never a deletion.

use gatherbot_sdk::objects::gathering::GatheringEvent;
use time::OffsetDateTime;

/// Gathering kinds the bot can represent on the target platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringKind {
    /// A livestream; projected as an external/location-based event.
    Stream,
    /// A voice meetup; projected as a channel-based event.
    VoiceMeetup,
}

impl GatheringKind {
    /// Parse the content system's kind string. Anything else is not
    /// externally representable and the synchronizer skips it.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Stream" | "Livestream" => Some(Self::Stream),
            "Voice Meetup" | "Brew With Me" => Some(Self::VoiceMeetup),
            _ => None,
        }
    }
}

/// Gathering lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringStatus {
    Scheduled,
    Canceled,
}

impl GatheringStatus {
    /// Anything that is not explicitly canceled reconciles as scheduled.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("canceled") {
            Self::Canceled
        } else {
            Self::Scheduled
        }
    }
}

/// The two platforms a gathering is reconciled onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetPlatform {
    Community,
    Streaming,
}

impl TargetPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Community => "community",
            Self::Streaming => "streaming",
        }
    }
}

impl std::fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gathering as the synchronizer sees it: wire payload normalized
/// into typed fields.
#[derive(Debug, Clone)]
pub struct Gathering {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: Option<GatheringKind>,
    pub status: GatheringStatus,
    pub starts_at: Option<OffsetDateTime>,
    pub ends_at: Option<OffsetDateTime>,
    community_event_id: Option<String>,
    streaming_event_id: Option<String>,
}

impl Gathering {
    /// Normalize a wire payload. Empty correlation-id strings collapse
    /// to `None`; historical payloads are inconsistent about how they
    /// spell "not yet created".
    pub fn from_wire(event: &GatheringEvent) -> Self {
        Self {
            id: event.id.clone(),
            name: event.name.clone(),
            description: event.description.clone().unwrap_or_default(),
            kind: GatheringKind::parse(&event.kind),
            status: GatheringStatus::parse(&event.status),
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            community_event_id: normalize_id(event.community_event_id.as_deref()),
            streaming_event_id: normalize_id(event.streaming_event_id.as_deref()),
        }
    }

    /// The correlation id this gathering holds for `platform`, if it
    /// was ever created there.
    pub fn correlation_id(&self, platform: TargetPlatform) -> Option<&str> {
        match platform {
            TargetPlatform::Community => self.community_event_id.as_deref(),
            TargetPlatform::Streaming => self.streaming_event_id.as_deref(),
        }
    }

    /// Whether the required time bounds for this gathering's kind are
    /// present. A start is always required; external/location events
    /// also need an end.
    pub fn has_required_bounds(&self) -> bool {
        match self.kind {
            Some(GatheringKind::Stream) => self.starts_at.is_some() && self.ends_at.is_some(),
            Some(GatheringKind::VoiceMeetup) => self.starts_at.is_some(),
            None => false,
        }
    }
}

fn normalize_id(id: Option<&str>) -> Option<String> {
    match id {
        Some(value) if !value.is_empty() => Some(value.to_owned()),
        _ => None,
    }
}
