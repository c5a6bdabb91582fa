//! Scheduled-event projections on the target platforms.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Where a scheduled event takes place on its platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum EventVenue {
    /// External/location-based event (e.g. a livestream URL).
    External { location: String },
    /// Channel-based event inside the platform (e.g. a voice channel).
    Channel { channel_id: String },
}

/// Everything a target platform needs to create or update its
/// projection of a gathering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledEventDraft {
    pub name: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub ends_at: Option<OffsetDateTime>,
    #[serde(flatten)]
    pub venue: EventVenue,
    /// Cover image as a `data:` URI, when one could be generated.
    #[serde(default)]
    pub cover_image: Option<String>,
}

/// A platform's own record of a scheduled event, fetched by its
/// correlation id during reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteScheduledEvent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}
