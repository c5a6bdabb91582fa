//! Gathering change notifications from the content system.
//!
//! The content system is the source of truth for scheduled community
//! gatherings. Whenever one is created or edited there, its relay posts
//! the full record to `/webhooks/gatherings` as JSON.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A gathering record as delivered by the content-system relay.
///
/// `kind` and `status` arrive as free-form strings; the synchronizer
/// decides whether it can represent them externally. The two event-id
/// fields are correlation ids previously written back by the bot —
/// historical payloads carry them as missing, `null`, or empty strings
/// interchangeably, so consumers must treat all three as "not yet
/// created".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatheringEvent {
    /// Stable id assigned by the content system.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Gathering kind, e.g. "Stream" or "Voice Meetup".
    #[serde(rename = "type")]
    pub kind: String,
    /// Lifecycle status, e.g. "Scheduled" or "Canceled".
    pub status: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub starts_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub ends_at: Option<OffsetDateTime>,
    /// Correlation id on the community platform, if ever created there.
    #[serde(default)]
    pub community_event_id: Option<String>,
    /// Correlation id on the streaming platform, if ever created there.
    #[serde(default)]
    pub streaming_event_id: Option<String>,
    /// Optional public URL for the gathering.
    #[serde(default)]
    pub url: Option<String>,
}

/// Body posted back to the content system when a platform assigns a
/// correlation id to a newly created scheduled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationWriteBack {
    pub gathering_id: String,
    pub platform: String,
    pub event_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gathering_event_parses_minimal_payload() {
        let json = r#"{
            "id": "page-1",
            "name": "Friday Live Build",
            "type": "Stream",
            "status": "Scheduled",
            "starts_at": "2024-06-07T16:00:00Z",
            "ends_at": "2024-06-07T18:00:00Z"
        }"#;
        let event: GatheringEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, "Stream");
        assert!(event.community_event_id.is_none());
        assert!(event.description.is_none());
    }

    #[test]
    fn gathering_event_accepts_null_event_ids() {
        let json = r#"{
            "id": "page-2",
            "name": "Coffee Meetup",
            "type": "Voice Meetup",
            "status": "Scheduled",
            "community_event_id": null,
            "streaming_event_id": ""
        }"#;
        let event: GatheringEvent = serde_json::from_str(json).unwrap();
        assert!(event.community_event_id.is_none());
        assert_eq!(event.streaming_event_id.as_deref(), Some(""));
        assert!(event.starts_at.is_none());
    }
}
