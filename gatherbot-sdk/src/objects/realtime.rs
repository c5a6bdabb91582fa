//! Streaming-platform realtime protocol wire types.
//!
//! The platform pushes notifications over a persistent websocket. Every
//! frame is an envelope of `metadata` (message kind and routing) and
//! `payload` (session handshake data or a subscription event). The same
//! notification shape also arrives over the relay-proxied webhook, so
//! these types are shared by both ingress paths.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, OffsetDateTime};

/// Top-level websocket frame.
#[derive(Debug, Clone, Deserialize)]
pub struct WsMessage {
    pub metadata: WsMetadata,
    #[serde(default)]
    pub payload: WsPayload,
}

/// Frame routing metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct WsMetadata {
    pub message_id: String,
    pub message_type: MessageType,
    pub message_timestamp: String,
    /// Present on `notification` frames only. Kept as a raw string so an
    /// unknown subscription type degrades to "ignored" instead of a
    /// parse failure for the whole frame.
    #[serde(default)]
    pub subscription_type: Option<String>,
}

/// Known realtime message kinds. Anything the platform adds later lands
/// in `Unknown` and is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    SessionWelcome,
    SessionReconnect,
    SessionKeepalive,
    Revocation,
    Notification,
    #[serde(other)]
    Unknown,
}

/// Frame payload; which fields are set depends on the message type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WsPayload {
    #[serde(default)]
    pub session: Option<WsSession>,
    #[serde(default)]
    pub subscription: Option<Value>,
    #[serde(default)]
    pub event: Option<Value>,
}

/// Server-assigned realtime session. All subscriptions are scoped to
/// `id` and die with it.
#[derive(Debug, Clone, Deserialize)]
pub struct WsSession {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub keepalive_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub reconnect_url: Option<String>,
}

/// Subscription types the bot registers on every welcome/reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionType {
    ChannelFollow,
    StreamOnline,
    StreamOffline,
}

/// Every subscription type, in registration order.
pub const ALL_SUBSCRIPTION_TYPES: [SubscriptionType; 3] = [
    SubscriptionType::ChannelFollow,
    SubscriptionType::StreamOnline,
    SubscriptionType::StreamOffline,
];

impl SubscriptionType {
    /// Parse the wire discriminant. Unknown strings return `None` and
    /// the notification is dropped.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "channel.follow" => Some(Self::ChannelFollow),
            "stream.online" => Some(Self::StreamOnline),
            "stream.offline" => Some(Self::StreamOffline),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChannelFollow => "channel.follow",
            Self::StreamOnline => "stream.online",
            Self::StreamOffline => "stream.offline",
        }
    }

    /// Subscription schema version expected by the platform.
    pub fn version(&self) -> &'static str {
        match self {
            Self::ChannelFollow => "2",
            Self::StreamOnline | Self::StreamOffline => "1",
        }
    }
}

impl std::fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `channel.follow` notification event.
#[derive(Debug, Clone, Deserialize)]
pub struct FollowEvent {
    pub user_id: String,
    #[serde(default)]
    pub user_login: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

/// `stream.online` notification event.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamOnlineEvent {
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
}

/// A streaming-platform user profile, as resolved through the REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub login: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Snapshot of one live session, keyed by the calendar day it started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSnapshot {
    pub stream_date: Date,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub viewer_count: Option<u64>,
}

/// Relay-proxied notification body (the webhook counterpart of a
/// `notification` websocket frame).
#[derive(Debug, Clone, Deserialize)]
pub struct RelayNotification {
    pub subscription: RelaySubscription,
    #[serde(default)]
    pub event: Option<Value>,
}

/// Subscription descriptor embedded in a relay notification.
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySubscription {
    #[serde(rename = "type")]
    pub kind: String,
}
