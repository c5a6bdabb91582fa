//! TOML file configuration structures.
//!
//! These structs directly map to the `gatherbot-config.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub webhooks: WebhooksConfig,
    pub community: CommunityConfig,
    pub streaming: StreamingConfig,
    pub engagement: EngagementConfig,
    pub content: ContentConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Inbound webhook authentication secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhooksConfig {
    /// Optional shared bearer token for the trusted content-system and
    /// community-event routes. Absent means those routes are open
    /// (private-network deployments only).
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// HMAC-SHA1 secret shared with the code host.
    pub github_secret: String,
    /// HMAC-SHA256 secret shared with the transport relay.
    pub relay_secret: String,
    /// HMAC-SHA256 secret shared with the streaming platform itself.
    pub origin_secret: String,
}

/// Community platform (guild) section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityConfig {
    #[serde(default = "default_community_api_base")]
    pub api_base: String,
    pub bot_token: String,
    pub guild_id: String,
    /// Voice channel that hosts meetup events and is tracked for
    /// attendance.
    pub meetup_channel_id: String,
    /// Role granted for thirty minutes of attendance.
    pub attendee_role_id: String,
}

fn default_community_api_base() -> String {
    "https://discord.com/api/v10".to_owned()
}

/// Streaming platform section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    #[serde(default = "default_streaming_api_base")]
    pub api_base: String,
    #[serde(default = "default_realtime_ws_url")]
    pub ws_url: String,
    pub client_id: String,
    pub token: String,
    /// The broadcaster channel all lookups and subscriptions target.
    pub channel_id: String,
    pub moderator_id: String,
    /// Public URL of the stream, used as the location of external
    /// scheduled events.
    pub stream_url: String,
    /// Disable to run webhook-relay-only, without the websocket client.
    #[serde(default = "default_true")]
    pub realtime_enabled: bool,
}

fn default_streaming_api_base() -> String {
    "https://api.twitch.tv/helix".to_owned()
}

fn default_realtime_ws_url() -> String {
    "wss://eventsub.wss.twitch.tv/ws".to_owned()
}

fn default_true() -> bool {
    true
}

/// Engagement tracker section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    pub api_base: String,
    pub api_key: String,
    pub workspace: String,
}

/// Content system write-back section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Endpoint that receives learned correlation ids.
    pub callback_url: String,
}

/// Synchronizer tuning section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Attach generated cover images to created/updated events.
    #[serde(default = "default_true")]
    pub cover_images: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { cover_images: true }
    }
}
