//! External platform collaborators.
//!
//! Every outbound dependency sits behind a trait so the processors can
//! be unit-tested against recorded mocks. The reqwest-backed clients in
//! the submodules are the production implementations.

use async_trait::async_trait;
use gatherbot_sdk::objects::engagement::ActivityEntry;
use gatherbot_sdk::objects::realtime::{StreamSnapshot, SubscriptionType, UserProfile};
use gatherbot_sdk::objects::scheduled_event::{RemoteScheduledEvent, ScheduledEventDraft};
use thiserror::Error;
use time::Date;

use crate::entities::gathering::TargetPlatform;

pub mod community;
pub mod content;
pub mod engagement;
pub mod streaming;

pub use community::CommunityClient;
pub use content::ContentClient;
pub use engagement::EngagementClient;
pub use streaming::StreamingClient;

/// Per-call timeout applied to every platform HTTP client.
pub const PLATFORM_CALL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Errors from any external platform call.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Network or timeout failure; transient, redelivery retries it.
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The platform answered with an unexpected status.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The platform answered with a body we could not interpret.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Build the shared HTTP client with the conservative per-call timeout.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(PLATFORM_CALL_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// A platform that hosts scheduled-event projections of gatherings.
#[async_trait]
pub trait ScheduledEventHost: Send + Sync {
    fn platform(&self) -> TargetPlatform;

    /// Create a scheduled event and return the platform-assigned id.
    async fn create_scheduled_event(
        &self,
        draft: &ScheduledEventDraft,
    ) -> Result<String, PlatformError>;

    async fn update_scheduled_event(
        &self,
        event_id: &str,
        draft: &ScheduledEventDraft,
    ) -> Result<(), PlatformError>;

    async fn cancel_scheduled_event(&self, event_id: &str) -> Result<(), PlatformError>;

    /// Fetch an event by correlation id; `Ok(None)` means the platform
    /// no longer knows the id.
    async fn get_scheduled_event(
        &self,
        event_id: &str,
    ) -> Result<Option<RemoteScheduledEvent>, PlatformError>;
}

/// Community-platform operations beyond scheduled events.
#[async_trait]
pub trait CommunityPlatform: Send + Sync {
    /// Members currently connected to a voice channel.
    async fn channel_members(&self, channel_id: &str) -> Result<Vec<String>, PlatformError>;

    async fn has_role(&self, member_id: &str, role_id: &str) -> Result<bool, PlatformError>;

    async fn grant_role(&self, member_id: &str, role_id: &str) -> Result<(), PlatformError>;
}

/// Streaming-platform lookups and realtime subscription registration.
#[async_trait]
pub trait StreamingPlatform: Send + Sync {
    async fn get_user_profile(&self, user_id: &str)
    -> Result<Option<UserProfile>, PlatformError>;

    /// Snapshot of the live session that started on `date`, if any.
    async fn get_stream_snapshot(
        &self,
        date: Date,
    ) -> Result<Option<StreamSnapshot>, PlatformError>;

    /// Register one realtime subscription against a session id.
    /// Registration is idempotent on the platform side.
    async fn register_subscription(
        &self,
        kind: SubscriptionType,
        session_id: &str,
    ) -> Result<(), PlatformError>;
}

/// The engagement tracker that records member activities.
#[async_trait]
pub trait EngagementLog: Send + Sync {
    async fn record_activity(
        &self,
        member_id: &str,
        entry: &ActivityEntry,
    ) -> Result<(), PlatformError>;
}

/// Write-back channel to the content system.
#[async_trait]
pub trait ContentSystem: Send + Sync {
    /// Tell the content system which id a platform assigned to its
    /// projection of a gathering.
    async fn notify_correlation_learned(
        &self,
        gathering_id: &str,
        platform: TargetPlatform,
        event_id: &str,
    ) -> Result<(), PlatformError>;
}
