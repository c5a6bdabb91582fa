//! The in-process event bus.
//!
//! One broadcast channel per event type, bundled behind a cloneable
//! handle. Each subscriber runs as its own task, so a slow or failing
//! listener cannot stall delivery to the others; a publish with zero
//! subscribers is dropped.

use gatherbot_sdk::objects::contributions::PullRequestEvent;
use gatherbot_sdk::objects::gathering::GatheringEvent;
use tokio::sync::broadcast;

use super::types::{
    CorrelationUpdated, OnFollow, OnStream, PresenceUpdate, SessionStatusChanged,
};

/// Per-event-type buffer. Enough to absorb bursts while keeping memory
/// bounded; a lagging subscriber skips to the oldest retained event.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Cloneable handle to every event channel in the process.
#[derive(Clone)]
pub struct EventBus {
    gathering_changed: broadcast::Sender<GatheringEvent>,
    pull_request_merged: broadcast::Sender<PullRequestEvent>,
    follow: broadcast::Sender<OnFollow>,
    stream_start: broadcast::Sender<OnStream>,
    stream_end: broadcast::Sender<OnStream>,
    presence: broadcast::Sender<PresenceUpdate>,
    session_status: broadcast::Sender<SessionStatusChanged>,
    correlation: broadcast::Sender<CorrelationUpdated>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            gathering_changed: broadcast::channel(DEFAULT_CHANNEL_CAPACITY).0,
            pull_request_merged: broadcast::channel(DEFAULT_CHANNEL_CAPACITY).0,
            follow: broadcast::channel(DEFAULT_CHANNEL_CAPACITY).0,
            stream_start: broadcast::channel(DEFAULT_CHANNEL_CAPACITY).0,
            stream_end: broadcast::channel(DEFAULT_CHANNEL_CAPACITY).0,
            presence: broadcast::channel(DEFAULT_CHANNEL_CAPACITY).0,
            session_status: broadcast::channel(DEFAULT_CHANNEL_CAPACITY).0,
            correlation: broadcast::channel(DEFAULT_CHANNEL_CAPACITY).0,
        }
    }

    pub fn publish_gathering_changed(&self, event: GatheringEvent) {
        // A send error only means nobody is subscribed right now.
        let _ = self.gathering_changed.send(event);
    }

    pub fn subscribe_gathering_changed(&self) -> broadcast::Receiver<GatheringEvent> {
        self.gathering_changed.subscribe()
    }

    pub fn publish_pull_request_merged(&self, event: PullRequestEvent) {
        let _ = self.pull_request_merged.send(event);
    }

    pub fn subscribe_pull_request_merged(&self) -> broadcast::Receiver<PullRequestEvent> {
        self.pull_request_merged.subscribe()
    }

    pub fn publish_follow(&self, event: OnFollow) {
        let _ = self.follow.send(event);
    }

    pub fn subscribe_follow(&self) -> broadcast::Receiver<OnFollow> {
        self.follow.subscribe()
    }

    pub fn publish_stream_start(&self, event: OnStream) {
        let _ = self.stream_start.send(event);
    }

    pub fn subscribe_stream_start(&self) -> broadcast::Receiver<OnStream> {
        self.stream_start.subscribe()
    }

    pub fn publish_stream_end(&self, event: OnStream) {
        let _ = self.stream_end.send(event);
    }

    pub fn subscribe_stream_end(&self) -> broadcast::Receiver<OnStream> {
        self.stream_end.subscribe()
    }

    pub fn publish_presence(&self, event: PresenceUpdate) {
        let _ = self.presence.send(event);
    }

    pub fn subscribe_presence(&self) -> broadcast::Receiver<PresenceUpdate> {
        self.presence.subscribe()
    }

    pub fn publish_session_status(&self, event: SessionStatusChanged) {
        let _ = self.session_status.send(event);
    }

    pub fn subscribe_session_status(&self) -> broadcast::Receiver<SessionStatusChanged> {
        self.session_status.subscribe()
    }

    pub fn publish_correlation_updated(&self, event: CorrelationUpdated) {
        let _ = self.correlation.send(event);
    }

    pub fn subscribe_correlation_updated(&self) -> broadcast::Receiver<CorrelationUpdated> {
        self.correlation.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
