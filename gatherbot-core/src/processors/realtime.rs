//! Realtime-protocol client and notification dispatcher.
//!
//! The client keeps one persistent websocket to the streaming platform.
//! Subscriptions are scoped to the server-assigned session and die with
//! it, so every `session_welcome` and `session_reconnect` frame triggers
//! a full re-registration. Connection loss is answered with a capped
//! exponential backoff; a clean welcome resets it.
//!
//! The dispatcher turns raw notifications into enriched bus events. It
//! is shared with the relay webhook route, which carries the same
//! notification shape over HTTP, so both ingress paths converge here.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gatherbot_sdk::objects::realtime::{
    ALL_SUBSCRIPTION_TYPES, FollowEvent, MessageType, StreamOnlineEvent, SubscriptionType,
    UserProfile, WsMessage,
};
use rand::Rng;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::cache::{Cache, USER_PROFILE_STALENESS};
use crate::events::types::{OnFollow, OnStream};
use crate::events::EventBus;
use crate::platforms::StreamingPlatform;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
/// Random jitter added to every backoff sleep, in milliseconds.
const BACKOFF_JITTER_MS: u64 = 250;

/// Turns platform notifications into enriched bus events.
///
/// Lookups go through the cache first; a cache miss or a stale entry
/// falls back to the platform API. Enrichment failures degrade the
/// payload instead of dropping the event.
pub struct NotificationDispatcher<S: StreamingPlatform> {
    platform: Arc<S>,
    cache: Cache,
    bus: EventBus,
}

impl<S: StreamingPlatform> NotificationDispatcher<S> {
    pub fn new(platform: Arc<S>, cache: Cache, bus: EventBus) -> Self {
        Self {
            platform,
            cache,
            bus,
        }
    }

    /// Route one notification by its subscription type. Unknown types
    /// are dropped.
    pub async fn dispatch(&self, subscription_type: &str, event: Option<&Value>) {
        let Some(kind) = SubscriptionType::parse(subscription_type) else {
            debug!(subscription_type, "unknown subscription type; dropping");
            return;
        };
        match kind {
            SubscriptionType::ChannelFollow => self.dispatch_follow(event).await,
            SubscriptionType::StreamOnline => self.dispatch_stream_online(event).await,
            SubscriptionType::StreamOffline => self.dispatch_stream_offline().await,
        }
    }

    async fn dispatch_follow(&self, event: Option<&Value>) {
        let follow: FollowEvent = match event.map(|v| serde_json::from_value(v.clone())) {
            Some(Ok(follow)) => follow,
            Some(Err(e)) => {
                warn!(error = %e, "malformed follow event; dropping");
                return;
            }
            None => {
                warn!("follow notification without an event body; dropping");
                return;
            }
        };

        let user = self.resolve_user(&follow).await;
        info!(user_id = %user.id, login = %user.login, "follow received");
        self.bus.publish_follow(OnFollow { user });
    }

    /// Cache-first profile lookup. A fresh entry short-circuits; a miss
    /// or stale entry hits the API. When the API fails the stale entry
    /// (or the identity from the notification itself) fills in.
    async fn resolve_user(&self, follow: &FollowEvent) -> UserProfile {
        let cached = self.cache.get_user(&follow.user_id).await;
        if let Some(entry) = &cached {
            if !entry.is_older_than(USER_PROFILE_STALENESS) {
                return entry.value.clone();
            }
        }

        match self.platform.get_user_profile(&follow.user_id).await {
            Ok(Some(profile)) => {
                self.cache.put_user(profile.clone()).await;
                profile
            }
            Ok(None) => {
                warn!(user_id = %follow.user_id, "platform does not know the follower");
                self.fallback_profile(follow, cached)
            }
            Err(e) => {
                warn!(user_id = %follow.user_id, error = %e, "profile lookup failed");
                self.fallback_profile(follow, cached)
            }
        }
    }

    fn fallback_profile(
        &self,
        follow: &FollowEvent,
        cached: Option<crate::cache::CacheEntry<UserProfile>>,
    ) -> UserProfile {
        if let Some(entry) = cached {
            return entry.value;
        }
        UserProfile {
            id: follow.user_id.clone(),
            login: follow.user_login.clone().unwrap_or_default(),
            display_name: follow.user_name.clone(),
            avatar_url: None,
        }
    }

    async fn dispatch_stream_online(&self, event: Option<&Value>) {
        let online: Option<StreamOnlineEvent> =
            event.and_then(|v| serde_json::from_value(v.clone()).ok());
        let date = online
            .map(|e| e.started_at.date())
            .unwrap_or_else(|| OffsetDateTime::now_utc().date());

        let stream = self.resolve_stream(date).await;
        info!(%date, resolved = stream.is_some(), "stream started");
        self.bus.publish_stream_start(OnStream { stream });
    }

    async fn dispatch_stream_offline(&self) {
        let date = OffsetDateTime::now_utc().date();
        let stream = self.resolve_stream(date).await;
        info!(%date, resolved = stream.is_some(), "stream ended");
        self.bus.publish_stream_end(OnStream { stream });
    }

    /// Cache-first snapshot lookup, keyed by the stream's calendar day.
    async fn resolve_stream(
        &self,
        date: time::Date,
    ) -> Option<gatherbot_sdk::objects::realtime::StreamSnapshot> {
        if let Some(entry) = self.cache.get_stream(date).await {
            return Some(entry.value);
        }
        match self.platform.get_stream_snapshot(date).await {
            Ok(Some(snapshot)) => {
                self.cache.put_stream(snapshot.clone()).await;
                Some(snapshot)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(%date, error = %e, "stream snapshot lookup failed");
                None
            }
        }
    }
}

/// What a handled frame asks the connection loop to do next.
#[derive(Debug, PartialEq, Eq)]
enum FrameAction {
    Continue,
    /// The server asked us to move to a new endpoint.
    Reconnect,
}

/// What a finished connection attempt means for the run loop.
enum ConnectionOutcome {
    Shutdown,
    /// Server-directed move; reconnect immediately, no backoff.
    Directed,
    /// Error or unexpected close; back off before retrying.
    Dropped,
}

/// Persistent websocket client for the streaming platform's realtime
/// protocol.
pub struct RealtimeClient<S: StreamingPlatform> {
    platform: Arc<S>,
    dispatcher: Arc<NotificationDispatcher<S>>,
    ws_url: String,
    /// Set by a `session_reconnect` frame; consumed by the next dial.
    next_url: Option<String>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<S: StreamingPlatform> RealtimeClient<S> {
    pub fn new(
        platform: Arc<S>,
        dispatcher: Arc<NotificationDispatcher<S>>,
        ws_url: String,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            platform,
            dispatcher,
            ws_url,
            next_url: None,
            shutdown_rx,
        }
    }

    /// Run the client until shutdown, reconnecting forever.
    pub async fn run(mut self) {
        info!("RealtimeClient started");
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }
            match self.connect_and_listen(&mut backoff).await {
                ConnectionOutcome::Shutdown => break,
                ConnectionOutcome::Directed => continue,
                ConnectionOutcome::Dropped => {
                    let jitter =
                        Duration::from_millis(rand::rng().random_range(0..=BACKOFF_JITTER_MS));
                    let delay = backoff + jitter;
                    warn!(delay_ms = delay.as_millis() as u64, "reconnecting after backoff");

                    tokio::select! {
                        _ = self.shutdown_rx.changed() => {
                            if *self.shutdown_rx.borrow() {
                                break;
                            }
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }

        info!("RealtimeClient shutdown complete");
    }

    async fn connect_and_listen(&mut self, backoff: &mut Duration) -> ConnectionOutcome {
        let url = self.next_url.take().unwrap_or_else(|| self.ws_url.clone());
        let mut ws = match connect_async(&url).await {
            Ok((ws, _response)) => {
                info!(%url, "realtime connection established");
                ws
            }
            Err(e) => {
                error!(%url, error = %e, "realtime connection failed");
                return ConnectionOutcome::Dropped;
            }
        };

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        let _ = ws.close(None).await;
                        return ConnectionOutcome::Shutdown;
                    }
                }

                frame = ws.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<WsMessage>(&text) {
                                Ok(message) => {
                                    if self.handle_frame(&message, backoff).await == FrameAction::Reconnect {
                                        let _ = ws.close(None).await;
                                        return ConnectionOutcome::Directed;
                                    }
                                }
                                Err(e) => warn!(error = %e, "unparseable realtime frame; ignoring"),
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            if ws.send(Message::Pong(payload)).await.is_err() {
                                return ConnectionOutcome::Dropped;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            warn!(?frame, "realtime connection closed by server");
                            return ConnectionOutcome::Dropped;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(error = %e, "realtime read error");
                            return ConnectionOutcome::Dropped;
                        }
                        None => {
                            warn!("realtime stream ended");
                            return ConnectionOutcome::Dropped;
                        }
                    }
                }
            }
        }
    }

    async fn handle_frame(&mut self, message: &WsMessage, backoff: &mut Duration) -> FrameAction {
        match message.metadata.message_type {
            MessageType::SessionWelcome => {
                if let Some(session) = &message.payload.session {
                    info!(session_id = %session.id, "realtime session established");
                    self.register_all(&session.id).await;
                    *backoff = INITIAL_BACKOFF;
                } else {
                    warn!("welcome frame without a session");
                }
                FrameAction::Continue
            }
            MessageType::SessionReconnect => {
                if let Some(session) = &message.payload.session {
                    self.register_all(&session.id).await;
                    if let Some(url) = &session.reconnect_url {
                        info!(%url, "server directed a reconnect");
                        self.next_url = Some(url.clone());
                        return FrameAction::Reconnect;
                    }
                }
                FrameAction::Continue
            }
            MessageType::Notification => {
                if let Some(subscription_type) = &message.metadata.subscription_type {
                    self.dispatcher
                        .dispatch(subscription_type, message.payload.event.as_ref())
                        .await;
                } else {
                    warn!("notification frame without a subscription type");
                }
                FrameAction::Continue
            }
            MessageType::Revocation => {
                warn!(
                    subscription_type = ?message.metadata.subscription_type,
                    "subscription revoked by the platform"
                );
                FrameAction::Continue
            }
            MessageType::SessionKeepalive | MessageType::Unknown => FrameAction::Continue,
        }
    }

    /// Register every subscription against the session. A single
    /// failure is logged and the rest still go through.
    async fn register_all(&self, session_id: &str) {
        for kind in ALL_SUBSCRIPTION_TYPES {
            match self.platform.register_subscription(kind, session_id).await {
                Ok(()) => debug!(%kind, session_id, "subscription registered"),
                Err(e) => error!(%kind, session_id, error = %e, "subscription registration failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gatherbot_sdk::objects::realtime::StreamSnapshot;
    use serde_json::json;
    use std::sync::Mutex;
    use time::macros::{date, datetime};
    use time::Date;

    use crate::platforms::PlatformError;

    #[derive(Default)]
    struct MockStreaming {
        profile: Option<UserProfile>,
        snapshot: Option<StreamSnapshot>,
        profile_lookups: Mutex<u32>,
        registrations: Mutex<Vec<(SubscriptionType, String)>>,
    }

    #[async_trait]
    impl StreamingPlatform for MockStreaming {
        async fn get_user_profile(
            &self,
            _user_id: &str,
        ) -> Result<Option<UserProfile>, PlatformError> {
            *self.profile_lookups.lock().unwrap() += 1;
            Ok(self.profile.clone())
        }

        async fn get_stream_snapshot(
            &self,
            _date: Date,
        ) -> Result<Option<StreamSnapshot>, PlatformError> {
            Ok(self.snapshot.clone())
        }

        async fn register_subscription(
            &self,
            kind: SubscriptionType,
            session_id: &str,
        ) -> Result<(), PlatformError> {
            self.registrations
                .lock()
                .unwrap()
                .push((kind, session_id.to_owned()));
            Ok(())
        }
    }

    fn profile(id: &str, login: &str) -> UserProfile {
        UserProfile {
            id: id.into(),
            login: login.into(),
            display_name: None,
            avatar_url: None,
        }
    }

    fn dispatcher(
        platform: MockStreaming,
    ) -> (NotificationDispatcher<MockStreaming>, Arc<MockStreaming>, EventBus) {
        let platform = Arc::new(platform);
        let bus = EventBus::new();
        let dispatcher = NotificationDispatcher::new(platform.clone(), Cache::new(), bus.clone());
        (dispatcher, platform, bus)
    }

    #[tokio::test]
    async fn follow_resolves_profile_and_publishes() {
        let (dispatcher, platform, bus) = dispatcher(MockStreaming {
            profile: Some(profile("42", "somefan")),
            ..Default::default()
        });
        let mut follows = bus.subscribe_follow();

        dispatcher
            .dispatch("channel.follow", Some(&json!({"user_id": "42"})))
            .await;

        let event = follows.recv().await.unwrap();
        assert_eq!(event.user.login, "somefan");
        assert_eq!(*platform.profile_lookups.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn second_follow_from_same_user_hits_the_cache() {
        let (dispatcher, platform, bus) = dispatcher(MockStreaming {
            profile: Some(profile("42", "somefan")),
            ..Default::default()
        });
        let mut follows = bus.subscribe_follow();

        let body = json!({"user_id": "42"});
        dispatcher.dispatch("channel.follow", Some(&body)).await;
        dispatcher.dispatch("channel.follow", Some(&body)).await;

        assert_eq!(*platform.profile_lookups.lock().unwrap(), 1);
        assert!(follows.recv().await.is_ok());
        assert!(follows.recv().await.is_ok());
    }

    #[tokio::test]
    async fn follow_falls_back_to_notification_identity() {
        let (dispatcher, _, bus) = dispatcher(MockStreaming::default());
        let mut follows = bus.subscribe_follow();

        dispatcher
            .dispatch(
                "channel.follow",
                Some(&json!({"user_id": "7", "user_login": "ghost"})),
            )
            .await;

        let event = follows.recv().await.unwrap();
        assert_eq!(event.user.id, "7");
        assert_eq!(event.user.login, "ghost");
    }

    #[tokio::test]
    async fn stream_online_resolves_snapshot_for_the_start_day() {
        let snapshot = StreamSnapshot {
            stream_date: date!(2024 - 06 - 07),
            title: "build day".into(),
            started_at: datetime!(2024-06-07 16:00 UTC),
            ended_at: None,
            thumbnail_url: None,
            viewer_count: Some(12),
        };
        let (dispatcher, _, bus) = dispatcher(MockStreaming {
            snapshot: Some(snapshot),
            ..Default::default()
        });
        let mut starts = bus.subscribe_stream_start();

        dispatcher
            .dispatch(
                "stream.online",
                Some(&json!({"started_at": "2024-06-07T16:00:00Z"})),
            )
            .await;

        let event = starts.recv().await.unwrap();
        assert_eq!(event.stream.unwrap().title, "build day");
    }

    #[tokio::test]
    async fn unknown_subscription_type_publishes_nothing() {
        let (dispatcher, _, bus) = dispatcher(MockStreaming::default());
        let mut follows = bus.subscribe_follow();
        let mut starts = bus.subscribe_stream_start();

        dispatcher.dispatch("channel.cheer", Some(&json!({}))).await;

        assert!(follows.try_recv().is_err());
        assert!(starts.try_recv().is_err());
    }

    fn client(platform: Arc<MockStreaming>) -> RealtimeClient<MockStreaming> {
        let bus = EventBus::new();
        let dispatcher = Arc::new(NotificationDispatcher::new(
            platform.clone(),
            Cache::new(),
            bus,
        ));
        let (_tx, shutdown_rx) = watch::channel(false);
        RealtimeClient::new(
            platform,
            dispatcher,
            "wss://realtime.example/ws".into(),
            shutdown_rx,
        )
    }

    fn frame(message_type: &str, session: Value) -> WsMessage {
        serde_json::from_value(json!({
            "metadata": {
                "message_id": "m1",
                "message_type": message_type,
                "message_timestamp": "2024-06-07T16:00:00Z"
            },
            "payload": { "session": session }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn welcome_registers_every_subscription_once() {
        let platform = Arc::new(MockStreaming::default());
        let mut client = client(platform.clone());
        let mut backoff = MAX_BACKOFF;

        let welcome = frame(
            "session_welcome",
            json!({"id": "sess-1", "status": "connected"}),
        );
        let action = client.handle_frame(&welcome, &mut backoff).await;

        assert_eq!(action, FrameAction::Continue);
        let registrations = platform.registrations.lock().unwrap();
        assert_eq!(registrations.len(), ALL_SUBSCRIPTION_TYPES.len());
        for kind in ALL_SUBSCRIPTION_TYPES {
            assert_eq!(
                registrations.iter().filter(|(k, _)| *k == kind).count(),
                1
            );
        }
        // A clean welcome resets the backoff.
        assert_eq!(backoff, INITIAL_BACKOFF);
    }

    #[tokio::test]
    async fn reconnect_re_registers_and_moves_to_the_new_url() {
        let platform = Arc::new(MockStreaming::default());
        let mut client = client(platform.clone());
        let mut backoff = INITIAL_BACKOFF;

        let reconnect = frame(
            "session_reconnect",
            json!({
                "id": "sess-1",
                "status": "reconnecting",
                "reconnect_url": "wss://realtime.example/ws?migrate=1"
            }),
        );
        let action = client.handle_frame(&reconnect, &mut backoff).await;

        assert_eq!(action, FrameAction::Reconnect);
        assert_eq!(
            client.next_url.as_deref(),
            Some("wss://realtime.example/ws?migrate=1")
        );
        assert_eq!(
            platform.registrations.lock().unwrap().len(),
            ALL_SUBSCRIPTION_TYPES.len()
        );
    }
}
