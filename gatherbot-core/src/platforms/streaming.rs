//! Streaming-platform REST client.
//!
//! Helix-style API: user lookups, current-stream lookups, realtime
//! subscription registration, and the platform's own schedule segments
//! (its scheduled-event projection of a gathering).

use async_trait::async_trait;
use gatherbot_sdk::objects::realtime::{StreamSnapshot, SubscriptionType, UserProfile};
use gatherbot_sdk::objects::scheduled_event::{RemoteScheduledEvent, ScheduledEventDraft};
use serde::Deserialize;
use serde_json::json;
use time::Date;
use tracing::{debug, info};

use super::{PlatformError, ScheduledEventHost, StreamingPlatform, http_client};
use crate::entities::gathering::TargetPlatform;

pub struct StreamingClient {
    http: reqwest::Client,
    api_base: String,
    client_id: String,
    token: String,
    /// The broadcaster whose channel this bot operates.
    channel_id: String,
    /// Bot account id, used as the moderator on follow subscriptions.
    moderator_id: String,
}

/// Helix-style list envelope: every resource answer is `{"data": [...]}`.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    login: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    title: String,
    #[serde(with = "time::serde::rfc3339")]
    started_at: time::OffsetDateTime,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    viewer_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SegmentResponse {
    id: String,
    title: String,
}

impl StreamingClient {
    pub fn new(
        api_base: &str,
        client_id: &str,
        token: &str,
        channel_id: &str,
        moderator_id: &str,
    ) -> Self {
        Self {
            http: http_client(),
            api_base: api_base.trim_end_matches('/').to_owned(),
            client_id: client_id.to_owned(),
            token: token.to_owned(),
            channel_id: channel_id.to_owned(),
            moderator_id: moderator_id.to_owned(),
        }
    }

    fn auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Client-Id", self.client_id.clone())
    }

    fn subscription_condition(&self, kind: SubscriptionType) -> serde_json::Value {
        match kind {
            SubscriptionType::ChannelFollow => json!({
                "broadcaster_user_id": self.channel_id,
                "moderator_user_id": self.moderator_id,
            }),
            SubscriptionType::StreamOnline | SubscriptionType::StreamOffline => json!({
                "broadcaster_user_id": self.channel_id,
            }),
        }
    }
}

async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(PlatformError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl StreamingPlatform for StreamingClient {
    async fn get_user_profile(
        &self,
        user_id: &str,
    ) -> Result<Option<UserProfile>, PlatformError> {
        let url = format!("{}/users", self.api_base);
        let response = self
            .auth(self.http.get(url).query(&[("id", user_id)]))
            .send()
            .await?;
        let envelope: DataEnvelope<UserResponse> = expect_success(response).await?.json().await?;
        Ok(envelope.data.into_iter().next().map(|user| UserProfile {
            id: user.id,
            login: user.login,
            display_name: user.display_name,
            avatar_url: user.profile_image_url,
        }))
    }

    async fn get_stream_snapshot(
        &self,
        date: Date,
    ) -> Result<Option<StreamSnapshot>, PlatformError> {
        let url = format!("{}/streams", self.api_base);
        let response = self
            .auth(
                self.http
                    .get(url)
                    .query(&[("user_id", self.channel_id.as_str()), ("first", "1")]),
            )
            .send()
            .await?;
        let envelope: DataEnvelope<StreamResponse> =
            expect_success(response).await?.json().await?;
        Ok(envelope.data.into_iter().next().map(|stream| StreamSnapshot {
            stream_date: date,
            title: stream.title,
            started_at: stream.started_at,
            ended_at: None,
            thumbnail_url: stream.thumbnail_url,
            viewer_count: stream.viewer_count,
        }))
    }

    async fn register_subscription(
        &self,
        kind: SubscriptionType,
        session_id: &str,
    ) -> Result<(), PlatformError> {
        let url = format!("{}/eventsub/subscriptions", self.api_base);
        let payload = json!({
            "type": kind.as_str(),
            "version": kind.version(),
            "condition": self.subscription_condition(kind),
            "transport": {
                "method": "websocket",
                "session_id": session_id,
            },
        });
        let response = self.auth(self.http.post(url)).json(&payload).send().await?;
        expect_success(response).await?;
        info!(subscription = %kind, session_id, "registered realtime subscription");
        Ok(())
    }
}

#[async_trait]
impl ScheduledEventHost for StreamingClient {
    fn platform(&self) -> TargetPlatform {
        TargetPlatform::Streaming
    }

    async fn create_scheduled_event(
        &self,
        draft: &ScheduledEventDraft,
    ) -> Result<String, PlatformError> {
        let url = format!("{}/schedule/segment", self.api_base);
        let response = self
            .auth(
                self.http
                    .post(url)
                    .query(&[("broadcaster_id", self.channel_id.as_str())]),
            )
            .json(&draft)
            .send()
            .await?;
        let envelope: DataEnvelope<SegmentResponse> =
            expect_success(response).await?.json().await?;
        let segment = envelope.data.into_iter().next().ok_or_else(|| {
            PlatformError::Malformed("schedule segment response had no data".into())
        })?;
        debug!(segment_id = %segment.id, title = %segment.title, "created schedule segment");
        Ok(segment.id)
    }

    async fn update_scheduled_event(
        &self,
        event_id: &str,
        draft: &ScheduledEventDraft,
    ) -> Result<(), PlatformError> {
        let url = format!("{}/schedule/segment", self.api_base);
        let response = self
            .auth(self.http.patch(url).query(&[
                ("broadcaster_id", self.channel_id.as_str()),
                ("id", event_id),
            ]))
            .json(&draft)
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn cancel_scheduled_event(&self, event_id: &str) -> Result<(), PlatformError> {
        let url = format!("{}/schedule/segment", self.api_base);
        let response = self
            .auth(self.http.delete(url).query(&[
                ("broadcaster_id", self.channel_id.as_str()),
                ("id", event_id),
            ]))
            .send()
            .await?;
        if response.status().as_u16() == 404 {
            return Ok(());
        }
        expect_success(response).await?;
        Ok(())
    }

    async fn get_scheduled_event(
        &self,
        event_id: &str,
    ) -> Result<Option<RemoteScheduledEvent>, PlatformError> {
        let url = format!("{}/schedule/segment", self.api_base);
        let response = self
            .auth(self.http.get(url).query(&[
                ("broadcaster_id", self.channel_id.as_str()),
                ("id", event_id),
            ]))
            .send()
            .await?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let envelope: DataEnvelope<SegmentResponse> =
            expect_success(response).await?.json().await?;
        Ok(envelope.data.into_iter().next().map(|segment| {
            RemoteScheduledEvent {
                id: segment.id,
                name: segment.title,
                status: None,
            }
        }))
    }
}
