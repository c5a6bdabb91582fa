//! Community-platform REST client.
//!
//! Guild-scoped operations: scheduled-event CRUD, voice-channel member
//! listing, role reads and grants. The platform addresses scheduled
//! events by its own ids, which the synchronizer stores as correlation
//! ids.

use async_trait::async_trait;
use gatherbot_sdk::objects::scheduled_event::{
    EventVenue, RemoteScheduledEvent, ScheduledEventDraft,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{CommunityPlatform, PlatformError, ScheduledEventHost, http_client};
use crate::entities::gathering::TargetPlatform;

/// Privacy level sent on every created event (guild members only).
const PRIVACY_GUILD_ONLY: u8 = 2;

pub struct CommunityClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    guild_id: String,
}

#[derive(Debug, Deserialize)]
struct ScheduledEventResponse {
    id: String,
    name: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GuildMemberResponse {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VoiceMemberResponse {
    user_id: String,
}

#[derive(Debug, Serialize)]
struct ScheduledEventBody<'a> {
    name: &'a str,
    description: &'a str,
    scheduled_start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheduled_end_time: Option<String>,
    privacy_level: u8,
    entity_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
}

impl CommunityClient {
    pub fn new(api_base: &str, token: &str, guild_id: &str) -> Self {
        Self {
            http: http_client(),
            api_base: api_base.trim_end_matches('/').to_owned(),
            token: token.to_owned(),
            guild_id: guild_id.to_owned(),
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/guilds/{}/scheduled-events",
            self.api_base, self.guild_id
        )
    }

    fn auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bot {}", self.token))
    }

    fn event_body<'a>(&'a self, draft: &'a ScheduledEventDraft) -> ScheduledEventBody<'a> {
        let (entity_type, channel_id, entity_metadata) = match &draft.venue {
            // 3 = external/location-based, 2 = voice-channel-based.
            EventVenue::External { location } => (3, None, Some(json!({ "location": location }))),
            EventVenue::Channel { channel_id } => (2, Some(channel_id.as_str()), None),
        };
        ScheduledEventBody {
            name: &draft.name,
            description: &draft.description,
            scheduled_start_time: rfc3339(draft.starts_at),
            scheduled_end_time: draft.ends_at.map(rfc3339),
            privacy_level: PRIVACY_GUILD_ONLY,
            entity_type,
            channel_id,
            entity_metadata,
            image: draft.cover_image.as_deref(),
        }
    }
}

fn rfc3339(value: time::OffsetDateTime) -> String {
    value
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| value.to_string())
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
impl ScheduledEventHost for CommunityClient {
    fn platform(&self) -> TargetPlatform {
        TargetPlatform::Community
    }

    async fn create_scheduled_event(
        &self,
        draft: &ScheduledEventDraft,
    ) -> Result<String, PlatformError> {
        let response = self
            .auth(self.http.post(self.events_url()))
            .json(&self.event_body(draft))
            .send()
            .await?;
        let event: ScheduledEventResponse = expect_success(response).await?.json().await?;
        debug!(event_id = %event.id, name = %event.name, "created community scheduled event");
        Ok(event.id)
    }

    async fn update_scheduled_event(
        &self,
        event_id: &str,
        draft: &ScheduledEventDraft,
    ) -> Result<(), PlatformError> {
        let url = format!("{}/{}", self.events_url(), event_id);
        let response = self
            .auth(self.http.patch(url))
            .json(&self.event_body(draft))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn cancel_scheduled_event(&self, event_id: &str) -> Result<(), PlatformError> {
        let url = format!("{}/{}", self.events_url(), event_id);
        let response = self.auth(self.http.delete(url)).send().await?;
        // Deleting an already-deleted event is a safe no-op.
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
        let url = format!("{}/{}", self.events_url(), event_id);
        let response = self.auth(self.http.get(url)).send().await?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let event: ScheduledEventResponse = expect_success(response).await?.json().await?;
        Ok(Some(RemoteScheduledEvent {
            id: event.id,
            name: event.name,
            status: event.status,
        }))
    }
}

#[async_trait]
impl CommunityPlatform for CommunityClient {
    async fn channel_members(&self, channel_id: &str) -> Result<Vec<String>, PlatformError> {
        let url = format!("{}/channels/{}/voice-members", self.api_base, channel_id);
        let response = self.auth(self.http.get(url)).send().await?;
        let members: Vec<VoiceMemberResponse> = expect_success(response).await?.json().await?;
        Ok(members.into_iter().map(|m| m.user_id).collect())
    }

    async fn has_role(&self, member_id: &str, role_id: &str) -> Result<bool, PlatformError> {
        let url = format!(
            "{}/guilds/{}/members/{}",
            self.api_base, self.guild_id, member_id
        );
        let response = self.auth(self.http.get(url)).send().await?;
        let member: GuildMemberResponse = expect_success(response).await?.json().await?;
        Ok(member.roles.iter().any(|role| role == role_id))
    }

    async fn grant_role(&self, member_id: &str, role_id: &str) -> Result<(), PlatformError> {
        let url = format!(
            "{}/guilds/{}/members/{}/roles/{}",
            self.api_base, self.guild_id, member_id, role_id
        );
        let response = self.auth(self.http.put(url)).send().await?;
        expect_success(response).await?;
        Ok(())
    }
}
