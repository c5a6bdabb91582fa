//! Engagement-tracker client.
//!
//! Posts member activities to a workspace-scoped activities endpoint.
//! The tracker deduplicates on the entry `key`, which is why attendance
//! entries are keyed by member, channel and calendar day.

use async_trait::async_trait;
use gatherbot_sdk::objects::engagement::{ActivityEntry, MemberIdentity};
use serde_json::json;
use tracing::debug;

use super::{EngagementLog, PlatformError, http_client};

/// Identity source recorded with every attendance activity.
const IDENTITY_SOURCE: &str = "community";

pub struct EngagementClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    workspace: String,
}

impl EngagementClient {
    pub fn new(api_base: &str, api_key: &str, workspace: &str) -> Self {
        Self {
            http: http_client(),
            api_base: api_base.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
            workspace: workspace.to_owned(),
        }
    }
}

#[async_trait]
impl EngagementLog for EngagementClient {
    async fn record_activity(
        &self,
        member_id: &str,
        entry: &ActivityEntry,
    ) -> Result<(), PlatformError> {
        let url = format!("{}/{}/activities", self.api_base, self.workspace);
        let identity = MemberIdentity {
            uid: member_id.to_owned(),
            source: IDENTITY_SOURCE.to_owned(),
        };
        let response = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({ "activity": entry, "identity": identity }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
        debug!(member_id, key = %entry.key, "recorded engagement activity");
        Ok(())
    }
}
