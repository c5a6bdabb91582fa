//! Content-system write-back client.
//!
//! The content system owns the gathering records. When a target
//! platform assigns an id to a new scheduled event, the bot posts it
//! back so the next change notification already carries the
//! correlation id and the synchronizer takes the update path.

use async_trait::async_trait;
use gatherbot_sdk::objects::gathering::CorrelationWriteBack;
use tracing::debug;

use super::{ContentSystem, PlatformError, http_client};
use crate::entities::gathering::TargetPlatform;

pub struct ContentClient {
    http: reqwest::Client,
    callback_url: String,
}

impl ContentClient {
    pub fn new(callback_url: &str) -> Self {
        Self {
            http: http_client(),
            callback_url: callback_url.to_owned(),
        }
    }
}

#[async_trait]
impl ContentSystem for ContentClient {
    async fn notify_correlation_learned(
        &self,
        gathering_id: &str,
        platform: TargetPlatform,
        event_id: &str,
    ) -> Result<(), PlatformError> {
        let body = CorrelationWriteBack {
            gathering_id: gathering_id.to_owned(),
            platform: platform.as_str().to_owned(),
            event_id: event_id.to_owned(),
        };
        let response = self.http.post(&self.callback_url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PlatformError::UnexpectedStatus {
                status: status.as_u16(),
                body: text,
            });
        }
        debug!(gathering_id, %platform, event_id, "correlation id written back");
        Ok(())
    }
}
