//! Application state shared across all request handlers.

use crate::config::file::WebhooksConfig;
use gatherbot_core::events::EventBus;
use gatherbot_core::platforms::StreamingClient;
use gatherbot_core::processors::NotificationDispatcher;
use std::sync::Arc;

/// Webhook authentication material, decoded once at startup.
pub struct WebhookSecrets {
    /// Shared token for the trusted (content system / community
    /// gateway) routes; `None` leaves them open.
    pub bearer_token: Option<String>,
    pub code_host_secret: Vec<u8>,
    pub relay_secret: Vec<u8>,
    pub origin_secret: Vec<u8>,
}

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// The process-wide event bus.
    pub bus: EventBus,
    /// Dispatcher shared with the realtime websocket client, so the
    /// relay route and the socket converge on the same handling.
    pub dispatcher: Arc<NotificationDispatcher<StreamingClient>>,
    pub secrets: Arc<WebhookSecrets>,
}

impl AppState {
    pub fn new(
        bus: EventBus,
        dispatcher: Arc<NotificationDispatcher<StreamingClient>>,
        webhooks: &WebhooksConfig,
    ) -> Self {
        Self {
            bus,
            dispatcher,
            secrets: Arc::new(WebhookSecrets {
                bearer_token: webhooks.bearer_token.clone(),
                code_host_secret: webhooks.github_secret.clone().into_bytes(),
                relay_secret: webhooks.relay_secret.clone().into_bytes(),
                origin_secret: webhooks.origin_secret.clone().into_bytes(),
            }),
        }
    }
}
