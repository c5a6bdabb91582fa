//! Inbound webhook routes: the trust boundary into the event bus.
//!
//! Every handler takes the raw request bytes and verifies its
//! signature scheme before any JSON decoding, since the schemes sign
//! bytes a re-serialized body would not reproduce. Authentication
//! failures are the only non-2xx the callers ever see: once a request
//! is authenticated it is acknowledged, and anything unreadable past
//! that point is logged and dropped rather than bounced back for a
//! redelivery that would fail the same way.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info, warn};

use gatherbot_core::events::types::{PresenceUpdate, SessionPhase, SessionStatusChanged};
use gatherbot_sdk::objects::contributions::PullRequestEvent;
use gatherbot_sdk::objects::gathering::GatheringEvent;
use gatherbot_sdk::objects::realtime::RelayNotification;
use gatherbot_sdk::signature::{
    CODE_HOST_SIGNATURE_HEADER, ORIGIN_MESSAGE_ID_HEADER, ORIGIN_SIGNATURE_HEADER,
    ORIGIN_TIMESTAMP_HEADER, RELAY_SIGNATURE_ALT_HEADER, RELAY_SIGNATURE_HEADER,
    verify_code_host_signature, verify_origin_signature, verify_relay_signature,
};

use crate::state::AppState;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Bearer check for the trusted routes. A configured token must match
/// exactly; no configured token leaves the route open.
fn check_bearer(state: &AppState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let Some(expected) = &state.secrets.bearer_token else {
        return Ok(());
    };
    let provided = header_str(headers, header::AUTHORIZATION.as_str());
    if provided == Some(format!("Bearer {expected}").as_str()) {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

/// `POST /webhooks/gatherings` — gathering change notifications from
/// the content system.
pub async fn receive_gathering(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Err(status) = check_bearer(&state, &headers) {
        warn!("gathering webhook rejected: bad bearer token");
        return status;
    }

    let event: GatheringEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "unreadable gathering payload; ignoring");
            return StatusCode::OK;
        }
    };

    info!(gathering_id = %event.id, status = %event.status, "gathering change received");
    state.bus.publish_gathering_changed(event);
    StatusCode::OK
}

/// Presence or session-status push from the community-platform gateway
/// bridge.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum CommunityEventBody {
    Presence {
        member_id: String,
        /// Channel the member is now in; null means they left voice.
        #[serde(default)]
        channel_id: Option<String>,
    },
    SessionStatus {
        channel_id: String,
        name: String,
        status: SessionStatusValue,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SessionStatusValue {
    Active,
    Completed,
}

/// `POST /webhooks/community-events` — voice presence and scheduled
/// event lifecycle signals, same trust level as the gatherings route.
pub async fn receive_community_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Err(status) = check_bearer(&state, &headers) {
        warn!("community event webhook rejected: bad bearer token");
        return status;
    }

    let event: CommunityEventBody = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "unreadable community event payload; ignoring");
            return StatusCode::OK;
        }
    };

    match event {
        CommunityEventBody::Presence {
            member_id,
            channel_id,
        } => {
            debug!(%member_id, ?channel_id, "presence update received");
            state.bus.publish_presence(PresenceUpdate {
                member_id,
                channel_id,
            });
        }
        CommunityEventBody::SessionStatus {
            channel_id,
            name,
            status,
        } => {
            let phase = match status {
                SessionStatusValue::Active => SessionPhase::Active,
                SessionStatusValue::Completed => SessionPhase::Completed,
            };
            info!(%channel_id, %name, ?phase, "session status change received");
            state.bus.publish_session_status(SessionStatusChanged {
                channel_id,
                name,
                phase,
            });
        }
    }
    StatusCode::OK
}

/// `POST /webhooks/github` — pull request notifications from the code
/// host, HMAC-SHA1 over the raw body.
pub async fn receive_code_host(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = header_str(&headers, CODE_HOST_SIGNATURE_HEADER);
    if let Err(e) = verify_code_host_signature(&state.secrets.code_host_secret, &body, signature) {
        warn!(error = %e, "code host webhook rejected");
        return StatusCode::UNAUTHORIZED;
    }

    let event: PullRequestEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "unreadable pull request payload; ignoring");
            return StatusCode::OK;
        }
    };

    // Only merged PRs become contribution events; everything else is
    // acknowledged and dropped.
    if event.action == "closed" && event.pull_request.merged {
        let repository = event
            .repository
            .as_ref()
            .map(|r| r.full_name.as_str())
            .unwrap_or("unknown");
        info!(
            number = event.pull_request.number,
            repository, "merged pull request received"
        );
        state.bus.publish_pull_request_merged(event);
    }
    StatusCode::OK
}

/// `POST /webhooks/platform-relay` — streaming-platform notifications
/// forwarded by the transport relay. Both the relay signature and the
/// platform's own origin signature must verify; a payload that passes
/// one but not the other is rejected.
pub async fn receive_platform_relay(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let relay_primary = header_str(&headers, RELAY_SIGNATURE_HEADER);
    let relay_secondary = header_str(&headers, RELAY_SIGNATURE_ALT_HEADER);
    if let Err(e) =
        verify_relay_signature(&state.secrets.relay_secret, &body, relay_primary, relay_secondary)
    {
        warn!(error = %e, "relay signature rejected");
        return StatusCode::UNAUTHORIZED;
    }

    let message_id = header_str(&headers, ORIGIN_MESSAGE_ID_HEADER).unwrap_or_default();
    let timestamp = header_str(&headers, ORIGIN_TIMESTAMP_HEADER).unwrap_or_default();
    let origin_signature = header_str(&headers, ORIGIN_SIGNATURE_HEADER);
    if let Err(e) = verify_origin_signature(
        &state.secrets.origin_secret,
        message_id,
        timestamp,
        &body,
        origin_signature,
    ) {
        warn!(error = %e, "origin signature rejected");
        return StatusCode::UNAUTHORIZED;
    }

    // Authenticated. Anything unreadable past this point is a protocol
    // anomaly: logged and ignored, never surfaced to the caller.
    let notification: RelayNotification = match serde_json::from_slice(&body) {
        Ok(notification) => notification,
        Err(e) => {
            warn!(error = %e, "unreadable relay notification; ignoring");
            return StatusCode::OK;
        }
    };

    // Dispatch off the request path so slow enrichment never delays the
    // acknowledgement the relay is waiting for.
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        dispatcher
            .dispatch(&notification.subscription.kind, notification.event.as_ref())
            .await;
    });
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::WebhooksConfig;
    use gatherbot_core::events::EventBus;
    use gatherbot_core::platforms::StreamingClient;
    use gatherbot_core::processors::NotificationDispatcher;
    use std::sync::Arc;

    const GITHUB_SECRET: &[u8] = b"gh-secret";
    const RELAY_SECRET: &[u8] = b"relay-secret";
    const ORIGIN_SECRET: &[u8] = b"origin-secret";

    fn test_state(bearer_token: Option<&str>) -> AppState {
        let bus = EventBus::new();
        let streaming = Arc::new(StreamingClient::new(
            "https://streaming.invalid",
            "client",
            "token",
            "chan",
            "mod",
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            streaming,
            gatherbot_core::cache::Cache::new(),
            bus.clone(),
        ));
        AppState::new(
            bus,
            dispatcher,
            &WebhooksConfig {
                bearer_token: bearer_token.map(str::to_owned),
                github_secret: String::from_utf8_lossy(GITHUB_SECRET).into_owned(),
                relay_secret: String::from_utf8_lossy(RELAY_SECRET).into_owned(),
                origin_secret: String::from_utf8_lossy(ORIGIN_SECRET).into_owned(),
            },
        )
    }

    fn sha1_header(secret: &[u8], body: &[u8]) -> String {
        let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret);
        format!("sha1={}", hex::encode(ring::hmac::sign(&key, body).as_ref()))
    }

    fn relay_header(secret: &[u8], body: &[u8]) -> String {
        let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret);
        fast32::base64::RFC4648.encode(ring::hmac::sign(&key, body).as_ref())
    }

    fn origin_header(secret: &[u8], message_id: &str, timestamp: &str, body: &[u8]) -> String {
        let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret);
        let mut ctx = ring::hmac::Context::with_key(&key);
        ctx.update(message_id.as_bytes());
        ctx.update(timestamp.as_bytes());
        ctx.update(body);
        format!("sha256={}", hex::encode(ctx.sign().as_ref()))
    }

    const GATHERING_BODY: &[u8] = br#"{
        "id": "g1",
        "name": "Friday Live Build",
        "type": "Stream",
        "status": "Scheduled",
        "starts_at": "2024-06-07T16:00:00Z",
        "ends_at": "2024-06-07T18:00:00Z"
    }"#;

    #[tokio::test]
    async fn gathering_route_publishes_on_valid_token() {
        let state = test_state(Some("trusted"));
        let mut rx = state.bus.subscribe_gathering_changed();

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer trusted".parse().unwrap());
        let status = receive_gathering(
            State(state),
            headers,
            Bytes::from_static(GATHERING_BODY),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(rx.recv().await.unwrap().id, "g1");
    }

    #[tokio::test]
    async fn gathering_route_rejects_bad_token() {
        let state = test_state(Some("trusted"));
        let mut rx = state.bus.subscribe_gathering_changed();

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer wrong".parse().unwrap());
        let status = receive_gathering(
            State(state),
            headers,
            Bytes::from_static(GATHERING_BODY),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unreadable_gathering_body_is_acknowledged_and_dropped() {
        let state = test_state(None);
        let mut rx = state.bus.subscribe_gathering_changed();
        let status =
            receive_gathering(State(state), HeaderMap::new(), Bytes::from_static(b"not json"))
                .await;
        assert_eq!(status, StatusCode::OK);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unreadable_code_host_body_is_acknowledged_and_dropped() {
        let state = test_state(None);
        let mut rx = state.bus.subscribe_pull_request_merged();
        let body: &[u8] = b"not json";
        let mut headers = HeaderMap::new();
        headers.insert(
            CODE_HOST_SIGNATURE_HEADER,
            sha1_header(GITHUB_SECRET, body).parse().unwrap(),
        );
        let status = receive_code_host(State(state), headers, Bytes::from_static(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn community_event_route_publishes_presence() {
        let state = test_state(None);
        let mut rx = state.bus.subscribe_presence();

        let body = br#"{"kind": "presence", "member_id": "m1", "channel_id": "voice-1"}"#;
        let status = receive_community_event(
            State(state),
            HeaderMap::new(),
            Bytes::from_static(body),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let update = rx.recv().await.unwrap();
        assert_eq!(update.member_id, "m1");
        assert_eq!(update.channel_id.as_deref(), Some("voice-1"));
    }

    #[tokio::test]
    async fn community_event_route_publishes_session_status() {
        let state = test_state(None);
        let mut rx = state.bus.subscribe_session_status();

        let body = br#"{
            "kind": "session_status",
            "channel_id": "voice-1",
            "name": "Morning Standup",
            "status": "completed"
        }"#;
        let status = receive_community_event(
            State(state),
            HeaderMap::new(),
            Bytes::from_static(body),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(rx.recv().await.unwrap().phase, SessionPhase::Completed);
    }

    #[tokio::test]
    async fn code_host_route_publishes_merged_pull_requests() {
        let state = test_state(None);
        let mut rx = state.bus.subscribe_pull_request_merged();

        let body = br#"{
            "action": "closed",
            "pull_request": {
                "number": 7,
                "title": "Fix reconnect backoff",
                "merged": true,
                "user": {"login": "contributor"}
            },
            "repository": {"full_name": "community/bot"}
        }"#;
        let mut headers = HeaderMap::new();
        headers.insert(
            CODE_HOST_SIGNATURE_HEADER,
            sha1_header(GITHUB_SECRET, body).parse().unwrap(),
        );
        let status =
            receive_code_host(State(state), headers, Bytes::from_static(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(rx.recv().await.unwrap().pull_request.number, 7);
    }

    #[tokio::test]
    async fn code_host_route_rejects_tampered_body() {
        let state = test_state(None);
        let mut headers = HeaderMap::new();
        headers.insert(
            CODE_HOST_SIGNATURE_HEADER,
            sha1_header(GITHUB_SECRET, b"original").parse().unwrap(),
        );
        let status =
            receive_code_host(State(state), headers, Bytes::from_static(b"tampered")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unmerged_pull_request_is_acknowledged_but_not_published() {
        let state = test_state(None);
        let mut rx = state.bus.subscribe_pull_request_merged();

        let body = br#"{
            "action": "closed",
            "pull_request": {
                "number": 8,
                "title": "Abandoned idea",
                "merged": false,
                "user": {"login": "contributor"}
            },
            "repository": {"full_name": "community/bot"}
        }"#;
        let mut headers = HeaderMap::new();
        headers.insert(
            CODE_HOST_SIGNATURE_HEADER,
            sha1_header(GITHUB_SECRET, body).parse().unwrap(),
        );
        let status =
            receive_code_host(State(state), headers, Bytes::from_static(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(rx.try_recv().is_err());
    }

    const RELAY_BODY: &[u8] = br#"{"subscription": {"type": "channel.cheer"}, "event": {}}"#;
    const MESSAGE_ID: &str = "msg-1";
    const TIMESTAMP: &str = "2024-06-07T16:00:00Z";

    fn relay_headers(valid_relay: bool, valid_origin: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let relay = if valid_relay {
            relay_header(RELAY_SECRET, RELAY_BODY)
        } else {
            "bogus".to_owned()
        };
        headers.insert(RELAY_SIGNATURE_HEADER, relay.parse().unwrap());
        headers.insert(ORIGIN_MESSAGE_ID_HEADER, MESSAGE_ID.parse().unwrap());
        headers.insert(ORIGIN_TIMESTAMP_HEADER, TIMESTAMP.parse().unwrap());
        let origin = if valid_origin {
            origin_header(ORIGIN_SECRET, MESSAGE_ID, TIMESTAMP, RELAY_BODY)
        } else {
            "sha256=bogus".to_owned()
        };
        headers.insert(ORIGIN_SIGNATURE_HEADER, origin.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn relay_route_accepts_when_both_signatures_verify() {
        let state = test_state(None);
        let status = receive_platform_relay(
            State(state),
            relay_headers(true, true),
            Bytes::from_static(RELAY_BODY),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn relay_route_requires_both_signatures() {
        // Valid relay signature alone is not enough, and neither is a
        // valid origin signature alone.
        let state = test_state(None);
        let status = receive_platform_relay(
            State(state),
            relay_headers(true, false),
            Bytes::from_static(RELAY_BODY),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let state = test_state(None);
        let status = receive_platform_relay(
            State(state),
            relay_headers(false, true),
            Bytes::from_static(RELAY_BODY),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn relay_route_accepts_rotated_secondary_header() {
        let state = test_state(None);
        let mut headers = relay_headers(false, true);
        headers.insert(
            RELAY_SIGNATURE_ALT_HEADER,
            relay_header(RELAY_SECRET, RELAY_BODY).parse().unwrap(),
        );
        let status =
            receive_platform_relay(State(state), headers, Bytes::from_static(RELAY_BODY)).await;
        assert_eq!(status, StatusCode::OK);
    }
}
