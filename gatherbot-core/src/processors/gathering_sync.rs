//! GatheringSynchronizer processor.
//!
//! Consumes `GatheringChanged` events and reconciles each gathering
//! onto the community and streaming platforms independently. The
//! decision per platform hangs entirely on whether the gathering
//! already carries that platform's correlation id:
//!
//! * absent id -> create the remote event, write the assigned id back
//!   to the content system, publish `CorrelationUpdated`
//! * present id -> fetch the remote event; halt if it vanished,
//!   cancel it if the gathering was canceled, update it otherwise
//!
//! Branching on correlation-id presence (never on any "seen before"
//! flag) is what makes redelivered change events converge instead of
//! duplicating remote resources.

use std::sync::Arc;

use gatherbot_sdk::objects::gathering::GatheringEvent;
use gatherbot_sdk::objects::scheduled_event::{EventVenue, ScheduledEventDraft};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::entities::gathering::{Gathering, GatheringKind, GatheringStatus, TargetPlatform};
use crate::events::types::CorrelationUpdated;
use crate::events::EventBus;
use crate::platforms::{ContentSystem, PlatformError, ScheduledEventHost};

use super::cover_image::{cover_image_url, fetch_cover_image};

/// Errors from a single platform reconciliation pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Platform call failed; redelivery retries the whole pass.
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    /// A known correlation id no longer resolves remotely. Surfaced,
    /// never papered over with a recreate.
    #[error("remote event {event_id} not found on {platform}")]
    RemoteMissing {
        platform: TargetPlatform,
        event_id: String,
    },
}

pub struct GatheringSynchronizer<C, S, N>
where
    C: ScheduledEventHost,
    S: ScheduledEventHost,
    N: ContentSystem,
{
    community: Arc<C>,
    streaming: Arc<S>,
    content: Arc<N>,
    bus: EventBus,
    gathering_rx: broadcast::Receiver<GatheringEvent>,
    shutdown_rx: watch::Receiver<bool>,
    http: reqwest::Client,
    /// Location string used for external/stream events.
    stream_location: String,
    /// Voice channel hosting meetup events on the community platform.
    meetup_channel_id: String,
    cover_images_enabled: bool,
}

impl<C, S, N> GatheringSynchronizer<C, S, N>
where
    C: ScheduledEventHost,
    S: ScheduledEventHost,
    N: ContentSystem,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        community: Arc<C>,
        streaming: Arc<S>,
        content: Arc<N>,
        bus: EventBus,
        shutdown_rx: watch::Receiver<bool>,
        stream_location: String,
        meetup_channel_id: String,
        cover_images_enabled: bool,
    ) -> Self {
        let gathering_rx = bus.subscribe_gathering_changed();
        Self {
            community,
            streaming,
            content,
            bus,
            gathering_rx,
            shutdown_rx,
            http: crate::platforms::http_client(),
            stream_location,
            meetup_channel_id,
            cover_images_enabled,
        }
    }

    /// Run the synchronizer until shutdown.
    pub async fn run(mut self) {
        info!("GatheringSynchronizer started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("GatheringSynchronizer received shutdown signal");
                        break;
                    }
                }

                result = self.gathering_rx.recv() => {
                    match result {
                        Ok(event) => self.reconcile(&event).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "gathering channel lagged; events dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!("gathering channel closed");
                            break;
                        }
                    }
                }
            }
        }

        info!("GatheringSynchronizer shutdown complete");
    }

    /// Reconcile one gathering onto both target platforms.
    pub async fn reconcile(&self, event: &GatheringEvent) {
        let gathering = Gathering::from_wire(event);

        let Some(kind) = gathering.kind else {
            debug!(gathering_id = %gathering.id, kind = %event.kind, "kind not externally representable; skipping");
            return;
        };
        if !gathering.has_required_bounds() {
            debug!(gathering_id = %gathering.id, "missing required time bounds; skipping");
            return;
        }
        let Some(draft) = self.build_draft(&gathering, kind).await else {
            return;
        };

        if let Err(e) = self
            .reconcile_platform(self.community.as_ref(), &gathering, &draft)
            .await
        {
            error!(gathering_id = %gathering.id, platform = %TargetPlatform::Community, error = %e, "reconciliation failed");
        }
        if let Err(e) = self
            .reconcile_platform(self.streaming.as_ref(), &gathering, &draft)
            .await
        {
            error!(gathering_id = %gathering.id, platform = %TargetPlatform::Streaming, error = %e, "reconciliation failed");
        }
    }

    /// Build the platform draft, attaching a cover image when one can
    /// be fetched. Image failures degrade to an imageless draft.
    async fn build_draft(
        &self,
        gathering: &Gathering,
        kind: GatheringKind,
    ) -> Option<ScheduledEventDraft> {
        let starts_at = gathering.starts_at?;
        let venue = match kind {
            GatheringKind::Stream => EventVenue::External {
                location: self.stream_location.clone(),
            },
            GatheringKind::VoiceMeetup => EventVenue::Channel {
                channel_id: self.meetup_channel_id.clone(),
            },
        };

        let cover_image = if self.cover_images_enabled {
            let url = cover_image_url(kind, &gathering.name);
            match fetch_cover_image(&self.http, &url).await {
                Ok(data_uri) => Some(data_uri),
                Err(e) => {
                    error!(gathering = %gathering.name, error = %e, "cover image fetch failed; continuing without one");
                    None
                }
            }
        } else {
            None
        };

        Some(ScheduledEventDraft {
            name: gathering.name.clone(),
            description: gathering.description.clone(),
            starts_at,
            ends_at: gathering.ends_at,
            venue,
            cover_image,
        })
    }

    async fn reconcile_platform<H: ScheduledEventHost + ?Sized>(
        &self,
        host: &H,
        gathering: &Gathering,
        draft: &ScheduledEventDraft,
    ) -> Result<(), SyncError> {
        match gathering.correlation_id(host.platform()) {
            None => self.create_remote(host, gathering, draft).await,
            Some(event_id) => self.refresh_remote(host, gathering, event_id, draft).await,
        }
    }

    async fn create_remote<H: ScheduledEventHost + ?Sized>(
        &self,
        host: &H,
        gathering: &Gathering,
        draft: &ScheduledEventDraft,
    ) -> Result<(), SyncError> {
        let platform = host.platform();
        // On failure the correlation id stays absent, so a redelivered
        // change event retries the create.
        let event_id = host.create_scheduled_event(draft).await?;
        info!(gathering_id = %gathering.id, %platform, event_id, "created scheduled event");

        if let Err(e) = self
            .content
            .notify_correlation_learned(&gathering.id, platform, &event_id)
            .await
        {
            error!(gathering_id = %gathering.id, %platform, error = %e, "correlation write-back failed");
        }
        self.bus.publish_correlation_updated(CorrelationUpdated {
            gathering_id: gathering.id.clone(),
            platform,
            event_id,
        });
        Ok(())
    }

    async fn refresh_remote<H: ScheduledEventHost + ?Sized>(
        &self,
        host: &H,
        gathering: &Gathering,
        event_id: &str,
        draft: &ScheduledEventDraft,
    ) -> Result<(), SyncError> {
        let platform = host.platform();
        let Some(remote) = host.get_scheduled_event(event_id).await? else {
            return Err(SyncError::RemoteMissing {
                platform,
                event_id: event_id.to_owned(),
            });
        };

        if gathering.status == GatheringStatus::Canceled {
            host.cancel_scheduled_event(&remote.id).await?;
            info!(gathering_id = %gathering.id, %platform, event_id, "canceled scheduled event");
        } else {
            host.update_scheduled_event(&remote.id, draft).await?;
            info!(gathering_id = %gathering.id, %platform, event_id, "updated scheduled event");
        }
        Ok(())
    }
}
