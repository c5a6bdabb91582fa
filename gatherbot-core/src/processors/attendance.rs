//! AttendanceTracker processor.
//!
//! Tracks voice-channel presence for the duration of one active
//! session and settles rewards when the session completes: a community
//! role at thirty minutes and an engagement activity at fifteen. Both
//! checks use `>=`, so landing exactly on a threshold counts.
//!
//! The tracker is scoped to one configured voice channel. Session and
//! presence events for any other channel are ignored outright; only
//! the tracked channel's lifecycle can open or settle a session.
//! Timestamps flow in as parameters so the interval math stays
//! deterministic under test.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use gatherbot_sdk::objects::engagement::ActivityEntry;
use time::OffsetDateTime;

use crate::entities::attendance::AttendanceSession;
use crate::events::types::{PresenceUpdate, SessionPhase, SessionStatusChanged};
use crate::events::EventBus;
use crate::platforms::{CommunityPlatform, EngagementLog};

/// Minutes of attendance that earn the community role.
pub const ROLE_THRESHOLD_MINUTES: f64 = 30.0;

/// Minutes of attendance that earn an engagement activity.
pub const ACTIVITY_THRESHOLD_MINUTES: f64 = 15.0;

const ATTENDANCE_ACTIVITY_TYPE: &str = "voice-event-attendance";

/// The one session currently being tracked.
struct ActiveSession {
    name: String,
    session: AttendanceSession,
}

pub struct AttendanceTracker<P, E>
where
    P: CommunityPlatform,
    E: EngagementLog,
{
    community: Arc<P>,
    engagement: Arc<E>,
    presence_rx: broadcast::Receiver<PresenceUpdate>,
    session_rx: broadcast::Receiver<SessionStatusChanged>,
    shutdown_rx: watch::Receiver<bool>,
    /// The one voice channel whose sessions are tracked.
    tracked_channel_id: String,
    /// Role granted for thirty minutes of attendance.
    attendee_role_id: String,
    active: Option<ActiveSession>,
}

impl<P, E> AttendanceTracker<P, E>
where
    P: CommunityPlatform,
    E: EngagementLog,
{
    pub fn new(
        community: Arc<P>,
        engagement: Arc<E>,
        bus: &EventBus,
        shutdown_rx: watch::Receiver<bool>,
        tracked_channel_id: String,
        attendee_role_id: String,
    ) -> Self {
        Self {
            community,
            engagement,
            presence_rx: bus.subscribe_presence(),
            session_rx: bus.subscribe_session_status(),
            shutdown_rx,
            tracked_channel_id,
            attendee_role_id,
            active: None,
        }
    }

    /// Run the tracker until shutdown.
    pub async fn run(mut self) {
        info!("AttendanceTracker started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("AttendanceTracker received shutdown signal");
                        break;
                    }
                }

                result = self.session_rx.recv() => {
                    match result {
                        Ok(event) => {
                            self.handle_session_status(&event, OffsetDateTime::now_utc()).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "session status channel lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }

                result = self.presence_rx.recv() => {
                    match result {
                        Ok(event) => self.handle_presence(&event, OffsetDateTime::now_utc()),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "presence channel lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        info!("AttendanceTracker shutdown complete");
    }

    async fn handle_session_status(&mut self, event: &SessionStatusChanged, now: OffsetDateTime) {
        // Only the tracked channel's lifecycle concerns this tracker;
        // other channels' events must not touch the live session.
        if event.channel_id != self.tracked_channel_id {
            debug!(channel_id = %event.channel_id, "session status for an untracked channel; ignoring");
            return;
        }
        match event.phase {
            SessionPhase::Active => self.open_session(event, now).await,
            SessionPhase::Completed => self.settle_session(event, now).await,
        }
    }

    /// Start tracking: snapshot whoever is already in the channel so
    /// early arrivals are credited from the session start.
    async fn open_session(&mut self, event: &SessionStatusChanged, now: OffsetDateTime) {
        if self.active.is_some() {
            warn!(
                channel_id = %self.tracked_channel_id,
                "new session started while one was active; discarding the old one"
            );
        }

        let members = match self.community.channel_members(&self.tracked_channel_id).await {
            Ok(members) => members,
            Err(e) => {
                error!(channel_id = %self.tracked_channel_id, error = %e, "channel member snapshot failed; starting empty");
                Vec::new()
            }
        };

        info!(channel_id = %self.tracked_channel_id, seeded = members.len(), name = %event.name, "session tracking started");
        self.active = Some(ActiveSession {
            name: event.name.clone(),
            session: AttendanceSession::begin(members, now),
        });
    }

    fn handle_presence(&mut self, event: &PresenceUpdate, now: OffsetDateTime) {
        let Some(active) = &mut self.active else {
            return;
        };

        match &event.channel_id {
            Some(channel_id) if *channel_id == self.tracked_channel_id => {
                debug!(member_id = %event.member_id, "member joined tracked channel");
                active.session.record_join(&event.member_id, now);
            }
            _ => {
                // Moved elsewhere or disconnected; either way the
                // tracked interval closes.
                active.session.record_leave(&event.member_id, now);
            }
        }
    }

    /// Close the session and apply both reward thresholds per member.
    async fn settle_session(&mut self, event: &SessionStatusChanged, now: OffsetDateTime) {
        let Some(active) = self.active.take() else {
            debug!(channel_id = %event.channel_id, "completion without an active session; ignoring");
            return;
        };

        let totals = active.session.close(now);
        info!(channel_id = %event.channel_id, attendees = totals.len(), "session completed; settling attendance");

        for (member_id, minutes) in totals {
            if minutes >= ROLE_THRESHOLD_MINUTES {
                self.grant_role_if_missing(&member_id).await;
            }
            if minutes >= ACTIVITY_THRESHOLD_MINUTES {
                self.record_attendance(&member_id, &active.name, minutes, now).await;
            }
        }
    }

    async fn grant_role_if_missing(&self, member_id: &str) {
        match self
            .community
            .has_role(member_id, &self.attendee_role_id)
            .await
        {
            Ok(true) => {
                debug!(member_id, "member already carries the attendee role");
            }
            Ok(false) => {
                if let Err(e) = self
                    .community
                    .grant_role(member_id, &self.attendee_role_id)
                    .await
                {
                    error!(member_id, error = %e, "role grant failed");
                } else {
                    info!(member_id, "attendee role granted");
                }
            }
            Err(e) => {
                error!(member_id, error = %e, "role check failed; skipping grant");
            }
        }
    }

    async fn record_attendance(
        &self,
        member_id: &str,
        session_name: &str,
        minutes: f64,
        now: OffsetDateTime,
    ) {
        // One entry per member, channel and calendar day; the tracker
        // deduplicates on the key, so redelivered completions collapse.
        let entry = ActivityEntry {
            title: format!("Attended {session_name}"),
            description: format!("Attended {session_name} for {} minutes", minutes.round()),
            activity_type: ATTENDANCE_ACTIVITY_TYPE.to_owned(),
            key: format!(
                "attendance:{member_id}:{}:{}",
                self.tracked_channel_id,
                now.date()
            ),
            link: None,
        };
        if let Err(e) = self.engagement.record_activity(member_id, &entry).await {
            error!(member_id, error = %e, "engagement activity write failed");
        }
    }
}
