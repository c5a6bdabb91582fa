//! Attendance interval accounting for one live session window.
//!
//! `accumulated_minutes` only ever holds closed join/leave intervals;
//! the open interval (when `joined_at` is set) is added lazily when the
//! total is read, so it can never be double-counted. Timestamps are
//! passed in by the caller, which keeps the math deterministic under
//! test.

use std::collections::HashMap;

use time::OffsetDateTime;

/// Per-member attendance state within one session.
#[derive(Debug, Clone, Default)]
pub struct AttendanceRecord {
    /// Set iff the member is currently in the channel.
    pub joined_at: Option<OffsetDateTime>,
    /// Minutes from closed intervals only. Monotonically non-decreasing
    /// while the session is active.
    pub accumulated_minutes: f64,
}

impl AttendanceRecord {
    /// Total minutes including the still-open interval, if any.
    pub fn total_minutes(&self, now: OffsetDateTime) -> f64 {
        match self.joined_at {
            Some(joined_at) => self.accumulated_minutes + minutes_between(joined_at, now),
            None => self.accumulated_minutes,
        }
    }
}

/// Attendee map for the one active session on the tracked channel.
#[derive(Debug, Default)]
pub struct AttendanceSession {
    attendees: HashMap<String, AttendanceRecord>,
}

impl AttendanceSession {
    /// Open a session, seeding a record for every member already in the
    /// channel. Their interval opens now and closes at completion even
    /// if they never produce a presence event.
    pub fn begin(members: impl IntoIterator<Item = String>, now: OffsetDateTime) -> Self {
        let attendees = members
            .into_iter()
            .map(|member_id| {
                (
                    member_id,
                    AttendanceRecord {
                        joined_at: Some(now),
                        accumulated_minutes: 0.0,
                    },
                )
            })
            .collect();
        Self { attendees }
    }

    pub fn len(&self) -> usize {
        self.attendees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attendees.is_empty()
    }

    /// A member entered the tracked channel. Re-joining keeps the
    /// minutes already accumulated.
    pub fn record_join(&mut self, member_id: &str, now: OffsetDateTime) {
        let record = self.attendees.entry(member_id.to_owned()).or_default();
        record.joined_at = Some(now);
    }

    /// A member left the tracked channel: close their open interval.
    pub fn record_leave(&mut self, member_id: &str, now: OffsetDateTime) {
        let record = self.attendees.entry(member_id.to_owned()).or_default();
        if let Some(joined_at) = record.joined_at.take() {
            record.accumulated_minutes += minutes_between(joined_at, now);
        }
    }

    /// Close every open interval and drain the session, yielding each
    /// member's final total.
    pub fn close(self, now: OffsetDateTime) -> Vec<(String, f64)> {
        self.attendees
            .into_iter()
            .map(|(member_id, record)| {
                let total = record.total_minutes(now);
                (member_id, total)
            })
            .collect()
    }
}

fn minutes_between(from: OffsetDateTime, to: OffsetDateTime) -> f64 {
    (to - from).as_seconds_f64() / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-06-07 16:00 UTC);

    #[test]
    fn intervals_accumulate_across_rejoins() {
        // Join at t0, leave at +10m, rejoin at +20m, session ends at +40m.
        let mut session = AttendanceSession::begin(["alice".to_owned()], T0);
        session.record_leave("alice", T0 + Duration::minutes(10));
        session.record_join("alice", T0 + Duration::minutes(20));

        let totals = session.close(T0 + Duration::minutes(40));
        let (_, minutes) = totals.into_iter().find(|(m, _)| m == "alice").unwrap();
        assert!((minutes - 30.0).abs() < 1e-9);
    }

    #[test]
    fn member_present_at_start_is_credited_for_the_full_window() {
        let session = AttendanceSession::begin(["bob".to_owned()], T0);
        let totals = session.close(T0 + Duration::minutes(45));
        assert!((totals[0].1 - 45.0).abs() < 1e-9);
    }

    #[test]
    fn rejoin_does_not_reset_accumulated_minutes() {
        let mut session = AttendanceSession::begin(["carol".to_owned()], T0);
        session.record_leave("carol", T0 + Duration::minutes(12));
        session.record_join("carol", T0 + Duration::minutes(30));
        session.record_leave("carol", T0 + Duration::minutes(35));

        let totals = session.close(T0 + Duration::minutes(60));
        assert!((totals[0].1 - 17.0).abs() < 1e-9);
    }

    #[test]
    fn duplicate_leave_is_a_no_op() {
        let mut session = AttendanceSession::begin(["dave".to_owned()], T0);
        session.record_leave("dave", T0 + Duration::minutes(5));
        session.record_leave("dave", T0 + Duration::minutes(9));

        let totals = session.close(T0 + Duration::minutes(40));
        assert!((totals[0].1 - 5.0).abs() < 1e-9);
    }

    #[test]
    fn open_interval_is_never_double_counted() {
        let mut session = AttendanceSession::begin(["erin".to_owned()], T0);
        session.record_join("erin", T0 + Duration::minutes(1));
        session.record_join("erin", T0 + Duration::minutes(2));

        let totals = session.close(T0 + Duration::minutes(10));
        assert!((totals[0].1 - 8.0).abs() < 1e-9);
    }
}
