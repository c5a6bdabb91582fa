//! Long-lived processors driving the event flow.
//!
//! Each processor owns its receivers and runs as an independent task
//! with a `tokio::select!` loop, watching the shared shutdown channel.
//! A failure inside one processor is logged and never crosses into the
//! others.

pub mod attendance;
pub mod cover_image;
pub mod gathering_sync;
pub mod realtime;

pub use attendance::AttendanceTracker;
pub use gathering_sync::GatheringSynchronizer;
pub use realtime::{NotificationDispatcher, RealtimeClient};
