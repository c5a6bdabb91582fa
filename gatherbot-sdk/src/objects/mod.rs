pub mod contributions;
pub mod engagement;
pub mod gathering;
pub mod realtime;
pub mod scheduled_event;
