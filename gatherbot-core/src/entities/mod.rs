pub mod attendance;
pub mod gathering;
