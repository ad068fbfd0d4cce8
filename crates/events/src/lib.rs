//! In-process video lifecycle events.

pub mod bus;

pub use bus::{EventBus, VideoEvent};
