//! Status reconciliation for in-flight video generation jobs.
//!
//! One [`VideoPoller`] drives a polling loop per video: a fixed-interval
//! timer bounded by a wall-clock budget, reconciling the stored record
//! against the external service through a [`StatusProbe`]. Active loops are
//! tracked in a [`PollingRegistry`] (one session per video id) with an
//! independent [`sweeper`] task as the safety net against leaked sessions.

pub mod probe;
pub mod reconciler;
pub mod registry;
pub mod sweeper;

pub use probe::{DirectProbe, ProbeError, StatusProbe, StatusSnapshot};
pub use reconciler::{PollOutcome, StartError, VideoPoller};
pub use registry::PollingRegistry;
pub use sweeper::spawn_sweeper;
