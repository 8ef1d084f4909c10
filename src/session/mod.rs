pub mod state;
pub mod tracker;

pub use state::{SampleDisposition, SessionState, TrackerStatus};
pub use tracker::{ActivityGate, SessionTracker, TrackerSnapshot};
