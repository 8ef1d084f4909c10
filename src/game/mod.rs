//! Orchestration a game screen drives: tracker, sampling, decisions and
//! generation behind one handle.

pub mod controller;
pub mod report;
pub mod signal;

pub use controller::GameController;
pub use report::{GameReport, PlanSource, RoundReport};
pub use signal::{connect_sample_source, SignalMode};
