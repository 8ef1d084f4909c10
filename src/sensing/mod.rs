pub mod capture;
pub mod classifier;
pub mod clock;
pub mod controller;
pub mod gate;
pub mod loop_worker;
pub mod mock;
pub mod scheduler;

pub use capture::{CaptureDevice, Frame, SnapshotFileDevice, SyntheticDevice};
pub use classifier::{ClassifierResponse, FrameClassifier, HttpClassifier};
pub use clock::{Clock, ManualClock, TokioClock};
pub use controller::{SampleSource, SamplingOptions};
pub use gate::IntervalGate;
pub use loop_worker::TickOutcome;
pub use mock::{PlaySnapshot, SharedPlaySnapshot, SimulatedClassifier};
pub use scheduler::{every, CancelHandle};
