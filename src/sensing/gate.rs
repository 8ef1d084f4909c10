use tokio::time::{Duration, Instant};

/// Enforces a minimum spacing between accepted classification calls,
/// independent of how often the scheduler ticks. A rejected tick is simply
/// dropped; nothing is queued for later.
#[derive(Debug, Clone)]
pub struct IntervalGate {
    min_interval: Duration,
    last_accepted: Option<Instant>,
}

impl IntervalGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn try_accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_accepted = Some(now);
        true
    }

    /// Forget the last accepted call so the next tick goes through.
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}
