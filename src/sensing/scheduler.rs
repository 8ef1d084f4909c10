use std::future::Future;

use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Handle to a periodic task started with [`every`]. Dropping it does not
/// stop the task; call [`CancelHandle::cancel`].
#[derive(Debug)]
pub struct CancelHandle {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel and wait for the current tick body to unwind.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// Run `tick` every `period` until cancelled. The body is awaited inline,
/// so two bodies never overlap; a slow body delays the next tick instead of
/// stacking them up.
pub fn every<F, Fut>(period: Duration, token: CancellationToken, mut tick: F) -> CancelHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let loop_token = token.clone();
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = tick() => {}
                        _ = loop_token.cancelled() => break,
                    }
                }
                _ = loop_token.cancelled() => break,
            }
        }
    });

    CancelHandle {
        token,
        handle: Some(handle),
    }
}
