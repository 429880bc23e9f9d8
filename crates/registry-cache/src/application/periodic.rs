//! Interval-driven background loop with a watch-channel stop signal.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

struct RunningLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// A loop that runs `tick` on every interval until stopped. Ticks never
/// overlap: a slow tick delays the next one, and `stop` lets the tick in
/// flight finish.
pub(crate) struct PeriodicTask {
    name: &'static str,
    running: Mutex<Option<RunningLoop>>,
}

impl PeriodicTask {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            running: Mutex::new(None),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Spawn the loop. Returns `false` if it was already running.
    pub(crate) fn start<F, Fut>(&self, period: Duration, tick: F) -> bool
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut running = self.running.lock();
        if running.is_some() {
            return false;
        }
        let (shutdown, mut receiver) = watch::channel(false);
        let name = self.name;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => tick().await,
                    changed = receiver.changed() => {
                        if changed.is_err() || *receiver.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!(task = name, "Loop exited");
        });
        *running = Some(RunningLoop { shutdown, handle });
        true
    }

    /// Signal the loop and wait for it. Returns `false` if it was not
    /// running.
    pub(crate) async fn stop(&self) -> bool {
        let Some(running) = self.running.lock().take() else {
            return false;
        };
        let _ = running.shutdown.send(true);
        if let Err(e) = running.handle.await {
            warn!(task = self.name, error = %e, "Loop ended abnormally");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_start_stop() {
        let task = PeriodicTask::new("test");
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        assert!(task.start(Duration::from_millis(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));
        assert!(!task.start(Duration::from_millis(5), || async {}));
        assert!(task.is_running());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(task.stop().await);
        assert!(!task.is_running());
        assert!(!task.stop().await);

        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }
}
