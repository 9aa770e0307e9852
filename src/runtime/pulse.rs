use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Counts spawned pulses so a host can wait for the graph to settle.
#[derive(Clone, Default)]
pub struct PulseTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Default)]
struct TrackerInner {
    active: AtomicUsize,
    idle: Notify,
}

struct ActiveGuard(Arc<TrackerInner>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.0.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl PulseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, pulse: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard(self.inner.clone());
        tokio::spawn(async move {
            let _guard = guard;
            pulse.await;
        });
    }

    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Resolves once no spawned pulse is running, including pulses spawned
    /// while waiting.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn waits_for_nested_spawns() {
        let tracker = PulseTracker::new();
        let done = Arc::new(AtomicUsize::new(0));

        let inner_tracker = tracker.clone();
        let inner_done = done.clone();
        tracker.spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let nested_done = inner_done.clone();
            inner_tracker.spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                nested_done.fetch_add(1, Ordering::SeqCst);
            });
            inner_done.fetch_add(1, Ordering::SeqCst);
        });

        tracker.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.active(), 0);
    }
}
