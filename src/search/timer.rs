use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// A single pending delayed task that can be replaced or cancelled.
///
/// Scheduling cancels whatever was pending before. Cancelling is idempotent:
/// cancelling twice, or after the task already fired, does nothing.
#[derive(Debug, Default)]
pub struct DebounceTimer {
    pending: Option<CancellationToken>,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay` unless cancelled or rescheduled first.
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&mut self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let token = CancellationToken::new();
        let guard = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => {}
                _ = tokio::time::sleep(delay) => task.await,
            }
        });
        self.pending = Some(token);
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new();
        timer.schedule(Duration::from_millis(500), counting_task(&fired));

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_pending_task() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new();
        timer.schedule(Duration::from_millis(500), counting_task(&first));
        tokio::time::sleep(Duration::from_millis(300)).await;
        timer.schedule(Duration::from_millis(500), counting_task(&second));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new();
        timer.schedule(Duration::from_millis(500), counting_task(&fired));
        timer.cancel();
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_is_noop() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new();
        timer.schedule(Duration::from_millis(10), counting_task(&fired));
        tokio::time::sleep(Duration::from_millis(50)).await;
        timer.cancel();
        timer.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let mut timer = DebounceTimer::new();
            timer.schedule(Duration::from_millis(100), counting_task(&fired));
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
