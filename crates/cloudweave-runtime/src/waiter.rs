//! Fixed-interval polling
//!
//! Providers are polled at a steady rate; there is no backoff. The caller's
//! check decides what counts as done, still pending, or a hard failure.

use crate::error::{Result, RuntimeError};
use cloudweave_config::WaitSpec;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Polling cursor created per wait
#[derive(Debug)]
pub struct Waiter {
    interval: Duration,
    timeout: Duration,
    started: Instant,
}

impl Waiter {
    pub fn new(interval_secs: u64, timeout_secs: u64) -> Self {
        Self::from_spec(&WaitSpec::new(interval_secs, timeout_secs))
    }

    pub fn from_spec(spec: &WaitSpec) -> Self {
        Self {
            interval: spec.interval(),
            timeout: spec.timeout(),
            started: Instant::now(),
        }
    }

    /// Sleeps one interval; `false` once the total wait exceeds the timeout
    pub async fn wait(&mut self) -> bool {
        sleep(self.interval).await;
        self.started.elapsed() <= self.timeout
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Runs `check` until it yields a value, an error, or the budget runs out
///
/// `check` returns `Ok(None)` while the target state is not reached yet.
pub async fn poll_until<T, F, Fut>(spec: &WaitSpec, what: &str, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let mut waiter = Waiter::from_spec(spec);
    loop {
        if let Some(value) = check().await? {
            return Ok(value);
        }
        if !waiter.wait().await {
            tracing::error!(
                "Timed out waiting for {} after {:?}",
                what,
                waiter.elapsed()
            );
            return Err(RuntimeError::Timeout(format!(
                "{} (waited {}s)",
                what, spec.timeout_secs
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_timeout() {
        let mut waiter = Waiter::new(1, 3);
        assert!(waiter.wait().await);
        assert!(waiter.wait().await);
        assert!(waiter.wait().await);
        assert!(!waiter.wait().await);
        assert_eq!(waiter.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_ready() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let value = poll_until(&WaitSpec::new(2, 60), "vm running", || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Ok((n == 2).then_some("203.0.113.1"))
            }
        })
        .await
        .unwrap();
        assert_eq!(value, "203.0.113.1");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_times_out() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = poll_until::<(), _, _>(&WaitSpec::new(1, 3), "disk attach", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Timeout(ref msg) if msg.contains("disk attach")));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_propagates_errors() {
        let err = poll_until::<(), _, _>(&WaitSpec::new(1, 10), "vm status", || async {
            Err(RuntimeError::NotFound("vm".into()))
        })
        .await
        .unwrap_err();
        assert!(err.is_not_found());
    }
}
