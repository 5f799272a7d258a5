//! Bounded polling with exponential backoff
//!
//! Remote workflow runs are watched by probing their status repeatedly. The
//! probe interval grows geometrically up to a cap, and the whole loop gives up
//! once a total wait budget is spent, so a poll always terminates.

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Options for polling behavior
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffOptions {
    /// Delay before the second probe
    pub initial_delay: Duration,
    /// Maximum delay between probes
    pub max_delay: Duration,
    /// Backoff multiplier applied after every probe
    pub backoff_multiplier: f64,
    /// Total time budget across all probes
    pub max_wait: Duration,
}

impl Default for BackoffOptions {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 1.5,
            max_wait: Duration::from_secs(60 * 60),
        }
    }
}

/// Sequence of sleep intervals bounded by a total wait budget
#[derive(Debug)]
pub struct Backoff {
    options: BackoffOptions,
    next_delay: Duration,
    started: Instant,
}

impl Backoff {
    pub fn new(options: BackoffOptions) -> Self {
        Self {
            next_delay: options.initial_delay,
            options,
            started: Instant::now(),
        }
    }

    /// Time spent since the backoff started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Next delay to sleep, or `None` once the wait budget is exhausted
    ///
    /// The final delay is shortened so the budget is never overshot.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let remaining = self.options.max_wait.checked_sub(self.elapsed())?;
        if remaining.is_zero() {
            return None;
        }

        let delay = self.next_delay.min(remaining);
        // An overflowing or NaN product saturates at the cap
        self.next_delay = Duration::try_from_secs_f64(
            self.next_delay.as_secs_f64() * self.options.backoff_multiplier,
        )
        .unwrap_or(self.options.max_delay)
        .min(self.options.max_delay);

        Some(delay)
    }
}

/// Result of a bounded poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    /// The probe produced a value
    Ready(T),
    /// The wait budget ran out first
    TimedOut { waited: Duration, probes: u32 },
}

/// Poller that repeats a probe until it yields a value or time runs out
///
/// # Examples
///
/// ```no_run
/// use release_publisher::core::{BackoffOptions, PollOutcome, Poller};
///
/// # async fn example() {
/// let poller = Poller::new(BackoffOptions::default());
/// let outcome = poller.until(|| async { Some("completed") }).await;
/// assert_eq!(outcome, PollOutcome::Ready("completed"));
/// # }
/// ```
pub struct Poller {
    options: BackoffOptions,
}

impl Poller {
    pub fn new(options: BackoffOptions) -> Self {
        Self { options }
    }

    /// Probe until `probe` returns `Some`, sleeping with backoff in between
    ///
    /// The probe always runs at least once, even with a zero budget.
    pub async fn until<F, Fut, T>(&self, mut probe: F) -> PollOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let mut backoff = Backoff::new(self.options.clone());
        let mut probes = 0u32;

        loop {
            probes += 1;
            if let Some(value) = probe().await {
                return PollOutcome::Ready(value);
            }

            match backoff.next_delay() {
                Some(delay) => sleep(delay).await,
                None => {
                    return PollOutcome::TimedOut {
                        waited: backoff.elapsed(),
                        probes,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_options(max_wait: Duration) -> BackoffOptions {
        BackoffOptions {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            backoff_multiplier: 2.0,
            max_wait,
        }
    }

    #[tokio::test]
    async fn test_poll_ready_on_first_probe() {
        let poller = Poller::new(fast_options(Duration::from_secs(1)));

        let outcome = poller.until(|| async { Some(42) }).await;

        assert_eq!(outcome, PollOutcome::Ready(42));
    }

    #[tokio::test]
    async fn test_poll_ready_after_pending_probes() {
        let poller = Poller::new(fast_options(Duration::from_secs(5)));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let outcome = poller
            .until(move || {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                async move { if count < 2 { None } else { Some("completed") } }
            })
            .await;

        assert_eq!(outcome, PollOutcome::Ready("completed"));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_times_out_within_budget() {
        let poller = Poller::new(fast_options(Duration::from_millis(100)));
        let start = std::time::Instant::now();

        let outcome = poller.until(|| async { None::<()> }).await;

        let elapsed = start.elapsed();
        match outcome {
            PollOutcome::TimedOut { waited, probes } => {
                assert!(waited >= Duration::from_millis(100));
                assert!(probes >= 3, "expected several probes, got {}", probes);
            }
            PollOutcome::Ready(_) => panic!("probe never succeeds"),
        }
        assert!(
            elapsed < Duration::from_millis(1000),
            "Expected to stop near the budget, took {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_zero_budget_probes_once() {
        let poller = Poller::new(fast_options(Duration::ZERO));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let outcome = poller
            .until(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async { None::<()> }
            })
            .await;

        assert!(matches!(outcome, PollOutcome::TimedOut { probes: 1, .. }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backoff_delays_grow_and_cap() {
        let mut backoff = Backoff::new(fast_options(Duration::from_secs(10)));

        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(10)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(20)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(40)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(40)));
    }

    #[tokio::test]
    async fn test_huge_multiplier_saturates_at_max_delay() {
        for multiplier in [1.0e30, f64::INFINITY, f64::NAN] {
            let mut backoff = Backoff::new(BackoffOptions {
                backoff_multiplier: multiplier,
                ..fast_options(Duration::from_secs(10))
            });

            assert_eq!(backoff.next_delay(), Some(Duration::from_millis(10)));
            assert_eq!(backoff.next_delay(), Some(Duration::from_millis(40)));
            assert_eq!(backoff.next_delay(), Some(Duration::from_millis(40)));
        }
    }

    #[test]
    fn test_backoff_options_default() {
        let options = BackoffOptions::default();

        assert_eq!(options.initial_delay, Duration::from_secs(5));
        assert_eq!(options.max_delay, Duration::from_secs(60));
        assert_eq!(options.max_wait, Duration::from_secs(3600));
    }
}
