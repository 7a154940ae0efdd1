//! Sliding-window rate limiter shared by all calls to one API

use std::collections::VecDeque;
use std::time::Duration;

use kashi_core::ThrottleConfig;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Admits at most `times` calls within any `interval`
#[derive(Debug)]
pub struct Throttle {
    times: usize,
    interval: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        let times = (config.times as usize).max(1);
        Self {
            times,
            interval: Duration::from_millis(config.interval_ms),
            admitted: Mutex::new(VecDeque::with_capacity(times)),
        }
    }

    /// Wait until a call may go out
    ///
    /// A caller that finds the window full sleeps until the oldest admission
    /// leaves it, then tries again.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut admitted = self.admitted.lock().await;
                let now = Instant::now();
                while let Some(first) = admitted.front() {
                    if now.duration_since(*first) < self.interval {
                        break;
                    }
                    admitted.pop_front();
                }
                if admitted.len() < self.times {
                    admitted.push_back(now);
                    return;
                }
                let oldest = admitted.front().copied().unwrap_or(now);
                self.interval.saturating_sub(now.duration_since(oldest)) + Duration::from_millis(1)
            };
            tracing::trace!(wait_ms = wait.as_millis() as u64, "Throttled");
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_within_limit_pass_immediately() {
        let throttle = Throttle::new(ThrottleConfig::new(3, 1_000));
        let start = Instant::now();
        for _ in 0..3 {
            throttle.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extra_call_waits_for_window() {
        let throttle = Throttle::new(ThrottleConfig::new(2, 1_000));
        let start = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        throttle.acquire().await;

        // Oldest admission leaves the window after 1000ms, plus 1ms
        let elapsed = start.elapsed();
        assert!(elapsed >= ms(1_001), "waited {elapsed:?}");
        assert!(elapsed < ms(1_010), "waited {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_spread_over_windows() {
        let throttle = Arc::new(Throttle::new(ThrottleConfig::new(2, 1_000)));
        let start = Instant::now();

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let throttle = throttle.clone();
                tokio::spawn(async move {
                    throttle.acquire().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut admitted = Vec::new();
        for handle in handles {
            admitted.push(handle.await.unwrap());
        }
        admitted.sort();

        // Two per window: 0, 0, ~1001, ~1001, ~2002
        assert_eq!(admitted[0], Duration::ZERO);
        assert_eq!(admitted[1], Duration::ZERO);
        for (call, window) in [(2, 1), (3, 1), (4, 2)] {
            let floor = ms(1_001 * window);
            assert!(admitted[call] >= floor, "call {call} at {:?}", admitted[call]);
            assert!(admitted[call] < floor + ms(20), "call {call} at {:?}", admitted[call]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_times_still_admits_one() {
        let throttle = Throttle::new(ThrottleConfig::new(0, 500));
        let start = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        assert!(start.elapsed() >= ms(501));
    }
}
