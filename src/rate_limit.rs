use crate::error::{LabError, Result};
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter as GovRateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

/// Per-key limiter: a burst of `max` calls, refilled evenly across `window`.
pub struct RateLimiter<C: Clock = DefaultClock> {
    limiter: GovRateLimiter<String, DefaultKeyedStateStore<String>, C, NoOpMiddleware<C::Instant>>,
    clock: C,
}

impl RateLimiter {
    pub fn new(max: NonZeroU32, window: Duration) -> Self {
        Self::with_clock(max, window, DefaultClock::default())
    }
}

impl<C: Clock + Clone> RateLimiter<C> {
    pub fn with_clock(max: NonZeroU32, window: Duration, clock: C) -> Self {
        let quota = Quota::with_period(window / max.get())
            .map(|q| q.allow_burst(max))
            .unwrap_or_else(|| Quota::per_second(max));
        Self {
            limiter: GovRateLimiter::new(quota, DefaultKeyedStateStore::default(), clock.clone()),
            clock,
        }
    }

    pub fn check(&self, key: &str) -> Result<()> {
        match self.limiter.check_key(&key.to_string()) {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                let retry_after_secs = wait.as_secs_f64().ceil().max(1.0) as u64;
                log::warn!("Rate limit hit for '{key}', retry in {retry_after_secs}s");
                Err(LabError::RateLimited { retry_after_secs })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;

    fn limiter(max: u32, window: Duration) -> (RateLimiter<FakeRelativeClock>, FakeRelativeClock) {
        let clock = FakeRelativeClock::default();
        let max = NonZeroU32::new(max).unwrap();
        (RateLimiter::with_clock(max, window, clock.clone()), clock)
    }

    #[test]
    fn rejects_once_burst_is_spent() {
        let (limiter, _) = limiter(2, Duration::from_secs(10));
        limiter.check("u1").unwrap();
        limiter.check("u1").unwrap();
        match limiter.check("u1") {
            Err(LabError::RateLimited { retry_after_secs }) => assert!((1..=10).contains(&retry_after_secs)),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn keys_are_independent() {
        let (limiter, _) = limiter(1, Duration::from_secs(10));
        limiter.check("a").unwrap();
        limiter.check("b").unwrap();
        assert!(limiter.check("a").is_err());
    }

    #[test]
    fn capacity_returns_after_the_window() {
        let (limiter, clock) = limiter(1, Duration::from_secs(5));
        limiter.check("a").unwrap();
        clock.advance(Duration::from_secs(4));
        assert!(limiter.check("a").is_err());
        clock.advance(Duration::from_secs(1));
        limiter.check("a").unwrap();
    }

    #[test]
    fn retry_hint_is_at_least_one_second() {
        let (limiter, _) = limiter(1, Duration::from_millis(300));
        limiter.check("a").unwrap();
        assert!(matches!(limiter.check("a"), Err(LabError::RateLimited { retry_after_secs: 1 })));
    }
}
