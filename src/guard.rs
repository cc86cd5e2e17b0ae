//! Per-caller submission rate limiting.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{Result, SearchError};

/// Rejects a caller's submission that follows its previous one too closely.
#[derive(Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    last_seen: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Admits `caller` unless it was admitted less than one cooldown ago.
    ///
    /// Rejected attempts do not restart the cooldown.
    pub async fn check(&self, caller: &str) -> Result<()> {
        let now = Instant::now();
        let mut last_seen = self.last_seen.lock().await;
        if let Some(previous) = last_seen.get(caller) {
            if now.duration_since(*previous) < self.cooldown {
                return Err(SearchError::RateLimited);
            }
        }
        last_seen.insert(caller.to_string(), now);
        Ok(())
    }

    /// Forgets callers whose cooldown has passed.
    pub async fn sweep(&self) -> usize {
        let mut last_seen = self.last_seen.lock().await;
        let before = last_seen.len();
        last_seen.retain(|_, seen| seen.elapsed() < self.cooldown);
        before - last_seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_rejects_within_cooldown() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        assert_ok!(limiter.check("client-a").await);

        tokio::time::advance(Duration::from_millis(500)).await;
        let result = limiter.check("client-a").await;
        assert!(matches!(result, Err(SearchError::RateLimited)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_admits_after_cooldown() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        assert_ok!(limiter.check("client-a").await);
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_ok!(limiter.check("client-a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_rejection_does_not_extend_cooldown() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        assert_ok!(limiter.check("client-a").await);
        tokio::time::advance(Duration::from_millis(900)).await;
        assert_err!(limiter.check("client-a").await);
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_ok!(limiter.check("client-a").await);
    }

    #[tokio::test]
    async fn test_rate_limiter_callers_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        assert_ok!(limiter.check("client-a").await);
        assert_ok!(limiter.check("client-b").await);
        assert_err!(limiter.check("client-a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_sweep() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        assert_ok!(limiter.check("client-a").await);
        assert_ok!(limiter.check("client-b").await);
        assert_eq!(limiter.sweep().await, 0);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(limiter.sweep().await, 2);
    }
}
