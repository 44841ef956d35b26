//! Shared call-rate limiter.
//!
//! One instance is created per external API surface and cloned (via `Arc`)
//! into every component that calls that surface, so the configured rate is an
//! aggregate across all concurrently processed items.

use crate::error::{Result, YtsumError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Generic cell rate limiter.
///
/// Admits one call per `interval`, with up to `burst` calls admitted
/// back-to-back when the limiter has been idle. Callers over budget are
/// suspended until their slot, never rejected.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    interval: Duration,
    tolerance: Duration,
    /// Theoretical arrival time of the next conforming call.
    tat: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter admitting `calls_per_second` on average.
    pub fn new(name: &str, calls_per_second: f64, burst: u32) -> Result<Self> {
        if !calls_per_second.is_finite() || calls_per_second <= 0.0 {
            return Err(YtsumError::Config(format!(
                "rate for '{}' must be a positive number, got {}",
                name, calls_per_second
            )));
        }
        Ok(Self::with_interval(
            name,
            Duration::from_secs_f64(1.0 / calls_per_second),
            burst,
        ))
    }

    /// Create a limiter admitting one call per `interval`.
    pub fn with_interval(name: &str, interval: Duration, burst: u32) -> Self {
        let burst = burst.max(1);
        Self {
            name: name.to_string(),
            interval,
            tolerance: interval * (burst - 1),
            tat: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the shared budget admits one more call.
    pub async fn acquire(&self) {
        let slot = {
            let mut tat = self.tat.lock().await;
            let now = Instant::now();
            let current = match *tat {
                Some(t) if t > now => t,
                _ => now,
            };
            let slot = current
                .checked_sub(self.tolerance)
                .filter(|earliest| *earliest > now)
                .unwrap_or(now);
            *tat = Some(current + self.interval);
            slot
        };

        let now = Instant::now();
        if slot > now {
            trace!(limiter = %self.name, wait_ms = (slot - now).as_millis() as u64, "throttling call");
            tokio::time::sleep_until(slot).await;
        }
    }
}
