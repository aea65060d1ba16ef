//! Millisecond countdown timer and the sleep capability used between retries.

use std::time::Duration;

use tokio::time::Instant;

/// A deadline on the tokio clock.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    end: Instant,
}

impl Countdown {
    pub fn new(ms: u64) -> Self {
        Self::from_duration(Duration::from_millis(ms))
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self {
            end: Instant::now() + duration,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.end
    }

    /// Restart the countdown `ms` milliseconds from now.
    pub fn countdown_ms(&mut self, ms: u64) {
        self.end = Instant::now() + Duration::from_millis(ms);
    }

    /// Restart the countdown `secs` seconds from now.
    pub fn countdown(&mut self, secs: u64) {
        self.end = Instant::now() + Duration::from_secs(secs);
    }

    pub fn left(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }

    pub fn left_ms(&self) -> u64 {
        self.left().as_millis() as u64
    }
}

impl Default for Countdown {
    /// An already expired countdown.
    fn default() -> Self {
        Self {
            end: Instant::now(),
        }
    }
}

/// Blocking sleep used between connection retries.
#[allow(async_fn_in_trait)]
pub trait Delay {
    async fn delay_ms(&mut self, ms: u64);
}

/// [`Delay`] backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDelay;

impl Delay for TokioDelay {
    async fn delay_ms(&mut self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
