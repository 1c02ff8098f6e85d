//! Polling parameters and the sleep seam.
//!
//! The orchestrator's poll loop is a bounded retry with a fixed delay. The
//! delay goes through the [`Sleeper`] trait so tests can drive the loop
//! without real time.

use async_trait::async_trait;
use std::time::Duration;

/// Bounded-retry parameters for job polling.
///
/// The defaults give a ceiling of roughly 48 seconds per generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between consecutive status queries
    pub interval: Duration,
    /// Number of status queries before the poll gives up
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(800),
            max_attempts: 60,
        }
    }
}

/// The delay between poll iterations.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
