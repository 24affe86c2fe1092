use std::thread;
use std::time::Duration;

/// Controls the rate of requests sent to a rate limited node
pub trait Pacer {
    /// Called before every request is sent
    fn before_request(&mut self);

    /// Called before retry number `attempt` (starting at 1) of a rate limited request
    fn before_retry(&mut self, attempt: u32);
}

/// Sends requests in batches, sleeping for a cooldown between batches
#[derive(Debug, Clone)]
pub struct BatchPacer {
    batch_size: usize,
    cooldown: Duration,
    sent: usize,
}

impl BatchPacer {
    pub fn new(batch_size: usize, cooldown: Duration) -> Self {
        BatchPacer {
            batch_size: batch_size.max(1),
            cooldown,
            sent: 0,
        }
    }

    /// Pause owed before the next request, if it starts a new batch
    fn next_delay(&mut self) -> Option<Duration> {
        let starts_batch = self.sent > 0 && self.sent % self.batch_size == 0;
        self.sent += 1;
        starts_batch.then_some(self.cooldown)
    }

    /// Exponential backoff, starting at one cooldown
    fn retry_delay(&self, attempt: u32) -> Duration {
        self.cooldown * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Pacer for BatchPacer {
    fn before_request(&mut self) {
        if let Some(delay) = self.next_delay() {
            log::info!(
                "Sent {} requests, waiting {:?} before next batch",
                self.sent - 1,
                delay
            );
            thread::sleep(delay);
        }
    }

    fn before_retry(&mut self, attempt: u32) {
        let delay = self.retry_delay(attempt);
        log::warn!("Rate limited, retry {} in {:?}", attempt, delay);
        thread::sleep(delay);
    }
}

/// Sends requests back to back
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

#[cfg(test)]
impl Pacer for NoPacing {
    fn before_request(&mut self) {}

    fn before_retry(&mut self, _attempt: u32) {}
}
