//! Token-bucket pacing for gateway calls.

use std::time::Duration;

use tokio::time::Instant;

/// Token bucket that gates outbound calls.
///
/// The bucket starts full. Each [`Pacer::acquire`] takes one token, waiting
/// for a refill when empty. One token is earned per `interval`, up to
/// `capacity`. A capacity of 1 reproduces a fixed delay between calls.
#[derive(Debug)]
pub struct Pacer {
    capacity: f64,
    interval: Duration,
    tokens: f64,
    last_refill: Instant,
}

impl Pacer {
    /// A zero `capacity` is treated as 1.
    #[must_use]
    pub fn new(capacity: u32, interval: Duration) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            interval,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    /// At most one call per `delay_ms`.
    #[must_use]
    pub fn fixed_delay(delay_ms: u64) -> Self {
        Self::new(1, Duration::from_millis(delay_ms))
    }

    /// Never waits.
    #[must_use]
    pub fn unpaced() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Takes one token, sleeping until one is available.
    pub async fn acquire(&mut self) {
        if self.interval.is_zero() {
            return;
        }
        loop {
            self.refill();
            if self.tokens >= 1.0 {
                self.tokens -= 1.0;
                return;
            }
            let missing = 1.0 - self.tokens;
            let wait = self.interval.mul_f64(missing);
            tokio::time::sleep(wait).await;
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        let earned = elapsed / self.interval.as_secs_f64();
        self.tokens = (self.tokens + earned).min(self.capacity);
    }
}
