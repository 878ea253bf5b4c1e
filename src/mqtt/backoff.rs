use std::time::Duration;

/// Bounded exponential delay between reconnect attempts.
///
/// Attempt 1 waits `initial`; each further attempt multiplies the previous
/// delay by `multiplier`, never exceeding `max`. With `initial == max` the
/// delay is fixed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub initial: Duration,

    pub max: Duration,

    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1000),
            max: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let scaled = self.initial.as_secs_f64() * self.multiplier.powi(exponent);

        if !scaled.is_finite() || scaled >= self.max.as_secs_f64() {
            return self.max.max(self.initial);
        }

        Duration::from_secs_f64(scaled)
    }
}
