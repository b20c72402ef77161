use std::time::Duration;

/// Exponential backoff with jitter for the reconnect loop (§4.7.5:
/// initial 1s, cap 60s, jitter 10%). Deterministic given a seed so
/// tests don't depend on real randomness.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    cap: Duration,
    jitter: f64,
    attempt: u32,
    seed: u64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, cap: Duration, jitter: f64) -> Self {
        ExponentialBackoff {
            initial,
            cap,
            jitter,
            attempt: 0,
            seed: 0x9E3779B97F4A7C15,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The cap, used by [`crate::status`] to decide when a tangle with
    /// no successful exchange for `5 * dead_after_cap()` is declared dead.
    pub fn cap(&self) -> Duration {
        self.cap
    }

    fn next_seed(&mut self) -> u64 {
        // xorshift64*, cheap and deterministic.
        let mut x = self.seed;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.seed = x;
        x
    }

    /// The delay for the current attempt, then advances to the next.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.attempt.min(32);
        self.attempt += 1;
        let base_millis = (self.initial.as_millis() as u64).saturating_mul(1u64 << exp);
        let capped = base_millis.min(self.cap.as_millis() as u64);

        let jitter_span = (capped as f64 * self.jitter) as u64;
        let jitter_offset = if jitter_span == 0 {
            0
        } else {
            self.next_seed() % (jitter_span * 2 + 1)
        };
        let jittered = capped.saturating_sub(jitter_span).saturating_add(jitter_offset);
        Duration::from_millis(jittered)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), 0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_saturates_at_cap() {
        let mut backoff = ExponentialBackoff::default();
        let first = backoff.next_delay();
        let second = backoff.next_delay();
        assert!(second >= first || second.as_millis() <= backoff.cap().as_millis());
        for _ in 0..20 {
            let delay = backoff.next_delay();
            assert!(delay <= backoff.cap());
        }
    }

    #[test]
    fn reset_returns_to_first_attempt() {
        let mut backoff = ExponentialBackoff::default();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
    }
}
