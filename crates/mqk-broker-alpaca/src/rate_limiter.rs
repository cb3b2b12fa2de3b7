//! Token-bucket rate limiter for Alpaca's 200 req/min ceiling — spec §4.1.
//!
//! Grounded on `brokers/alpaca.py::RateLimiter`. Same shape as
//! `mqk-broker-kalshi::rate_limiter::KalshiRateLimiter`; kept as a separate
//! type because the two venues' refill rates and units differ (per-minute
//! here vs per-second for Kalshi) and each adapter owns its own limiter
//! instance.

use std::sync::Mutex;
use std::time::Instant;

struct State {
    tokens: f64,
    last_update: Instant,
}

pub struct AlpacaRateLimiter {
    rate_per_second: f64,
    capacity: f64,
    state: Mutex<State>,
}

impl AlpacaRateLimiter {
    /// `requests_per_minute` is the configured ceiling (200 req/min for the
    /// equities REST surface); the bucket capacity equals that rate.
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute as f64;
        Self {
            rate_per_second: capacity / 60.0,
            capacity,
            state: Mutex::new(State {
                tokens: capacity,
                last_update: Instant::now(),
            }),
        }
    }

    /// Blocks the calling thread until a token is available, then consumes
    /// one. Refill is `min(capacity, tokens + elapsed * rate_per_second)`.
    pub fn acquire(&self) {
        let wait = {
            let mut state = self.state.lock().expect("rate limiter mutex poisoned");
            let now = Instant::now();
            let elapsed = now.duration_since(state.last_update).as_secs_f64();
            state.tokens = (state.tokens + elapsed * self.rate_per_second).min(self.capacity);
            state.last_update = now;

            let wait = if state.tokens < 1.0 {
                (1.0 - state.tokens) / self.rate_per_second
            } else {
                0.0
            };
            if wait == 0.0 {
                state.tokens -= 1.0;
            }
            wait
        };

        if wait > 0.0 {
            std::thread::sleep(std::time::Duration::from_secs_f64(wait));
            let mut state = self.state.lock().expect("rate limiter mutex poisoned");
            state.tokens = 0.0;
            state.last_update = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_n_acquires_do_not_block() {
        let limiter = AlpacaRateLimiter::new(200);
        let start = Instant::now();
        for _ in 0..200 {
            limiter.acquire();
        }
        assert!(start.elapsed().as_millis() < 500);
    }

    #[test]
    fn exhausted_bucket_blocks_until_refill() {
        let limiter = AlpacaRateLimiter::new(60); // 1 token/sec refill
        for _ in 0..60 {
            limiter.acquire();
        }
        let start = Instant::now();
        limiter.acquire();
        assert!(start.elapsed().as_millis() >= 500);
    }
}
