//! Token-bucket rate limiter for Kalshi's 10 req/sec ceiling.
//!
//! Grounded on `brokers/kalshi.py::KalshiRateLimiter`. The REST client is a
//! blocking adapter (see crate docs), so this limiter blocks the calling
//! thread with `std::thread::sleep` rather than an async sleep.

use std::sync::Mutex;
use std::time::Instant;

struct State {
    tokens: f64,
    last_update: Instant,
}

pub struct KalshiRateLimiter {
    rate: f64,
    state: Mutex<State>,
}

impl KalshiRateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            rate: requests_per_second as f64,
            state: Mutex::new(State {
                tokens: requests_per_second as f64,
                last_update: Instant::now(),
            }),
        }
    }

    /// Blocks until a token is available, then consumes one.
    pub fn acquire(&self) {
        let wait = {
            let mut state = self.state.lock().expect("rate limiter mutex poisoned");
            let now = Instant::now();
            let elapsed = now.duration_since(state.last_update).as_secs_f64();
            state.tokens = (state.tokens + elapsed * self.rate).min(self.rate);
            state.last_update = now;

            let wait = if state.tokens < 1.0 {
                (1.0 - state.tokens) / self.rate
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
        let limiter = KalshiRateLimiter::new(10);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire();
        }
        assert!(start.elapsed().as_millis() < 200);
    }
}
