use std::sync::Arc;
use std::time::Instant;

use mqk_broker_kalshi::KalshiRateLimiter;

#[test]
fn exhausted_bucket_blocks_until_refill() {
    let limiter = KalshiRateLimiter::new(10); // 10 req/sec
    for _ in 0..10 {
        limiter.acquire();
    }
    let start = Instant::now();
    limiter.acquire();
    assert!(start.elapsed().as_millis() >= 80, "eleventh call should wait roughly 1/10s for a token");
}

#[test]
fn concurrent_acquirers_share_one_bucket_without_poisoning() {
    // Spec §4.1: the limiter is shared across every request a broker makes,
    // including concurrent ones from multiple order-submission threads. This
    // only asserts the shared bucket survives contention (no poisoned mutex,
    // no hang) -- exact interleaved timing is an implementation detail.
    let limiter = Arc::new(KalshiRateLimiter::new(10));
    let start = Instant::now();

    let handles: Vec<_> = (0..15)
        .map(|_| {
            let limiter = limiter.clone();
            std::thread::spawn(move || limiter.acquire())
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // More requests than the starting bucket capacity must take some
    // non-zero time, but must still complete well within a few seconds.
    assert!(start.elapsed().as_millis() < 5_000);
}
