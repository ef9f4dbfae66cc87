//! Rate Limiter (Token Bucket Algorithm)
//!
//! Caps how fast mutating RPC methods are accepted. The bucket lives in a
//! single atomic word so concurrent handlers never block each other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Token bucket shared by all mutating methods
pub struct RateLimiter {
    // Upper 32 bits: tokens, lower 32 bits: last refill (ms since `origin`)
    packed: AtomicU64,
    origin: Instant,
    burst: u32,
    per_second: u32,
}

fn pack(tokens: u32, at_ms: u32) -> u64 {
    ((tokens as u64) << 32) | at_ms as u64
}

fn unpack(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, (word & 0xFFFF_FFFF) as u32)
}

impl RateLimiter {
    /// `burst` requests may arrive at once; `per_second` tokens flow back in
    ///
    /// # Example
    /// Allow 100 requests/sec with burst of 200:
    /// `RateLimiter::new(200, 100)`
    pub fn new(burst: u32, per_second: u32) -> Self {
        Self {
            packed: AtomicU64::new(pack(burst, 0)),
            origin: Instant::now(),
            burst,
            per_second,
        }
    }

    fn refilled(&self, tokens: u32, last_ms: u32, now_ms: u32) -> u32 {
        // The ms counter wraps after ~49.7 days; wrapping keeps the delta right across it
        let delta_ms = now_ms.wrapping_sub(last_ms) as u64;
        let added = delta_ms * self.per_second as u64 / 1000;
        (tokens as u64 + added).min(self.burst as u64) as u32
    }

    /// Consume one token; false when the bucket is empty
    pub async fn check(&self) -> bool {
        loop {
            let current = self.packed.load(Ordering::Acquire);
            let (tokens, last_ms) = unpack(current);
            let now_ms = self.origin.elapsed().as_millis() as u32;

            // Move the refill clock only once a whole token was earned or the bucket is full
            let available = self.refilled(tokens, last_ms, now_ms);
            let stamp = if available > tokens || available == self.burst {
                now_ms
            } else {
                last_ms
            };

            if available == 0 {
                return false;
            }

            let next = pack(available - 1, stamp);
            if self
                .packed
                .compare_exchange(current, next, Ordering::Release, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }
}
