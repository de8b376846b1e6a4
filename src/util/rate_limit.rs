//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Inbound frame limiter for one socket
#[derive(Clone)]
pub struct PeerRateLimiter {
    frame_limiter: Arc<Limiter>,
}

impl PeerRateLimiter {
    pub fn new(frames_per_second: u32) -> Self {
        Self {
            frame_limiter: create_limiter(frames_per_second),
        }
    }

    /// Check if an inbound frame is allowed (returns true if allowed)
    pub fn check_frame(&self) -> bool {
        self.frame_limiter.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_beyond_quota_is_refused() {
        let limiter = PeerRateLimiter::new(3);
        let allowed = (0..10).filter(|_| limiter.check_frame()).count();
        assert_eq!(allowed, 3);
    }
}
