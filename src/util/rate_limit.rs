//! Rate limiting for inbound connection traffic

use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter,
};
use std::num::NonZeroU32;

use crate::ws::protocol::ConnectionId;

/// Max inbound messages per second per connection. Typing is bursty, not tick driven.
pub const INPUT_RATE_LIMIT: u32 = 20;

type KeyedLimiter =
    RateLimiter<ConnectionId, DefaultKeyedStateStore<ConnectionId>, DefaultClock>;

/// One shared limiter, one bucket per connection
pub struct InputRateLimiter {
    limiter: KeyedLimiter,
}

impl InputRateLimiter {
    pub fn new(messages_per_second: u32) -> Self {
        let quota =
            Quota::per_second(NonZeroU32::new(messages_per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Returns true if the message is allowed
    pub fn check(&self, connection: &ConnectionId) -> bool {
        self.limiter.check_key(connection).is_ok()
    }

    /// Drop buckets that have fully refilled, e.g. after disconnects
    pub fn forget_idle(&self) {
        self.limiter.retain_recent();
    }
}

impl Default for InputRateLimiter {
    fn default() -> Self {
        Self::new(INPUT_RATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_beyond_quota_is_limited() {
        let limiter = InputRateLimiter::new(5);
        let conn = ConnectionId::new();

        let allowed = (0..20).filter(|_| limiter.check(&conn)).count();

        assert_eq!(allowed, 5);
    }

    #[test]
    fn buckets_are_per_connection() {
        let limiter = InputRateLimiter::new(1);
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        assert!(limiter.check(&a));
        assert!(!limiter.check(&a));
        assert!(limiter.check(&b));
    }
}
