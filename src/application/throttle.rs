//! Message throttle: one handled free-text message per interval, both
//! globally and per user.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-user entries kept before old ones are pruned
const MAX_TRACKED_USERS: usize = 10_000;

#[derive(Debug, Default)]
struct ThrottleState {
    last_global: Option<Instant>,
    last_user: HashMap<i64, Instant>,
}

#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    state: Mutex<ThrottleState>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(ThrottleState::default()),
        }
    }

    /// Whether `user_id` may be served now; records the hit when allowed
    pub fn allow(&self, user_id: i64) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let too_soon = |last: Option<&Instant>| last.is_some_and(|t| now.duration_since(*t) < self.interval);
        if too_soon(state.last_global.as_ref()) || too_soon(state.last_user.get(&user_id)) {
            return false;
        }

        if state.last_user.len() >= MAX_TRACKED_USERS {
            let interval = self.interval;
            state.last_user.retain(|_, t| now.duration_since(*t) < interval);
        }

        state.last_global = Some(now);
        state.last_user.insert(user_id, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_message_within_interval_is_dropped() {
        let throttle = Throttle::new(Duration::from_secs(1));
        assert!(throttle.allow(7));
        assert!(!throttle.allow(7));
    }

    #[test]
    fn test_global_window_applies_across_users() {
        let throttle = Throttle::new(Duration::from_secs(1));
        assert!(throttle.allow(1));
        assert!(!throttle.allow(2));
    }

    #[test]
    fn test_zero_interval_allows_everything() {
        let throttle = Throttle::new(Duration::ZERO);
        assert!(throttle.allow(1));
        assert!(throttle.allow(1));
        assert!(throttle.allow(2));
    }

    #[test]
    fn test_allows_again_after_interval() {
        let throttle = Throttle::new(Duration::from_millis(20));
        assert!(throttle.allow(1));
        std::thread::sleep(Duration::from_millis(30));
        assert!(throttle.allow(1));
    }
}
