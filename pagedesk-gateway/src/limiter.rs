//! Per-action cooldown limiter
//!
//! Advisory throttling for repeat-triggerable actions (checking for new
//! messages). Not a security boundary: callers that are told "no" get a
//! soft cooldown response, not an error.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Default cooldown window between firings of the same action.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

/// Tracks the last firing time per action name.
pub struct ActionLimiter {
    cooldown: Duration,
    last_fired: RwLock<HashMap<String, Instant>>,
}

impl ActionLimiter {
    pub fn new() -> Self {
        Self::with_cooldown(DEFAULT_COOLDOWN)
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_fired: RwLock::new(HashMap::new()),
        }
    }

    /// Whether the action may fire now. A `true` result records the firing.
    pub fn allow(&self, action: &str) -> bool {
        let now = Instant::now();
        let mut last_fired = self.last_fired.write().unwrap();
        match last_fired.get(action) {
            Some(last) if now.duration_since(*last) < self.cooldown => false,
            _ => {
                last_fired.insert(action.to_string(), now);
                true
            }
        }
    }
}

impl Default for ActionLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_blocks_second_firing() {
        let limiter = ActionLimiter::with_cooldown(Duration::from_secs(60));
        assert!(limiter.allow("check_new_messages"));
        assert!(!limiter.allow("check_new_messages"));
    }

    #[test]
    fn test_actions_are_independent() {
        let limiter = ActionLimiter::with_cooldown(Duration::from_secs(60));
        assert!(limiter.allow("check_new_messages"));
        assert!(limiter.allow("toggle_ai"));
    }

    #[test]
    fn test_allows_after_window() {
        let limiter = ActionLimiter::with_cooldown(Duration::from_millis(1));
        assert!(limiter.allow("check_new_messages"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.allow("check_new_messages"));
    }
}
