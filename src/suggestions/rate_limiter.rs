use crate::config::SuggestionLimits;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Time source, injectable for tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Admission control for suggestion generation, keyed by (user, plan)
pub trait GenerationLimiter: Send + Sync {
    /// Record an attempt and report whether it is admitted
    fn is_allowed(&self, user_id: &str, plan_id: &str) -> bool;

    /// Attempts left in the current window, without recording one
    fn get_remaining(&self, user_id: &str, plan_id: &str) -> u32;
}

type Key = (String, String);

/// Longest accepted window, one year
const MAX_WINDOW_SECS: u64 = 365 * 24 * 3600;

/// Rolling-window limiter held in process memory. Timestamps older than the
/// window are pruned lazily whenever a key is checked; state is lost on
/// restart and not shared between processes.
pub struct InMemoryRateLimiter {
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    requests: Mutex<HashMap<Key, Vec<DateTime<Utc>>>>,
}

impl InMemoryRateLimiter {
    pub fn new(max_requests: u32, window_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_requests,
            window: Duration::seconds(window_secs.min(MAX_WINDOW_SECS) as i64),
            clock,
            requests: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_limits(limits: SuggestionLimits) -> Self {
        Self::new(limits.max_per_window, limits.window_secs, Arc::new(SystemClock))
    }

    fn key(user_id: &str, plan_id: &str) -> Key {
        (user_id.to_string(), plan_id.to_string())
    }

    fn prune(timestamps: &mut Vec<DateTime<Utc>>, cutoff: DateTime<Utc>) {
        timestamps.retain(|t| *t > cutoff);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Key, Vec<DateTime<Utc>>>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
impl InMemoryRateLimiter {
    fn tracked_keys(&self) -> usize {
        self.lock().len()
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::from_limits(SuggestionLimits::default())
    }
}

impl GenerationLimiter for InMemoryRateLimiter {
    fn is_allowed(&self, user_id: &str, plan_id: &str) -> bool {
        let now = self.clock.now();
        let cutoff = now - self.window;
        let mut requests = self.lock();
        // Sweep every key so pairs that stopped asking do not linger
        requests.retain(|_, timestamps| {
            Self::prune(timestamps, cutoff);
            !timestamps.is_empty()
        });

        let key = Self::key(user_id, plan_id);
        if requests.get(&key).map_or(0, Vec::len) >= self.max_requests as usize {
            tracing::debug!(user_id, plan_id, "Suggestion generation rate limited");
            return false;
        }

        requests.entry(key).or_default().push(now);
        true
    }

    fn get_remaining(&self, user_id: &str, plan_id: &str) -> u32 {
        let now = self.clock.now();
        let mut requests = self.lock();
        let key = Self::key(user_id, plan_id);
        let Some(timestamps) = requests.get_mut(&key) else {
            return self.max_requests;
        };
        Self::prune(timestamps, now - self.window);

        let used = u32::try_from(timestamps.len()).unwrap_or(u32::MAX);
        if used == 0 {
            requests.remove(&key);
        }
        self.max_requests.saturating_sub(used)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Clock that only moves when told to
    pub(crate) struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self {
                now: Mutex::new(Utc::now()),
            }
        }

        pub(crate) fn advance(&self, secs: i64) {
            let mut now = self.now.lock().unwrap();
            *now += Duration::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn limiter(max: u32, window: u64) -> (InMemoryRateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (InMemoryRateLimiter::new(max, window, clock.clone()), clock)
    }

    #[test]
    fn test_allows_up_to_limit() {
        let (limiter, _clock) = limiter(3, 3600);

        for expected_remaining in [2, 1, 0] {
            assert!(limiter.is_allowed("u", "p"));
            assert_eq!(limiter.get_remaining("u", "p"), expected_remaining);
        }
        assert!(!limiter.is_allowed("u", "p"));
        assert_eq!(limiter.get_remaining("u", "p"), 0);
    }

    #[test]
    fn test_window_expiry_frees_slots() {
        let (limiter, clock) = limiter(2, 60);
        assert!(limiter.is_allowed("u", "p"));
        clock.advance(30);
        assert!(limiter.is_allowed("u", "p"));
        assert!(!limiter.is_allowed("u", "p"));

        clock.advance(31);
        assert_eq!(limiter.get_remaining("u", "p"), 1);
        assert!(limiter.is_allowed("u", "p"));
        assert!(!limiter.is_allowed("u", "p"));
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _clock) = limiter(1, 3600);
        assert!(limiter.is_allowed("u", "p1"));
        assert!(!limiter.is_allowed("u", "p1"));
        assert!(limiter.is_allowed("u", "p2"));
        assert!(limiter.is_allowed("other", "p1"));
    }

    #[test]
    fn test_remaining_for_unknown_key() {
        let (limiter, _clock) = limiter(5, 3600);
        assert_eq!(limiter.get_remaining("nobody", "nothing"), 5);
    }

    #[test]
    fn test_denied_attempts_are_not_recorded() {
        let (limiter, clock) = limiter(1, 10);
        assert!(limiter.is_allowed("u", "p"));
        clock.advance(5);
        assert!(!limiter.is_allowed("u", "p"));
        // Only the first, admitted attempt counts toward the window
        clock.advance(6);
        assert!(limiter.is_allowed("u", "p"));
    }

    #[test]
    fn test_expired_keys_are_dropped() {
        let (limiter, clock) = limiter(2, 60);
        assert!(limiter.is_allowed("u1", "p1"));
        assert!(limiter.is_allowed("u2", "p2"));
        assert_eq!(limiter.tracked_keys(), 2);

        clock.advance(61);
        assert_eq!(limiter.get_remaining("u1", "p1"), 2);
        assert_eq!(limiter.tracked_keys(), 1);

        // Any admitted request sweeps the rest
        assert!(limiter.is_allowed("u3", "p3"));
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_default_limits() {
        let limiter = InMemoryRateLimiter::default();
        assert_eq!(limiter.get_remaining("u", "p"), 5);
    }
}
