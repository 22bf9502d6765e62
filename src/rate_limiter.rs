use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::RateLimits;

/// Bucket applied to every API request, per hour
pub const HOURLY: &str = "hourly";
/// Bucket applied to every API request, per day
pub const DAILY: &str = "daily";
/// Bucket for `/api/upload`
pub const UPLOAD: &str = "upload";
/// Bucket for `/api/process_errors`
pub const PROCESS_ERRORS: &str = "process_errors";

/// How often windows whose timestamps have all expired are dropped
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Sliding-window request limiter keyed by limit name and client
pub struct RateLimiter {
    limits: HashMap<String, RateLimit>,
    sweep_interval: Duration,
    state: Mutex<LimiterState>,
}

struct LimiterState {
    windows: HashMap<(String, String), RateLimitState>,
    last_sweep: Instant,
}

#[derive(Clone, Copy, Debug)]
struct RateLimit {
    requests: usize,
    window: Duration,
}

#[derive(Default)]
struct RateLimitState {
    requests: Vec<Instant>,
}

impl RateLimiter {
    /// Creates a rate limiter with no limits
    pub fn new() -> Self {
        Self {
            limits: HashMap::new(),
            sweep_interval: SWEEP_INTERVAL,
            state: Mutex::new(LimiterState {
                windows: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Creates a rate limiter with the service's named limits
    pub fn from_config(config: &RateLimits) -> Self {
        let mut limiter = Self::new();
        limiter.add_limit(UPLOAD, config.upload_per_minute, Duration::from_secs(60));
        limiter.add_limit(PROCESS_ERRORS, config.process_per_minute, Duration::from_secs(60));
        limiter.add_limit(HOURLY, config.per_hour, Duration::from_secs(60 * 60));
        limiter.add_limit(DAILY, config.per_day, Duration::from_secs(24 * 60 * 60));
        limiter
    }

    /// Adds a rate limit for the specified name
    pub fn add_limit(&mut self, name: &str, requests: usize, window: Duration) {
        self.limits.insert(name.to_string(), RateLimit { requests, window });
    }

    /// Records a request from `client` against every named limit
    ///
    /// Returns `false` without recording anything if any of the limits is
    /// already exhausted. Unknown names are ignored.
    pub async fn try_acquire(&self, names: &[&str], client: &str) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock().await;

        if now.duration_since(state.last_sweep) >= self.sweep_interval {
            self.sweep(&mut state, now);
        }

        for name in names {
            let Some(limit) = self.limits.get(*name) else { continue };
            let entry = state
                .windows
                .entry((name.to_string(), client.to_string()))
                .or_default();

            // Remove expired timestamps
            entry.requests.retain(|&t| now.duration_since(t) < limit.window);

            if entry.requests.len() >= limit.requests {
                warn!(limit = *name, client, "Rate limit exceeded");
                return false;
            }
        }

        for name in names {
            if self.limits.contains_key(*name) {
                state
                    .windows
                    .entry((name.to_string(), client.to_string()))
                    .or_default()
                    .requests
                    .push(now);
            }
        }
        true
    }

    /// Drops every window with no timestamps left inside its limit
    fn sweep(&self, state: &mut LimiterState, now: Instant) {
        let before = state.windows.len();
        state.windows.retain(|(name, _), entry| match self.limits.get(name) {
            Some(limit) => {
                entry.requests.retain(|&t| now.duration_since(t) < limit.window);
                !entry.requests.is_empty()
            }
            None => false,
        });
        state.last_sweep = now;

        let removed = before - state.windows.len();
        if removed > 0 {
            debug!(removed, remaining = state.windows.len(), "Swept expired rate limit windows");
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
