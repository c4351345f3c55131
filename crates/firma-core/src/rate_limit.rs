//! In-memory rate limiting for the OTP endpoints
//!
//! Fixed-window counting per key, process-local and approximate. This
//! bounds brute-forcing across many OTPs from one origin, independent of
//! the per-OTP attempt cap. Stale windows are dropped by `cleanup` so
//! memory stays bounded.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Rate limit configuration for an endpoint
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub limit: u32,
    /// Time window for rate limiting
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self {
            limit,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Preset for OTP verification (10 req/min per IP)
    pub fn otp_verify() -> Self {
        Self::new(10, 60)
    }

    /// Preset for OTP sending (5 req/min per IP)
    pub fn otp_send() -> Self {
        Self::new(5, 60)
    }
}

/// Entry tracking requests for a single key
#[derive(Debug, Clone)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

/// Result of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    /// Request is rate limited; retry once the window rolls over.
    Limited { retry_after: Duration },
}

impl RateLimitResult {
    pub fn is_allowed(self) -> bool {
        matches!(self, RateLimitResult::Allowed)
    }

    pub fn retry_after(self) -> Option<Duration> {
        match self {
            RateLimitResult::Allowed => None,
            RateLimitResult::Limited { retry_after } => Some(retry_after),
        }
    }
}

/// Fixed-window in-memory rate limiter
///
/// Wrap in a `Mutex` for shared use; checks are O(1) per key.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: HashMap<String, WindowEntry>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    /// Check whether a request from `key` is allowed, counting it if so.
    pub fn check(&mut self, key: &str) -> RateLimitResult {
        let now = Instant::now();

        match self.entries.get_mut(key) {
            Some(entry) => {
                if now.duration_since(entry.window_start) > self.config.window {
                    entry.count = 1;
                    entry.window_start = now;
                    return RateLimitResult::Allowed;
                }
                if entry.count >= self.config.limit {
                    let retry_after =
                        self.config.window - now.duration_since(entry.window_start);
                    return RateLimitResult::Limited { retry_after };
                }
                entry.count += 1;
                RateLimitResult::Allowed
            }
            None => {
                self.entries.insert(
                    key.to_string(),
                    WindowEntry {
                        count: 1,
                        window_start: now,
                    },
                );
                RateLimitResult::Allowed
            }
        }
    }

    /// Drop entries whose window has fully elapsed.
    pub fn cleanup(&mut self) {
        let now = Instant::now();
        let window = self.config.window;
        self.entries
            .retain(|_, entry| now.duration_since(entry.window_start) <= window);
    }

    /// Number of tracked keys
    pub fn tracked_count(&self) -> usize {
        self.entries.len()
    }
}
