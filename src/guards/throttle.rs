//! Request throttling
//!
//! Fixed-window counter per client identifier.
//!
//! ## Usage
//!
//! ```no_run
//! use minigame_orchestrator::guards::{MemoryThrottle, RequestThrottle};
//! use std::time::Duration;
//!
//! let throttle = MemoryThrottle::new(25, Duration::from_secs(60));
//! # fn run(throttle: &MemoryThrottle) -> Result<(), minigame_orchestrator::ForgeError> {
//! if throttle.admit("203.0.113.7")? {
//!     // Generate a level
//! } else {
//!     // Serve the canned rate-limit joke
//! }
//! # Ok(()) }
//! ```

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::ForgeError;

/// Admission control keyed by client identifier.
pub trait RequestThrottle: Send + Sync {
    /// `Ok(true)` if the request may proceed, `Ok(false)` if the client is over quota.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Store`] if the backing store is unavailable.
    fn admit(&self, client_id: &str) -> Result<bool, ForgeError>;
}

/// In-memory throttle; one bucket per client, replaced when its window ends.
pub struct MemoryThrottle {
    buckets: DashMap<String, Bucket>,
    max_requests: usize,
    window: Duration,
}

struct Bucket {
    count: usize,
    reset_at: Instant,
}

impl MemoryThrottle {
    /// Throttle admitting `max_requests` per `window` per client.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            max_requests,
            window,
        }
    }

    /// [`RequestThrottle::admit`] evaluated at `now`.
    ///
    /// The bucket update happens under the map's per-key lock, so
    /// concurrent requests from one client never lose a count.
    pub fn admit_at(&self, client_id: &str, now: Instant) -> bool {
        let mut bucket = self
            .buckets
            .entry(client_id.to_string())
            .or_insert_with(|| Bucket {
                count: 0,
                reset_at: now,
            });

        if bucket.count == 0 || now > bucket.reset_at {
            bucket.count = 1;
            bucket.reset_at = now + self.window;
            debug!(client_id = client_id, "throttle window opened");
            return true;
        }

        if bucket.count >= self.max_requests {
            warn!(
                client_id = client_id,
                count = bucket.count,
                limit = self.max_requests,
                "rate limit exceeded"
            );
            return false;
        }

        bucket.count += 1;
        debug!(
            client_id = client_id,
            count = bucket.count,
            limit = self.max_requests,
            "rate limit check passed"
        );
        true
    }

    /// Drop the bucket for a client.
    pub fn reset(&self, client_id: &str) {
        self.buckets.remove(client_id);
        debug!(client_id = client_id, "rate limit reset");
    }

    /// Current usage for a client, if it has a bucket.
    pub fn usage(&self, client_id: &str) -> Option<ThrottleUsage> {
        self.buckets.get(client_id).map(|bucket| ThrottleUsage {
            used: bucket.count,
            remaining: self.max_requests.saturating_sub(bucket.count),
            reset_in: bucket.reset_at.saturating_duration_since(Instant::now()),
        })
    }
}

impl RequestThrottle for MemoryThrottle {
    fn admit(&self, client_id: &str) -> Result<bool, ForgeError> {
        Ok(self.admit_at(client_id, Instant::now()))
    }
}

/// Usage snapshot for one client.
#[derive(Debug)]
pub struct ThrottleUsage {
    /// Requests admitted in the current window.
    pub used: usize,
    /// Requests still available in the current window.
    pub remaining: usize,
    /// Time until the window resets.
    pub reset_in: Duration,
}
