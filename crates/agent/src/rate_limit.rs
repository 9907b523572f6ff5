//! Per-identifier fixed-window message throttling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

pub const ANONYMOUS: &str = "anonymous";
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("límite de mensajes excedido. Intenta de nuevo en {}s", retry_after_secs(.retry_after))]
pub struct RateLimited {
    pub retry_after: Duration,
}

#[derive(Clone, Copy, Debug)]
struct RateLimitEntry {
    count: u32,
    reset_at: Instant,
}

impl RateLimitEntry {
    fn expired(&self, now: Instant) -> bool {
        now >= self.reset_at
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    limit: u32,
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(window: Duration, limit: u32) -> Self {
        Self { window, limit, entries: Mutex::new(HashMap::new()) }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Counts one message against `identifier`. The check and the increment happen
    /// under one lock acquisition.
    pub fn allow(&self, identifier: &str) -> Result<(), RateLimited> {
        let now = Instant::now();
        let mut entries = self.entries();
        let entry = entries
            .entry(normalize(identifier).to_owned())
            .or_insert(RateLimitEntry { count: 0, reset_at: now + self.window });

        if entry.expired(now) {
            *entry = RateLimitEntry { count: 0, reset_at: now + self.window };
        }
        if entry.count >= self.limit {
            return Err(RateLimited { retry_after: entry.reset_at.saturating_duration_since(now) });
        }
        entry.count += 1;
        Ok(())
    }

    /// Messages left in the current window; the full limit when nothing is tracked.
    pub fn remaining(&self, identifier: &str) -> u32 {
        let now = Instant::now();
        match self.entries().get(normalize(identifier)) {
            Some(entry) if !entry.expired(now) => self.limit.saturating_sub(entry.count),
            _ => self.limit,
        }
    }

    pub fn reset(&self, identifier: &str) {
        self.entries().remove(normalize(identifier));
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drops every entry whose window has ended. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.expired(now));
        before - entries.len()
    }

    /// Sweeps on a fixed interval until the limiter is dropped.
    pub fn spawn_sweeper(limiter: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(limiter);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = weak.upgrade() else {
                    break;
                };
                let removed = limiter.sweep();
                if removed > 0 {
                    debug!(event_name = "agent.rate_limit.sweep", removed, "expired rate-limit entries dropped");
                }
            }
        })
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, RateLimitEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn normalize(identifier: &str) -> &str {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        ANONYMOUS
    } else {
        trimmed
    }
}

fn retry_after_secs(retry_after: &Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
