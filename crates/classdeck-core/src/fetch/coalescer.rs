//! The request coalescer.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::fetch::key::{FetchOperation, ResourceKey};

/// Fetch activity for one logical resource.
#[derive(Debug, Clone, Copy)]
struct RequestRecord {
    /// Start time of the most recent admitted request. Left untouched on
    /// completion so the debounce window measures from request start.
    last_started_at: Instant,
    in_progress: bool,
}

/// Whether a fetch may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Proceed; the caller owns the in-flight slot for this key and must
    /// call [`RequestCoalescer::complete`] when done.
    Admitted,
    /// A fetch for this key is already underway.
    AlreadyInFlight,
    /// A fetch for this key started too recently.
    Debounced,
    /// The operation has no resource key; proceed, nothing is tracked.
    Uncoalesced,
}

impl Admission {
    /// True when the fetch may proceed.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted | Self::Uncoalesced)
    }
}

/// Deduplicates and rate-limits outbound fetches per logical resource.
///
/// Prevents the thundering herd where several widgets mount near
/// simultaneously and each triggers the same fetch. One instance is created
/// per process and injected into consumers; the record table is bounded by
/// the closed [`ResourceKey`] set.
///
/// This is a best-effort client-side guard, not an exactly-once mechanism.
#[derive(Debug)]
pub struct RequestCoalescer {
    debounce_window: Duration,
    records: Mutex<HashMap<ResourceKey, RequestRecord>>,
}

impl RequestCoalescer {
    /// Creates a coalescer with the given debounce window.
    pub fn new(debounce_window: Duration) -> Self {
        Self {
            debounce_window,
            records: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ResourceKey, RequestRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decides whether a fetch for this operation may proceed.
    pub fn admit(&self, operation: FetchOperation) -> Admission {
        self.admit_at(operation, Instant::now())
    }

    // The whole check-and-set runs under one lock acquisition with no
    // suspension point, so no interleaving observes a transient state.
    fn admit_at(&self, operation: FetchOperation, now: Instant) -> Admission {
        let Some(key) = operation.resource_key() else {
            return Admission::Uncoalesced;
        };
        let mut records = self.lock();
        match records.get_mut(&key) {
            None => {
                records.insert(
                    key,
                    RequestRecord {
                        last_started_at: now,
                        in_progress: true,
                    },
                );
                tracing::debug!(%key, %operation, "fetch admitted");
                Admission::Admitted
            }
            Some(record) if record.in_progress => {
                tracing::debug!(%key, %operation, "fetch rejected: already in flight");
                Admission::AlreadyInFlight
            }
            Some(record) if now.duration_since(record.last_started_at) < self.debounce_window => {
                tracing::debug!(%key, %operation, "fetch rejected: inside debounce window");
                Admission::Debounced
            }
            Some(record) => {
                record.last_started_at = now;
                record.in_progress = true;
                tracing::debug!(%key, %operation, "fetch admitted");
                Admission::Admitted
            }
        }
    }

    /// Marks an admitted fetch as finished (success or failure alike).
    ///
    /// The timestamp is deliberately not updated here; the debounce window
    /// is measured from request start.
    pub fn complete(&self, operation: FetchOperation) {
        let Some(key) = operation.resource_key() else {
            return;
        };
        if let Some(record) = self.lock().get_mut(&key) {
            record.in_progress = false;
        }
    }
}
