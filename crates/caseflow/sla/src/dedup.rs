//! Notification deduplication: at-most-one send per key per window
//!
//! Shared across concurrent notification producers. The check and the
//! insert are one atomic operation; a `contains` followed by a `put`
//! lets two racers both conclude "not sent yet" and both dispatch.

use caseflow_types::{EventName, StateId, TicketId, UserId, WorkflowId};
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

const DELIMITER: &str = ":";
const SUFFIX: &str = "SLA_WARNING";

/// The identity of one logical notification.
///
/// Every field is mandatory: omitting any of them under- or
/// over-deduplicates (e.g. without the recipient, the second recipient
/// of a breach would be suppressed; without the job name, unrelated
/// jobs would suppress each other).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DedupKey {
    pub recipient: UserId,
    pub ticket_id: TicketId,
    pub workflow_id: WorkflowId,
    pub event: EventName,
    pub to_state: StateId,
    pub source_job: String,
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            [
                self.recipient.0.as_str(),
                self.ticket_id.0.as_str(),
                self.workflow_id.0.as_str(),
                self.event.as_str(),
                self.to_state.0.as_str(),
                self.source_job.as_str(),
                SUFFIX,
            ]
            .join(DELIMITER)
        )
    }
}

/// TTL-bounded set of already-sent notification keys.
///
/// Entries are evicted lazily on access; `sweep_expired` provides
/// active garbage collection. A stale-but-unexpired entry always
/// suppresses (safety bias: better a missed reminder than a duplicate
/// page).
pub struct DeduplicationCache {
    entries: DashMap<String, DateTime<Utc>>,
}

impl DeduplicationCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Atomically claim `key` for the next `ttl`.
    ///
    /// Returns `true` when the caller may notify (key absent or
    /// expired, now claimed until `now + ttl`); `false` when an
    /// unexpired claim exists.
    pub fn try_acquire(&self, key: &DedupKey, ttl: Duration) -> bool {
        let now = Utc::now();
        match self.entries.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(now + ttl);
                true
            }
            Entry::Occupied(mut slot) => {
                if *slot.get() <= now {
                    // Expired: reclaim in place (lazy eviction)
                    slot.insert(now + ttl);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Whether an unexpired claim exists for `key`, evicting it if it
    /// has expired
    pub fn contains(&self, key: &DedupKey) -> bool {
        let rendered = key.to_string();
        let now = Utc::now();
        // The read guard must drop before remove_if takes the shard's
        // write lock.
        let expired = match self.entries.get(&rendered) {
            Some(expires_at) if *expires_at > now => return true,
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries
                .remove_if(&rendered, |_, expires_at| *expires_at <= now);
        }
        false
    }

    /// Drop all expired entries. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before - self.entries.len()
    }

    /// Number of entries currently held (expired included until swept)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DeduplicationCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn make_key(recipient: &str) -> DedupKey {
        DedupKey {
            recipient: UserId::new(recipient),
            ticket_id: TicketId::new("t-42"),
            workflow_id: WorkflowId::new("wf-support"),
            event: EventName::new("triage"),
            to_state: StateId::new("triaged"),
            source_job: "ticket-sla-scan".to_string(),
        }
    }

    #[test]
    fn test_key_format() {
        let key = make_key("alice");
        assert_eq!(
            key.to_string(),
            "alice:t-42:wf-support:triage:triaged:ticket-sla-scan:SLA_WARNING"
        );
    }

    #[test]
    fn test_acquire_then_suppress() {
        let cache = DeduplicationCache::new();
        let key = make_key("alice");
        let ttl = Duration::hours(24);

        assert!(cache.try_acquire(&key, ttl));
        assert!(!cache.try_acquire(&key, ttl));
        assert!(cache.contains(&key));

        // A different recipient is a different key
        assert!(cache.try_acquire(&make_key("bob"), ttl));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_expired_entry_is_reclaimed() {
        let cache = DeduplicationCache::new();
        let key = make_key("alice");

        // Negative TTL: claim is already expired
        assert!(cache.try_acquire(&key, Duration::seconds(-1)));
        assert!(!cache.contains(&key));
        assert!(cache.try_acquire(&key, Duration::hours(1)));
        assert!(cache.contains(&key));
    }

    #[test]
    fn test_sweep_expired() {
        let cache = DeduplicationCache::new();
        assert!(cache.try_acquire(&make_key("alice"), Duration::seconds(-1)));
        assert!(cache.try_acquire(&make_key("bob"), Duration::hours(1)));
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_race_exactly_one_acquires() {
        let cache = Arc::new(DeduplicationCache::new());
        let key = make_key("alice");

        let mut handles = Vec::new();
        for _ in 0..32 {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                cache.try_acquire(&key, Duration::hours(24))
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(cache.len(), 1);
    }
}
