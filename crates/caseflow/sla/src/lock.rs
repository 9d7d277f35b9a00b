//! Named job locks: single active instance across redundant runners
//!
//! Any number of runners may host the SLA scan job; a named lease keyed
//! by job name ensures at most one executes a given tick. A runner that
//! dies holding the lease is recovered by TTL takeover. Production
//! deployments back this trait with a shared store; the in-memory
//! implementation covers single-process clusters and tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// A named lease granting exclusive execution of a job
#[async_trait]
pub trait JobLock: Send + Sync {
    /// Try to take the lease for `name`. Returns `true` when this
    /// holder now owns it; `false` when another holder has an unexpired
    /// lease. Must be atomic under concurrent callers.
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> bool;

    /// Release the lease, if this holder still owns it
    async fn release(&self, name: &str, holder: &str);
}

#[derive(Clone, Debug)]
struct Lease {
    holder: String,
    expires_at: DateTime<Utc>,
}

/// In-memory job lock table
pub struct InMemoryJobLock {
    leases: DashMap<String, Lease>,
}

impl InMemoryJobLock {
    pub fn new() -> Self {
        Self {
            leases: DashMap::new(),
        }
    }

    /// The current holder of a lease, if unexpired
    pub fn holder_of(&self, name: &str) -> Option<String> {
        self.leases.get(name).and_then(|lease| {
            if lease.expires_at > Utc::now() {
                Some(lease.holder.clone())
            } else {
                None
            }
        })
    }
}

impl Default for InMemoryJobLock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobLock for InMemoryJobLock {
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> bool {
        let now = Utc::now();
        // Single entry-API operation: the check and the write happen
        // under the shard lock, so two runners cannot both win.
        match self.leases.entry(name.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(Lease {
                    holder: holder.to_string(),
                    expires_at: now + ttl,
                });
                true
            }
            Entry::Occupied(mut slot) => {
                if slot.get().expires_at <= now {
                    // Expired lease: take over
                    tracing::warn!(
                        job = name,
                        previous = %slot.get().holder,
                        "Taking over expired job lease"
                    );
                    slot.insert(Lease {
                        holder: holder.to_string(),
                        expires_at: now + ttl,
                    });
                    true
                } else {
                    false
                }
            }
        }
    }

    async fn release(&self, name: &str, holder: &str) {
        self.leases
            .remove_if(name, |_, lease| lease.holder == holder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const JOB: &str = "ticket-sla-scan";

    #[tokio::test]
    async fn test_acquire_release_cycle() {
        let lock = InMemoryJobLock::new();
        let ttl = Duration::minutes(2);

        assert!(lock.try_acquire(JOB, "runner-a", ttl).await);
        assert_eq!(lock.holder_of(JOB), Some("runner-a".to_string()));

        // Held: everyone else is refused, including the holder itself
        assert!(!lock.try_acquire(JOB, "runner-b", ttl).await);
        assert!(!lock.try_acquire(JOB, "runner-a", ttl).await);

        lock.release(JOB, "runner-a").await;
        assert!(lock.try_acquire(JOB, "runner-b", ttl).await);
    }

    #[tokio::test]
    async fn test_release_by_non_holder_is_ignored() {
        let lock = InMemoryJobLock::new();
        assert!(lock.try_acquire(JOB, "runner-a", Duration::minutes(2)).await);

        lock.release(JOB, "runner-b").await;
        assert_eq!(lock.holder_of(JOB), Some("runner-a".to_string()));
    }

    #[tokio::test]
    async fn test_expired_lease_takeover() {
        let lock = InMemoryJobLock::new();
        // Zero TTL: lease expires immediately
        assert!(lock.try_acquire(JOB, "runner-a", Duration::zero()).await);
        assert_eq!(lock.holder_of(JOB), None);

        assert!(lock.try_acquire(JOB, "runner-b", Duration::minutes(2)).await);
        assert_eq!(lock.holder_of(JOB), Some("runner-b".to_string()));
    }

    #[tokio::test]
    async fn test_independent_job_names() {
        let lock = InMemoryJobLock::new();
        let ttl = Duration::minutes(2);

        assert!(lock.try_acquire("scan-a", "runner-1", ttl).await);
        assert!(lock.try_acquire("scan-b", "runner-2", ttl).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_acquire_single_winner() {
        let lock = Arc::new(InMemoryJobLock::new());

        let mut handles = Vec::new();
        for i in 0..16 {
            let lock = Arc::clone(&lock);
            handles.push(tokio::spawn(async move {
                lock.try_acquire(JOB, &format!("runner-{i}"), Duration::minutes(2))
                    .await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }
}
