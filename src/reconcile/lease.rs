// src/reconcile/lease.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};

type Key = (&'static str, u64);

struct Claim {
    token: u64,
    expires_at: Instant,
}

/// Time-bounded exclusive claims on entities under reconciliation.
///
/// At most one in-flight reconciliation per position/order: a cycle acquires
/// a lease before touching an entity and skips it when another cycle already
/// holds one. Leases expire by timeout so a stuck holder cannot wedge an
/// entity forever.
pub struct LeaseMap {
    claims: Arc<Mutex<HashMap<Key, Claim>>>,
    ttl: Duration,
    tokens: AtomicU64,
}

impl LeaseMap {
    pub fn new(ttl: Duration) -> Self {
        Self {
            claims: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            tokens: AtomicU64::new(0),
        }
    }

    /// Claim `(kind, id)` for the duration of one reconciliation attempt.
    /// Returns `None` while another holder's lease is still live.
    pub fn try_acquire(&self, kind: &'static str, id: u64) -> Option<Lease> {
        let token = self.tokens.fetch_add(1, Ordering::SeqCst);
        let now = Instant::now();
        let mut claims = self.claims.lock().unwrap();

        if let Some(existing) = claims.get(&(kind, id)) {
            if existing.expires_at > now {
                return None;
            }
        }

        claims.insert(
            (kind, id),
            Claim {
                token,
                expires_at: now + self.ttl,
            },
        );

        Some(Lease {
            key: (kind, id),
            token,
            claims: Arc::clone(&self.claims),
        })
    }
}

/// Guard releasing the claim on drop. An expired lease that was reclaimed by
/// another holder is left alone.
pub struct Lease {
    key: Key,
    token: u64,
    claims: Arc<Mutex<HashMap<Key, Claim>>>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut claims = self.claims.lock().unwrap();
        if claims.get(&self.key).is_some_and(|c| c.token == self.token) {
            claims.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_while_held() {
        let leases = LeaseMap::new(Duration::from_secs(30));

        let held = leases.try_acquire("order", 7);
        assert!(held.is_some());
        assert!(leases.try_acquire("order", 7).is_none());

        drop(held);
        assert!(leases.try_acquire("order", 7).is_some());
    }

    #[test]
    fn distinct_entities_do_not_contend() {
        let leases = LeaseMap::new(Duration::from_secs(30));

        let _a = leases.try_acquire("order", 1).unwrap();
        assert!(leases.try_acquire("order", 2).is_some());
        assert!(leases.try_acquire("position", 1).is_some());
    }

    #[test]
    fn expired_lease_is_reclaimable() {
        let leases = LeaseMap::new(Duration::from_millis(20));

        let stale = leases.try_acquire("order", 1).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(40));
        let fresh = leases.try_acquire("order", 1);
        assert!(fresh.is_some());

        // The stale guard must not release the reclaimed lease.
        drop(stale);
        assert!(leases.try_acquire("order", 1).is_none());
        drop(fresh);
    }
}
