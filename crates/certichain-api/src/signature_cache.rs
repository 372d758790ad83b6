//! Verified-signature cache.
//!
//! Records which institution confirmed the embedded signature of a document,
//! keyed by the document's SHA-256 digest. A successful publish consumes the
//! entry, so each verification authorizes exactly one publish by the
//! institution that performed it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use certichain_core::{DocumentDigest, LedgerAddress};
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct Entry {
    address: LedgerAddress,
    verified_at: Instant,
}

/// A consumed entry, held while the publish it authorizes is in flight.
#[derive(Debug)]
#[must_use = "a claim that is neither used nor restored discards the verification"]
pub struct Claim {
    key: String,
    entry: Entry,
}

#[derive(Debug, Clone)]
pub struct SignatureCache {
    entries: Arc<DashMap<String, Entry>>,
    ttl: Duration,
}

impl SignatureCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Record that `address` verified the document with `digest`. A later
    /// verification of the same document replaces the entry.
    pub fn record(&self, digest: &DocumentDigest, address: &LedgerAddress) {
        self.entries.insert(
            digest.to_hex(),
            Entry {
                address: address.clone(),
                verified_at: Instant::now(),
            },
        );
    }

    /// Remove the entry for `digest` if it belongs to `address` and has not
    /// expired.
    ///
    /// Check and removal happen under the shard lock, so two concurrent
    /// publishes of the same document cannot both succeed.
    pub fn consume(&self, digest: &DocumentDigest, address: &LedgerAddress) -> Option<Claim> {
        let ttl = self.ttl;
        self.entries
            .remove_if(&digest.to_hex(), |_, entry| {
                entry.address == *address && entry.verified_at.elapsed() < ttl
            })
            .map(|(key, entry)| Claim { key, entry })
    }

    /// Put back an entry whose publish did not complete. It keeps its
    /// original timestamp. A newer verification of the same document wins.
    pub fn restore(&self, claim: Claim) {
        self.entries.entry(claim.key).or_insert(claim.entry);
    }

    /// Drop expired entries.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.verified_at.elapsed() < ttl);
        before.saturating_sub(self.entries.len())
    }

    /// Purge expired entries once per TTL until the runtime shuts down.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.ttl.max(Duration::from_secs(1)));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "expired signature cache entries dropped");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: &str) -> LedgerAddress {
        LedgerAddress::parse(&format!("0x{:0>40}", last)).unwrap()
    }

    #[test]
    fn consumed_at_most_once() {
        let cache = SignatureCache::new(Duration::from_secs(60));
        let digest = DocumentDigest::of(b"%PDF-1.7 diploma");
        cache.record(&digest, &addr("aa"));
        assert!(cache.consume(&digest, &addr("aa")).is_some());
        assert!(cache.consume(&digest, &addr("aa")).is_none());
    }

    #[test]
    fn only_the_verifying_identity_can_consume() {
        let cache = SignatureCache::new(Duration::from_secs(60));
        let digest = DocumentDigest::of(b"%PDF-1.7 diploma");
        cache.record(&digest, &addr("aa"));
        assert!(cache.consume(&digest, &addr("bb")).is_none());
        assert!(cache.consume(&digest, &addr("AA")).is_some());
    }

    #[test]
    fn expired_entry_is_absent() {
        let cache = SignatureCache::new(Duration::ZERO);
        let digest = DocumentDigest::of(b"doc");
        cache.record(&digest, &addr("aa"));
        assert!(cache.consume(&digest, &addr("aa")).is_none());
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_consumers_race_for_one_entry() {
        let cache = SignatureCache::new(Duration::from_secs(60));
        let digest = DocumentDigest::of(b"contended");
        cache.record(&digest, &addr("aa"));

        let winners: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| cache.consume(&digest, &addr("aa")).is_some() as usize))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(winners, 1);
    }

    #[test]
    fn restored_claim_can_be_consumed_again() {
        let cache = SignatureCache::new(Duration::from_secs(60));
        let digest = DocumentDigest::of(b"%PDF-1.7 retry");
        cache.record(&digest, &addr("aa"));

        let claim = cache.consume(&digest, &addr("aa")).unwrap();
        assert!(cache.is_empty());
        cache.restore(claim);
        assert!(cache.consume(&digest, &addr("bb")).is_none());
        assert!(cache.consume(&digest, &addr("aa")).is_some());
    }

    #[test]
    fn restore_does_not_replace_a_newer_verification() {
        let cache = SignatureCache::new(Duration::from_secs(60));
        let digest = DocumentDigest::of(b"%PDF-1.7 reverified");
        cache.record(&digest, &addr("aa"));
        let stale = cache.consume(&digest, &addr("aa")).unwrap();

        cache.record(&digest, &addr("bb"));
        cache.restore(stale);
        assert!(cache.consume(&digest, &addr("aa")).is_none());
        assert!(cache.consume(&digest, &addr("bb")).is_some());
    }
}
