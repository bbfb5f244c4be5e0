//! In-memory document storage with time-based expiry.
//!
//! Documents are keyed by [`Document::uid`], so re-registering the same
//! product, version and metadata replaces the earlier entry. Entries older
//! than the configured TTL are hidden from reads and pruned on the next
//! upsert.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indicator_core::Document;
use parking_lot::RwLock;
use tracing::debug;

use crate::clock::Clock;

#[derive(Debug, Clone)]
struct Entry {
    document: Document,
    received_at: DateTime<Utc>,
}

/// Outcome of [`DocumentStore::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    /// UID the document is stored under.
    pub uid: String,
    /// UIDs of expired entries pruned by this upsert, excluding `uid`.
    pub expired: Vec<String>,
}

/// Thread-safe store of registered documents.
pub struct DocumentStore {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Creates an empty store whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the configured time to live.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores a document, replacing any entry with the same UID, and returns
    /// that UID.
    pub fn upsert_document(&self, document: Document) -> String {
        self.upsert(document).uid
    }

    /// Stores a document like [`upsert_document`](Self::upsert_document) and
    /// reports which expired entries were pruned on the way.
    pub fn upsert(&self, document: Document) -> Upserted {
        let uid = document.uid();
        let now = self.clock.now();

        let mut entries = self.entries.write();
        let mut expired = Vec::new();
        entries.retain(|key, entry| {
            let live = self.is_live(entry, now);
            if !live && *key != uid {
                expired.push(key.clone());
            }
            live
        });
        let replaced = entries
            .insert(
                uid.clone(),
                Entry {
                    document,
                    received_at: now,
                },
            )
            .is_some();

        debug!(
            uid = %uid,
            replaced,
            pruned = expired.len(),
            entries = entries.len(),
            "upserted document"
        );
        Upserted { uid, expired }
    }

    /// Returns every live document, ordered by UID.
    #[must_use]
    pub fn all_documents(&self) -> Vec<Document> {
        let now = self.clock.now();
        self.entries
            .read()
            .values()
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| entry.document.clone())
            .collect()
    }

    /// Looks up a live document by UID.
    #[must_use]
    pub fn document_for(&self, uid: &str) -> Option<Document> {
        let now = self.clock.now();
        self.entries
            .read()
            .get(uid)
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| entry.document.clone())
    }

    /// Number of live documents.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .read()
            .values()
            .filter(|entry| self.is_live(entry, now))
            .count()
    }

    /// Whether no live documents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_live(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        match (now - entry.received_at).to_std() {
            Ok(age) => age < self.ttl,
            // received after `now`
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use indicator_core::{ApiVersion, Indicator, Layout, Product};
    use proptest::prelude::*;

    const TTL: Duration = Duration::from_secs(60 * 60);

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2012, 12, 1, 16, 45, 19).unwrap()
    }

    fn document(name: &str, deployment: &str, promql: &str) -> Document {
        let indicators = vec![Indicator::new("latency", promql)];
        Document {
            api_version: ApiVersion::V1,
            product: Product::new(name, "1.0"),
            metadata: BTreeMap::from([("deployment".to_string(), deployment.to_string())]),
            layout: Layout::single_section(&indicators),
            indicators,
        }
    }

    fn store() -> (DocumentStore, ManualClock) {
        let clock = ManualClock::at(start());
        (DocumentStore::new(TTL, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn upsert_returns_document_uid() {
        let (store, _) = store();
        let doc = document("redis", "dep-1", "up");

        let uid = store.upsert_document(doc.clone());

        assert_eq!(uid, doc.uid());
        assert_eq!(store.document_for(&uid), Some(doc));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn same_identity_overwrites_in_place() {
        let (store, _) = store();

        let first = store.upsert_document(document("redis", "dep-1", "up"));
        let second = store.upsert_document(document("redis", "dep-1", "rate(x[5m])"));

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.document_for(&first).unwrap().indicators[0].promql,
            "rate(x[5m])"
        );
    }

    #[test]
    fn different_metadata_is_a_different_document() {
        let (store, _) = store();

        let a = store.upsert_document(document("redis", "dep-1", "up"));
        let b = store.upsert_document(document("redis", "dep-2", "up"));

        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn all_documents_are_sorted_by_uid() {
        let (store, _) = store();
        for name in ["zookeeper", "apache", "mysql"] {
            store.upsert_document(document(name, "dep", "up"));
        }

        let uids: Vec<String> = store.all_documents().iter().map(Document::uid).collect();
        let mut sorted = uids.clone();
        sorted.sort();

        assert_eq!(uids, sorted);
        assert_eq!(uids.len(), 3);
    }

    #[test]
    fn expires_exactly_at_ttl() {
        let (store, clock) = store();
        let uid = store.upsert_document(document("redis", "dep-1", "up"));

        clock.advance(chrono::Duration::minutes(59) + chrono::Duration::seconds(59));
        assert_eq!(store.all_documents().len(), 1);

        clock.advance(chrono::Duration::seconds(1));
        assert!(store.all_documents().is_empty());
        assert_eq!(store.document_for(&uid), None);
        assert!(store.is_empty());
    }

    #[test]
    fn reregistering_refreshes_expiry() {
        let (store, clock) = store();
        store.upsert_document(document("redis", "dep-1", "up"));

        clock.advance(chrono::Duration::minutes(45));
        store.upsert_document(document("redis", "dep-1", "up"));
        clock.advance(chrono::Duration::minutes(45));

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn upsert_prunes_expired_entries() {
        let (store, clock) = store();
        store.upsert_document(document("old", "dep", "up"));

        clock.advance(chrono::Duration::hours(2));
        store.upsert_document(document("new", "dep", "up"));

        assert_eq!(store.entries.read().len(), 1);
    }

    #[test]
    fn upsert_reports_pruned_uids() {
        let (store, clock) = store();
        let old = store.upsert_document(document("old", "dep", "up"));
        let again = store.upsert_document(document("again", "dep", "up"));

        clock.advance(chrono::Duration::hours(2));
        let upserted = store.upsert(document("again", "dep", "rate(x[5m])"));

        assert_eq!(upserted.uid, again);
        assert_eq!(upserted.expired, vec![old]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_upserts_and_reads() {
        let store = DocumentStore::new(TTL, Arc::new(crate::clock::SystemClock));

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    for round in 0..50 {
                        store.upsert_document(document(
                            &format!("product-{worker}"),
                            "dep",
                            &format!("expr_{round}"),
                        ));
                        assert!(!store.all_documents().is_empty());
                    }
                });
            }
        });

        assert_eq!(store.len(), 8);
    }

    proptest! {
        #[test]
        fn visible_iff_younger_than_ttl(offset_secs in 0i64..(3 * 60 * 60)) {
            let (store, clock) = store();
            let uid = store.upsert_document(document("redis", "dep-1", "up"));

            clock.advance(chrono::Duration::seconds(offset_secs));

            let visible = store.document_for(&uid).is_some();
            prop_assert_eq!(visible, offset_secs < 60 * 60);
        }
    }
}
