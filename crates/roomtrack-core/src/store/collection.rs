// ── Ordered reactive record collection ──
//
// Keyed O(1) lookups via `DashMap`, plus an ordered snapshot published
// through a `watch` channel. The snapshot is the source of truth for order;
// every mutation rewrites it inside `send_modify`, so readers always see a
// consistent `Arc<Vec<_>>` and never a half-applied change.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use super::Keyed;

pub(crate) type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// An ordered, reactive collection for a single record type.
pub(crate) struct RecordCollection<T: Keyed + Send + Sync + 'static> {
    /// Index: primary key -> record.
    by_key: DashMap<String, Arc<T>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Ordered snapshot handed to readers and subscribers.
    snapshot: watch::Sender<Snapshot<T>>,
}

impl<T: Keyed + Send + Sync + 'static> RecordCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Replace the whole collection, keeping the given order.
    pub(crate) fn replace_all(&self, records: Vec<T>) {
        let records: Vec<Arc<T>> = records.into_iter().map(Arc::new).collect();
        self.snapshot.send_modify(|snap| {
            self.by_key.clear();
            for record in &records {
                self.by_key
                    .insert(record.key().to_owned(), Arc::clone(record));
            }
            *snap = Arc::new(records);
        });
        self.bump_version();
    }

    /// Append a record, or replace it in place if its key already exists.
    /// Returns `true` if the key was new.
    pub(crate) fn upsert(&self, record: T) -> bool {
        let record = Arc::new(record);
        let mut is_new = false;
        self.snapshot.send_modify(|snap| {
            let mut values = snap.as_ref().clone();
            match values.iter().position(|r| r.key() == record.key()) {
                Some(idx) => values[idx] = Arc::clone(&record),
                None => {
                    is_new = true;
                    values.push(Arc::clone(&record));
                }
            }
            self.by_key
                .insert(record.key().to_owned(), Arc::clone(&record));
            *snap = Arc::new(values);
        });
        self.bump_version();
        is_new
    }

    /// Replace an existing record in place. Returns the previous value,
    /// or `None` (and changes nothing) if the key is unknown.
    pub(crate) fn replace(&self, record: T) -> Option<Arc<T>> {
        let record = Arc::new(record);
        let mut previous = None;
        self.snapshot.send_if_modified(|snap| {
            let Some(idx) = snap.iter().position(|r| r.key() == record.key()) else {
                return false;
            };
            let mut values = snap.as_ref().clone();
            previous = Some(std::mem::replace(&mut values[idx], Arc::clone(&record)));
            self.by_key
                .insert(record.key().to_owned(), Arc::clone(&record));
            *snap = Arc::new(values);
            true
        });
        if previous.is_some() {
            self.bump_version();
        }
        previous
    }

    /// Remove a record by key. Returns the removed record if it existed.
    pub(crate) fn remove(&self, key: &str) -> Option<Arc<T>> {
        let mut removed = None;
        self.snapshot.send_if_modified(|snap| {
            let Some((_, record)) = self.by_key.remove(key) else {
                return false;
            };
            let values: Vec<Arc<T>> = snap
                .iter()
                .filter(|r| r.key() != key)
                .map(Arc::clone)
                .collect();
            *snap = Arc::new(values);
            removed = Some(record);
            true
        });
        if removed.is_some() {
            self.bump_version();
        }
        removed
    }

    /// Look up a record by its primary key.
    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshot.borrow().len()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Item {
        id: &'static str,
        value: &'static str,
    }

    impl Keyed for Item {
        fn key(&self) -> &str {
            self.id
        }
    }

    fn item(id: &'static str, value: &'static str) -> Item {
        Item { id, value }
    }

    fn values(col: &RecordCollection<Item>) -> Vec<&'static str> {
        col.snapshot().iter().map(|i| i.value).collect()
    }

    #[test]
    fn replace_all_keeps_order() {
        let col = RecordCollection::new();
        col.replace_all(vec![item("b", "B"), item("a", "A"), item("c", "C")]);
        assert_eq!(values(&col), ["B", "A", "C"]);
        assert_eq!(col.get("a").unwrap().value, "A");
        assert_eq!(col.len(), 3);

        col.replace_all(vec![item("z", "Z")]);
        assert_eq!(values(&col), ["Z"]);
        assert!(col.get("a").is_none());
    }

    #[test]
    fn upsert_appends_new_and_replaces_existing() {
        let col = RecordCollection::new();
        assert!(col.upsert(item("1", "one")));
        assert!(col.upsert(item("2", "two")));
        assert!(!col.upsert(item("1", "uno")));

        assert_eq!(values(&col), ["uno", "two"]);
    }

    #[test]
    fn replace_in_place_only_for_known_keys() {
        let col = RecordCollection::new();
        col.replace_all(vec![item("1", "a"), item("2", "b"), item("3", "c")]);
        let before = col.version();

        let old = col.replace(item("2", "B")).unwrap();
        assert_eq!(old.value, "b");
        assert_eq!(values(&col), ["a", "B", "c"]);
        assert_eq!(col.version(), before + 1);

        assert!(col.replace(item("9", "x")).is_none());
        assert_eq!(col.len(), 3);
        assert_eq!(col.version(), before + 1);
    }

    #[test]
    fn remove_cleans_up_index() {
        let col = RecordCollection::new();
        col.replace_all(vec![item("1", "a"), item("2", "b")]);

        assert_eq!(col.remove("1").unwrap().value, "a");
        assert!(col.get("1").is_none());
        assert_eq!(values(&col), ["b"]);

        assert!(col.remove("1").is_none());
    }

    #[test]
    fn subscribers_see_each_change() {
        let col = RecordCollection::new();
        let mut rx = col.subscribe();
        assert!(!rx.has_changed().unwrap());

        col.upsert(item("1", "a"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);

        // Removing an unknown key is not a change.
        col.remove("missing");
        assert!(!rx.has_changed().unwrap());
    }
}
