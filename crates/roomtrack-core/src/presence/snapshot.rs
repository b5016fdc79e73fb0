// ── Presence snapshot ──

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::model::PresenceRecord;

/// Immutable presence map as delivered by one snapshot event.
///
/// Keyed by `device_id` in first-seen order. When a payload repeats a
/// `device_id`, the later entry wins but keeps the earlier position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PresenceSnapshot {
    records: IndexMap<String, Arc<PresenceRecord>>,
    received_at: Option<DateTime<Utc>>,
}

impl PresenceSnapshot {
    pub fn new(records: Vec<PresenceRecord>, received_at: DateTime<Utc>) -> Self {
        let mut map = IndexMap::with_capacity(records.len());
        for record in records {
            map.insert(record.device_id.clone(), Arc::new(record));
        }
        Self {
            records: map,
            received_at: Some(received_at),
        }
    }

    pub fn get(&self, device_id: &str) -> Option<&Arc<PresenceRecord>> {
        self.records.get(device_id)
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.records.contains_key(device_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PresenceRecord>> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// When the snapshot arrived; `None` before the first one.
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    /// Same records, ignoring arrival time.
    pub fn same_records(&self, other: &Self) -> bool {
        self.records == other.records
    }
}
