// ── Derived views ──
//
// Pure projections over the current snapshots. Recomputed on demand,
// never stored.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::model::{DeviceRecord, PresenceRecord, UNKNOWN_LOCATION};
use crate::presence::PresenceSnapshot;

/// All presence records, in snapshot order.
pub fn flat_list(snapshot: &PresenceSnapshot) -> Vec<Arc<PresenceRecord>> {
    snapshot.iter().map(Arc::clone).collect()
}

/// Records sharing one location label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationGroup {
    pub location: String,
    pub records: Vec<Arc<PresenceRecord>>,
}

/// Group records by location label.
///
/// Groups are sorted by label; the `Unknown` bucket (absent labels and
/// labels that literally read `Unknown`) always comes last. Record order inside a group follows the
/// snapshot.
pub fn group_by_location(snapshot: &PresenceSnapshot) -> Vec<LocationGroup> {
    let mut known: BTreeMap<&str, Vec<Arc<PresenceRecord>>> = BTreeMap::new();
    let mut unknown = Vec::new();

    for record in snapshot.iter() {
        match record.location_label() {
            UNKNOWN_LOCATION => unknown.push(Arc::clone(record)),
            label => known.entry(label).or_default().push(Arc::clone(record)),
        }
    }

    let mut groups: Vec<LocationGroup> = known
        .into_iter()
        .map(|(location, records)| LocationGroup {
            location: location.to_owned(),
            records,
        })
        .collect();
    if !unknown.is_empty() {
        groups.push(LocationGroup {
            location: UNKNOWN_LOCATION.to_owned(),
            records: unknown,
        });
    }
    groups
}

/// A directory entry together with its live presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairedDevice {
    pub device: Arc<DeviceRecord>,
    pub presence: Arc<PresenceRecord>,
}

/// Directory joined with presence on `device_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Directory entries with a matching presence record.
    pub paired: Vec<PairedDevice>,
    /// Presence records no directory entry refers to.
    pub orphans: Vec<Arc<PresenceRecord>>,
    /// Directory entries with no presence record.
    pub unseen: Vec<Arc<DeviceRecord>>,
}

pub fn reconcile(directory: &[Arc<DeviceRecord>], presence: &PresenceSnapshot) -> Reconciliation {
    let mut out = Reconciliation::default();
    let mut registered: HashSet<&str> = HashSet::with_capacity(directory.len());

    for device in directory {
        registered.insert(device.device_id.as_str());
        match presence.get(&device.device_id) {
            Some(record) => out.paired.push(PairedDevice {
                device: Arc::clone(device),
                presence: Arc::clone(record),
            }),
            None => out.unseen.push(Arc::clone(device)),
        }
    }

    out.orphans = presence
        .iter()
        .filter(|r| !registered.contains(r.device_id.as_str()))
        .map(Arc::clone)
        .collect();
    out
}

/// Headline counts for presentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PresenceSummary {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
}

pub fn summarize(snapshot: &PresenceSnapshot) -> PresenceSummary {
    let online = snapshot.iter().filter(|r| r.is_online()).count();
    PresenceSummary {
        total: snapshot.len(),
        online,
        offline: snapshot.len() - online,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PresenceStatus;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn person(device_id: &str, status: PresenceStatus, location: Option<&str>) -> PresenceRecord {
        PresenceRecord {
            device_id: device_id.into(),
            name: device_id.to_uppercase(),
            status,
            location: location.map(str::to_owned),
            last_seen: None,
        }
    }

    fn room(id: &str, device_id: &str) -> Arc<DeviceRecord> {
        Arc::new(DeviceRecord {
            id: id.into(),
            name: format!("Room {id}"),
            device_id: device_id.into(),
        })
    }

    fn snapshot() -> PresenceSnapshot {
        PresenceSnapshot::new(
            vec![
                person("d1", PresenceStatus::Online, Some("Kitchen")),
                person("d2", PresenceStatus::Offline, None),
                person("d3", PresenceStatus::Online, Some("Bedroom")),
                person("d4", PresenceStatus::Online, Some("Kitchen")),
            ],
            Utc::now(),
        )
    }

    #[test]
    fn flat_list_keeps_order() {
        let ids: Vec<String> = flat_list(&snapshot())
            .iter()
            .map(|r| r.device_id.clone())
            .collect();
        assert_eq!(ids, ["d1", "d2", "d3", "d4"]);
    }

    #[test]
    fn groups_sorted_with_unknown_last() {
        let groups = group_by_location(&snapshot());
        let labels: Vec<&str> = groups.iter().map(|g| g.location.as_str()).collect();
        assert_eq!(labels, ["Bedroom", "Kitchen", "Unknown"]);
        assert_eq!(groups[1].records.len(), 2);
        assert_eq!(groups[2].records[0].device_id, "d2");
    }

    #[test]
    fn literal_unknown_label_shares_the_unknown_bucket() {
        let snapshot = PresenceSnapshot::new(
            vec![
                person("a", PresenceStatus::Online, Some("Unknown")),
                person("b", PresenceStatus::Offline, None),
                person("c", PresenceStatus::Online, Some("Hall")),
            ],
            Utc::now(),
        );
        let groups = group_by_location(&snapshot);
        let labels: Vec<&str> = groups.iter().map(|g| g.location.as_str()).collect();
        assert_eq!(labels, ["Hall", "Unknown"]);
        let ids: Vec<&str> = groups[1].records.iter().map(|r| r.device_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn empty_snapshot_has_no_groups() {
        assert!(group_by_location(&PresenceSnapshot::default()).is_empty());
    }

    #[test]
    fn reconcile_splits_paired_orphans_unseen() {
        let directory = vec![room("1", "d1"), room("2", "d9"), room("3", "d3")];
        let result = reconcile(&directory, &snapshot());

        let paired: Vec<&str> = result.paired.iter().map(|p| p.device.id.as_str()).collect();
        assert_eq!(paired, ["1", "3"]);
        let unseen: Vec<&str> = result.unseen.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(unseen, ["2"]);
        let orphans: Vec<&str> = result.orphans.iter().map(|r| r.device_id.as_str()).collect();
        assert_eq!(orphans, ["d2", "d4"]);
    }

    #[test]
    fn summary_counts() {
        assert_eq!(
            summarize(&snapshot()),
            PresenceSummary {
                total: 4,
                online: 3,
                offline: 1,
            }
        );
    }
}
