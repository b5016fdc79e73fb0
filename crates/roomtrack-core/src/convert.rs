// ── API-to-domain type conversions ──
//
// Bridges raw `roomtrack_api` wire types into canonical `roomtrack_core::model`
// types. Presence entries are normalized leniently: a bad timestamp or an
// odd status never rejects the entry, only a missing `deviceID` does.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use roomtrack_api::{PresenceEntry, RoomDto};

use crate::model::{DeviceRecord, PresenceRecord, PresenceStatus};

// ── Helpers ────────────────────────────────────────────────────────

/// Parse a `lastSeen` value: RFC 3339, a zone-less ISO-8601 timestamp
/// (taken as UTC), or epoch milliseconds as number or string.
fn parse_last_seen(raw: Option<&Value>) -> Option<DateTime<Utc>> {
    match raw? {
        Value::String(s) => parse_timestamp_text(s.trim()),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_timestamp_text(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)
}

/// Trim a label; blank becomes `None`.
fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

// ── Directory ──────────────────────────────────────────────────────

impl From<RoomDto> for DeviceRecord {
    fn from(dto: RoomDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            device_id: dto.device_id,
        }
    }
}

// ── Presence ───────────────────────────────────────────────────────

impl PresenceRecord {
    /// Normalize one snapshot entry. Returns `None` when the entry has no
    /// usable `deviceID` and therefore cannot be keyed.
    pub fn from_entry(entry: PresenceEntry) -> Option<Self> {
        let Some(device_id) = non_blank(entry.device_id) else {
            tracing::debug!(name = ?entry.name, "dropping presence entry without deviceID");
            return None;
        };

        Some(Self {
            name: non_blank(entry.name).unwrap_or_else(|| device_id.clone()),
            status: PresenceStatus::from_wire(entry.status.as_deref()),
            location: non_blank(entry.room),
            last_seen: parse_last_seen(entry.last_seen.as_ref()),
            device_id,
        })
    }
}
