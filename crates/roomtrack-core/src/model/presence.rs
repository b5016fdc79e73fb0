// ── Presence domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Label used for records without a known location.
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Whether a tracked device is currently seen by the presence backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl PresenceStatus {
    /// Lenient parse: anything that is not `online` (any case) is offline.
    pub fn from_wire(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.trim().parse().ok())
            .unwrap_or(Self::Offline)
    }
}

/// Live presence state of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub device_id: String,
    pub name: String,
    pub status: PresenceStatus,
    /// Free-text location; `None` when the backend does not know.
    pub location: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl PresenceRecord {
    pub fn is_online(&self) -> bool {
        self.status == PresenceStatus::Online
    }

    /// Location for display, with absent labels folded into `Unknown`.
    pub fn location_label(&self) -> &str {
        self.location.as_deref().unwrap_or(UNKNOWN_LOCATION)
    }
}
