// ── Directory domain types ──

use serde::{Deserialize, Serialize};

use crate::store::Keyed;

/// A registered room/device pairing.
///
/// `id` is assigned by the directory authority and is opaque to the
/// client. `device_id` is the hardware identifier that presence entries
/// refer to; it is not guaranteed unique across records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    pub device_id: String,
}

impl Keyed for DeviceRecord {
    fn key(&self) -> &str {
        &self.id
    }
}
