// ── Domain model ──
//
// Canonical types the core exposes. Wire DTOs from `roomtrack-api` are
// translated into these in `convert`.

mod device;
mod presence;

pub use device::DeviceRecord;
pub use presence::{PresenceRecord, PresenceStatus, UNKNOWN_LOCATION};
