//! Presence synchronization and directory consistency for roomtrack.
//!
//! This crate owns the client-side state of the tracker and keeps it
//! consistent with two remote collaborators from `roomtrack-api`:
//!
//! - **[`DirectoryManager`]**: local, ordered snapshot of registered
//!   devices. `list()` replaces it wholesale; `create()` / `update()` /
//!   `remove()` go to the directory authority first and touch the snapshot
//!   only on success. A single in-flight slot serializes mutations, and a
//!   [`FormDraft`] keeps user input across failures. Transient state
//!   (loading, pending mutation, error slot, self-expiring success notice)
//!   is published as [`DirectoryStatus`].
//!
//! - **[`PresenceReconciler`]**: live presence map fed by the push
//!   channel. Every `updatePersons` event atomically replaces the whole
//!   [`PresenceSnapshot`]; disconnects keep the last map and flag it stale.
//!
//! - **[`view`]**: pure projections: flat list, grouping by location,
//!   directory/presence join and summary counts.
//!
//! - **[`Tracker`]**: facade owning both components and the shared
//!   mount/unmount lifecycle.

pub mod config;
pub mod convert;
pub mod directory;
pub mod error;
pub mod model;
pub mod presence;
pub mod store;
pub mod stream;
pub mod tracker;
pub mod view;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ReconnectPolicy, TlsVerification, TrackerConfig};
pub use directory::{DirectoryManager, DirectoryStatus, FormDraft, PendingMutation};
pub use error::{CoreError, MutationKind};
pub use model::{DeviceRecord, PresenceRecord, PresenceStatus};
pub use presence::{ChannelStatus, PresenceReconciler, PresenceSnapshot, PresenceStream};
pub use stream::RecordStream;
pub use tracker::Tracker;
pub use view::{LocationGroup, PairedDevice, PresenceSummary, Reconciliation};
