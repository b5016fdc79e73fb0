// ── Tracker facade ──
//
// Wires the directory manager and presence reconciler to their
// collaborators and drives the mount/unmount lifecycle shared by both.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use roomtrack_api::{DirectoryClient, ReconnectConfig};

use crate::config::TrackerConfig;
use crate::directory::DirectoryManager;
use crate::error::CoreError;
use crate::model::DeviceRecord;
use crate::presence::PresenceReconciler;
use crate::view::{self, Reconciliation};

/// Both components plus their shared lifetime.
///
/// Cheaply cloneable. Construct with [`new`](Self::new), call
/// [`mount`](Self::mount) once, and [`unmount`](Self::unmount) on teardown.
#[derive(Clone)]
pub struct Tracker {
    config: Arc<TrackerConfig>,
    directory: DirectoryManager,
    presence: PresenceReconciler,
    cancel: CancellationToken,
}

impl Tracker {
    /// Build both components. Does NOT touch the network.
    pub fn new(config: TrackerConfig) -> Result<Self, CoreError> {
        let cancel = CancellationToken::new();
        let client = DirectoryClient::new(config.api_url.clone(), &config.transport())?;
        let directory =
            DirectoryManager::with_cancel(client, config.success_ttl, cancel.child_token());
        let presence = PresenceReconciler::new(
            config.socket_url.clone(),
            ReconnectConfig::from(&config.reconnect),
            cancel.child_token(),
        );

        Ok(Self {
            config: Arc::new(config),
            directory,
            presence,
            cancel,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn directory(&self) -> &DirectoryManager {
        &self.directory
    }

    pub fn presence(&self) -> &PresenceReconciler {
        &self.presence
    }

    /// Open the presence channel and fetch the directory.
    ///
    /// A failed fetch is recorded in the directory's error slot and
    /// returned; the channel stays open either way.
    pub async fn mount(&self) -> Result<Arc<Vec<Arc<DeviceRecord>>>, CoreError> {
        self.presence.connect().await?;
        self.directory.list().await.inspect_err(|e| {
            warn!(error = %e, "initial directory fetch failed");
        })
    }

    /// Close the channel and abandon in-flight directory requests.
    ///
    /// Terminal: a tracker cannot be mounted again.
    pub async fn unmount(&self) {
        self.directory.detach();
        self.presence.disconnect().await;
        self.cancel.cancel();
        debug!("tracker unmounted");
    }

    /// Current directory joined with current presence.
    pub fn reconciliation(&self) -> Reconciliation {
        view::reconcile(&self.directory.snapshot(), &self.presence.snapshot())
    }
}
