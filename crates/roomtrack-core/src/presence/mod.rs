// ── Presence stream reconciler ──
//
// Keeps a live presence map fed by the push channel. Every snapshot event
// replaces the whole map in one atomic swap; nothing is ever merged.
// Reconnection is the channel's job; this layer only reacts to
// open/close/data events.

mod snapshot;

use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use roomtrack_api::{ChannelEvent, PresenceChannel, ReconnectConfig};

use crate::error::CoreError;
use crate::model::PresenceRecord;

pub use snapshot::PresenceSnapshot;

/// Connectivity and freshness of the presence view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    /// The channel is open. Independent of whether data has arrived.
    pub connected: bool,
    /// Data is shown but the channel is closed.
    pub stale: bool,
    /// Text of the last channel failure; cleared when the channel reopens.
    pub last_error: Option<String>,
    /// Arrival time of the latest snapshot.
    pub last_updated: Option<DateTime<Utc>>,
}

impl ChannelStatus {
    fn refresh_stale(&mut self) {
        self.stale = !self.connected && self.last_updated.is_some();
    }
}

/// Live presence state driven by the push channel.
///
/// Cheaply cloneable via `Arc<PresenceInner>`. Dropping the last handle
/// shuts the channel down.
#[derive(Clone)]
pub struct PresenceReconciler {
    inner: Arc<PresenceInner>,
}

struct PresenceInner {
    socket_url: Url,
    reconnect: ReconnectConfig,
    snapshot: Arc<ArcSwap<PresenceSnapshot>>,
    /// Bumped on every snapshot swap.
    generation: watch::Sender<u64>,
    status: watch::Sender<ChannelStatus>,
    session: Mutex<Option<Session>>,
    cancel: CancellationToken,
}

/// One `connect()`..`disconnect()` span.
struct Session {
    channel: PresenceChannel,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
    bridge: JoinHandle<()>,
}

impl Drop for PresenceInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl PresenceReconciler {
    pub fn new(socket_url: Url, reconnect: ReconnectConfig, cancel: CancellationToken) -> Self {
        let (generation, _) = watch::channel(0u64);
        let (status, _) = watch::channel(ChannelStatus::default());
        Self {
            inner: Arc::new(PresenceInner {
                socket_url,
                reconnect,
                snapshot: Arc::new(ArcSwap::from_pointee(PresenceSnapshot::default())),
                generation,
                status,
                session: Mutex::new(None),
                cancel,
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the push channel.
    ///
    /// Idempotent while a session is live. If the previous session's
    /// channel gave up, a fresh one replaces it.
    pub async fn connect(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Detached);
        }

        let mut session = self.inner.session.lock().await;
        if let Some(existing) = session.as_ref() {
            if !existing.pump.is_finished() {
                debug!("presence channel already connecting or connected");
                return Ok(());
            }
        }
        if let Some(old) = session.take() {
            old.cancel.cancel();
            let _ = old.bridge.await;
        }

        let cancel = self.inner.cancel.child_token();
        let channel = PresenceChannel::new(
            &self.inner.socket_url,
            self.inner.reconnect.clone(),
            cancel.clone(),
        )?;
        info!(url = %channel.endpoint(), "opening presence channel");

        // Subscribe before starting so `Connected` is never missed.
        let rx = channel.subscribe();
        let bridge = tokio::spawn(bridge_events(
            Arc::downgrade(&self.inner),
            rx,
            cancel.clone(),
        ));
        let pump = channel.start();

        *session = Some(Session {
            channel,
            cancel,
            pump,
            bridge,
        });
        Ok(())
    }

    /// Close the channel. The presence map is kept as last-known state
    /// and reported stale.
    pub async fn disconnect(&self) {
        let session = self.inner.session.lock().await.take();
        if let Some(session) = session {
            session.channel.shutdown();
            session.cancel.cancel();
            let _ = session.pump.await;
            let _ = session.bridge.await;
            info!("presence channel closed");
        }
        self.inner.status.send_if_modified(|s| {
            let was_connected = std::mem::replace(&mut s.connected, false);
            let was_stale = s.stale;
            s.refresh_stale();
            was_connected || was_stale != s.stale
        });
    }

    /// Whether a session exists (connecting, connected or retrying).
    pub async fn is_active(&self) -> bool {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| !s.pump.is_finished())
    }

    // ── Snapshot handling ────────────────────────────────────────────

    /// Replace the entire presence map with `records`.
    ///
    /// An empty list means no devices are currently known.
    pub fn on_snapshot(&self, records: Vec<PresenceRecord>) {
        self.inner.apply_snapshot(records);
    }

    /// Feed one channel event through the reconciler.
    pub fn handle_event(&self, event: &ChannelEvent) {
        self.inner.handle_event(event);
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Current presence map (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<PresenceSnapshot> {
        self.inner.snapshot.load_full()
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<PresenceRecord>> {
        self.inner.snapshot.load().get(device_id).map(Arc::clone)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.status.borrow().connected
    }

    pub fn is_stale(&self) -> bool {
        self.inner.status.borrow().stale
    }

    pub fn status(&self) -> ChannelStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ChannelStatus> {
        self.inner.status.subscribe()
    }

    /// Subscribe to snapshot swaps.
    pub fn subscribe(&self) -> PresenceStream {
        PresenceStream::new(Arc::clone(&self.inner.snapshot), self.inner.generation.subscribe())
    }
}

impl PresenceInner {
    fn apply_snapshot(&self, records: Vec<PresenceRecord>) {
        let snapshot = PresenceSnapshot::new(records, Utc::now());
        let received_at = snapshot.received_at();
        debug!(count = snapshot.len(), "presence snapshot applied");

        self.snapshot.store(Arc::new(snapshot));
        self.status.send_modify(|s| {
            s.last_updated = received_at;
            s.refresh_stale();
        });
        self.generation.send_modify(|g| *g += 1);
    }

    fn handle_event(&self, event: &ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                self.status.send_modify(|s| {
                    s.connected = true;
                    s.last_error = None;
                    s.refresh_stale();
                });
            }
            ChannelEvent::Snapshot(entries) => {
                let records = entries
                    .iter()
                    .cloned()
                    .filter_map(PresenceRecord::from_entry)
                    .collect();
                self.apply_snapshot(records);
            }
            ChannelEvent::Disconnected { reason } => {
                warn!(%reason, "presence channel disconnected");
                self.mark_closed(format!("Disconnected from presence channel: {reason}"));
            }
            ChannelEvent::Error { message } => {
                warn!(%message, "presence channel error");
                self.mark_closed(message.clone());
            }
        }
    }

    fn mark_closed(&self, message: String) {
        self.status.send_modify(|s| {
            s.connected = false;
            s.last_error = Some(message);
            s.refresh_stale();
        });
    }
}

/// Bridge task: channel events → reconciler state.
///
/// Holds only a weak reference so an abandoned reconciler can drop.
async fn bridge_events(
    inner: Weak<PresenceInner>,
    mut rx: broadcast::Receiver<Arc<ChannelEvent>>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = rx.recv() => event,
        };

        match event {
            Ok(event) => {
                // Events racing with disconnect() are dropped.
                if cancel.is_cancelled() {
                    break;
                }
                let Some(inner) = inner.upgrade() else { break };
                inner.handle_event(&event);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "presence bridge lagged, waiting for next snapshot");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("presence bridge exiting");
}

// ── PresenceStream ───────────────────────────────────────────────────

/// A subscription to presence snapshot swaps.
pub struct PresenceStream {
    snapshot: Arc<ArcSwap<PresenceSnapshot>>,
    receiver: watch::Receiver<u64>,
    current: Arc<PresenceSnapshot>,
}

impl PresenceStream {
    fn new(snapshot: Arc<ArcSwap<PresenceSnapshot>>, mut receiver: watch::Receiver<u64>) -> Self {
        receiver.borrow_and_update();
        let current = snapshot.load_full();
        Self {
            snapshot,
            receiver,
            current,
        }
    }

    /// Snapshot captured at creation time or at the last `changed()`.
    pub fn current(&self) -> &Arc<PresenceSnapshot> {
        &self.current
    }

    pub fn latest(&self) -> Arc<PresenceSnapshot> {
        self.snapshot.load_full()
    }

    /// Wait for the next snapshot swap. Returns `None` once the reconciler
    /// is dropped.
    pub async fn changed(&mut self) -> Option<Arc<PresenceSnapshot>> {
        self.receiver.changed().await.ok()?;
        self.receiver.borrow_and_update();
        self.current = self.snapshot.load_full();
        Some(Arc::clone(&self.current))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use roomtrack_api::PresenceEntry;
    use serde_json::json;

    fn reconciler() -> PresenceReconciler {
        PresenceReconciler::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            ReconnectConfig::disabled(),
            CancellationToken::new(),
        )
    }

    fn entries(value: serde_json::Value) -> Vec<PresenceEntry> {
        serde_json::from_value(value).unwrap()
    }

    fn alice_in_kitchen() -> ChannelEvent {
        ChannelEvent::Snapshot(entries(json!([{
            "deviceID": "dev-1",
            "name": "Alice",
            "status": "Online",
            "room": "Kitchen",
            "lastSeen": "2025-01-01T10:00:00Z"
        }])))
    }

    #[test]
    fn snapshot_then_empty_clears() {
        let presence = reconciler();
        presence.handle_event(&alice_in_kitchen());
        assert_eq!(presence.snapshot().len(), 1);
        assert_eq!(
            presence.get("dev-1").unwrap().location.as_deref(),
            Some("Kitchen")
        );

        presence.handle_event(&ChannelEvent::Snapshot(Vec::new()));
        assert!(presence.snapshot().is_empty());
        assert!(presence.status().last_updated.is_some());
    }

    #[test]
    fn full_replace_never_merges() {
        let presence = reconciler();
        presence.handle_event(&alice_in_kitchen());
        presence.handle_event(&ChannelEvent::Snapshot(entries(json!([
            { "deviceID": "dev-2", "name": "Bob", "status": "Offline" }
        ]))));

        let snap = presence.snapshot();
        assert_eq!(snap.len(), 1);
        assert!(snap.get("dev-1").is_none());
        assert!(snap.contains("dev-2"));
    }

    #[test]
    fn same_payload_twice_is_idempotent() {
        let presence = reconciler();
        presence.handle_event(&alice_in_kitchen());
        let first = presence.snapshot();
        presence.handle_event(&alice_in_kitchen());
        let second = presence.snapshot();
        assert!(first.same_records(&second));
    }

    #[test]
    fn connectivity_is_independent_of_data() {
        let presence = reconciler();
        presence.handle_event(&ChannelEvent::Connected);
        assert!(presence.is_connected());
        assert!(presence.snapshot().is_empty());
        assert!(!presence.is_stale());

        presence.handle_event(&alice_in_kitchen());
        presence.handle_event(&ChannelEvent::Disconnected {
            reason: "transport close".into(),
        });
        let status = presence.status();
        assert!(!status.connected);
        assert!(status.stale);
        assert_eq!(
            status.last_error.as_deref(),
            Some("Disconnected from presence channel: transport close")
        );
        // Data survives the close.
        assert_eq!(presence.snapshot().len(), 1);

        presence.handle_event(&ChannelEvent::Connected);
        assert_eq!(presence.status().last_error, None);
        assert!(!presence.is_stale());
    }

    #[test]
    fn error_before_any_session() {
        let presence = reconciler();
        presence.handle_event(&ChannelEvent::Error {
            message: "WebSocket connection failed: refused".into(),
        });
        let status = presence.status();
        assert!(!status.connected);
        assert!(!status.stale);
        assert!(status.last_error.unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn subscribers_are_notified_per_swap() {
        let presence = reconciler();
        let mut stream = presence.subscribe();
        assert!(stream.current().is_empty());

        presence.on_snapshot(vec![PresenceRecord::from_entry(
            entries(json!([{ "deviceID": "dev-9" }])).remove(0),
        )
        .unwrap()]);
        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(stream.latest().len(), 1);
    }

    #[tokio::test]
    async fn disconnect_without_connect_marks_nothing_stale() {
        let presence = reconciler();
        presence.disconnect().await;
        assert!(!presence.is_connected());
        assert!(!presence.is_stale());
        assert!(!presence.is_active().await);
    }

    #[tokio::test]
    async fn connect_after_teardown_is_rejected() {
        let cancel = CancellationToken::new();
        let presence = PresenceReconciler::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            ReconnectConfig::disabled(),
            cancel.clone(),
        );
        cancel.cancel();
        assert!(matches!(presence.connect().await, Err(CoreError::Detached)));
    }
}
