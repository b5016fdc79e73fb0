// ── Directory status board ──
//
// Observable transient state of the directory manager: the loading flag,
// the in-flight mutation guard, the single error slot and the
// self-expiring success notice.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::MutationKind;

/// Default lifetime of a success notice.
pub const DEFAULT_SUCCESS_TTL: Duration = Duration::from_secs(3);

/// Snapshot of the manager's transient state, for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryStatus {
    /// At least one `list()` is awaiting the authority.
    pub loading: bool,
    /// The mutation currently awaiting the authority, if any.
    pub pending: Option<PendingMutation>,
    /// Human-readable text of the most recent failure.
    pub last_error: Option<String>,
    /// Human-readable success notice; clears itself after a short interval.
    pub last_success: Option<String>,
}

impl DirectoryStatus {
    /// Whether a submit control should be disabled.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }
}

/// An in-flight directory mutation and its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PendingMutation {
    Create,
    Update { id: String },
    Delete { id: String },
}

impl PendingMutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::Create => MutationKind::Create,
            Self::Update { .. } => MutationKind::Update,
            Self::Delete { .. } => MutationKind::Delete,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Create => None,
            Self::Update { id } | Self::Delete { id } => Some(id),
        }
    }
}

pub(crate) struct StatusBoard {
    status: watch::Sender<DirectoryStatus>,
    /// Bumped on every success notice; a timer only clears its own notice.
    notice_generation: AtomicU64,
    /// Outstanding fetches; only touched under the status lock.
    fetches: AtomicUsize,
    success_ttl: Duration,
    cancel: CancellationToken,
}

impl StatusBoard {
    pub(crate) fn new(success_ttl: Duration, cancel: CancellationToken) -> Self {
        let (status, _) = watch::channel(DirectoryStatus::default());
        Self {
            status,
            notice_generation: AtomicU64::new(0),
            fetches: AtomicUsize::new(0),
            success_ttl,
            cancel,
        }
    }

    pub(crate) fn current(&self) -> DirectoryStatus {
        self.status.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<DirectoryStatus> {
        self.status.subscribe()
    }

    pub(crate) fn pending(&self) -> Option<PendingMutation> {
        self.status.borrow().pending.clone()
    }

    // ── Fetch ────────────────────────────────────────────────────────

    pub(crate) fn start_fetch(&self) {
        self.status.send_modify(|s| {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            s.loading = true;
            s.last_error = None;
        });
    }

    /// Clears `loading` once the last outstanding fetch has ended.
    pub(crate) fn end_fetch(&self) {
        self.status.send_if_modified(|s| {
            let remaining = self
                .fetches
                .fetch_sub(1, Ordering::SeqCst)
                .saturating_sub(1);
            remaining == 0 && std::mem::replace(&mut s.loading, false)
        });
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Claim the in-flight slot. Returns `None` if another mutation holds it.
    pub(crate) fn begin_mutation(self: &Arc<Self>, pending: PendingMutation) -> Option<MutationGuard> {
        let mut acquired = false;
        self.status.send_if_modified(|s| {
            if s.pending.is_some() {
                return false;
            }
            s.pending = Some(pending);
            acquired = true;
            true
        });
        acquired.then(|| MutationGuard {
            board: Arc::clone(self),
        })
    }

    fn end_mutation(&self) {
        self.status.send_if_modified(|s| s.pending.take().is_some());
    }

    // ── Error / success slots ────────────────────────────────────────

    pub(crate) fn clear_error(&self) {
        self.status.send_if_modified(|s| s.last_error.take().is_some());
    }

    pub(crate) fn fail(&self, message: String) {
        self.notice_generation.fetch_add(1, Ordering::SeqCst);
        self.status.send_modify(|s| {
            s.last_error = Some(message);
            s.last_success = None;
        });
    }

    /// Publish a success notice and schedule its removal.
    pub(crate) fn succeed(self: &Arc<Self>, message: &str) {
        let generation = self.notice_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.status.send_modify(|s| {
            s.last_error = None;
            s.last_success = Some(message.to_owned());
        });

        let board: Weak<Self> = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        let ttl = self.success_ttl;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(ttl) => {
                    if let Some(board) = board.upgrade() {
                        board.expire_notice(generation);
                    }
                }
            }
        });
    }

    fn expire_notice(&self, generation: u64) {
        if self.notice_generation.load(Ordering::SeqCst) != generation {
            return;
        }
        self.status.send_if_modified(|s| s.last_success.take().is_some());
    }
}

/// Holds the in-flight slot; releases it on drop, whatever the outcome.
pub(crate) struct MutationGuard {
    board: Arc<StatusBoard>,
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        self.board.end_mutation();
    }
}
