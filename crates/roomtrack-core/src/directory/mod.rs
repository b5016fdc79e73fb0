// ── Directory manager ──
//
// Owns the local snapshot of registered devices and keeps it consistent
// with the remote directory authority. Mutations are serialized by a
// single in-flight slot; the local snapshot only changes after the
// authority confirms.

mod draft;
mod status;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use roomtrack_api::{DirectoryClient, RoomDto};

use crate::error::{CoreError, MutationKind};
use crate::model::DeviceRecord;
use crate::store::RecordCollection;
use crate::stream::RecordStream;

pub use draft::FormDraft;
pub use status::{DEFAULT_SUCCESS_TTL, DirectoryStatus, PendingMutation};

use draft::is_filled;
use status::StatusBoard;

/// Local, optimistic view of the device directory.
///
/// Cheaply cloneable via `Arc<DirectoryInner>`; all clones share the same
/// snapshot, status board and form draft.
#[derive(Clone)]
pub struct DirectoryManager {
    inner: Arc<DirectoryInner>,
}

struct DirectoryInner {
    client: DirectoryClient,
    rooms: RecordCollection<DeviceRecord>,
    board: Arc<StatusBoard>,
    draft: watch::Sender<FormDraft>,
    cancel: CancellationToken,
}

impl DirectoryManager {
    pub fn new(client: DirectoryClient, success_ttl: Duration) -> Self {
        Self::with_cancel(client, success_ttl, CancellationToken::new())
    }

    /// Build a manager whose lifetime is bound to `cancel`. Cancelling the
    /// token has the same effect as [`detach()`](Self::detach).
    pub fn with_cancel(
        client: DirectoryClient,
        success_ttl: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let (draft, _) = watch::channel(FormDraft::default());
        Self {
            inner: Arc::new(DirectoryInner {
                client,
                rooms: RecordCollection::new(),
                board: Arc::new(StatusBoard::new(success_ttl, cancel.child_token())),
                draft,
                cancel,
            }),
        }
    }

    // ── Fetch ────────────────────────────────────────────────────────

    /// Fetch the authoritative list and replace the local snapshot.
    ///
    /// On failure the previous snapshot is kept and the error slot is set.
    pub async fn list(&self) -> Result<Arc<Vec<Arc<DeviceRecord>>>, CoreError> {
        self.ensure_attached()?;
        let inner = &self.inner;

        inner.board.start_fetch();
        let result = inner.client.list_rooms().await;
        inner.board.end_fetch();
        self.ensure_attached_after("list")?;

        match result {
            Ok(rooms) => {
                debug!(count = rooms.len(), "directory fetched");
                inner.rooms.replace_all(into_records(rooms));
                Ok(inner.rooms.snapshot())
            }
            Err(e) => {
                warn!(error = %e, "directory fetch failed");
                let err = CoreError::fetch(&e);
                inner.board.fail(err.user_message());
                Err(err)
            }
        }
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Register a new device.
    ///
    /// Returns the record as stored by the authority, or `None` when the
    /// authority did not echo one and the snapshot was re-fetched instead.
    pub async fn create(
        &self,
        name: &str,
        device_id: &str,
    ) -> Result<Option<Arc<DeviceRecord>>, CoreError> {
        self.ensure_attached()?;
        let inner = &self.inner;
        let _guard = inner
            .board
            .begin_mutation(PendingMutation::Create)
            .ok_or(CoreError::MutationInFlight)?;

        self.write_draft(None, name, device_id);
        inner.board.clear_error();
        self.validate(name, device_id)?;

        debug!(name, device_id, "creating room");
        let result = inner.client.add_room(name, device_id).await;
        self.ensure_attached_after("create")?;

        let created = match result {
            Ok(created) => created,
            Err(e) => return Err(self.mutation_failed(MutationKind::Create, &e)),
        };

        let record = match created {
            Some(dto) => {
                let record = DeviceRecord::from(dto);
                let id = record.id.clone();
                inner.rooms.upsert(record);
                inner.rooms.get(&id)
            }
            None => {
                self.refetch_quietly().await;
                None
            }
        };

        info!(name, device_id, "room created");
        self.finish_mutation(MutationKind::Create);
        Ok(record)
    }

    /// Update an existing record in place.
    pub async fn update(
        &self,
        id: &str,
        name: &str,
        device_id: &str,
    ) -> Result<Option<Arc<DeviceRecord>>, CoreError> {
        self.ensure_attached()?;
        let inner = &self.inner;
        let _guard = inner
            .board
            .begin_mutation(PendingMutation::Update { id: id.to_owned() })
            .ok_or(CoreError::MutationInFlight)?;

        self.write_draft(Some(id), name, device_id);
        inner.board.clear_error();
        self.validate(name, device_id)?;

        debug!(id, name, device_id, "updating room");
        let result = inner.client.update_room(id, name, device_id).await;
        self.ensure_attached_after("update")?;

        let returned = match result {
            Ok(returned) => returned,
            Err(e) => return Err(self.mutation_failed(MutationKind::Update, &e)),
        };

        // The record stays keyed by the id we asked for, whatever the
        // authority echoes back.
        let record = match returned {
            Some(dto) => DeviceRecord {
                id: id.to_owned(),
                ..DeviceRecord::from(dto)
            },
            None => DeviceRecord {
                id: id.to_owned(),
                name: name.to_owned(),
                device_id: device_id.to_owned(),
            },
        };

        if inner.rooms.replace(record).is_none() {
            debug!(id, "updated room not in local snapshot, re-fetching");
            self.refetch_quietly().await;
        }

        info!(id, "room updated");
        self.finish_mutation(MutationKind::Update);
        Ok(inner.rooms.get(id))
    }

    /// Delete a record. Confirmation is the caller's concern.
    pub async fn remove(&self, id: &str) -> Result<(), CoreError> {
        self.ensure_attached()?;
        let inner = &self.inner;
        let _guard = inner
            .board
            .begin_mutation(PendingMutation::Delete { id: id.to_owned() })
            .ok_or(CoreError::MutationInFlight)?;

        inner.board.clear_error();

        debug!(id, "deleting room");
        let result = inner.client.delete_room(id).await;
        self.ensure_attached_after("delete")?;

        if let Err(e) = result {
            return Err(self.mutation_failed(MutationKind::Delete, &e));
        }

        inner.rooms.remove(id);
        if inner.draft.borrow().editing.as_deref() == Some(id) {
            inner.draft.send_replace(FormDraft::default());
        }

        info!(id, "room deleted");
        inner
            .board
            .succeed(MutationKind::Delete.success_message());
        Ok(())
    }

    // ── Form draft workflow ──────────────────────────────────────────

    /// Load a record into the draft and enter edit mode.
    pub fn begin_edit(&self, id: &str) -> Result<FormDraft, CoreError> {
        self.ensure_attached()?;
        let record = self
            .inner
            .rooms
            .get(id)
            .ok_or_else(|| CoreError::NotFound { id: id.to_owned() })?;
        let draft = FormDraft::from_record(&record);
        self.inner.draft.send_replace(draft.clone());
        Ok(draft)
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.inner.draft.send_modify(|d| d.name = name);
    }

    pub fn set_device_id(&self, device_id: impl Into<String>) {
        let device_id = device_id.into();
        self.inner.draft.send_modify(|d| d.device_id = device_id);
    }

    /// Discard the draft and leave edit mode.
    pub fn cancel_edit(&self) {
        self.inner.draft.send_replace(FormDraft::default());
    }

    /// Create or update from the current draft, depending on edit mode.
    pub async fn submit(&self) -> Result<Option<Arc<DeviceRecord>>, CoreError> {
        let draft = self.draft();
        match draft.editing {
            Some(id) => self.update(&id, &draft.name, &draft.device_id).await,
            None => self.create(&draft.name, &draft.device_id).await,
        }
    }

    pub fn draft(&self) -> FormDraft {
        self.inner.draft.borrow().clone()
    }

    pub fn subscribe_draft(&self) -> watch::Receiver<FormDraft> {
        self.inner.draft.subscribe()
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Abandon in-flight requests. Responses that arrive later are
    /// discarded, and every further call returns [`CoreError::Detached`].
    pub fn detach(&self) {
        if !self.inner.cancel.is_cancelled() {
            debug!("directory manager detached");
        }
        self.inner.cancel.cancel();
    }

    pub fn is_detached(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Current snapshot in authority order (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Arc<DeviceRecord>>> {
        self.inner.rooms.snapshot()
    }

    pub fn get(&self, id: &str) -> Option<Arc<DeviceRecord>> {
        self.inner.rooms.get(id)
    }

    /// All records paired with a hardware identifier.
    pub fn by_device_id(&self, device_id: &str) -> Vec<Arc<DeviceRecord>> {
        self.snapshot()
            .iter()
            .filter(|r| r.device_id == device_id)
            .map(Arc::clone)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of snapshot changes so far.
    pub fn version(&self) -> u64 {
        self.inner.rooms.version()
    }

    pub fn subscribe(&self) -> RecordStream<DeviceRecord> {
        RecordStream::new(self.inner.rooms.subscribe())
    }

    pub fn status(&self) -> DirectoryStatus {
        self.inner.board.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<DirectoryStatus> {
        self.inner.board.subscribe()
    }

    /// The mutation currently awaiting the authority, if any.
    pub fn pending(&self) -> Option<PendingMutation> {
        self.inner.board.pending()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn ensure_attached(&self) -> Result<(), CoreError> {
        if self.is_detached() {
            return Err(CoreError::Detached);
        }
        Ok(())
    }

    /// Checked after every await on the authority: a response that lands
    /// after teardown is dropped without touching any state.
    fn ensure_attached_after(&self, operation: &str) -> Result<(), CoreError> {
        if self.is_detached() {
            debug!(operation, "discarding response received after detach");
            return Err(CoreError::Detached);
        }
        Ok(())
    }

    fn write_draft(&self, editing: Option<&str>, name: &str, device_id: &str) {
        self.inner.draft.send_replace(FormDraft {
            name: name.to_owned(),
            device_id: device_id.to_owned(),
            editing: editing.map(str::to_owned),
        });
    }

    fn validate(&self, name: &str, device_id: &str) -> Result<(), CoreError> {
        if is_filled(name) && is_filled(device_id) {
            return Ok(());
        }
        let err = CoreError::validation();
        self.inner.board.fail(err.user_message());
        Err(err)
    }

    fn mutation_failed(&self, kind: MutationKind, err: &roomtrack_api::Error) -> CoreError {
        warn!(error = %err, operation = %kind, "directory mutation failed");
        let err = CoreError::mutation(kind, err);
        self.inner.board.fail(err.user_message());
        err
    }

    fn finish_mutation(&self, kind: MutationKind) {
        self.inner.draft.send_replace(FormDraft::default());
        self.inner.board.succeed(kind.success_message());
    }

    /// Re-sync after a mutation whose response could not be applied
    /// locally. Failures are logged only; the mutation itself succeeded.
    async fn refetch_quietly(&self) {
        match self.inner.client.list_rooms().await {
            Ok(rooms) if !self.is_detached() => {
                self.inner.rooms.replace_all(into_records(rooms));
            }
            Ok(_) => debug!("discarding re-fetch received after detach"),
            Err(e) => warn!(error = %e, "re-fetch after mutation failed"),
        }
    }
}

fn into_records(rooms: Vec<RoomDto>) -> Vec<DeviceRecord> {
    rooms.into_iter().map(DeviceRecord::from).collect()
}
