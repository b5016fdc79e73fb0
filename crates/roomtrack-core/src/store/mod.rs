// ── Reactive storage ──

mod collection;

pub(crate) use collection::RecordCollection;

/// Records stored in a [`RecordCollection`] expose a stable primary key.
pub trait Keyed {
    fn key(&self) -> &str;
}
