// ── Form draft ──

use serde::Serialize;

use crate::model::DeviceRecord;

/// Working copy of a device record being created or edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormDraft {
    pub name: String,
    pub device_id: String,
    /// `Some(id)` while editing an existing record.
    pub editing: Option<String>,
}

impl FormDraft {
    pub(crate) fn from_record(record: &DeviceRecord) -> Self {
        Self {
            name: record.name.clone(),
            device_id: record.device_id.clone(),
            editing: Some(record.id.clone()),
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.device_id.is_empty() && self.editing.is_none()
    }

    /// Both fields contain something other than whitespace.
    pub fn is_complete(&self) -> bool {
        is_filled(&self.name) && is_filled(&self.device_id)
    }
}

pub(crate) fn is_filled(value: &str) -> bool {
    !value.trim().is_empty()
}
