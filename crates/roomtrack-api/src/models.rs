// Wire types for the directory API and the presence channel
//
// Field names follow the backend's JSON (`deviceID`, `lastSeen`, `_id`).
// Presence entries are deliberately loose: every field is optional so a
// single odd entry never poisons a whole snapshot. `roomtrack-core`
// normalizes them into domain records.

use serde::{Deserialize, Serialize};

// ── Directory ───────────────────────────────────────────────────────

/// A room/device pairing as stored by the directory authority.
///
/// The authority is MongoDB-backed and usually names the identifier
/// `_id`; `id` is accepted as well. When both are present `_id` wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRoom")]
pub struct RoomDto {
    pub id: String,
    pub name: String,
    #[serde(rename = "deviceID")]
    pub device_id: String,
}

#[derive(Deserialize)]
struct RawRoom {
    #[serde(rename = "_id", default)]
    mongo_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(rename = "deviceID", default)]
    device_id: String,
}

impl TryFrom<RawRoom> for RoomDto {
    type Error = &'static str;

    fn try_from(raw: RawRoom) -> Result<Self, Self::Error> {
        let id = raw.mongo_id.or(raw.id).ok_or("room is missing `_id`")?;
        Ok(Self {
            id,
            name: raw.name,
            device_id: raw.device_id,
        })
    }
}

/// Request body for `POST /addRoom` and `PUT /rooms/{id}`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RoomPayload<'a> {
    pub name: &'a str,
    #[serde(rename = "deviceID")]
    pub device_id: &'a str,
}

/// Error body the authority sends alongside non-2xx statuses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.message
            .or(self.error)
            .map(|m| m.trim().to_owned())
            .filter(|m| !m.is_empty())
    }
}

// ── Presence ────────────────────────────────────────────────────────

/// One element of an `updatePersons` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEntry {
    #[serde(rename = "deviceID", default)]
    pub device_id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    /// `"Online"` or `"Offline"` in practice; kept raw here.
    #[serde(default)]
    pub status: Option<String>,

    /// Current location label. Missing, `null` or empty means unknown.
    #[serde(default)]
    pub room: Option<String>,

    /// ISO-8601 string from most backends, epoch millis from some.
    #[serde(rename = "lastSeen", default)]
    pub last_seen: Option<serde_json::Value>,

    /// All remaining fields the backend sends.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn room_accepts_mongo_style_id() {
        let room: RoomDto = serde_json::from_value(json!({
            "_id": "65f1c0",
            "name": "Living Room",
            "deviceID": "dev-1",
            "__v": 0
        }))
        .unwrap();
        assert_eq!(room.id, "65f1c0");
        assert_eq!(room.device_id, "dev-1");
    }

    #[test]
    fn room_with_both_ids_prefers_mongo_id() {
        let room: RoomDto = serde_json::from_value(json!({
            "_id": "65f1c0",
            "id": "virtual-id",
            "name": "Living Room",
            "deviceID": "dev-1"
        }))
        .unwrap();
        assert_eq!(room.id, "65f1c0");
        assert_eq!(room.name, "Living Room");

        let plain: RoomDto = serde_json::from_value(json!({ "id": "7", "deviceID": "dev-2" })).unwrap();
        assert_eq!(plain.id, "7");
    }

    #[test]
    fn room_without_any_id_is_rejected() {
        let err = serde_json::from_value::<RoomDto>(json!({ "name": "Hall", "deviceID": "d" }))
            .unwrap_err();
        assert!(err.to_string().contains("_id"));
    }

    #[test]
    fn room_payload_uses_backend_field_names() {
        let body = serde_json::to_value(RoomPayload {
            name: "Kitchen",
            device_id: "dev-2",
        })
        .unwrap();
        assert_eq!(body, json!({ "name": "Kitchen", "deviceID": "dev-2" }));
    }

    #[test]
    fn error_body_prefers_message_and_drops_blank() {
        let body: ErrorBody =
            serde_json::from_value(json!({ "message": "Room exists", "error": "x" })).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Room exists"));

        let blank: ErrorBody = serde_json::from_value(json!({ "message": "  " })).unwrap();
        assert_eq!(blank.into_message(), None);
    }

    #[test]
    fn presence_entry_keeps_unknown_fields() {
        let entry: PresenceEntry = serde_json::from_value(json!({
            "deviceID": "dev-1",
            "name": "Alice",
            "status": "Online",
            "room": "Kitchen",
            "lastSeen": "2025-01-01T10:00:00Z",
            "rssi": -61
        }))
        .unwrap();
        assert_eq!(entry.device_id.as_deref(), Some("dev-1"));
        assert_eq!(entry.room.as_deref(), Some("Kitchen"));
        assert_eq!(entry.extra["rssi"], -61);
    }

    #[test]
    fn presence_entry_tolerates_missing_fields() {
        let entry: PresenceEntry = serde_json::from_value(json!({ "deviceID": "dev-9" })).unwrap();
        assert!(entry.name.is_none());
        assert!(entry.room.is_none());
        assert!(entry.last_seen.is_none());
    }
}
