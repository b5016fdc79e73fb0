// ── Core error types ──
//
// User-facing errors from roomtrack-core. Consumers never match on HTTP
// status codes or JSON parse failures directly; `From<roomtrack_api::Error>`
// and the `fetch` / `mutation` constructors translate transport failures
// into the error-slot text the presentation layer shows.

use strum::Display;
use thiserror::Error;

/// Message shown when a required form field is empty.
pub const VALIDATION_MESSAGE: &str = "Please fill in all fields";

/// Generic fetch failure text, used when the authority gives no message.
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch rooms. Please try again.";

/// Which directory mutation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    /// Error-slot text when the authority supplies no message of its own.
    pub fn generic_message(self) -> &'static str {
        match self {
            Self::Create | Self::Update => "An error occurred. Please try again.",
            Self::Delete => "Failed to delete room. Please try again.",
        }
    }

    /// Success notice shown after the mutation completes.
    pub fn success_message(self) -> &'static str {
        match self {
            Self::Create => "Room added successfully!",
            Self::Update => "Room updated successfully!",
            Self::Delete => "Room deleted successfully!",
        }
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Directory ────────────────────────────────────────────────────
    /// A required field was empty. Never reaches the network.
    #[error("{message}")]
    Validation { message: String },

    /// Listing the directory failed; the previous snapshot is kept.
    #[error("Failed to fetch rooms: {reason}")]
    Fetch {
        reason: String,
        authority_message: Option<String>,
    },

    /// A create/update/delete was rejected or failed in transit.
    #[error("Failed to {operation} room: {reason}")]
    Mutation {
        operation: MutationKind,
        reason: String,
        /// Text from the authority's `message` body field, if any.
        authority_message: Option<String>,
        status: Option<u16>,
    },

    /// Another mutation is still awaiting the authority.
    #[error("Another change is still in progress")]
    MutationInFlight,

    #[error("Room not found: {id}")]
    NotFound { id: String },

    /// The owning component has been torn down.
    #[error("Directory manager has been detached")]
    Detached,

    // ── Presence ─────────────────────────────────────────────────────
    #[error("Presence channel error: {message}")]
    Channel { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn validation() -> Self {
        Self::Validation {
            message: VALIDATION_MESSAGE.into(),
        }
    }

    /// Wrap a failed directory listing.
    pub fn fetch(err: &roomtrack_api::Error) -> Self {
        Self::Fetch {
            reason: err.to_string(),
            authority_message: err.authority_message().map(str::to_owned),
        }
    }

    /// Wrap a failed directory mutation.
    pub fn mutation(operation: MutationKind, err: &roomtrack_api::Error) -> Self {
        Self::Mutation {
            operation,
            reason: err.to_string(),
            authority_message: err.authority_message().map(str::to_owned),
            status: err.status(),
        }
    }

    /// Text for the manager's error slot.
    ///
    /// The authority's own message wins; otherwise a fixed, generic
    /// sentence per operation.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message } => message.clone(),
            Self::Fetch {
                authority_message, ..
            } => authority_message
                .clone()
                .unwrap_or_else(|| FETCH_FAILED_MESSAGE.into()),
            Self::Mutation {
                operation,
                authority_message,
                ..
            } => authority_message
                .clone()
                .unwrap_or_else(|| operation.generic_message().into()),
            other => other.to_string(),
        }
    }

    /// Whether retrying the same call might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { .. } | Self::Channel { .. } | Self::MutationInFlight => true,
            Self::Mutation { status, .. } => status.is_none_or(|s| s >= 500),
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<roomtrack_api::Error> for CoreError {
    fn from(err: roomtrack_api::Error) -> Self {
        match err {
            roomtrack_api::Error::InvalidUrl(e) => Self::Config {
                message: format!("Invalid URL: {e}"),
            },
            roomtrack_api::Error::Tls(msg) => Self::Config {
                message: format!("TLS error: {msg}"),
            },
            roomtrack_api::Error::WebSocketConnect(_)
            | roomtrack_api::Error::WebSocketClosed { .. }
            | roomtrack_api::Error::Protocol(_)
            | roomtrack_api::Error::ConnectRefused { .. }
            | roomtrack_api::Error::HeartbeatTimeout { .. } => Self::Channel {
                message: err.to_string(),
            },
            roomtrack_api::Error::Deserialization { message, body: _ } => {
                Self::Internal(format!("Deserialization error: {message}"))
            }
            other => Self::Fetch {
                reason: other.to_string(),
                authority_message: other.authority_message().map(str::to_owned),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_message_wins() {
        let api = roomtrack_api::Error::Api {
            status: 400,
            message: Some("Device ID already in use".into()),
        };
        let err = CoreError::mutation(MutationKind::Create, &api);
        assert_eq!(err.user_message(), "Device ID already in use");
        assert!(!err.is_retryable());
    }

    #[test]
    fn generic_messages_per_operation() {
        let api = roomtrack_api::Error::Api {
            status: 500,
            message: None,
        };
        assert_eq!(
            CoreError::mutation(MutationKind::Update, &api).user_message(),
            "An error occurred. Please try again."
        );
        assert_eq!(
            CoreError::mutation(MutationKind::Delete, &api).user_message(),
            "Failed to delete room. Please try again."
        );
        assert_eq!(
            CoreError::fetch(&api).user_message(),
            "Failed to fetch rooms. Please try again."
        );
        assert!(CoreError::mutation(MutationKind::Delete, &api).is_retryable());
    }

    #[test]
    fn validation_message_is_verbatim() {
        assert_eq!(CoreError::validation().user_message(), "Please fill in all fields");
        assert_eq!(CoreError::validation().to_string(), "Please fill in all fields");
    }

    #[test]
    fn channel_errors_translate() {
        let err: CoreError = roomtrack_api::Error::ConnectRefused {
            message: "nope".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Channel { .. }));
    }

    #[test]
    fn mutation_kind_display() {
        assert_eq!(MutationKind::Delete.to_string(), "delete");
        assert_eq!(MutationKind::Create.success_message(), "Room added successfully!");
    }
}
