//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use roomtrack_config::ConfigError;
use roomtrack_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    #[allow(dead_code)]
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Backend ──────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(roomtrack::request_failed),
        help(
            "{detail}\n\
             Check that the backend is reachable: roomtrack config show"
        )
    )]
    RequestFailed {
        message: String,
        detail: String,
        status: Option<u16>,
    },

    #[error("Another change is still in progress")]
    #[diagnostic(code(roomtrack::busy), help("Wait for it to finish and try again."))]
    Busy,

    #[error("Presence channel error: {message}")]
    #[diagnostic(
        code(roomtrack::presence),
        help("Check the presence server URL (--socket-url) and that it is running.")
    )]
    Presence { message: String },

    #[error("No presence snapshot received within {seconds}s")]
    #[diagnostic(
        code(roomtrack::presence_timeout),
        help(
            "The server at {url} accepted no session or sent nothing yet.\n\
             Increase --wait or run with -v to see channel events."
        )
    )]
    PresenceTimeout { seconds: u64, url: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Room '{identifier}' not found")]
    #[diagnostic(
        code(roomtrack::not_found),
        help("Run: roomtrack rooms list to see registered rooms")
    )]
    NotFound { identifier: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(roomtrack::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(roomtrack::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: roomtrack config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(roomtrack::config))]
    Config { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(roomtrack::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    #[error("Internal error: {0}")]
    #[diagnostic(code(roomtrack::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON rendering failed: {0}")]
    #[diagnostic(code(roomtrack::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML rendering failed: {0}")]
    #[diagnostic(code(roomtrack::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::RequestFailed { status: None, .. } | Self::Presence { .. } => {
                exit_code::CONNECTION
            }
            Self::RequestFailed {
                status: Some(404), ..
            }
            | Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::RequestFailed {
                status: Some(409), ..
            } => exit_code::CONFLICT,
            Self::PresenceTimeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::ProfileNotFound { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.user_message();
        match err {
            CoreError::Validation { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Fetch { reason, .. } => Self::RequestFailed {
                message,
                detail: reason,
                status: None,
            },

            CoreError::Mutation { reason, status, .. } => Self::RequestFailed {
                message,
                detail: reason,
                status,
            },

            CoreError::MutationInFlight => Self::Busy,

            CoreError::NotFound { id } => Self::NotFound { identifier: id },

            CoreError::Channel { message } => Self::Presence { message },

            CoreError::Config { message } => Self::Config { message },

            CoreError::Detached => Self::Internal("tracker was shut down mid-command".into()),

            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownProfile { name, available } => {
                Self::ProfileNotFound { name, available }
            }
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_status() {
        let not_found = CliError::RequestFailed {
            message: "Room not found".into(),
            detail: String::new(),
            status: Some(404),
        };
        assert_eq!(not_found.exit_code(), exit_code::NOT_FOUND);

        let offline = CliError::RequestFailed {
            message: "Failed to fetch rooms. Please try again.".into(),
            detail: String::new(),
            status: None,
        };
        assert_eq!(offline.exit_code(), exit_code::CONNECTION);

        assert_eq!(CliError::Busy.exit_code(), exit_code::GENERAL);
        assert_ne!(CliError::Busy.exit_code(), exit_code::SUCCESS);
    }

    #[test]
    fn validation_keeps_core_message() {
        let err = CliError::from(CoreError::Validation {
            message: "Please fill in all fields".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
        assert!(err.to_string().contains("Please fill in all fields"));
    }

    #[test]
    fn unknown_profile_maps_to_usage() {
        let err = CliError::from(ConfigError::UnknownProfile {
            name: "lab".into(),
            available: "default".into(),
        });
        assert!(matches!(err, CliError::ProfileNotFound { .. }));
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
