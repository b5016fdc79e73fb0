// ── Runtime tracker configuration ──
//
// Describes *where* the directory authority and presence channel live and
// how to talk to them. Never touches disk; the CLI builds a
// `TrackerConfig` from its profile and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use roomtrack_api::{ReconnectConfig, TlsMode, TransportConfig};

use crate::directory::DEFAULT_SUCCESS_TTL;

/// Default directory API root.
pub const DEFAULT_API_URL: &str = "http://localhost:5005/api";

/// Default presence server root.
pub const DEFAULT_SOCKET_URL: &str = "http://localhost:5005";

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed development backends).
    DangerAcceptInvalid,
}

/// Push-channel reconnection policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        let defaults = ReconnectConfig::default();
        Self {
            enabled: true,
            initial_delay: defaults.initial_delay,
            max_delay: defaults.max_delay,
            max_retries: defaults.max_retries,
        }
    }
}

impl From<&ReconnectPolicy> for ReconnectConfig {
    fn from(policy: &ReconnectPolicy) -> Self {
        Self {
            initial_delay: policy.initial_delay,
            max_delay: policy.max_delay,
            max_retries: if policy.enabled {
                policy.max_retries
            } else {
                Some(0)
            },
        }
    }
}

/// Everything the core needs to reach its two collaborators.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Directory API root, e.g. `http://localhost:5005/api`.
    pub api_url: Url,
    /// Presence server root, e.g. `http://localhost:5005`.
    pub socket_url: Url,
    pub tls: TlsVerification,
    /// Per-request timeout for the directory API.
    pub timeout: Duration,
    /// How long a success notice stays visible.
    pub success_ttl: Duration,
    pub reconnect: ReconnectPolicy,
}

impl TrackerConfig {
    pub fn new(api_url: Url, socket_url: Url) -> Self {
        Self {
            api_url,
            socket_url,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            success_ttl: DEFAULT_SUCCESS_TTL,
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// The local development backend on port 5005.
    pub fn local() -> Result<Self, url::ParseError> {
        Ok(Self::new(
            Url::parse(DEFAULT_API_URL)?,
            Url::parse(DEFAULT_SOCKET_URL)?,
        ))
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn local_defaults() {
        let config = TrackerConfig::local().unwrap();
        assert_eq!(config.api_url.as_str(), "http://localhost:5005/api");
        assert_eq!(config.socket_url.as_str(), "http://localhost:5005/");
        assert_eq!(config.success_ttl, Duration::from_secs(3));
        assert!(matches!(config.transport().tls, TlsMode::System));
    }

    #[test]
    fn disabled_reconnect_means_single_attempt() {
        let policy = ReconnectPolicy {
            enabled: false,
            max_retries: Some(10),
            ..ReconnectPolicy::default()
        };
        assert_eq!(ReconnectConfig::from(&policy).max_retries, Some(0));
        assert_eq!(
            ReconnectConfig::from(&ReconnectPolicy::default()).max_retries,
            None
        );
    }
}
