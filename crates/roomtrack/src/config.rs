//! Profile resolution for the CLI: config file, then flag overrides, then
//! translation to `roomtrack_core::TrackerConfig`.

use roomtrack_config::{self as config, Profile};
use roomtrack_core::TrackerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Build the runtime config for the active profile with CLI overrides.
pub fn build_tracker_config(global: &GlobalOpts) -> Result<TrackerConfig, CliError> {
    let cfg = config::load_config()?;
    let name = cfg.profile_name(global.profile.as_deref());
    let mut profile = cfg.profile(name)?.clone();
    apply_overrides(&mut profile, global);

    tracing::debug!(profile = name, api_url = %profile.api_url, "resolved profile");
    Ok(config::profile_to_tracker_config(&profile, &cfg.defaults)?)
}

/// Flags win over whatever the profile says.
fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref url) = global.api_url {
        profile.api_url.clone_from(url);
    }
    if let Some(ref url) = global.socket_url {
        profile.socket_url = Some(url.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(secs) = global.timeout {
        profile.timeout = Some(secs);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["roomtrack"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["rooms", "list"]);
        Cli::try_parse_from(argv).unwrap().global
    }

    #[test]
    fn flags_override_profile() {
        let mut profile = Profile {
            socket_url: Some("http://presence.lan:5005".into()),
            timeout: Some(60),
            ..Profile::default()
        };
        let opts = global(&[
            "--api-url",
            "http://10.1.1.1:8080/api",
            "--insecure",
            "--timeout",
            "5",
        ]);
        apply_overrides(&mut profile, &opts);

        assert_eq!(profile.api_url, "http://10.1.1.1:8080/api");
        assert_eq!(profile.socket_url.as_deref(), Some("http://presence.lan:5005"));
        assert_eq!(profile.insecure, Some(true));
        assert_eq!(profile.timeout, Some(5));
    }

    #[test]
    fn absent_flags_keep_profile() {
        let original = Profile {
            insecure: Some(false),
            ..Profile::default()
        };
        let mut profile = original.clone();
        apply_overrides(&mut profile, &global(&[]));
        assert_eq!(profile, original);
    }
}
