//! Config subcommand handlers. None of these touch the backend.

use dialoguer::{Confirm, Input};

use roomtrack_config::{self as config, DEFAULT_PROFILE, Profile};
use roomtrack_core::config::DEFAULT_API_URL;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let out = output::render_single(
                global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("{c:#?}\n# {e}")),
                |c| c.profile_name(global.profile.as_deref()).to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init => init(global),
    }
}

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path();
    eprintln!("roomtrack configuration wizard");
    eprintln!("   Config path: {}\n", path.display());

    let mut cfg = config::load_config()?;

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default(
            global
                .profile
                .clone()
                .unwrap_or_else(|| DEFAULT_PROFILE.into()),
        )
        .interact_text()
        .map_err(prompt_err)?;

    let api_url: String = Input::new()
        .with_prompt("Directory API URL")
        .default(global.api_url.clone().unwrap_or_else(|| DEFAULT_API_URL.into()))
        .interact_text()
        .map_err(prompt_err)?;

    let socket_url: String = Input::new()
        .with_prompt("Presence server URL (empty: same host as the API)")
        .allow_empty(true)
        .default(global.socket_url.clone().unwrap_or_default())
        .interact_text()
        .map_err(prompt_err)?;

    let insecure = Confirm::new()
        .with_prompt("Accept self-signed TLS certificates?")
        .default(global.insecure)
        .interact()
        .map_err(prompt_err)?;

    let profile = Profile {
        api_url,
        socket_url: Some(socket_url).filter(|s| !s.trim().is_empty()),
        insecure: insecure.then_some(true),
        ..Profile::default()
    };
    // Catch bad URLs before they reach the file.
    config::profile_to_tracker_config(&profile, &cfg.defaults)?;

    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    config::save_config_to(&cfg, &path)?;

    eprintln!("\nConfiguration written to {}", path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: roomtrack rooms list");
    Ok(())
}
