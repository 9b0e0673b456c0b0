//! Config subcommand handlers.

use std::collections::HashMap;

use loxone_config::{self as config, Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

// ── Helpers ─────────────────────────────────────────────────────────

/// Replace plaintext passwords before anything is printed.
fn redact(cfg: &mut Config) {
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(REDACTED.into());
        }
    }
}

fn available(profiles: &HashMap<String, Profile>) -> String {
    let mut names: Vec<&str> = profiles.keys().map(String::as_str).collect();
    names.sort_unstable();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

/// Narrow `cfg` to the requested profile, if one was given.
fn select_profile(cfg: &mut Config, requested: Option<&str>) -> Result<(), CliError> {
    let Some(name) = requested else {
        return Ok(());
    };
    let Some(profile) = cfg.profiles.remove(name) else {
        return Err(CliError::ProfileNotFound {
            name: name.into(),
            available: available(&cfg.profiles),
        });
    };
    profile.validate()?;
    cfg.profiles = HashMap::from([(name.to_owned(), profile)]);
    cfg.default_profile = Some(name.to_owned());
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let mut cfg = config::load_config()?;
            select_profile(&mut cfg, global.profile.as_deref())?;
            redact(&mut cfg);

            let active = config::active_profile_name(global.profile.as_deref(), &cfg);
            let rendered = match global.output {
                OutputFormat::Table => format!(
                    "# {}\n# active profile: {active}\n\n{}",
                    config::config_path().display(),
                    toml::to_string_pretty(&cfg)?
                ),
                OutputFormat::Json => output::render_json(&cfg),
                OutputFormat::Plain => {
                    let mut names: Vec<&String> = cfg.profiles.keys().collect();
                    names.sort_unstable();
                    names.into_iter().cloned().collect::<Vec<_>>().join("\n")
                }
            };
            output::print_output(&rendered, global.quiet);
            Ok(())
        }
    }
}
