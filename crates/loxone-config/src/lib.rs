//! Shared configuration for Loxone tools.
//!
//! TOML profiles, password resolution (env + keyring + plaintext),
//! and translation to `loxone_core::MiniserverConfig`. Values are checked
//! strictly here; the core only clamps values changed at runtime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use loxone_core::{ConnectionTimings, MessageLimits, MiniserverConfig, Timing, TimingUpdate};

/// Keyring service name under which passwords are stored as
/// `<profile>/password`.
pub const KEYRING_SERVICE: &str = "loxone";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named Miniserver profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// A named Miniserver profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Hostname or IP address of the Miniserver.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    /// Password (plaintext — prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    #[serde(default)]
    pub timings: Timings,

    #[serde(default)]
    pub limits: Limits,
}

fn default_port() -> u16 {
    80
}

/// Session delays in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Timings {
    pub first_connect_delay: u64,
    pub keep_alive_period: u64,
    pub connect_error_delay: u64,
    pub user_error_delay: u64,
    pub com_error_delay: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            first_connect_delay: Timing::FirstConnectDelay.default_secs(),
            keep_alive_period: Timing::KeepAlivePeriod.default_secs(),
            connect_error_delay: Timing::ConnectErrorDelay.default_secs(),
            user_error_delay: Timing::UserErrorDelay.default_secs(),
            com_error_delay: Timing::ComErrorDelay.default_secs(),
        }
    }
}

impl Timings {
    fn entries(&self) -> [(Timing, u64); 5] {
        [
            (Timing::FirstConnectDelay, self.first_connect_delay),
            (Timing::KeepAlivePeriod, self.keep_alive_period),
            (Timing::ConnectErrorDelay, self.connect_error_delay),
            (Timing::UserErrorDelay, self.user_error_delay),
            (Timing::ComErrorDelay, self.com_error_delay),
        ]
    }

    /// Reject any value outside its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (timing, secs) in self.entries() {
            if !timing.contains(secs) {
                let (lo, hi) = timing.bounds();
                return Err(ConfigError::Validation {
                    field: format!("timings.{timing}"),
                    reason: format!("{secs}s is outside {lo}..={hi}s"),
                });
            }
        }
        Ok(())
    }

    pub fn to_connection_timings(&self) -> ConnectionTimings {
        ConnectionTimings {
            first_connect_delay: Duration::from_secs(self.first_connect_delay),
            keep_alive_period: Duration::from_secs(self.keep_alive_period),
            connect_error_delay: Duration::from_secs(self.connect_error_delay),
            user_error_delay: Duration::from_secs(self.user_error_delay),
            com_error_delay: Duration::from_secs(self.com_error_delay),
        }
    }

    /// Every timing as an explicit runtime update, for re-applying an
    /// edited profile to a running instance.
    pub fn to_update(&self) -> TimingUpdate {
        self.entries()
            .into_iter()
            .fold(TimingUpdate::default(), |update, (timing, secs)| {
                update.with(timing, i64::try_from(secs).unwrap_or(i64::MAX))
            })
    }
}

/// Maximum message sizes in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Limits {
    pub max_binary_msg_kib: u32,
    pub max_text_msg_kib: u32,
}

impl Default for Limits {
    fn default() -> Self {
        let core = MessageLimits::default();
        Self {
            max_binary_msg_kib: core.max_binary_kib,
            max_text_msg_kib: core.max_text_kib,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "loxone", "loxone").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("loxone");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` layered over defaults, with `LOXONE_` environment
/// overrides on top (`__` separates nesting levels, e.g.
/// `LOXONE_PROFILES__HOME__HOST`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LOXONE_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Pick the profile to use: explicit request, then `default_profile`,
/// then `"default"`.
pub fn active_profile_name(requested: Option<&str>, cfg: &Config) -> String {
    requested
        .map(str::to_owned)
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the password: env var named by the profile, then the system
/// keyring, then plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_password_with(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        |account| {
            keyring::Entry::new(KEYRING_SERVICE, account)
                .and_then(|entry| entry.get_password())
                .ok()
        },
    )
}

fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(pw) = profile.password_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(pw));
    }

    // 2. System keyring
    if let Some(pw) = keyring(&format!("{profile_name}/password")) {
        return Ok(SecretString::from(pw));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Profile → runtime config ────────────────────────────────────────

impl Profile {
    /// Strict check of everything except the password.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "host".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::Validation {
                field: "port".into(),
                reason: "must be between 1 and 65535".into(),
            });
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "username".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.limits.max_binary_msg_kib == 0 || self.limits.max_text_msg_kib == 0 {
            return Err(ConfigError::Validation {
                field: "limits".into(),
                reason: "message size limits must be positive".into(),
            });
        }
        self.timings.validate()
    }
}

/// Build a `MiniserverConfig` from a profile.
pub fn profile_to_miniserver_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<MiniserverConfig, ConfigError> {
    profile.validate()?;
    let password = resolve_password(profile, profile_name)?;
    Ok(build(profile, password))
}

fn build(profile: &Profile, password: SecretString) -> MiniserverConfig {
    let mut config = MiniserverConfig::new(
        profile.host.trim(),
        profile.port,
        profile.username.trim(),
        password,
    );
    config.timings = profile.timings.to_connection_timings();
    config.limits = MessageLimits {
        max_binary_kib: profile.limits.max_binary_msg_kib,
        max_text_kib: profile.limits.max_text_msg_kib,
    };
    config
}

/// Look up `profile_name` in `cfg` and build its runtime config.
pub fn resolve_profile(cfg: &Config, profile_name: &str) -> Result<MiniserverConfig, ConfigError> {
    let profile = cfg
        .profiles
        .get(profile_name)
        .ok_or_else(|| ConfigError::UnknownProfile {
            name: profile_name.into(),
        })?;
    profile_to_miniserver_config(profile, profile_name)
}
