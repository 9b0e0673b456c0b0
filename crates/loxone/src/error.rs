//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use loxone_config::ConfigError;
use loxone_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const SESSION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(loxone::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Add a [profiles.{name}] table to the config file (see: loxone config path)."
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(loxone::no_credentials),
        help(
            "Set `password_env` in the profile, store the password in the system keyring \
             under service 'loxone' as '{profile}/password', or set `password`."
        )
    )]
    NoCredentials { profile: String },

    #[error(transparent)]
    #[diagnostic(code(loxone::config))]
    Config(Box<figment::Error>),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(loxone::validation))]
    Validation { field: String, reason: String },

    // ── Replay ───────────────────────────────────────────────────────
    #[error("Invalid event on line {line} of the replay script")]
    #[diagnostic(
        code(loxone::replay_script),
        help("Each line must be one JSON object tagged with \"event\", e.g. {{\"event\":\"connection_established\"}}")
    )]
    Script {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Control '{identifier}' not found")]
    #[diagnostic(
        code(loxone::not_found),
        help("Controls are matched by name first, then by identity.")
    )]
    ControlNotFound { identifier: String },

    // ── Session ──────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(loxone::session))]
    Session { message: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render configuration: {0}")]
    #[diagnostic(code(loxone::toml))]
    Toml(#[from] toml::ser::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Session { .. } => exit_code::SESSION,
            Self::NoCredentials { .. } => exit_code::AUTH,
            Self::ProfileNotFound { .. } | Self::ControlNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::Script { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Figment(err) => Self::Config(err),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Communication { .. } | CoreError::EventQueueClosed => Self::Session {
                message: err.to_string(),
            },
        }
    }
}
