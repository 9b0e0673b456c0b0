// ── Runtime connection configuration ──
//
// These types describe *how* to reach one Miniserver and how patiently to
// retry. They never touch disk; the config crate (or any embedder) builds
// a `MiniserverConfig` and hands it in.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

/// The tunable delays of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum Timing {
    /// Wait before the very first connection attempt.
    FirstConnectDelay,
    /// Interval between keepalive messages on a live session.
    KeepAlivePeriod,
    /// Wait after a failed connection attempt.
    ConnectErrorDelay,
    /// Wait after the Miniserver rejected the credentials.
    UserErrorDelay,
    /// Wait after any other session failure.
    ComErrorDelay,
}

impl Timing {
    /// Inclusive range of accepted values, in seconds.
    pub const fn bounds(self) -> (u64, u64) {
        match self {
            Self::FirstConnectDelay => (0, 120),
            Self::KeepAlivePeriod => (1, 600),
            Self::ConnectErrorDelay => (0, 600),
            Self::UserErrorDelay | Self::ComErrorDelay => (0, 3600),
        }
    }

    pub const fn default_secs(self) -> u64 {
        match self {
            Self::FirstConnectDelay => 1,
            Self::KeepAlivePeriod => 240,
            Self::ConnectErrorDelay => 10,
            Self::UserErrorDelay => 60,
            Self::ComErrorDelay => 30,
        }
    }

    pub fn contains(self, secs: u64) -> bool {
        let (lo, hi) = self.bounds();
        (lo..=hi).contains(&secs)
    }
}

/// Current value of every [`Timing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTimings {
    pub first_connect_delay: Duration,
    pub keep_alive_period: Duration,
    pub connect_error_delay: Duration,
    pub user_error_delay: Duration,
    pub com_error_delay: Duration,
}

impl Default for ConnectionTimings {
    fn default() -> Self {
        let d = |t: Timing| Duration::from_secs(t.default_secs());
        Self {
            first_connect_delay: d(Timing::FirstConnectDelay),
            keep_alive_period: d(Timing::KeepAlivePeriod),
            connect_error_delay: d(Timing::ConnectErrorDelay),
            user_error_delay: d(Timing::UserErrorDelay),
            com_error_delay: d(Timing::ComErrorDelay),
        }
    }
}

impl ConnectionTimings {
    pub fn get(&self, timing: Timing) -> Duration {
        match timing {
            Timing::FirstConnectDelay => self.first_connect_delay,
            Timing::KeepAlivePeriod => self.keep_alive_period,
            Timing::ConnectErrorDelay => self.connect_error_delay,
            Timing::UserErrorDelay => self.user_error_delay,
            Timing::ComErrorDelay => self.com_error_delay,
        }
    }

    fn slot(&mut self, timing: Timing) -> &mut Duration {
        match timing {
            Timing::FirstConnectDelay => &mut self.first_connect_delay,
            Timing::KeepAlivePeriod => &mut self.keep_alive_period,
            Timing::ConnectErrorDelay => &mut self.connect_error_delay,
            Timing::UserErrorDelay => &mut self.user_error_delay,
            Timing::ComErrorDelay => &mut self.com_error_delay,
        }
    }

    /// Apply the non-negative entries of `update`, clamping each into its
    /// range. Returns the timings whose value actually changed.
    pub fn apply(&mut self, update: &TimingUpdate) -> Vec<Timing> {
        let mut changed = Vec::new();
        for (timing, requested) in update.entries() {
            let Ok(requested) = u64::try_from(requested) else {
                continue;
            };
            let (lo, hi) = timing.bounds();
            let secs = requested.clamp(lo, hi);
            if secs != requested {
                warn!(%timing, requested, applied = secs, "timing out of range, clamped");
            }
            let value = Duration::from_secs(secs);
            let slot = self.slot(timing);
            if *slot != value {
                *slot = value;
                changed.push(timing);
            }
        }
        changed
    }
}

/// A partial timing change in signed seconds. Negative means "keep the
/// current value"; every field defaults to [`TimingUpdate::NO_CHANGE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingUpdate {
    pub first_connect_delay: i64,
    pub keep_alive_period: i64,
    pub connect_error_delay: i64,
    pub user_error_delay: i64,
    pub com_error_delay: i64,
}

impl Default for TimingUpdate {
    fn default() -> Self {
        Self {
            first_connect_delay: Self::NO_CHANGE,
            keep_alive_period: Self::NO_CHANGE,
            connect_error_delay: Self::NO_CHANGE,
            user_error_delay: Self::NO_CHANGE,
            com_error_delay: Self::NO_CHANGE,
        }
    }
}

impl TimingUpdate {
    pub const NO_CHANGE: i64 = -1;

    #[must_use]
    pub fn with(mut self, timing: Timing, secs: i64) -> Self {
        match timing {
            Timing::FirstConnectDelay => self.first_connect_delay = secs,
            Timing::KeepAlivePeriod => self.keep_alive_period = secs,
            Timing::ConnectErrorDelay => self.connect_error_delay = secs,
            Timing::UserErrorDelay => self.user_error_delay = secs,
            Timing::ComErrorDelay => self.com_error_delay = secs,
        }
        self
    }

    fn entries(&self) -> [(Timing, i64); 5] {
        [
            (Timing::FirstConnectDelay, self.first_connect_delay),
            (Timing::KeepAlivePeriod, self.keep_alive_period),
            (Timing::ConnectErrorDelay, self.connect_error_delay),
            (Timing::UserErrorDelay, self.user_error_delay),
            (Timing::ComErrorDelay, self.com_error_delay),
        ]
    }
}

/// Largest messages the transport accepts from the Miniserver, in KiB.
/// Large installations produce structure files of several MiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLimits {
    pub max_binary_kib: u32,
    pub max_text_kib: u32,
}

impl Default for MessageLimits {
    fn default() -> Self {
        Self {
            max_binary_kib: 3 * 1024,
            max_text_kib: 512,
        }
    }
}

impl MessageLimits {
    pub fn max_binary_bytes(&self) -> usize {
        usize::try_from(self.max_binary_kib).unwrap_or(usize::MAX / 1024) * 1024
    }

    pub fn max_text_bytes(&self) -> usize {
        usize::try_from(self.max_text_kib).unwrap_or(usize::MAX / 1024) * 1024
    }
}

/// Everything needed to supervise one Miniserver session.
#[derive(Debug, Clone)]
pub struct MiniserverConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub timings: ConnectionTimings,
    pub limits: MessageLimits,
}

impl MiniserverConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password,
            timings: ConnectionTimings::default(),
            limits: MessageLimits::default(),
        }
    }

    /// `host:port`, used as the instance label in logs.
    pub fn label(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `true` if moving from `self` to `other` needs a new session (address,
    /// credentials or message limits differ). Timing changes never do; apply those with
    /// `Miniserver::update`.
    pub fn requires_restart(&self, other: &Self) -> bool {
        self.host != other.host
            || self.port != other.port
            || self.username != other.username
            || self.password.expose_secret() != other.password.expose_secret()
            || self.limits != other.limits
    }
}
