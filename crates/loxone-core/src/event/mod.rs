// ── Inbound events ──
//
// Everything a transport learns about the session is expressed as a
// `ServerEvent` and pushed onto the supervisor's queue. Events are also
// (de)serializable so a recorded session can be replayed.

mod queue;

use serde::{Deserialize, Serialize};

use crate::model::{ConfigSnapshot, Identity};

pub use queue::EventSender;
pub(crate) use queue::{EventQueue, QueueItem, channel};

/// An event produced by a transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Authentication completed; the session is usable.
    ConnectionEstablished,
    /// The session ended or could not be established.
    ConnectionLost { reason: OfflineReason },
    /// A full structure file was received and parsed.
    ConfigurationReceived { snapshot: Box<ConfigSnapshot> },
    /// A single state value changed.
    StateValueChanged { id: Identity, value: f64 },
    /// The transport finished a close requested by the supervisor.
    CloseAcknowledged,
}

/// Why the session is (or went) offline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OfflineReason {
    #[default]
    None,
    Unauthorized,
    TooManyFailedLogins,
    CommunicationError,
    AuthenticationTimeout,
    IdleTimeout,
    InternalError,
    ConnectFailed,
}

impl OfflineReason {
    /// Human-readable description for status displays.
    pub fn description(self) -> &'static str {
        match self {
            Self::None => "Offline",
            Self::Unauthorized => "User not authorized",
            Self::TooManyFailedLogins => "Too many failed login attempts - stopped trying",
            Self::CommunicationError => "Error communicating with Miniserver",
            Self::AuthenticationTimeout => "User authentication timeout",
            Self::IdleTimeout => "Idle timeout from Miniserver - adjust keepalive settings",
            Self::InternalError => "Internal error",
            Self::ConnectFailed => "Failed to connect to Miniserver",
        }
    }

    /// `true` when the user has to fix credentials before a reconnect can
    /// succeed.
    pub fn is_configuration_problem(self) -> bool {
        matches!(self, Self::Unauthorized | Self::TooManyFailedLogins)
    }

    /// `true` when the supervisor must not try again.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::TooManyFailedLogins)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn events_deserialize_from_tagged_json() {
        let ev: ServerEvent =
            serde_json::from_str(r#"{"event":"connection_lost","reason":"unauthorized"}"#)
                .unwrap();
        assert!(matches!(
            ev,
            ServerEvent::ConnectionLost {
                reason: OfflineReason::Unauthorized
            }
        ));

        let ev: ServerEvent =
            serde_json::from_str(r#"{"event":"state_value_changed","id":"P1","value":0.5}"#)
                .unwrap();
        match ev {
            ServerEvent::StateValueChanged { id, value } => {
                assert_eq!(id, Identity::new("p1"));
                assert!((value - 0.5).abs() < f64::EPSILON);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn only_credential_failures_are_configuration_problems() {
        assert!(OfflineReason::Unauthorized.is_configuration_problem());
        assert!(OfflineReason::TooManyFailedLogins.is_configuration_problem());
        assert!(!OfflineReason::IdleTimeout.is_configuration_problem());
        assert!(OfflineReason::TooManyFailedLogins.is_fatal());
        assert!(!OfflineReason::Unauthorized.is_fatal());
    }

    #[test]
    fn reason_display_is_snake_case() {
        assert_eq!(OfflineReason::TooManyFailedLogins.to_string(), "too_many_failed_logins");
    }
}
