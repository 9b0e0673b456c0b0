// ── Core error types ──
//
// User-facing errors from loxone-core. Transport implementations report
// `TransportError`; the `From` impl below folds those into the domain
// variants so callers never match on transport details.

use thiserror::Error;

use crate::transport::TransportError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Error communicating with Miniserver: {message}")]
    Communication { message: String },

    #[error("Event queue is closed; the supervisor has terminated")]
    EventQueueClosed,
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<TransportError> for CoreError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NotConnected => CoreError::Communication {
                message: "not connected".into(),
            },
            TransportError::Rejected(message) => CoreError::Communication { message },
            TransportError::Io(e) => CoreError::Communication {
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_become_communication() {
        let err: CoreError = TransportError::Rejected("code 500".into()).into();
        assert!(matches!(err, CoreError::Communication { ref message } if message == "code 500"));

        let err: CoreError = TransportError::NotConnected.into();
        assert_eq!(
            err.to_string(),
            "Error communicating with Miniserver: not connected"
        );
    }
}
