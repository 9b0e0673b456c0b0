// ── Identity ──
//
// Every room, category, control and state on a Miniserver carries a UUID
// that stays stable across configuration reloads. `Identity` wraps it as an
// immutable value; equality and hashing are by value only.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Immutable identifier of a tracked entity.
///
/// The Miniserver formats UUIDs as `0b734138-037d-034e-ffff403fb0c34b9e`
/// (not RFC 4122), and mixes upper and lower case between the structure
/// file and binary state updates. The value is normalized to lowercase so
/// both spellings compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Identity(Arc<str>);

impl Identity {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(Arc::from(raw.as_ref().trim().to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identity {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.0.to_string()
    }
}
