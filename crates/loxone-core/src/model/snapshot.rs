// ── Parsed configuration snapshot ──
//
// The shape a transport hands over after decoding the Miniserver's
// structure file. It is plain data: the synchronizer reconciles it against
// the live registry, nothing here holds references into the registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::identity::Identity;

/// Descriptive server metadata. Absent fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    pub miniserver_name: String,
    pub project_name: String,
    pub location: String,
    pub serial_number: String,
    pub cloud_address: String,
    /// Proprietary display name the project uses for "room".
    pub room_title: String,
    /// Proprietary display name the project uses for "category".
    pub category_title: String,
}

/// A full configuration document at one point in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(default)]
    pub info: ServerInfo,
    #[serde(default)]
    pub rooms: Vec<RoomEntry>,
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
    #[serde(default)]
    pub controls: Vec<ControlEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEntry {
    pub id: Identity,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub id: Identity,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEntry {
    pub id: Identity,
    pub name: String,
    /// Raw type tag, e.g. `Switch` or `Jalousie`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub room: Option<Identity>,
    #[serde(default)]
    pub category: Option<Identity>,
    /// State name → state identity. Names are proprietary per type tag.
    #[serde(default)]
    pub states: BTreeMap<String, Identity>,
}

impl RoomEntry {
    pub fn new(id: impl Into<Identity>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl CategoryEntry {
    pub fn new(id: impl Into<Identity>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
        }
    }
}

impl ControlEntry {
    pub fn new(id: impl Into<Identity>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
            room: None,
            category: None,
            states: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn in_room(mut self, room: impl Into<Identity>) -> Self {
        self.room = Some(room.into());
        self
    }

    #[must_use]
    pub fn in_category(mut self, category: impl Into<Identity>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_state(mut self, name: impl Into<String>, id: impl Into<Identity>) -> Self {
        self.states.insert(name.into(), id.into());
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn server_info_defaults_missing_fields_to_empty() {
        let snapshot: ConfigSnapshot =
            serde_json::from_str(r#"{ "info": { "miniserver_name": "MS Home" } }"#).unwrap();
        assert_eq!(snapshot.info.miniserver_name, "MS Home");
        assert_eq!(snapshot.info.serial_number, "");
        assert!(snapshot.controls.is_empty());
    }

    #[test]
    fn control_entry_reads_type_tag_and_states() {
        let entry: ControlEntry = serde_json::from_str(
            r#"{ "id": "J1", "name": "Blind", "type": "Jalousie",
                 "room": "R1", "states": { "position": "P1", "up": "U1" } }"#,
        )
        .unwrap();
        assert_eq!(entry.kind, "Jalousie");
        assert_eq!(entry.room, Some(Identity::new("r1")));
        assert_eq!(entry.states.get("position"), Some(&Identity::new("p1")));
        assert!(entry.category.is_none());
    }
}
