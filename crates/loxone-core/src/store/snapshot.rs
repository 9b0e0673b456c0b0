// ── Published registry view ──
//
// Immutable picture of the registry after a configuration pass. Entity
// handles inside are the live objects, so state values read through them
// are always current; membership only changes with the next snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::control::Control;
use crate::model::{Category, Identity, Room, ServerInfo};

#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    info: ServerInfo,
    rooms: Vec<Arc<Room>>,
    categories: Vec<Arc<Category>>,
    controls: HashMap<Identity, Arc<Control>>,
    state_count: usize,
    applied_at: Option<DateTime<Utc>>,
}

impl RegistrySnapshot {
    pub(crate) fn new(
        info: ServerInfo,
        mut rooms: Vec<Arc<Room>>,
        mut categories: Vec<Arc<Category>>,
        controls: HashMap<Identity, Arc<Control>>,
        state_count: usize,
        applied_at: Option<DateTime<Utc>>,
    ) -> Self {
        rooms.sort_by_cached_key(|r| r.name());
        categories.sort_by_cached_key(|c| c.name());
        Self {
            info,
            rooms,
            categories,
            controls,
            state_count,
            applied_at,
        }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Rooms sorted by name.
    pub fn rooms(&self) -> &[Arc<Room>] {
        &self.rooms
    }

    /// Categories sorted by name.
    pub fn categories(&self) -> &[Arc<Category>] {
        &self.categories
    }

    /// Controls sorted by name, then identity.
    pub fn controls(&self) -> Vec<Arc<Control>> {
        let mut controls: Vec<_> = self.controls.values().cloned().collect();
        controls.sort_by(|a, b| a.name().cmp(&b.name()).then_with(|| a.id().cmp(b.id())));
        controls
    }

    pub fn control_count(&self) -> usize {
        self.controls.len()
    }

    pub fn state_count(&self) -> usize {
        self.state_count
    }

    /// When the configuration pass completed; `None` before the first one.
    pub fn applied_at(&self) -> Option<DateTime<Utc>> {
        self.applied_at
    }

    pub fn find_control(&self, id: &Identity) -> Option<Arc<Control>> {
        self.controls.get(id).cloned()
    }

    /// First control whose display name matches exactly.
    pub fn find_control_by_name(&self, name: &str) -> Option<Arc<Control>> {
        self.controls.values().find(|c| c.name() == name).cloned()
    }

    /// Dump the whole inventory at `trace` level.
    pub fn trace_inventory(&self) {
        trace!(
            name = %self.info.miniserver_name,
            project = %self.info.project_name,
            location = %self.info.location,
            serial = %self.info.serial_number,
            "server"
        );
        for room in &self.rooms {
            trace!(id = %room.id(), name = %room.name(), "room");
        }
        for cat in &self.categories {
            trace!(id = %cat.id(), name = %cat.name(), kind = %cat.kind(), "category");
        }
        for control in self.controls() {
            trace!(
                id = %control.id(),
                name = %control.name(),
                kind = %control.kind(),
                room = control.room().map(|r| r.name()).unwrap_or_default(),
                category = control.category().map(|c| c.name()).unwrap_or_default(),
                "control"
            );
            for (name, state) in control.states() {
                trace!(id = %state.id(), %name, value = state.value(), "state");
            }
        }
    }
}
