use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::snapshot::RegistrySnapshot;
use crate::control::Control;
use crate::model::{Category, ControlState, Identity, Room, ServerInfo};

/// Id-keyed maps of every tracked entity plus server metadata.
///
/// Not `Sync`-shared: only the supervisor holds it, so plain `HashMap`s are
/// enough. Identity-preserving reconciliation lives in
/// [`ConfigSynchronizer`](super::ConfigSynchronizer).
#[derive(Debug, Default)]
pub(crate) struct EntityRegistry {
    pub(super) info: ServerInfo,
    pub(super) rooms: HashMap<Identity, Arc<Room>>,
    pub(super) categories: HashMap<Identity, Arc<Category>>,
    pub(super) controls: HashMap<Identity, Arc<Control>>,
    pub(super) states: HashMap<Identity, Arc<ControlState>>,
}

impl EntityRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub(crate) fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub(crate) fn state(&self, id: &Identity) -> Option<&Arc<ControlState>> {
        self.states.get(id)
    }

    pub(crate) fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.rooms.len(),
            self.categories.len(),
            self.controls.len(),
            self.states.len(),
        )
    }

    // ── Sweep ────────────────────────────────────────────────────────

    /// Drop every entity whose identity is not in the matching `seen` set.
    /// Returns the removed identities.
    pub(super) fn retain_seen(&mut self, seen: &SeenSet) -> Vec<Identity> {
        let mut removed = Vec::new();
        sweep(&mut self.controls, &seen.controls, &mut removed);
        sweep(&mut self.states, &seen.states, &mut removed);
        sweep(&mut self.rooms, &seen.rooms, &mut removed);
        sweep(&mut self.categories, &seen.categories, &mut removed);
        removed
    }

    // ── Publication ──────────────────────────────────────────────────

    pub(crate) fn snapshot(&self, applied_at: DateTime<Utc>) -> RegistrySnapshot {
        RegistrySnapshot::new(
            self.info.clone(),
            self.rooms.values().cloned().collect(),
            self.categories.values().cloned().collect(),
            self.controls.clone(),
            self.states.len(),
            Some(applied_at),
        )
    }
}

fn sweep<T>(
    map: &mut HashMap<Identity, Arc<T>>,
    seen: &HashSet<Identity>,
    removed: &mut Vec<Identity>,
) {
    map.retain(|id, _| {
        let keep = seen.contains(id);
        if !keep {
            removed.push(id.clone());
        }
        keep
    });
}

/// Identities encountered during one reconciliation pass.
#[derive(Debug, Default)]
pub(super) struct SeenSet {
    pub rooms: HashSet<Identity>,
    pub categories: HashSet<Identity>,
    pub controls: HashSet<Identity>,
    pub states: HashSet<Identity>,
}
