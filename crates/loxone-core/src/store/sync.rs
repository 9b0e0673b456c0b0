// ── Configuration reconciliation ──
//
// Upsert-then-sweep of a freshly parsed snapshot into the registry.
// Entities whose identity survives keep their `Arc`, so consumers holding a
// control across a reload keep talking to the live object.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use super::registry::{EntityRegistry, SeenSet};
use crate::control::{Control, ControlKind};
use crate::model::{
    Category, CategoryKind, ConfigSnapshot, ControlEntry, ControlState, Identity, Room,
};
use crate::transport::Transport;

/// What one configuration pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Identities of rooms, categories, controls and states created.
    pub created: Vec<Identity>,
    /// Identities of entities no longer present, now dropped.
    pub removed: Vec<Identity>,
    /// Controls whose type tag is not supported, and entities left out
    /// because their identity is blank (listed as the empty identity).
    pub skipped: Vec<Identity>,
    /// Existing entities whose attributes changed in place.
    pub updated: usize,
}

impl SyncReport {
    /// `true` if the pass left the registry exactly as it was.
    pub fn is_unchanged(&self) -> bool {
        self.created.is_empty() && self.removed.is_empty() && self.updated == 0
    }
}

/// Applies configuration snapshots to an [`EntityRegistry`].
pub(crate) struct ConfigSynchronizer {
    transport: Arc<dyn Transport>,
}

impl ConfigSynchronizer {
    /// New controls are bound to `transport` for sending commands.
    pub(crate) fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Reconcile `snapshot` into `registry`.
    ///
    /// Entries that cannot be tracked (blank identity, unsupported type)
    /// are left out one by one; the rest of the snapshot still applies.
    pub(crate) fn apply(
        &self,
        registry: &mut EntityRegistry,
        snapshot: ConfigSnapshot,
    ) -> SyncReport {
        let ConfigSnapshot {
            info,
            rooms,
            categories,
            controls,
        } = snapshot;

        let mut report = SyncReport::default();
        let mut seen = SeenSet::default();

        registry.info = info;

        for entry in rooms {
            if entry.id.is_empty() {
                warn!(name = %entry.name, "room without identity, skipping");
                report.skipped.push(entry.id);
                continue;
            }
            if let Some(room) = registry.rooms.get(&entry.id) {
                if room.set_name(&entry.name) {
                    report.updated += 1;
                }
            } else {
                let room = Arc::new(Room::new(entry.id.clone(), entry.name));
                registry.rooms.insert(entry.id.clone(), room);
                report.created.push(entry.id.clone());
            }
            seen.rooms.insert(entry.id);
        }

        for entry in categories {
            if entry.id.is_empty() {
                warn!(name = %entry.name, "category without identity, skipping");
                report.skipped.push(entry.id);
                continue;
            }
            let kind = CategoryKind::from_tag(&entry.kind);
            if let Some(cat) = registry.categories.get(&entry.id) {
                if cat.update(&entry.name, kind) {
                    report.updated += 1;
                }
            } else {
                let cat = Arc::new(Category::new(entry.id.clone(), entry.name, kind));
                registry.categories.insert(entry.id.clone(), cat);
                report.created.push(entry.id.clone());
            }
            seen.categories.insert(entry.id);
        }

        for entry in controls {
            self.upsert_control(registry, &mut seen, &mut report, entry);
        }

        let removed = registry.retain_seen(&seen);
        report.removed.extend(removed);

        let (rooms, categories, controls, states) = registry.counts();
        debug!(
            rooms,
            categories,
            controls,
            states,
            created = report.created.len(),
            removed = report.removed.len(),
            skipped = report.skipped.len(),
            updated = report.updated,
            "configuration applied"
        );
        report
    }

    fn upsert_control(
        &self,
        registry: &mut EntityRegistry,
        seen: &mut SeenSet,
        report: &mut SyncReport,
        entry: ControlEntry,
    ) {
        let Some(kind) = ControlKind::from_tag(&entry.kind) else {
            debug!(control = %entry.id, tag = %entry.kind, "unsupported control type, skipping");
            report.skipped.push(entry.id);
            return;
        };
        if entry.id.is_empty() {
            warn!(name = %entry.name, %kind, "control without identity, skipping");
            report.skipped.push(entry.id);
            return;
        }
        if !seen.controls.insert(entry.id.clone()) {
            warn!(control = %entry.id, "duplicate control identity in snapshot, ignoring repeat");
            return;
        }

        let mut states = HashMap::with_capacity(entry.states.len());
        for (name, id) in entry.states {
            if id.is_empty() {
                warn!(control = %entry.id, state = %name, "state without identity, skipping");
                report.skipped.push(id);
                continue;
            }
            if !seen.states.insert(id.clone()) {
                warn!(control = %entry.id, state = %id, "state already claimed by another control");
                continue;
            }
            let state = if let Some(state) = registry.states.get(&id) {
                if state.set_name(&name) {
                    report.updated += 1;
                }
                Arc::clone(state)
            } else {
                let state = Arc::new(ControlState::new(id.clone(), name.clone()));
                registry.states.insert(id.clone(), Arc::clone(&state));
                report.created.push(id);
                state
            };
            states.insert(name, state);
        }

        let room = resolve(&registry.rooms, &seen.rooms, entry.room.as_ref(), "room", &entry.id);
        let category = resolve(
            &registry.categories,
            &seen.categories,
            entry.category.as_ref(),
            "category",
            &entry.id,
        );

        let existing = registry
            .controls
            .get(&entry.id)
            .filter(|c| c.kind() == kind)
            .cloned();
        let control = if let Some(control) = existing {
            if control.update(&entry.name, room.as_ref(), category.as_ref(), states) {
                report.updated += 1;
            }
            control
        } else {
            if registry.controls.contains_key(&entry.id) {
                debug!(control = %entry.id, %kind, "control type changed, replacing");
                report.removed.push(entry.id.clone());
            }
            let control = Arc::new(Control::new(
                entry.id.clone(),
                kind,
                entry.name.clone(),
                Arc::clone(&self.transport),
            ));
            control.update(&entry.name, room.as_ref(), category.as_ref(), states);
            registry.controls.insert(entry.id.clone(), Arc::clone(&control));
            report.created.push(entry.id);
            control
        };

        for (_, state) in control.states() {
            state.attach(&control);
        }
    }
}

/// Look up a referenced container among those seen in this pass. A
/// missing or stale reference resolves to `None`.
fn resolve<T>(
    map: &HashMap<Identity, Arc<T>>,
    seen: &HashSet<Identity>,
    id: Option<&Identity>,
    what: &str,
    control: &Identity,
) -> Option<Arc<T>> {
    let id = id.filter(|id| !id.is_empty())?;
    let found = map.get(id).filter(|_| seen.contains(id)).cloned();
    if found.is_none() {
        debug!(%control, %id, what, "reference not found");
    }
    found
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::control::tests::RecordingTransport;
    use crate::model::{CategoryEntry, RoomEntry, ServerInfo};

    fn sync() -> ConfigSynchronizer {
        ConfigSynchronizer::new(Arc::new(RecordingTransport::default()))
    }

    fn house() -> ConfigSnapshot {
        ConfigSnapshot {
            info: ServerInfo {
                miniserver_name: "MS Home".into(),
                ..ServerInfo::default()
            },
            rooms: vec![RoomEntry::new("R1", "Kitchen")],
            categories: vec![CategoryEntry::new("C1", "Lighting", "lights")],
            controls: vec![
                ControlEntry::new("S1", "Lamp", "Switch")
                    .in_room("R1")
                    .in_category("C1")
                    .with_state("active", "ST1"),
                ControlEntry::new("J1", "Blind", "Jalousie")
                    .in_room("R1")
                    .with_state("up", "U1")
                    .with_state("down", "D1")
                    .with_state("position", "P1"),
            ],
        }
    }

    fn ids(list: &[Identity]) -> Vec<&str> {
        let mut v: Vec<&str> = list.iter().map(Identity::as_str).collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn first_pass_creates_everything_and_links_it() {
        let mut reg = EntityRegistry::new();
        let report = sync().apply(&mut reg, house());

        assert_eq!(
            ids(&report.created),
            ["c1", "d1", "j1", "p1", "r1", "s1", "st1", "u1"]
        );
        assert!(report.removed.is_empty());
        assert_eq!(reg.counts(), (1, 1, 2, 4));
        assert_eq!(reg.info().miniserver_name, "MS Home");

        let lamp = reg.controls.get(&"s1".into()).unwrap();
        assert_eq!(lamp.room().unwrap().name(), "Kitchen");
        assert!(lamp.category().unwrap().kind().is_lighting());
        let active = reg.state(&"st1".into()).unwrap();
        assert!(Arc::ptr_eq(&active.control().unwrap(), lamp));
    }

    #[test]
    fn applying_same_snapshot_twice_is_idempotent() {
        let mut reg = EntityRegistry::new();
        let sync = sync();
        sync.apply(&mut reg, house());
        let lamp = Arc::clone(reg.controls.get(&"s1".into()).unwrap());
        let pos = Arc::clone(reg.state(&"p1".into()).unwrap());

        let report = sync.apply(&mut reg, house());
        assert!(report.is_unchanged(), "{report:?}");
        assert!(Arc::ptr_eq(&lamp, reg.controls.get(&"s1".into()).unwrap()));
        assert!(Arc::ptr_eq(&pos, reg.state(&"p1".into()).unwrap()));
    }

    #[test]
    fn rename_keeps_object_identity() {
        let mut reg = EntityRegistry::new();
        let sync = sync();
        sync.apply(&mut reg, house());
        let lamp = Arc::clone(reg.controls.get(&"s1".into()).unwrap());
        let kitchen = Arc::clone(reg.rooms.get(&"r1".into()).unwrap());

        let mut next = house();
        next.rooms[0].name = "Kitchen & Dining".into();
        next.controls[0].name = "Ceiling".into();
        let report = sync.apply(&mut reg, next);

        assert!(report.created.is_empty());
        assert_eq!(report.updated, 2);
        assert!(Arc::ptr_eq(&lamp, reg.controls.get(&"s1".into()).unwrap()));
        assert!(Arc::ptr_eq(&kitchen, reg.rooms.get(&"r1".into()).unwrap()));
        assert_eq!(lamp.name(), "Ceiling");
        assert_eq!(lamp.room().unwrap().name(), "Kitchen & Dining");
    }

    #[test]
    fn absent_entities_are_swept() {
        let mut reg = EntityRegistry::new();
        let sync = sync();
        sync.apply(&mut reg, house());
        let blind = Arc::clone(reg.controls.get(&"j1".into()).unwrap());

        let mut next = house();
        next.controls.truncate(1);
        next.rooms.clear();
        let report = sync.apply(&mut reg, next);

        assert_eq!(ids(&report.removed), ["d1", "j1", "p1", "r1", "u1"]);
        assert_eq!(reg.counts(), (0, 1, 1, 1));
        assert!(reg.controls.get(&"j1".into()).is_none());
        // Room is gone: the lamp's reference now resolves to nothing.
        assert!(reg.controls.get(&"s1".into()).unwrap().room().is_none());
        // A held handle still works, it is just no longer tracked.
        assert_eq!(blind.name(), "Blind");
    }

    #[test]
    fn unknown_type_tags_are_skipped() {
        let mut reg = EntityRegistry::new();
        let mut snap = house();
        snap.controls
            .push(ControlEntry::new("X1", "Meter", "InfoOnlyAnalog").with_state("value", "V1"));
        let report = sync().apply(&mut reg, snap);

        assert_eq!(ids(&report.skipped), ["x1"]);
        assert!(reg.controls.get(&"x1".into()).is_none());
        assert!(reg.state(&"v1".into()).is_none());
    }

    #[test]
    fn missing_room_reference_resolves_to_none() {
        let mut reg = EntityRegistry::new();
        let mut snap = house();
        snap.controls[0].room = Some("nowhere".into());
        sync().apply(&mut reg, snap);
        assert!(reg.controls.get(&"s1".into()).unwrap().room().is_none());
    }

    #[test]
    fn kind_change_replaces_the_control() {
        let mut reg = EntityRegistry::new();
        let sync = sync();
        sync.apply(&mut reg, house());
        let old = Arc::clone(reg.controls.get(&"s1".into()).unwrap());

        let mut next = house();
        next.controls[0].kind = "Jalousie".into();
        let report = sync.apply(&mut reg, next);

        let new = reg.controls.get(&"s1".into()).unwrap();
        assert!(!Arc::ptr_eq(&old, new));
        assert_eq!(new.kind(), ControlKind::Jalousie);
        assert_eq!(ids(&report.removed), ["s1"]);
        assert_eq!(ids(&report.created), ["s1"]);
        // The state object survives and now points at the new control.
        let active = reg.state(&"st1".into()).unwrap();
        assert!(Arc::ptr_eq(&active.control().unwrap(), new));
    }

    #[test]
    fn blank_identities_are_skipped_without_blocking_the_rest() {
        let mut reg = EntityRegistry::new();
        let mut snap = house();
        snap.rooms.push(RoomEntry::new(" ", "Ghost"));
        snap.controls
            .push(ControlEntry::new("X1", "Meter", "InfoOnlyAnalog").with_state("value", ""));
        snap.controls
            .push(ControlEntry::new("", "Orphan", "Switch").with_state("active", "OA1"));
        snap.controls[1].states.insert("stop".into(), "".into());
        let report = sync().apply(&mut reg, snap);

        // Ghost room, orphan switch and the blind's blank state; the meter
        // is skipped for its type before its ids matter.
        assert_eq!(ids(&report.skipped), ["", "", "", "x1"]);
        assert_eq!(reg.counts(), (1, 1, 2, 4));
        let lamp = reg.controls.get(&"s1".into()).unwrap();
        assert_eq!(lamp.room().unwrap().name(), "Kitchen");
        assert!(reg.controls.get(&"j1".into()).unwrap().state("stop").is_none());
        assert!(reg.state(&"oa1".into()).is_none());
    }

    #[test]
    fn state_moved_between_controls_keeps_identity() {
        let mut reg = EntityRegistry::new();
        let sync = sync();
        sync.apply(&mut reg, house());
        let active = Arc::clone(reg.state(&"st1".into()).unwrap());

        let mut next = house();
        next.controls[0].states.clear();
        next.controls[1].states.insert("active".into(), "ST1".into());
        sync.apply(&mut reg, next);

        let blind = reg.controls.get(&"j1".into()).unwrap();
        assert!(Arc::ptr_eq(&blind.state("active").unwrap(), &active));
        assert!(Arc::ptr_eq(&active.control().unwrap(), blind));
        assert!(reg.controls.get(&"s1".into()).unwrap().state("active").is_none());
    }
}
