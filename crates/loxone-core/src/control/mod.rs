// ── Controls ──
//
// A control is a device function exposed by the Miniserver (a light
// switch, a blind motor). The set of supported kinds is closed; the kind is
// resolved once from the type tag and never changes for a given object.
// A type tag change for an existing identity is handled by the
// synchronizer as remove + create.

mod jalousie;
mod switch;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::{CommandResult, ControlCommand};
use crate::error::CoreError;
use crate::model::{Category, ControlState, Identity, Room};
use crate::transport::Transport;

pub use jalousie::Jalousie;
pub use switch::Switch;

/// Supported control kinds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum ControlKind {
    Switch,
    Jalousie,
}

impl ControlKind {
    /// Resolve a raw type tag. `None` for kinds this crate does not model.
    pub fn from_tag(tag: &str) -> Option<Self> {
        tag.trim().parse().ok()
    }
}

/// Current reading of a control, interpreted per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlReading {
    Switch { on: Option<bool> },
    Jalousie { position_percent: Option<u8> },
}

impl fmt::Display for ControlReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch { on: Some(true) } => f.write_str("on"),
            Self::Switch { on: Some(false) } => f.write_str("off"),
            Self::Jalousie {
                position_percent: Some(pct),
            } => write!(f, "{pct}%"),
            Self::Switch { on: None } | Self::Jalousie { position_percent: None } => {
                f.write_str("-")
            }
        }
    }
}

struct ControlAttrs {
    name: String,
    room: Option<Weak<Room>>,
    category: Option<Weak<Category>>,
    states: HashMap<String, Arc<ControlState>>,
}

/// A live control. Shared as `Arc<Control>`; attributes are swapped in
/// place when the configuration is reloaded.
pub struct Control {
    id: Identity,
    kind: ControlKind,
    attrs: ArcSwap<ControlAttrs>,
    transport: Arc<dyn Transport>,
}

impl Control {
    pub(crate) fn new(
        id: Identity,
        kind: ControlKind,
        name: String,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            id,
            kind,
            attrs: ArcSwap::from_pointee(ControlAttrs {
                name,
                room: None,
                category: None,
                states: HashMap::new(),
            }),
            transport,
        }
    }

    pub fn id(&self) -> &Identity {
        &self.id
    }

    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    pub fn name(&self) -> String {
        self.attrs.load().name.clone()
    }

    /// Assigned room, if any and still tracked.
    pub fn room(&self) -> Option<Arc<Room>> {
        self.attrs.load().room.as_ref().and_then(Weak::upgrade)
    }

    /// Assigned category, if any and still tracked.
    pub fn category(&self) -> Option<Arc<Category>> {
        self.attrs.load().category.as_ref().and_then(Weak::upgrade)
    }

    /// State by its proprietary name (e.g. `active`, `position`).
    pub fn state(&self, name: &str) -> Option<Arc<ControlState>> {
        self.attrs.load().states.get(name).cloned()
    }

    /// All states, sorted by name.
    pub fn states(&self) -> Vec<(String, Arc<ControlState>)> {
        let attrs = self.attrs.load();
        let mut states: Vec<_> = attrs
            .states
            .iter()
            .map(|(name, state)| (name.clone(), Arc::clone(state)))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    pub(crate) fn state_value(&self, name: &str) -> Option<f64> {
        self.attrs.load().states.get(name).map(|s| s.value())
    }

    pub fn as_switch(&self) -> Option<Switch<'_>> {
        (self.kind == ControlKind::Switch).then_some(Switch::new(self))
    }

    pub fn as_jalousie(&self) -> Option<Jalousie<'_>> {
        (self.kind == ControlKind::Jalousie).then_some(Jalousie::new(self))
    }

    pub fn reading(&self) -> ControlReading {
        match self.kind {
            ControlKind::Switch => ControlReading::Switch {
                on: Switch::new(self).is_on(),
            },
            ControlKind::Jalousie => ControlReading::Jalousie {
                position_percent: Jalousie::new(self).position_percent(),
            },
        }
    }

    /// Run a generic command. Commands the kind does not understand are
    /// [`Ignored`](CommandResult::Ignored), not an error.
    pub async fn execute(&self, command: ControlCommand) -> Result<CommandResult, CoreError> {
        let wire = match (self.kind, command) {
            (ControlKind::Switch, ControlCommand::On | ControlCommand::Off)
            | (
                ControlKind::Jalousie,
                ControlCommand::FullUp | ControlCommand::FullDown | ControlCommand::Stop,
            ) => command,
            _ => {
                debug!(control = %self.id, kind = %self.kind, %command, "command ignored");
                return Ok(CommandResult::Ignored);
            }
        };
        self.send(wire).await?;
        Ok(CommandResult::Sent)
    }

    pub(crate) async fn send(&self, command: ControlCommand) -> Result<(), CoreError> {
        debug!(control = %self.id, %command, "sending command");
        self.transport
            .send_command(&self.id, &command.to_string())
            .await
            .map_err(CoreError::from)
    }

    /// Replace name, references and state mapping. Returns `true` if any
    /// of them differed from the current attributes.
    pub(crate) fn update(
        &self,
        name: &str,
        room: Option<&Arc<Room>>,
        category: Option<&Arc<Category>>,
        states: HashMap<String, Arc<ControlState>>,
    ) -> bool {
        let current = self.attrs.load();
        let same_states = current.states.len() == states.len()
            && states.iter().all(|(name, state)| {
                current
                    .states
                    .get(name)
                    .is_some_and(|held| Arc::ptr_eq(held, state))
            });
        let changed = current.name != name
            || !same_target(current.room.as_ref(), room)
            || !same_target(current.category.as_ref(), category)
            || !same_states;

        self.attrs.store(Arc::new(ControlAttrs {
            name: name.to_owned(),
            room: room.map(Arc::downgrade),
            category: category.map(Arc::downgrade),
            states,
        }));
        changed
    }
}

fn same_target<T>(held: Option<&Weak<T>>, next: Option<&Arc<T>>) -> bool {
    match (held, next) {
        (None, None) => true,
        (Some(weak), Some(strong)) => std::ptr::eq(weak.as_ptr(), Arc::as_ptr(strong)),
        _ => false,
    }
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Control")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
