// ── Control state ──
//
// A single named numeric value reported by the Miniserver for one control
// (e.g. `active` of a switch, `position` of a jalousie). Only the supervisor
// writes to it; readers on other threads see the latest value without
// taking a lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::{ArcSwap, ArcSwapOption};

use super::identity::Identity;
use crate::control::Control;

pub struct ControlState {
    id: Identity,
    name: ArcSwap<String>,
    /// `f64` bit pattern.
    value: AtomicU64,
    control: ArcSwapOption<Weak<Control>>,
}

impl ControlState {
    pub(crate) fn new(id: Identity, name: String) -> Self {
        Self {
            id,
            name: ArcSwap::from_pointee(name),
            value: AtomicU64::new(0.0_f64.to_bits()),
            control: ArcSwapOption::empty(),
        }
    }

    pub fn id(&self) -> &Identity {
        &self.id
    }

    pub fn name(&self) -> String {
        self.name.load().as_ref().clone()
    }

    pub fn value(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Acquire))
    }

    /// The control this state belongs to, if it is still alive.
    pub fn control(&self) -> Option<Arc<Control>> {
        self.control.load().as_ref().and_then(|weak| weak.upgrade())
    }

    pub(crate) fn set_value(&self, value: f64) {
        self.value.store(value.to_bits(), Ordering::Release);
    }

    /// Returns `true` if the name differed.
    pub(crate) fn set_name(&self, name: &str) -> bool {
        if self.name.load().as_str() == name {
            return false;
        }
        self.name.store(Arc::new(name.to_owned()));
        true
    }

    /// Point the back-reference at `control`.
    pub(crate) fn attach(&self, control: &Arc<Control>) {
        self.control.store(Some(Arc::new(Arc::downgrade(control))));
    }
}

impl std::fmt::Debug for ControlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlState")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("value", &self.value())
            .finish_non_exhaustive()
    }
}
