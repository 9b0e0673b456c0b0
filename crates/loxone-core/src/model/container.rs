// ── Rooms and categories ──
//
// Both are plain named containers a control can be assigned to. The
// identity is fixed at construction; display attributes are swapped in
// place on every configuration reload so `Arc<Room>` handles held by
// consumers keep pointing at the live object.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use super::identity::Identity;

/// A room as configured on the Miniserver.
#[derive(Debug)]
pub struct Room {
    id: Identity,
    name: ArcSwap<String>,
}

impl Room {
    pub(crate) fn new(id: Identity, name: String) -> Self {
        Self {
            id,
            name: ArcSwap::from_pointee(name),
        }
    }

    pub fn id(&self) -> &Identity {
        &self.id
    }

    pub fn name(&self) -> String {
        self.name.load().as_ref().clone()
    }

    /// Replace the display name. Returns `true` if it differed.
    pub(crate) fn set_name(&self, name: &str) -> bool {
        if self.name.load().as_str() == name {
            return false;
        }
        self.name.store(Arc::new(name.to_owned()));
        true
    }
}

/// Classification carried by a category's type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CategoryKind {
    Lights,
    Other,
}

impl CategoryKind {
    /// Map the raw type tag. Anything but `lights` is [`Other`](Self::Other).
    pub fn from_tag(tag: &str) -> Self {
        if tag.trim().eq_ignore_ascii_case("lights") {
            Self::Lights
        } else {
            Self::Other
        }
    }

    pub fn is_lighting(self) -> bool {
        matches!(self, Self::Lights)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CategoryAttrs {
    name: String,
    kind: CategoryKind,
}

/// A control category (e.g. "Lighting", "Shading").
#[derive(Debug)]
pub struct Category {
    id: Identity,
    attrs: ArcSwap<CategoryAttrs>,
}

impl Category {
    pub(crate) fn new(id: Identity, name: String, kind: CategoryKind) -> Self {
        Self {
            id,
            attrs: ArcSwap::from_pointee(CategoryAttrs { name, kind }),
        }
    }

    pub fn id(&self) -> &Identity {
        &self.id
    }

    pub fn name(&self) -> String {
        self.attrs.load().name.clone()
    }

    pub fn kind(&self) -> CategoryKind {
        self.attrs.load().kind
    }

    /// Replace name and classification. Returns `true` if either differed.
    pub(crate) fn update(&self, name: &str, kind: CategoryKind) -> bool {
        let current = self.attrs.load();
        if current.name == name && current.kind == kind {
            return false;
        }
        self.attrs.store(Arc::new(CategoryAttrs {
            name: name.to_owned(),
            kind,
        }));
        true
    }
}
