//! Layer collections.
//!
//! A [`LayerSet`] is an ordered, immutable snapshot of layers of one kind.
//! Sequence order is the z-order: a layer later in the set is drawn on top of
//! every layer before it. Every operation returns a new snapshot and leaves
//! the receiver untouched.

mod overlay;
mod text;

use std::fmt;

pub use overlay::{OverlayImage, Transform, TransformPatch};
pub use text::{TextAttribute, TextLayer, TextPatch};

/// Identity of a layer within its own collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LayerId(pub u32);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A layer kind that can live in a [`LayerSet`].
pub trait Layer: Clone {
    /// Typed description of a single attribute change.
    type Patch;

    fn id(&self) -> LayerId;

    /// Only called by [`LayerSet`] when the layer enters the collection.
    fn assign_id(&mut self, id: LayerId);

    fn apply(&mut self, patch: Self::Patch);
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSet<L> {
    layers: Vec<L>,
    highest_issued: u32,
}

impl<L> Default for LayerSet<L> {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            highest_issued: 0,
        }
    }
}

impl<L: Layer> LayerSet<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers in draw order.
    pub fn iter(&self) -> impl Iterator<Item = &L> {
        self.layers.iter()
    }

    pub fn ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(Layer::id).collect()
    }

    pub fn get(&self, id: LayerId) -> Option<&L> {
        self.layers.iter().find(|layer| layer.id() == id)
    }

    pub fn as_slice(&self) -> &[L] {
        &self.layers
    }

    // Ids are never reused, even after the current maximum was removed.
    fn next_id(&self) -> LayerId {
        let max_live = self.layers.iter().map(|l| l.id().0).max().unwrap_or(0);
        LayerId(max_live.max(self.highest_issued) + 1)
    }

    fn pushed(&self, mut layer: L) -> (LayerId, Self) {
        let id = self.next_id();
        layer.assign_id(id);
        let mut layers = self.layers.clone();
        layers.push(layer);
        let next = Self {
            layers,
            highest_issued: id.0,
        };
        (id, next)
    }

    /// Appends `template` on top of the stack under a freshly allocated id.
    #[must_use]
    pub fn add(&self, template: L) -> (LayerId, Self) {
        self.pushed(template)
    }

    /// Applies `patch` to the layer with `id`. Unknown ids leave the set as is.
    #[must_use]
    pub fn update(&self, id: LayerId, patch: L::Patch) -> Self {
        let mut next = self.clone();
        if let Some(layer) = next.layers.iter_mut().find(|layer| layer.id() == id) {
            layer.apply(patch);
        }
        next
    }

    /// Copies every field of `id` except the id itself and appends the copy on top.
    #[must_use]
    pub fn duplicate(&self, id: LayerId) -> (Option<LayerId>, Self) {
        match self.get(id) {
            Some(source) => {
                let (new_id, next) = self.pushed(source.clone());
                (Some(new_id), next)
            }
            None => (None, self.clone()),
        }
    }

    #[must_use]
    pub fn remove(&self, id: LayerId) -> Self {
        Self {
            layers: self
                .layers
                .iter()
                .filter(|layer| layer.id() != id)
                .cloned()
                .collect(),
            highest_issued: self.highest_issued,
        }
    }
}
