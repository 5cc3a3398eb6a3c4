//! One buffer of world state.
//!
//! The world keeps two [`Generation`]s: *current*, which every read goes
//! through, and *next*, which every write goes to. A generation is an arena:
//! entity state sits in a dense vector indexed by the handle's slot index,
//! next to the layer index that partitions those entities.

use std::collections::BTreeMap;

use crate::entity::EntityId;
use crate::layer::{LayerId, LayerIndex};
use crate::schema::{ComponentId, PropertyId};
use crate::value::Value;

/// Explicitly written properties of one component. Anything absent reads as
/// the schema default.
pub(crate) type Overrides = BTreeMap<PropertyId, Value>;

// ---------------------------------------------------------------------------
// ComponentMap
// ---------------------------------------------------------------------------

/// Components attached to one entity in one generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ComponentMap {
    entries: BTreeMap<ComponentId, Overrides>,
}

impl ComponentMap {
    pub fn contains(&self, component: ComponentId) -> bool {
        self.entries.contains_key(&component)
    }

    pub fn overrides(&self, component: ComponentId) -> Option<&Overrides> {
        self.entries.get(&component)
    }

    /// Attach `component` with the given overrides, replacing any previous
    /// entry wholesale.
    pub fn replace(&mut self, component: ComponentId, overrides: Overrides) {
        self.entries.insert(component, overrides);
    }

    pub fn remove(&mut self, component: ComponentId) -> bool {
        self.entries.remove(&component).is_some()
    }

    /// Write one property. Returns `false`, writing nothing, if the
    /// component is not attached.
    pub fn set(&mut self, component: ComponentId, property: PropertyId, value: Value) -> bool {
        match self.entries.get_mut(&component) {
            Some(overrides) => {
                overrides.insert(property, value);
                true
            }
            None => false,
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

// ---------------------------------------------------------------------------
// EntityState
// ---------------------------------------------------------------------------

/// An entity's layer and components within one generation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EntityState {
    pub id: EntityId,
    pub layer: LayerId,
    pub components: ComponentMap,
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct Generation {
    pub layers: LayerIndex,
    /// Indexed by `EntityId::index`. `None` for slots with no entity in this
    /// generation (never committed, destroyed, or free).
    entities: Vec<Option<EntityState>>,
}

impl Clone for Generation {
    fn clone(&self) -> Self {
        Self {
            layers: self.layers.clone(),
            entities: self.entities.clone(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.layers.clone_from(&source.layers);
        self.entities.clone_from(&source.entities);
    }
}

impl Generation {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            layers: LayerIndex::new(),
            entities: Vec::with_capacity(capacity),
        }
    }

    /// State for `id`, if this generation holds that exact handle.
    pub fn state(&self, id: EntityId) -> Option<&EntityState> {
        self.entities
            .get(id.slot())
            .and_then(Option::as_ref)
            .filter(|state| state.id == id)
    }

    pub fn state_mut(&mut self, id: EntityId) -> Option<&mut EntityState> {
        self.entities
            .get_mut(id.slot())
            .and_then(Option::as_mut)
            .filter(|state| state.id == id)
    }

    /// Add a fresh entity to `layer` with no components.
    pub fn insert(&mut self, id: EntityId, layer: LayerId) {
        let slot = id.slot();
        if slot >= self.entities.len() {
            self.entities.resize_with(slot + 1, || None);
        }
        debug_assert!(self.entities[slot].is_none(), "slot {slot} already staged");
        self.entities[slot] = Some(EntityState {
            id,
            layer,
            components: ComponentMap::default(),
        });
        self.layers.insert(layer, id);
    }

    /// Take `id` out of this generation, layer membership included.
    pub fn remove(&mut self, id: EntityId) -> Option<EntityState> {
        self.state(id)?;
        let state = self.entities[id.slot()].take()?;
        self.layers.remove(state.layer, id);
        Some(state)
    }

    /// Re-file `id` under `layer`, appended after the layer's existing
    /// members. Returns `false` if the entity was already there.
    pub fn relocate(&mut self, id: EntityId, layer: LayerId) -> Option<bool> {
        let previous = self.state(id)?.layer;
        if previous == layer {
            return Some(false);
        }
        self.layers.remove(previous, id);
        self.layers.insert(layer, id);
        if let Some(state) = self.state_mut(id) {
            state.layer = layer;
        }
        Some(true)
    }

    /// Number of entities held, derived from the layer index.
    pub fn population(&self) -> usize {
        self.layers.member_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: u32) -> EntityId {
        EntityId::new(index, 0)
    }

    #[test]
    fn insert_and_remove_track_layers() {
        let mut generation = Generation::default();
        let alive = generation.layers.intern("alive");
        generation.insert(id(0), alive);
        generation.insert(id(3), alive);
        assert_eq!(generation.population(), 2);
        assert_eq!(generation.layers.members(alive).collect::<Vec<_>>(), [id(0), id(3)]);

        let removed = generation.remove(id(0)).unwrap();
        assert_eq!(removed.layer, alive);
        assert!(generation.state(id(0)).is_none());
        assert_eq!(generation.layers.members(alive).collect::<Vec<_>>(), [id(3)]);
        assert!(generation.remove(id(0)).is_none());
    }

    #[test]
    fn state_rejects_other_generation() {
        let mut generation = Generation::default();
        let layer = generation.layers.intern("l");
        generation.insert(EntityId::new(2, 1), layer);
        assert!(generation.state(EntityId::new(2, 1)).is_some());
        assert!(generation.state(EntityId::new(2, 0)).is_none());
    }

    #[test]
    fn relocate_appends_to_target() {
        let mut generation = Generation::default();
        let a = generation.layers.intern("a");
        let b = generation.layers.intern("b");
        generation.insert(id(0), b);
        generation.insert(id(1), a);
        assert_eq!(generation.relocate(id(1), b), Some(true));
        assert_eq!(generation.relocate(id(1), b), Some(false));
        assert_eq!(generation.layers.members(b).collect::<Vec<_>>(), [id(0), id(1)]);
        assert_eq!(generation.layers.layer_len(a), 0);
        assert_eq!(generation.state(id(1)).unwrap().layer, b);
        assert_eq!(generation.relocate(id(9), a), None);
    }

    #[test]
    fn clone_from_is_a_deep_copy() {
        let mut staged = Generation::default();
        let layer = staged.layers.intern("l");
        staged.insert(id(0), layer);
        staged
            .state_mut(id(0))
            .unwrap()
            .components
            .replace(ComponentId(0), Overrides::from([(PropertyId(0), Value::from(5))]));

        let mut copy = Generation::default();
        copy.clone_from(&staged);
        staged
            .state_mut(id(0))
            .unwrap()
            .components
            .set(ComponentId(0), PropertyId(0), Value::from(6));

        let copied = copy.state(id(0)).unwrap();
        assert_eq!(
            copied.components.overrides(ComponentId(0)).unwrap()[&PropertyId(0)],
            Value::from(5)
        );
    }
}
