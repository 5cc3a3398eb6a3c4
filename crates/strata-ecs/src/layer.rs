//! Layer keys and the per-generation layer index.
//!
//! Layer keys are interned to dense [`LayerId`]s the first time they are
//! used. The next generation's index only ever appends keys, and the current
//! index is always a copy of a former next index, so a `LayerId` means the
//! same key in both generations.

use std::collections::HashMap;
use std::fmt;

use crate::entity::EntityId;

/// Interned layer key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub(crate) u32);

impl fmt::Debug for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerId({})", self.0)
    }
}

/// Members of one layer. Removal leaves a `None` in place; [`LayerIndex::compact`]
/// squeezes them out.
#[derive(Debug, Default)]
struct Members {
    entries: Vec<Option<EntityId>>,
    live: usize,
}

impl Clone for Members {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            live: self.live,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.entries.clone_from(&source.entries);
        self.live = source.live;
    }
}

/// Layer key -> members, both in first-insertion order.
///
/// Insert and remove are O(1). Removal tombstones the member's position, so
/// an index that has seen removals should be [compacted](Self::compact)
/// before it is published.
#[derive(Debug, Default)]
pub(crate) struct LayerIndex {
    keys: Vec<String>,
    by_key: HashMap<String, LayerId>,
    /// Indexed by `LayerId.0`.
    layers: Vec<Members>,
    /// Position of each member within its layer's entries.
    positions: HashMap<EntityId, usize>,
}

impl Clone for LayerIndex {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            by_key: self.by_key.clone(),
            layers: self.layers.clone(),
            positions: self.positions.clone(),
        }
    }

    // Commit re-seeds the next index from the current one every frame; this
    // keeps the member vectors' allocations alive across frames.
    fn clone_from(&mut self, source: &Self) {
        self.keys.clone_from(&source.keys);
        self.by_key.clone_from(&source.by_key);
        self.layers.clone_from(&source.layers);
        self.positions.clone_from(&source.positions);
    }
}

impl LayerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an existing key.
    pub fn id(&self, key: &str) -> Option<LayerId> {
        self.by_key.get(key).copied()
    }

    /// Look up `key`, creating an empty layer for it on first use.
    pub fn intern(&mut self, key: &str) -> LayerId {
        if let Some(id) = self.id(key) {
            return id;
        }
        let id = LayerId(self.keys.len() as u32);
        self.keys.push(key.to_owned());
        self.by_key.insert(key.to_owned(), id);
        self.layers.push(Members::default());
        id
    }

    pub fn key(&self, layer: LayerId) -> &str {
        &self.keys[layer.0 as usize]
    }

    /// Members of `layer`, oldest insertion first. Empty for ids this index
    /// has not seen yet.
    pub fn members(&self, layer: LayerId) -> impl Iterator<Item = EntityId> + '_ {
        self.layers
            .get(layer.0 as usize)
            .into_iter()
            .flat_map(|members| members.entries.iter().flatten().copied())
    }

    /// Number of members in `layer`.
    pub fn layer_len(&self, layer: LayerId) -> usize {
        self.layers.get(layer.0 as usize).map_or(0, |m| m.live)
    }

    /// Append `entity` to `layer`. The entity must not be in any layer.
    pub fn insert(&mut self, layer: LayerId, entity: EntityId) {
        debug_assert!(!self.positions.contains_key(&entity), "{entity} already indexed");
        let members = &mut self.layers[layer.0 as usize];
        self.positions.insert(entity, members.entries.len());
        members.entries.push(Some(entity));
        members.live += 1;
    }

    /// Remove `entity` from `layer`, keeping the order of the others.
    pub fn remove(&mut self, layer: LayerId, entity: EntityId) -> bool {
        let Some(members) = self.layers.get_mut(layer.0 as usize) else {
            return false;
        };
        let Some(&pos) = self.positions.get(&entity) else {
            return false;
        };
        match members.entries.get_mut(pos) {
            Some(slot) if *slot == Some(entity) => {
                *slot = None;
                members.live -= 1;
                self.positions.remove(&entity);
                true
            }
            _ => false,
        }
    }

    /// Drop the tombstones left by [`remove`](Self::remove). Member order is
    /// unchanged.
    pub fn compact(&mut self) {
        for members in &mut self.layers {
            if members.entries.len() == members.live {
                continue;
            }
            members.entries.retain(Option::is_some);
            for (pos, entity) in members.entries.iter().flatten().enumerate() {
                self.positions.insert(*entity, pos);
            }
        }
    }

    /// All layers in key-creation order.
    pub fn iter(&self) -> impl Iterator<Item = (LayerId, &str)> + '_ {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, key)| (LayerId(i as u32), key.as_str()))
    }

    /// Number of known keys, including empty layers.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Sum of all layer sizes.
    pub fn member_count(&self) -> usize {
        self.positions.len()
    }

    #[cfg(test)]
    fn tombstones(&self) -> usize {
        self.layers.iter().map(|m| m.entries.len() - m.live).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(index: &LayerIndex, layer: LayerId) -> Vec<EntityId> {
        index.members(layer).collect()
    }

    #[test]
    fn intern_is_stable() {
        let mut index = LayerIndex::new();
        let alive = index.intern("alive");
        let dead = index.intern("dead");
        assert_eq!(index.intern("alive"), alive);
        assert_ne!(alive, dead);
        assert_eq!(index.key(dead), "dead");
        assert_eq!(index.len(), 2);
        assert_eq!(
            index.iter().collect::<Vec<_>>(),
            vec![(alive, "alive"), (dead, "dead")]
        );
    }

    #[test]
    fn remove_preserves_order() {
        let mut index = LayerIndex::new();
        let layer = index.intern("units");
        let ids: Vec<_> = (0..4).map(|i| EntityId::new(i, 0)).collect();
        for &id in &ids {
            index.insert(layer, id);
        }
        assert!(index.remove(layer, ids[1]));
        assert!(!index.remove(layer, ids[1]));
        assert_eq!(members(&index, layer), vec![ids[0], ids[2], ids[3]]);
        assert_eq!(index.member_count(), 3);
        assert_eq!(index.layer_len(layer), 3);
    }

    #[test]
    fn remove_from_wrong_layer_is_refused() {
        let mut index = LayerIndex::new();
        let a = index.intern("a");
        let b = index.intern("b");
        let e = EntityId::new(0, 0);
        index.insert(a, e);
        index.insert(b, EntityId::new(1, 0));
        assert!(!index.remove(b, e));
        assert_eq!(members(&index, a), vec![e]);
        assert_eq!(index.layer_len(b), 1);
    }

    #[test]
    fn compact_keeps_order_and_positions() {
        let mut index = LayerIndex::new();
        let layer = index.intern("units");
        let ids: Vec<_> = (0..6).map(|i| EntityId::new(i, 0)).collect();
        for &id in &ids {
            index.insert(layer, id);
        }
        index.remove(layer, ids[0]);
        index.remove(layer, ids[3]);
        assert_eq!(index.tombstones(), 2);

        index.compact();
        assert_eq!(index.tombstones(), 0);
        assert_eq!(members(&index, layer), vec![ids[1], ids[2], ids[4], ids[5]]);

        // Positions were rebuilt, so removal after compaction still works.
        assert!(index.remove(layer, ids[5]));
        assert!(index.remove(layer, ids[1]));
        index.insert(layer, ids[0]);
        assert_eq!(members(&index, layer), vec![ids[2], ids[4], ids[0]]);
    }

    #[test]
    fn clone_from_copies_structure() {
        let mut staged = LayerIndex::new();
        let a = staged.intern("a");
        staged.insert(a, EntityId::new(0, 0));
        let b = staged.intern("b");
        staged.insert(b, EntityId::new(1, 0));

        let mut copy = LayerIndex::new();
        copy.clone_from(&staged);
        assert_eq!(copy.id("b"), Some(b));
        assert_eq!(members(&copy, a), members(&staged, a));
        assert_eq!(members(&copy, b), members(&staged, b));
        assert!(copy.remove(a, EntityId::new(0, 0)));
    }

    #[test]
    fn unseen_layer_has_no_members() {
        let index = LayerIndex::new();
        assert_eq!(index.members(LayerId(5)).count(), 0);
        assert_eq!(index.layer_len(LayerId(5)), 0);
    }
}
