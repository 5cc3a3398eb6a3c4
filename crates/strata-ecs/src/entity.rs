//! Entity handles and slot allocation.
//!
//! An [`EntityId`] is a 64-bit handle that packs a *generation* counter in the
//! high 32 bits and a slot *index* in the low 32 bits. Per-generation entity
//! state lives in dense vectors indexed by the slot index. A slot is only
//! released when a commit drops its entity, at which point the generation is
//! bumped and every outstanding handle to it becomes stale.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity handle.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Construct an `EntityId` from a slot index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The slot index (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.index() as usize
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Hands out slots with generational tracking.
///
/// Free slots are kept in a FIFO queue so that generations are spread out
/// over time rather than concentrated on a hot index.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// Current generation for each slot.
    generations: Vec<u32>,
    /// Whether the slot is currently held by an entity.
    allocated: Vec<bool>,
    /// Recyclable slots, oldest first.
    free_indices: VecDeque<u32>,
    /// Number of `true` entries in `allocated`.
    allocated_count: usize,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an allocator with room for `capacity` slots before growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            generations: Vec::with_capacity(capacity),
            allocated: Vec::with_capacity(capacity),
            free_indices: VecDeque::new(),
            allocated_count: 0,
        }
    }

    /// Allocate a fresh [`EntityId`].
    ///
    /// A recycled slot is reused with its already-bumped generation; otherwise
    /// a brand-new slot is appended.
    pub fn allocate(&mut self) -> EntityId {
        self.allocated_count += 1;
        if let Some(index) = self.free_indices.pop_front() {
            self.allocated[index as usize] = true;
            EntityId::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.allocated.push(true);
            EntityId::new(index, 0)
        }
    }

    /// Release the slot held by `id`, bumping its generation so that any
    /// outstanding handles become stale.
    ///
    /// Returns `false` (and changes nothing) if `id` is already stale.
    pub fn deallocate(&mut self, id: EntityId) -> bool {
        if !self.is_allocated(id) {
            return false;
        }
        let idx = id.slot();
        self.allocated[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(id.index());
        self.allocated_count -= 1;
        true
    }

    /// Whether `id` still holds its slot (matching generation, not released).
    pub fn is_allocated(&self, id: EntityId) -> bool {
        let idx = id.slot();
        idx < self.generations.len()
            && self.allocated[idx]
            && self.generations[idx] == id.generation()
    }

    /// Number of slots currently held.
    pub fn allocated_count(&self) -> usize {
        self.allocated_count
    }

    /// Highest slot index ever handed out, plus one.
    pub fn slot_count(&self) -> usize {
        self.generations.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
