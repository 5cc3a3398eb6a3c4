//! Staging: structural and data writes against the next generation.
//!
//! A [`Stage`] borrows the world's next generation mutably and its current
//! generation immutably. [`World`](crate::world::World) hands one out through
//! [`World::stage`](crate::world::World::stage) and, more usefully, to the
//! visitor of [`World::for_each_entity_mut`](crate::world::World::for_each_entity_mut):
//! the visitor can create, destroy, move and write entities while the current
//! layer sets are being walked, and the borrow checker guarantees the walk
//! never sees those changes.
//!
//! # Destroy policy
//!
//! Destroy is terminal within a frame. Once an entity has been destroyed,
//! every further staged operation on its handle (a second destroy, a move, a
//! component write) fails with [`EcsError::EntityNotStaged`] and changes
//! nothing. Its committed state stays readable until the next commit, after
//! which the handle is stale ([`EcsError::StaleEntity`]).

use std::collections::HashSet;

use tracing::trace;

use crate::access::{EntityMut, EntityRef};
use crate::entity::{EntityAllocator, EntityId};
use crate::generation::Generation;
use crate::schema::{ComponentId, ComponentSchema, PropertyId};
use crate::EcsError;

// ---------------------------------------------------------------------------
// FrameLog
// ---------------------------------------------------------------------------

/// Bookkeeping for the frame in progress, folded into a
/// [`CommitReport`](crate::world::CommitReport) and reset on commit.
#[derive(Debug, Default)]
pub(crate) struct FrameLog {
    pub created: usize,
    pub moved: usize,
    /// Handles whose slots are released by the next commit.
    pub destroyed: Vec<EntityId>,
    /// Properties written at least once this frame.
    pub written: HashSet<(EntityId, ComponentId, PropertyId)>,
    /// Writes that replaced a value already written this frame.
    pub overwrites: usize,
}

impl FrameLog {
    pub fn clear(&mut self) {
        self.created = 0;
        self.moved = 0;
        self.destroyed.clear();
        self.written.clear();
        self.overwrites = 0;
    }
}

// ---------------------------------------------------------------------------
// Staging primitives
// ---------------------------------------------------------------------------

/// Check that `id` may receive staged operations.
fn ensure_staged(
    allocator: &EntityAllocator,
    next: &Generation,
    id: EntityId,
) -> Result<(), EcsError> {
    if !allocator.is_allocated(id) {
        return Err(EcsError::StaleEntity { entity: id });
    }
    if next.state(id).is_none() {
        return Err(EcsError::EntityNotStaged { entity: id });
    }
    Ok(())
}

/// Build an [`EntityMut`] from disjoint borrows of the world's parts.
pub(crate) fn entity_mut<'s>(
    schema: &'s ComponentSchema,
    allocator: &'s EntityAllocator,
    current: &'s Generation,
    next: &'s mut Generation,
    log: &'s mut FrameLog,
    id: EntityId,
) -> Result<EntityMut<'s>, EcsError> {
    if !allocator.is_allocated(id) {
        return Err(EcsError::StaleEntity { entity: id });
    }
    let staged = next
        .state_mut(id)
        .ok_or(EcsError::EntityNotStaged { entity: id })?;
    Ok(EntityMut::new(id, schema, current.state(id), staged, log))
}

/// Read view of `id` in the current generation.
pub(crate) fn entity_ref<'w>(
    schema: &'w ComponentSchema,
    allocator: &EntityAllocator,
    current: &'w Generation,
    id: EntityId,
) -> Result<EntityRef<'w>, EcsError> {
    if !allocator.is_allocated(id) {
        return Err(EcsError::StaleEntity { entity: id });
    }
    Ok(EntityRef::new(id, schema, &current.layers, current.state(id)))
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Mutable view onto the next generation.
pub struct Stage<'s> {
    pub(crate) schema: &'s ComponentSchema,
    pub(crate) allocator: &'s mut EntityAllocator,
    pub(crate) current: &'s Generation,
    pub(crate) next: &'s mut Generation,
    pub(crate) staged_count: &'s mut usize,
    pub(crate) log: &'s mut FrameLog,
}

impl<'s> Stage<'s> {
    /// Allocate a new entity and stage it into `layer`, creating the layer on
    /// first use. The entity becomes visible at the next commit.
    pub fn create_entity(&mut self, layer: &str) -> EntityId {
        let id = self.allocator.allocate();
        let layer_id = self.next.layers.intern(layer);
        self.next.insert(id, layer_id);
        *self.staged_count += 1;
        self.log.created += 1;
        trace!(entity = %id, layer, "entity staged");
        id
    }

    /// Stage the removal of `entity`. It stays visible in the current
    /// generation until the next commit.
    ///
    /// Fails with [`EcsError::EntityNotStaged`] if it was already destroyed
    /// this frame, leaving the staged count untouched.
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<(), EcsError> {
        ensure_staged(self.allocator, self.next, entity)?;
        if let Some(state) = self.next.remove(entity) {
            *self.staged_count -= 1;
            self.log.destroyed.push(entity);
            trace!(
                entity = %entity,
                layer = self.next.layers.key(state.layer),
                "entity destroy staged"
            );
        }
        Ok(())
    }

    /// Stage `entity` into `layer`, keeping its component data. Moving into
    /// the layer it is already staged in does nothing.
    pub fn move_entity(&mut self, entity: EntityId, layer: &str) -> Result<(), EcsError> {
        ensure_staged(self.allocator, self.next, entity)?;
        let target = self.next.layers.intern(layer);
        if self.next.relocate(entity, target) == Some(true) {
            self.log.moved += 1;
            trace!(entity = %entity, layer, "entity move staged");
        }
        Ok(())
    }

    /// Write access to `entity`'s staged components.
    pub fn entity_mut(&mut self, entity: EntityId) -> Result<EntityMut<'_>, EcsError> {
        entity_mut(
            self.schema,
            self.allocator,
            self.current,
            self.next,
            self.log,
            entity,
        )
    }

    /// Committed state of `entity`. Writes made through this stage are not
    /// visible here.
    pub fn entity(&self, entity: EntityId) -> Result<EntityRef<'s>, EcsError> {
        entity_ref(self.schema, self.allocator, self.current, entity)
    }

    /// Layer `entity` will be in after the next commit; `None` once it has
    /// been destroyed this frame.
    pub fn staged_layer(&self, entity: EntityId) -> Result<Option<&str>, EcsError> {
        if !self.allocator.is_allocated(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        Ok(self
            .next
            .state(entity)
            .map(|state| self.next.layers.key(state.layer)))
    }

    /// Population the next commit will publish.
    pub fn staged_count(&self) -> usize {
        *self.staged_count
    }

    pub fn schema(&self) -> &ComponentSchema {
        self.schema
    }
}

impl std::fmt::Debug for Stage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("staged_count", &*self.staged_count)
            .field("created", &self.log.created)
            .field("destroyed", &self.log.destroyed.len())
            .finish()
    }
}
