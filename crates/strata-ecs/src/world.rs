//! The [`World`] is the top-level container. It owns the schema, the slot
//! allocator and both generations of entity state, and it is the only place
//! where the next generation is promoted to current.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::access::{EntityMut, EntityRef};
use crate::entity::{EntityAllocator, EntityId};
use crate::generation::Generation;
use crate::schema::{json_kind, ComponentSchema};
use crate::stage::{self, FrameLog, Stage};
use crate::EcsError;

// ---------------------------------------------------------------------------
// WorldConfig
// ---------------------------------------------------------------------------

/// Construction-time settings for a [`World`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Number of entity slots to reserve up front.
    pub entity_capacity: usize,
    /// Cross-check the staged entity count against the next layer index
    /// before every commit.
    pub verify_commits: bool,
}

impl Default for WorldConfig {
    /// No reservation, commit verification on.
    fn default() -> Self {
        Self {
            entity_capacity: 0,
            verify_commits: true,
        }
    }
}

impl WorldConfig {
    /// Load a config from a JSON object. Missing fields take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, EcsError> {
        let document: serde_json::Value =
            serde_json::from_str(text).map_err(|e| EcsError::InvalidConfig {
                reason: format!("config is not valid JSON: {e}"),
            })?;
        // Derived `Deserialize` also accepts a positional array.
        if !document.is_object() {
            return Err(EcsError::InvalidConfig {
                reason: format!("config must be an object, found {}", json_kind(&document)),
            });
        }
        serde_json::from_value(document).map_err(|e| EcsError::InvalidConfig {
            reason: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// CommitReport
// ---------------------------------------------------------------------------

/// Summary of one [`World::apply_changes`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReport {
    /// Commit counter after this commit (the first commit reports 1).
    pub frame: u64,
    /// Entities created during the frame (including ones destroyed again).
    pub created: usize,
    /// Entities destroyed during the frame; their slots are now free.
    pub destroyed: usize,
    /// Layer changes staged during the frame.
    pub moved: usize,
    /// Property writes that replaced a value already written in the frame.
    pub overwrites: usize,
    /// Committed population after this commit.
    pub entity_count: usize,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Double-buffered, layered entity store.
///
/// Reads ([`entity`](Self::entity), [`for_each_entity`](Self::for_each_entity),
/// ...) see the current generation. Writes ([`create_entity`](Self::create_entity),
/// [`entity_mut`](Self::entity_mut), ...) go to the next generation and become
/// visible together at [`apply_changes`](Self::apply_changes).
pub struct World {
    schema: Arc<ComponentSchema>,
    config: WorldConfig,
    allocator: EntityAllocator,
    current: Generation,
    next: Generation,
    /// Committed population.
    entity_count: usize,
    /// Population the next commit will publish.
    staged_count: usize,
    /// Number of commits so far.
    frame: u64,
    log: FrameLog,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("frame", &self.frame)
            .field("entity_count", &self.entity_count)
            .field("staged_count", &self.staged_count)
            .field("layer_count", &self.current.layers.len())
            .finish()
    }
}

impl World {
    /// Create an empty world over `schema` with the default config.
    pub fn new(schema: impl Into<Arc<ComponentSchema>>) -> Self {
        Self::with_config(schema, WorldConfig::default())
    }

    pub fn with_config(schema: impl Into<Arc<ComponentSchema>>, config: WorldConfig) -> Self {
        let capacity = config.entity_capacity;
        Self {
            schema: schema.into(),
            config,
            allocator: EntityAllocator::with_capacity(capacity),
            current: Generation::with_capacity(capacity),
            next: Generation::with_capacity(capacity),
            entity_count: 0,
            staged_count: 0,
            frame: 0,
            log: FrameLog::default(),
        }
    }

    pub fn schema(&self) -> &ComponentSchema {
        &self.schema
    }

    /// Shared handle to the schema, for building further worlds over it.
    pub fn schema_arc(&self) -> Arc<ComponentSchema> {
        Arc::clone(&self.schema)
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // -- staging ---------------------------------------------------------------

    /// Mutable view onto the next generation.
    pub fn stage(&mut self) -> Stage<'_> {
        Stage {
            schema: &self.schema,
            allocator: &mut self.allocator,
            current: &self.current,
            next: &mut self.next,
            staged_count: &mut self.staged_count,
            log: &mut self.log,
        }
    }

    /// See [`Stage::create_entity`].
    pub fn create_entity(&mut self, layer: &str) -> EntityId {
        self.stage().create_entity(layer)
    }

    /// See [`Stage::destroy_entity`].
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<(), EcsError> {
        self.stage().destroy_entity(entity)
    }

    /// See [`Stage::move_entity`].
    pub fn move_entity(&mut self, entity: EntityId, layer: &str) -> Result<(), EcsError> {
        self.stage().move_entity(entity, layer)
    }

    /// Write access to `entity`'s staged components.
    pub fn entity_mut(&mut self, entity: EntityId) -> Result<EntityMut<'_>, EcsError> {
        stage::entity_mut(
            &self.schema,
            &self.allocator,
            &self.current,
            &mut self.next,
            &mut self.log,
            entity,
        )
    }

    // -- reads -----------------------------------------------------------------

    /// Committed state of `entity`.
    ///
    /// Entities created this frame are readable but have no committed state;
    /// entities destroyed this frame stay readable until the next commit.
    pub fn entity(&self, entity: EntityId) -> Result<EntityRef<'_>, EcsError> {
        stage::entity_ref(&self.schema, &self.allocator, &self.current, entity)
    }

    /// Whether `entity` still holds its slot. True from creation until the
    /// commit that follows its destruction.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.allocator.is_allocated(entity)
    }

    /// Committed layer of `entity`.
    pub fn layer_of(&self, entity: EntityId) -> Result<Option<&str>, EcsError> {
        Ok(self.entity(entity)?.layer())
    }

    /// Committed layer keys in creation order, including empty layers.
    pub fn layers(&self) -> impl Iterator<Item = &str> + '_ {
        self.current.layers.iter().map(|(_, key)| key)
    }

    /// Committed size of `layer`; zero for unknown keys.
    pub fn layer_len(&self, layer: &str) -> usize {
        self.current
            .layers
            .id(layer)
            .map_or(0, |id| self.current.layers.layer_len(id))
    }

    /// Committed population.
    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    /// Population the next commit will publish.
    pub fn staged_count(&self) -> usize {
        self.staged_count
    }

    /// Number of commits applied so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // -- iteration -------------------------------------------------------------

    /// Visit every committed entity: layers in creation order, entities in
    /// the order they entered their layer.
    pub fn for_each_entity<F>(&self, mut visitor: F)
    where
        F: FnMut(EntityRef<'_>),
    {
        for (layer, _) in self.current.layers.iter() {
            for id in self.current.layers.members(layer) {
                visitor(self.committed(id));
            }
        }
    }

    /// Like [`for_each_entity`](Self::for_each_entity), restricted to
    /// `layers` in the order given. Unknown keys are skipped.
    pub fn for_each_entity_in<K, F>(&self, layers: &[K], mut visitor: F)
    where
        K: AsRef<str>,
        F: FnMut(EntityRef<'_>),
    {
        for key in layers {
            let Some(layer) = self.current.layers.id(key.as_ref()) else {
                continue;
            };
            for id in self.current.layers.members(layer) {
                visitor(self.committed(id));
            }
        }
    }

    /// Visit every committed entity with a [`Stage`] for staging changes.
    /// The set being walked is the current one, so nothing staged during the
    /// walk affects which entities are visited.
    pub fn for_each_entity_mut<F>(&mut self, mut visitor: F)
    where
        F: FnMut(EntityRef<'_>, &mut Stage<'_>),
    {
        let mut stage = Stage {
            schema: &self.schema,
            allocator: &mut self.allocator,
            current: &self.current,
            next: &mut self.next,
            staged_count: &mut self.staged_count,
            log: &mut self.log,
        };
        let current = &self.current;
        for (layer, _) in current.layers.iter() {
            for id in current.layers.members(layer) {
                visitor(committed(&self.schema, current, id), &mut stage);
            }
        }
    }

    /// Like [`for_each_entity_mut`](Self::for_each_entity_mut), restricted
    /// to `layers` in the order given. Unknown keys are skipped.
    pub fn for_each_entity_in_mut<K, F>(&mut self, layers: &[K], mut visitor: F)
    where
        K: AsRef<str>,
        F: FnMut(EntityRef<'_>, &mut Stage<'_>),
    {
        let mut stage = Stage {
            schema: &self.schema,
            allocator: &mut self.allocator,
            current: &self.current,
            next: &mut self.next,
            staged_count: &mut self.staged_count,
            log: &mut self.log,
        };
        let current = &self.current;
        for key in layers {
            let Some(layer) = current.layers.id(key.as_ref()) else {
                continue;
            };
            for id in current.layers.members(layer) {
                visitor(committed(&self.schema, current, id), &mut stage);
            }
        }
    }

    fn committed(&self, id: EntityId) -> EntityRef<'_> {
        committed(&self.schema, &self.current, id)
    }

    // -- commit ----------------------------------------------------------------

    /// Promote the next generation to current.
    ///
    /// Every staged create, destroy, move and component write becomes
    /// visible at once. The new next generation starts as a deep copy of the
    /// new current one, so properties nobody touches next frame keep their
    /// committed values. Slots of entities destroyed this frame are released
    /// and their handles become stale.
    ///
    /// With [`WorldConfig::verify_commits`] on, a staged count that disagrees
    /// with the next layer index is reported as
    /// [`EcsError::StagedCountMismatch`] and nothing is applied.
    pub fn apply_changes(&mut self) -> Result<CommitReport, EcsError> {
        if self.config.verify_commits {
            let indexed = self.next.population();
            if indexed != self.staged_count {
                warn!(
                    frame = self.frame,
                    staged = self.staged_count,
                    indexed,
                    "commit refused: staged entity count disagrees with next layer index"
                );
                return Err(EcsError::StagedCountMismatch {
                    staged: self.staged_count,
                    indexed,
                });
            }
        }

        self.next.layers.compact();

        // Swap the buffers, then overwrite the old current one with a copy of
        // what was just promoted; `clone_from` reuses its allocations.
        std::mem::swap(&mut self.current, &mut self.next);
        self.next.clone_from(&self.current);

        for &entity in &self.log.destroyed {
            self.allocator.deallocate(entity);
        }

        self.entity_count = self.staged_count;
        self.frame += 1;

        let report = CommitReport {
            frame: self.frame,
            created: self.log.created,
            destroyed: self.log.destroyed.len(),
            moved: self.log.moved,
            overwrites: self.log.overwrites,
            entity_count: self.entity_count,
        };
        self.log.clear();

        debug!(
            frame = report.frame,
            created = report.created,
            destroyed = report.destroyed,
            moved = report.moved,
            overwrites = report.overwrites,
            entity_count = report.entity_count,
            "applied staged changes"
        );
        Ok(report)
    }
}

/// Read view of a member of `current`'s layer index.
fn committed<'w>(
    schema: &'w ComponentSchema,
    current: &'w Generation,
    id: EntityId,
) -> EntityRef<'w> {
    EntityRef::new(id, schema, &current.layers, current.state(id))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
