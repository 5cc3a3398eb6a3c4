//! Strata ECS -- a double-buffered, layered entity store.
//!
//! A [`World`](world::World) groups entities into named *layers* and attaches
//! schema-validated *components* to them. State is kept in two generations:
//! every read sees the *current* generation, every write lands in the *next*
//! one, and [`World::apply_changes`](world::World::apply_changes) promotes the
//! next generation in one step at the end of a frame. Iterating the current
//! generation while creating, destroying, moving or writing entities is
//! therefore always safe.
//!
//! # Quick Start
//!
//! ```
//! use strata_ecs::prelude::*;
//!
//! let schema = ComponentSchema::builder()
//!     .component("health", [("hp", Value::from(100))])
//!     .build()
//!     .unwrap();
//! let mut world = World::new(schema);
//!
//! let hero = world.create_entity("alive");
//! world.entity_mut(hero).unwrap().add(["health"]).unwrap();
//!
//! // Nothing is visible until the frame is committed.
//! assert!(!world.entity(hero).unwrap().has("health"));
//! world.apply_changes().unwrap();
//!
//! let entity = world.entity(hero).unwrap();
//! assert_eq!(entity.get("health", "hp").unwrap(), &Value::Int(100));
//! ```

#![deny(unsafe_code)]

pub mod access;
pub mod entity;
mod generation;
mod layer;
pub mod schema;
pub mod stage;
pub mod value;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by world, entity and schema operations.
///
/// Every error is reported before anything is written, so a failed call
/// leaves both generations exactly as they were.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EcsError {
    /// The component is not declared in the schema.
    #[error("component '{name}' is not declared in the schema")]
    UnknownComponent { name: String },

    /// The component is not attached to the entity in the generation the
    /// operation reads from.
    #[error("entity {entity} has no committed component '{component}'")]
    ComponentNotPresent {
        entity: entity::EntityId,
        component: String,
    },

    /// `set` on a component that is not attached in the next generation.
    #[error("entity {entity} has no staged component '{component}' (add it first)")]
    ComponentNotStaged {
        entity: entity::EntityId,
        component: String,
    },

    /// The property is not declared for the component.
    #[error("component '{component}' declares no property '{property}'")]
    UnknownProperty { component: String, property: String },

    /// The schema description was malformed.
    #[error("invalid schema: {reason}")]
    InvalidSchema { reason: String },

    /// The world configuration could not be loaded.
    #[error("invalid world config: {reason}")]
    InvalidConfig { reason: String },

    /// The handle's slot was released by a commit, or never allocated.
    #[error("entity {entity} does not exist (stale or never allocated)")]
    StaleEntity { entity: entity::EntityId },

    /// The entity was destroyed earlier in this frame; it stays readable until
    /// the next commit but accepts no further staged operations.
    #[error("entity {entity} was destroyed this frame and accepts no staged changes")]
    EntityNotStaged { entity: entity::EntityId },

    /// The staged entity count disagrees with the next layer index. Nothing
    /// was committed.
    #[error("staged entity count {staged} does not match next layer index ({indexed})")]
    StagedCountMismatch { staged: usize, indexed: usize },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::access::{EntityMut, EntityRef};
    pub use crate::entity::EntityId;
    pub use crate::schema::{ComponentDef, ComponentId, ComponentSchema, PropertyId, SchemaBuilder};
    pub use crate::stage::Stage;
    pub use crate::value::Value;
    pub use crate::world::{CommitReport, World, WorldConfig};
    pub use crate::EcsError;
}
