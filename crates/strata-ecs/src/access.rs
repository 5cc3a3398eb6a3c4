//! Entity accessors.
//!
//! [`EntityRef`] reads an entity's *current* (committed) state.
//! [`EntityMut`] writes its *next* (staged) state, validating every argument
//! against the schema before anything is touched. The two never observe each
//! other within a frame; [`World::apply_changes`](crate::world::World::apply_changes)
//! is what carries staged writes over.

use tracing::debug;

use crate::entity::EntityId;
use crate::generation::{EntityState, Overrides};
use crate::layer::LayerIndex;
use crate::schema::{ComponentDef, ComponentId, ComponentSchema};
use crate::stage::FrameLog;
use crate::value::Value;
use crate::EcsError;

/// Resolve `component.property` against `state`, falling back to the schema
/// default for properties that were never written.
fn read_property<'a>(
    schema: &'a ComponentSchema,
    state: Option<&'a EntityState>,
    component: &str,
    property: &str,
    missing: impl FnOnce() -> EcsError,
) -> Result<&'a Value, EcsError> {
    let def = schema.require(component)?;
    let overrides = state
        .and_then(|s| s.components.overrides(def.id()))
        .ok_or_else(missing)?;
    let property_id = def.require_property(property)?;
    overrides
        .get(&property_id)
        .or_else(|| def.default(property_id))
        .ok_or_else(|| EcsError::UnknownProperty {
            component: component.to_owned(),
            property: property.to_owned(),
        })
}

// ---------------------------------------------------------------------------
// EntityRef
// ---------------------------------------------------------------------------

/// Read-only view of an entity's committed state.
///
/// An entity created this frame has no committed state yet: it has no layer,
/// `has` is false for everything and `get` reports
/// [`EcsError::ComponentNotPresent`].
#[derive(Clone, Copy)]
pub struct EntityRef<'w> {
    id: EntityId,
    schema: &'w ComponentSchema,
    layers: &'w LayerIndex,
    state: Option<&'w EntityState>,
}

impl<'w> EntityRef<'w> {
    pub(crate) fn new(
        id: EntityId,
        schema: &'w ComponentSchema,
        layers: &'w LayerIndex,
        state: Option<&'w EntityState>,
    ) -> Self {
        Self {
            id,
            schema,
            layers,
            state,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Whether the entity has been through at least one commit.
    pub fn is_committed(&self) -> bool {
        self.state.is_some()
    }

    /// Committed layer key.
    pub fn layer(&self) -> Option<&'w str> {
        self.state.map(|s| self.layers.key(s.layer))
    }

    /// Whether `component` is attached in the current generation. Names the
    /// schema does not declare are never attached.
    pub fn has(&self, component: &str) -> bool {
        match (self.schema.component_id(component), self.state) {
            (Some(id), Some(state)) => state.components.contains(id),
            _ => false,
        }
    }

    /// Committed value of `component.property`, or its schema default if it
    /// was never set.
    pub fn get(&self, component: &str, property: &str) -> Result<&'w Value, EcsError> {
        let entity = self.id;
        read_property(self.schema, self.state, component, property, || {
            EcsError::ComponentNotPresent {
                entity,
                component: component.to_owned(),
            }
        })
    }

    /// Names of the committed components, in schema declaration order.
    pub fn components(&self) -> impl Iterator<Item = &'w str> + 'w {
        let schema = self.schema;
        self.state
            .into_iter()
            .flat_map(|s| s.components.ids())
            .map(move |id| schema.def(id).name())
    }

    pub fn component_count(&self) -> usize {
        self.state.map_or(0, |s| s.components.len())
    }
}

impl std::fmt::Debug for EntityRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRef")
            .field("id", &self.id)
            .field("layer", &self.layer())
            .field("components", &self.components().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EntityMut
// ---------------------------------------------------------------------------

/// Write access to one entity's staged state.
///
/// Obtained from [`World::entity_mut`](crate::world::World::entity_mut) or
/// [`Stage::entity_mut`](crate::stage::Stage::entity_mut). Reads through this
/// handle (`has`, `get`) still see the committed state; use
/// [`staged_has`](Self::staged_has) / [`staged_get`](Self::staged_get) to
/// inspect what the next commit will publish.
pub struct EntityMut<'s> {
    id: EntityId,
    schema: &'s ComponentSchema,
    current: Option<&'s EntityState>,
    staged: &'s mut EntityState,
    log: &'s mut FrameLog,
}

impl<'s> EntityMut<'s> {
    pub(crate) fn new(
        id: EntityId,
        schema: &'s ComponentSchema,
        current: Option<&'s EntityState>,
        staged: &'s mut EntityState,
        log: &'s mut FrameLog,
    ) -> Self {
        Self {
            id,
            schema,
            current,
            staged,
            log,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    // -- committed reads ------------------------------------------------------

    /// Same as [`EntityRef::has`].
    pub fn has(&self, component: &str) -> bool {
        match (self.schema.component_id(component), self.current) {
            (Some(id), Some(state)) => state.components.contains(id),
            _ => false,
        }
    }

    /// Same as [`EntityRef::get`].
    pub fn get(&self, component: &str, property: &str) -> Result<&Value, EcsError> {
        let entity = self.id;
        read_property(self.schema, self.current, component, property, || {
            EcsError::ComponentNotPresent {
                entity,
                component: component.to_owned(),
            }
        })
    }

    // -- staged reads ---------------------------------------------------------

    /// Whether `component` will be attached after the next commit.
    pub fn staged_has(&self, component: &str) -> bool {
        self.schema
            .component_id(component)
            .is_some_and(|id| self.staged.components.contains(id))
    }

    /// Value `component.property` will have after the next commit.
    pub fn staged_get(&self, component: &str, property: &str) -> Result<&Value, EcsError> {
        let entity = self.id;
        read_property(
            self.schema,
            Some(&*self.staged),
            component,
            property,
            || EcsError::ComponentNotStaged {
                entity,
                component: component.to_owned(),
            },
        )
    }

    // -- staged writes --------------------------------------------------------

    /// Stage each `(component, properties)` pair, replacing any staged entry
    /// for that component wholesale. Properties not listed fall back to
    /// their schema defaults.
    pub fn merge<I, C, P, K>(&mut self, components: I) -> Result<(), EcsError>
    where
        I: IntoIterator<Item = (C, P)>,
        C: AsRef<str>,
        P: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut validated: Vec<(ComponentId, Overrides)> = Vec::new();
        for (component, properties) in components {
            let def = self.schema.require(component.as_ref())?;
            let mut overrides = Overrides::new();
            for (property, value) in properties {
                overrides.insert(def.require_property(property.as_ref())?, value);
            }
            validated.push((def.id(), overrides));
        }

        for (id, overrides) in validated {
            self.staged.components.replace(id, overrides);
        }
        Ok(())
    }

    /// Stage each component with no overrides, so every property reads as
    /// its schema default. Re-adding a staged component resets it.
    pub fn add<I, C>(&mut self, components: I) -> Result<(), EcsError>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<str>,
    {
        let ids = components
            .into_iter()
            .map(|c| self.schema.require(c.as_ref()).map(ComponentDef::id))
            .collect::<Result<Vec<_>, _>>()?;
        for id in ids {
            self.staged.components.replace(id, Overrides::new());
        }
        Ok(())
    }

    /// Unstage each component. Every component must be declared and attached
    /// in the current generation.
    pub fn remove<I, C>(&mut self, components: I) -> Result<(), EcsError>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<str>,
    {
        let mut ids = Vec::new();
        for component in components {
            let component = component.as_ref();
            let id = self.schema.require(component)?.id();
            if !self.current.is_some_and(|s| s.components.contains(id)) {
                return Err(EcsError::ComponentNotPresent {
                    entity: self.id,
                    component: component.to_owned(),
                });
            }
            ids.push(id);
        }
        for id in ids {
            self.staged.components.remove(id);
        }
        Ok(())
    }

    /// Stage `component.property = value`. The component must already be
    /// staged on this entity (committed earlier or added this frame).
    pub fn set(
        &mut self,
        component: &str,
        property: &str,
        value: impl Into<Value>,
    ) -> Result<(), EcsError> {
        let def = self.schema.require(component)?;
        let property_id = def.require_property(property)?;
        let component_id = def.id();
        if !self.staged.components.contains(component_id) {
            return Err(EcsError::ComponentNotStaged {
                entity: self.id,
                component: component.to_owned(),
            });
        }

        self.staged
            .components
            .set(component_id, property_id, value.into());
        if !self.log.written.insert((self.id, component_id, property_id)) {
            self.log.overwrites += 1;
            debug!(
                entity = %self.id,
                component,
                property,
                "property written more than once this frame (last write wins)"
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for EntityMut<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityMut").field("id", &self.id).finish()
    }
}
