//! Component schema: the catalog of valid components and their defaults.
//!
//! A [`ComponentSchema`] is built once, before any world exists, and is
//! read-only afterwards. Every component name gets a dense [`ComponentId`]
//! and every property a dense per-component [`PropertyId`]; entity storage is
//! keyed by those ids, so string names are resolved exactly once per call.

use std::collections::HashMap;
use std::fmt;

use crate::value::Value;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// Opaque identifier for a component declared in a [`ComponentSchema`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u32);

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

/// Identifier of a property, scoped to its owning component.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub(crate) u32);

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentDef
// ---------------------------------------------------------------------------

/// One component's declared properties and their default values.
#[derive(Debug, Clone)]
pub struct ComponentDef {
    id: ComponentId,
    name: String,
    /// Indexed by `PropertyId.0`, in declaration order.
    properties: Vec<(String, Value)>,
    by_name: HashMap<String, PropertyId>,
}

impl ComponentDef {
    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve a property name declared on this component.
    pub fn property_id(&self, property: &str) -> Option<PropertyId> {
        self.by_name.get(property).copied()
    }

    /// Same as [`property_id`](Self::property_id) but reports
    /// [`EcsError::UnknownProperty`] on a miss.
    pub fn require_property(&self, property: &str) -> Result<PropertyId, EcsError> {
        self.property_id(property)
            .ok_or_else(|| EcsError::UnknownProperty {
                component: self.name.clone(),
                property: property.to_owned(),
            })
    }

    /// Name of a property. `None` if the id belongs to another component.
    pub fn property_name(&self, id: PropertyId) -> Option<&str> {
        self.properties.get(id.0 as usize).map(|(name, _)| name.as_str())
    }

    /// Schema default for a property.
    pub fn default(&self, id: PropertyId) -> Option<&Value> {
        self.properties.get(id.0 as usize).map(|(_, value)| value)
    }

    /// `(name, default)` pairs in declaration order.
    pub fn defaults(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.properties.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }
}

// ---------------------------------------------------------------------------
// ComponentSchema
// ---------------------------------------------------------------------------

/// Immutable mapping `component name -> (property name -> default value)`.
///
/// ```
/// use strata_ecs::prelude::*;
///
/// let schema = ComponentSchema::builder()
///     .component("health", [("hp", Value::from(100))])
///     .build()
///     .unwrap();
///
/// let health = schema.get("health").unwrap();
/// let hp = health.property_id("hp").unwrap();
/// assert_eq!(health.default(hp), Some(&Value::Int(100)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ComponentSchema {
    /// Indexed by `ComponentId.0`, in declaration order.
    components: Vec<ComponentDef>,
    by_name: HashMap<String, ComponentId>,
}

impl ComponentSchema {
    /// Start declaring a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Build a schema from a JSON document of the form
    /// `{ "component": { "property": default, ... }, ... }`.
    ///
    /// A component whose description is not an object is rejected here, not
    /// at first use.
    pub fn from_json(document: &serde_json::Value) -> Result<Self, EcsError> {
        let serde_json::Value::Object(components) = document else {
            return Err(EcsError::InvalidSchema {
                reason: format!("schema must be an object, found {}", json_kind(document)),
            });
        };

        let mut builder = SchemaBuilder::default();
        for (name, description) in components {
            let serde_json::Value::Object(properties) = description else {
                return Err(EcsError::InvalidSchema {
                    reason: format!(
                        "component '{name}' must map property names to defaults, found {}",
                        json_kind(description)
                    ),
                });
            };
            let mut defaults = Vec::with_capacity(properties.len());
            for (property, default) in properties {
                let value = Value::try_from(default).map_err(|e| EcsError::InvalidSchema {
                    reason: format!("default for '{name}.{property}': {e}"),
                })?;
                defaults.push((property.clone(), value));
            }
            builder = builder.component(name, defaults);
        }
        builder.build()
    }

    /// Parse `text` as JSON and build a schema from it.
    pub fn from_json_str(text: &str) -> Result<Self, EcsError> {
        let document: serde_json::Value =
            serde_json::from_str(text).map_err(|e| EcsError::InvalidSchema {
                reason: format!("schema is not valid JSON: {e}"),
            })?;
        Self::from_json(&document)
    }

    /// Whether `component` is declared.
    pub fn has(&self, component: &str) -> bool {
        self.by_name.contains_key(component)
    }

    /// Declared properties and defaults for `component`.
    pub fn get(&self, component: &str) -> Option<&ComponentDef> {
        self.component_id(component).map(|id| self.def(id))
    }

    /// Like [`get`](Self::get) but reports [`EcsError::UnknownComponent`].
    pub fn require(&self, component: &str) -> Result<&ComponentDef, EcsError> {
        self.get(component)
            .ok_or_else(|| EcsError::UnknownComponent {
                name: component.to_owned(),
            })
    }

    pub fn component_id(&self, component: &str) -> Option<ComponentId> {
        self.by_name.get(component).copied()
    }

    /// Definition for an id handed out by this schema.
    ///
    /// # Panics
    ///
    /// Panics if `id` came from a different schema with more components.
    pub fn def(&self, id: ComponentId) -> &ComponentDef {
        &self.components[id.0 as usize]
    }

    /// Number of declared components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component names in declaration order.
    pub fn component_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.components.iter().map(|def| def.name.as_str())
    }
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a bool",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// SchemaBuilder
// ---------------------------------------------------------------------------

/// Accumulates component declarations; validated as a whole by
/// [`build`](SchemaBuilder::build).
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    declared: Vec<(String, Vec<(String, Value)>)>,
}

impl SchemaBuilder {
    /// Declare a component and its `(property, default)` pairs.
    pub fn component<N, I, P>(mut self, name: N, properties: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (P, Value)>,
        P: Into<String>,
    {
        let properties = properties
            .into_iter()
            .map(|(property, default)| (property.into(), default))
            .collect();
        self.declared.push((name.into(), properties));
        self
    }

    /// Validate the declarations and freeze them into a schema.
    ///
    /// Duplicate component names, and duplicate property names within one
    /// component, are rejected.
    pub fn build(self) -> Result<ComponentSchema, EcsError> {
        let mut schema = ComponentSchema {
            components: Vec::with_capacity(self.declared.len()),
            by_name: HashMap::with_capacity(self.declared.len()),
        };

        for (name, properties) in self.declared {
            if schema.by_name.contains_key(&name) {
                return Err(EcsError::InvalidSchema {
                    reason: format!("component '{name}' is declared more than once"),
                });
            }

            let mut by_name = HashMap::with_capacity(properties.len());
            for (index, (property, _)) in properties.iter().enumerate() {
                if by_name
                    .insert(property.clone(), PropertyId(index as u32))
                    .is_some()
                {
                    return Err(EcsError::InvalidSchema {
                        reason: format!("property '{name}.{property}' is declared more than once"),
                    });
                }
            }

            let id = ComponentId(schema.components.len() as u32);
            schema.by_name.insert(name.clone(), id);
            schema.components.push(ComponentDef {
                id,
                name,
                properties,
                by_name,
            });
        }

        Ok(schema)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
