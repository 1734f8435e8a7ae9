//! Joiner configuration shapes
//!
//! A `ModuleJoinerConfig` is the declarative description of how a service's
//! entities can be reached (aliases), what they look like (entity field
//! sets), and how they relate to other services' entities. Link modules are
//! defined entirely by one of these configs with `is_link = true`.

use serde::{Deserialize, Serialize};

/// Joiner configuration for one service (real module or link).
///
/// The first entry in `entities` is the service's default entity: it is what
/// relationships resolve to when they name no entity, and what an alias with
/// no entity points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleJoinerConfig {
    /// Service name, unique across the platform
    pub service_name: String,
    /// Whether this config defines a synthetic link module
    #[serde(default)]
    pub is_link: bool,
    /// Primary key fields of the default entity (for links: the association
    /// row key set)
    pub primary_keys: Vec<String>,
    /// Entry-point aliases into this service
    #[serde(default)]
    pub alias: Vec<JoinerAlias>,
    /// Public entity shapes this service exposes
    #[serde(default)]
    pub entities: Vec<EntityShape>,
    /// Outgoing relationships: virtual fields on this service's rows that
    /// resolve against another service
    #[serde(default)]
    pub relationships: Vec<JoinerRelationship>,
    /// Extensions of *other* services: virtual fields this config grafts
    /// onto another service's entity, pointing back at this service
    #[serde(default)]
    pub extends: Vec<JoinerExtend>,
}

impl ModuleJoinerConfig {
    /// The service's default entity name, if any entities are declared.
    pub fn default_entity(&self) -> Option<&str> {
        self.entities.first().map(|e| e.name.as_str())
    }

    /// Look up a declared entity shape by name.
    pub fn entity(&self, name: &str) -> Option<&EntityShape> {
        self.entities.iter().find(|e| e.name == name)
    }
}

/// An entry-point alias: a short name queries can use to reach an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinerAlias {
    pub name: String,
    /// Entity the alias resolves to; defaults to the service's default entity
    #[serde(default)]
    pub entity: Option<String>,
}

impl JoinerAlias {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity: None,
        }
    }

    pub fn for_entity(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity: Some(entity.into()),
        }
    }
}

/// Public shape of one entity: its name and field set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityShape {
    pub name: String,
    pub fields: Vec<String>,
}

impl EntityShape {
    pub fn new(name: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

/// A join edge description.
///
/// `foreign_key` is the field on the rows being expanded (the source side);
/// `primary_key` is the field on the target service's entity. Expanding a
/// row set collects its `foreign_key` values and fetches target rows whose
/// `primary_key` is among them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinerRelationship {
    pub service_name: String,
    /// Target entity within the service; defaults to the target's default
    #[serde(default)]
    pub entity: Option<String>,
    pub primary_key: String,
    pub foreign_key: String,
    /// Virtual field name the joined rows appear under
    pub alias: String,
    /// Whether the virtual field is a list (to-many) or a single record
    #[serde(default)]
    pub is_list: bool,
    #[serde(default)]
    pub args: Option<JoinerArgs>,
}

/// Extra relationship arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinerArgs {
    /// Suffix for the link module's generated accessor method
    /// (e.g. `Variants` produces `list_variants`)
    #[serde(default)]
    pub method_suffix: Option<String>,
}

/// Grafts a relationship onto another service's entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinerExtend {
    /// Service whose entity gains the virtual field
    pub service_name: String,
    /// Entity within that service; defaults to its default entity
    #[serde(default)]
    pub entity: Option<String>,
    pub relationship: JoinerRelationship,
}
