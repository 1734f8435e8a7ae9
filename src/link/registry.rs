//! Link registry and join graph
//!
//! Collects every service's joiner config plus the link definitions and
//! builds the static join graph the query composer traverses: nodes are
//! (service, entity) pairs, edges are virtual fields produced by
//! `relationships` and `extends` entries. The graph is built once at startup
//! and validated eagerly; queries only read it.

use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::link::config::{EntityShape, JoinerRelationship, ModuleJoinerConfig};

/// Link registration/validation errors. Fatal at startup: joiner configs are
/// trusted platform wiring, so a bad reference is a real bug, not a runtime
/// condition.
#[derive(Debug, Error)]
pub enum LinkValidationError {
    #[error("Joiner config {service_name} invalid: {}", .errors.join("; "))]
    Invalid {
        service_name: String,
        errors: Vec<String>,
    },

    #[error("Alias {alias} already registered for service {existing}")]
    DuplicateAlias { alias: String, existing: String },

    #[error("Service {0} already registered")]
    DuplicateService(String),
}

/// Metadata the registry keeps per service.
#[derive(Debug, Clone)]
pub struct ServiceMeta {
    pub service_name: String,
    pub is_link: bool,
    pub primary_keys: Vec<String>,
    pub entities: Vec<EntityShape>,
}

impl ServiceMeta {
    pub fn default_entity(&self) -> Option<&str> {
        self.entities.first().map(|e| e.name.as_str())
    }

    pub fn entity(&self, name: &str) -> Option<&EntityShape> {
        self.entities.iter().find(|e| e.name == name)
    }
}

/// One edge of the join graph.
///
/// Expanding rows of `(source_service, source_entity)` under `alias` means:
/// collect the rows' `source_key` values, fetch `(target_service,
/// target_entity)` rows whose `target_key` is among them, and stitch back
/// grouped by key: a list when `is_list`, a single record otherwise.
#[derive(Debug, Clone)]
pub struct JoinEdge {
    pub source_service: String,
    pub source_entity: String,
    pub alias: String,
    pub target_service: String,
    pub target_entity: String,
    pub source_key: String,
    pub target_key: String,
    pub is_list: bool,
}

/// The join graph plus entry-point alias map.
#[derive(Default)]
pub struct LinkRegistry {
    services: HashMap<String, ServiceMeta>,
    /// alias name → (service, entity)
    aliases: HashMap<String, (String, String)>,
    /// (service, entity, alias) → edge
    edges: HashMap<(String, String, String), JoinEdge>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a real module's own joiner config: its aliases, entity
    /// shapes, and intra/inter-service relationships.
    ///
    /// The source entity of a module relationship is the first declared
    /// entity carrying the relationship's foreign key; module configs must
    /// declare their entities in an order that makes this unambiguous.
    pub fn register_service_config(
        &mut self,
        config: &ModuleJoinerConfig,
    ) -> Result<(), LinkValidationError> {
        if self.services.contains_key(&config.service_name) {
            return Err(LinkValidationError::DuplicateService(
                config.service_name.clone(),
            ));
        }

        let mut errors = Vec::new();
        if config.entities.is_empty() {
            errors.push("config declares no entities".to_string());
        }

        let meta = ServiceMeta {
            service_name: config.service_name.clone(),
            is_link: config.is_link,
            primary_keys: config.primary_keys.clone(),
            entities: config.entities.clone(),
        };

        let mut edges = Vec::new();
        for relationship in &config.relationships {
            match self.build_self_edge(config, relationship) {
                Ok(edge) => edges.push(edge),
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() {
            return Err(LinkValidationError::Invalid {
                service_name: config.service_name.clone(),
                errors,
            });
        }

        self.insert_aliases(config)?;
        self.services.insert(config.service_name.clone(), meta);
        for edge in edges {
            self.insert_edge(edge);
        }

        debug!("Registered service config: {}", config.service_name);
        Ok(())
    }

    /// Register a link definition: validate it against the known services and
    /// wire the join graph in both directions from the single config.
    pub fn register_link(&mut self, config: &ModuleJoinerConfig) -> Result<(), LinkValidationError> {
        let mut errors = Vec::new();

        if !config.is_link {
            errors.push("config is not marked is_link".to_string());
        }
        if config.primary_keys.is_empty() {
            errors.push("primary_keys must not be empty".to_string());
        }
        if self.services.contains_key(&config.service_name) {
            return Err(LinkValidationError::DuplicateService(
                config.service_name.clone(),
            ));
        }

        let link_entity = match config.default_entity() {
            Some(entity) => entity.to_string(),
            None => {
                errors.push("link config declares no entities".to_string());
                String::new()
            }
        };
        let link_shape = config.entity(&link_entity).cloned();

        // Outgoing edges: link row → related module entity
        let mut edges = Vec::new();
        for relationship in &config.relationships {
            match self.validate_link_relationship(config, link_shape.as_ref(), relationship) {
                Ok(()) => edges.push(JoinEdge {
                    source_service: config.service_name.clone(),
                    source_entity: link_entity.clone(),
                    alias: relationship.alias.clone(),
                    target_service: relationship.service_name.clone(),
                    target_entity: self
                        .target_entity(relationship)
                        .unwrap_or_else(|| relationship.service_name.clone()),
                    source_key: relationship.foreign_key.clone(),
                    target_key: relationship.primary_key.clone(),
                    is_list: relationship.is_list,
                }),
                Err(e) => errors.push(e),
            }
        }

        // Incoming edges: extended module entity → link row
        for extend in &config.extends {
            let relationship = &extend.relationship;
            if relationship.service_name != config.service_name {
                errors.push(format!(
                    "extends relationship must target the link itself, got {}",
                    relationship.service_name
                ));
                continue;
            }

            let Some(source_meta) = self.services.get(&extend.service_name) else {
                errors.push(format!("extends references unknown service {}", extend.service_name));
                continue;
            };
            let source_entity = extend
                .entity
                .clone()
                .or_else(|| source_meta.default_entity().map(String::from));
            let Some(source_entity) = source_entity else {
                errors.push(format!("service {} has no entities to extend", extend.service_name));
                continue;
            };
            let Some(source_shape) = source_meta.entity(&source_entity) else {
                errors.push(format!(
                    "extends references unknown entity {} on service {}",
                    source_entity, extend.service_name
                ));
                continue;
            };

            if !source_shape.has_field(&relationship.foreign_key) {
                errors.push(format!(
                    "extends key {} does not exist on {}.{}",
                    relationship.foreign_key, extend.service_name, source_entity
                ));
            }
            if let Some(shape) = link_shape.as_ref() {
                if !shape.has_field(&relationship.primary_key) {
                    errors.push(format!(
                        "extends key {} does not exist on link {}",
                        relationship.primary_key, config.service_name
                    ));
                }
            }

            edges.push(JoinEdge {
                source_service: extend.service_name.clone(),
                source_entity,
                alias: relationship.alias.clone(),
                target_service: config.service_name.clone(),
                target_entity: link_entity.clone(),
                source_key: relationship.foreign_key.clone(),
                target_key: relationship.primary_key.clone(),
                is_list: relationship.is_list,
            });
        }

        if !errors.is_empty() {
            return Err(LinkValidationError::Invalid {
                service_name: config.service_name.clone(),
                errors,
            });
        }

        self.insert_aliases(config)?;
        self.services.insert(
            config.service_name.clone(),
            ServiceMeta {
                service_name: config.service_name.clone(),
                is_link: true,
                primary_keys: config.primary_keys.clone(),
                entities: config.entities.clone(),
            },
        );
        for edge in edges {
            self.insert_edge(edge);
        }

        debug!("Registered link: {}", config.service_name);
        Ok(())
    }

    /// Whether every relationship of a link config references a known
    /// service. Used to skip built-in links in deployments where a
    /// participating module is absent.
    pub fn can_register_link(&self, config: &ModuleJoinerConfig) -> bool {
        config
            .relationships
            .iter()
            .all(|r| self.services.contains_key(&r.service_name))
    }

    /// Resolve an entry-point name to (service, entity). Accepts declared
    /// aliases and bare service names (resolving to the default entity).
    pub fn resolve_entry_point(&self, name: &str) -> Option<(String, String)> {
        if let Some((service, entity)) = self.aliases.get(name) {
            return Some((service.clone(), entity.clone()));
        }
        self.services.get(name).and_then(|meta| {
            meta.default_entity()
                .map(|entity| (name.to_string(), entity.to_string()))
        })
    }

    /// Look up the join edge for a virtual field.
    pub fn edge(&self, service: &str, entity: &str, alias: &str) -> Option<&JoinEdge> {
        self.edges
            .get(&(service.to_string(), entity.to_string(), alias.to_string()))
    }

    pub fn service(&self, name: &str) -> Option<&ServiceMeta> {
        self.services.get(name)
    }

    fn insert_aliases(&mut self, config: &ModuleJoinerConfig) -> Result<(), LinkValidationError> {
        for alias in &config.alias {
            if let Some((existing, _)) = self.aliases.get(&alias.name) {
                return Err(LinkValidationError::DuplicateAlias {
                    alias: alias.name.clone(),
                    existing: existing.clone(),
                });
            }
            let entity = alias
                .entity
                .clone()
                .or_else(|| config.default_entity().map(String::from))
                .unwrap_or_default();
            self.aliases
                .insert(alias.name.clone(), (config.service_name.clone(), entity));
        }
        Ok(())
    }

    fn insert_edge(&mut self, edge: JoinEdge) {
        self.edges.insert(
            (
                edge.source_service.clone(),
                edge.source_entity.clone(),
                edge.alias.clone(),
            ),
            edge,
        );
    }

    /// Build an edge for a module's own relationship. The source entity is
    /// the first declared entity carrying the foreign key.
    fn build_self_edge(
        &self,
        config: &ModuleJoinerConfig,
        relationship: &JoinerRelationship,
    ) -> Result<JoinEdge, String> {
        let source_entity = config
            .entities
            .iter()
            .find(|e| e.has_field(&relationship.foreign_key))
            .map(|e| e.name.clone())
            .ok_or_else(|| {
                format!(
                    "no entity on {} declares relationship key {}",
                    config.service_name, relationship.foreign_key
                )
            })?;

        // Intra-service relationships validate against the config itself;
        // cross-service ones against already-registered services.
        let (target_entity, target_shape) = if relationship.service_name == config.service_name {
            let entity = relationship
                .entity
                .clone()
                .or_else(|| config.default_entity().map(String::from))
                .ok_or_else(|| format!("{} declares no entities", config.service_name))?;
            let shape = config
                .entity(&entity)
                .cloned()
                .ok_or_else(|| format!("unknown entity {} on {}", entity, config.service_name))?;
            (entity, shape)
        } else {
            let meta = self.services.get(&relationship.service_name).ok_or_else(|| {
                format!("relationship references unknown service {}", relationship.service_name)
            })?;
            let entity = relationship
                .entity
                .clone()
                .or_else(|| meta.default_entity().map(String::from))
                .ok_or_else(|| format!("{} declares no entities", relationship.service_name))?;
            let shape = meta
                .entity(&entity)
                .cloned()
                .ok_or_else(|| {
                    format!("unknown entity {} on {}", entity, relationship.service_name)
                })?;
            (entity, shape)
        };

        if !target_shape.has_field(&relationship.primary_key) {
            return Err(format!(
                "key {} does not exist on {}.{}",
                relationship.primary_key, relationship.service_name, target_entity
            ));
        }

        Ok(JoinEdge {
            source_service: config.service_name.clone(),
            source_entity,
            alias: relationship.alias.clone(),
            target_service: relationship.service_name.clone(),
            target_entity,
            source_key: relationship.foreign_key.clone(),
            target_key: relationship.primary_key.clone(),
            is_list: relationship.is_list,
        })
    }

    /// Validate a link relationship against the registered target service.
    fn validate_link_relationship(
        &self,
        config: &ModuleJoinerConfig,
        link_shape: Option<&EntityShape>,
        relationship: &JoinerRelationship,
    ) -> Result<(), String> {
        let meta = self.services.get(&relationship.service_name).ok_or_else(|| {
            format!("relationship references unknown service {}", relationship.service_name)
        })?;

        let target_entity = relationship
            .entity
            .clone()
            .or_else(|| meta.default_entity().map(String::from))
            .ok_or_else(|| format!("{} declares no entities", relationship.service_name))?;
        let target_shape = meta.entity(&target_entity).ok_or_else(|| {
            format!("unknown entity {} on {}", target_entity, relationship.service_name)
        })?;

        if !target_shape.has_field(&relationship.primary_key) {
            return Err(format!(
                "key {} does not exist on {}.{}",
                relationship.primary_key, relationship.service_name, target_entity
            ));
        }
        if let Some(shape) = link_shape {
            if !shape.has_field(&relationship.foreign_key) {
                return Err(format!(
                    "key {} does not exist on link {}",
                    relationship.foreign_key, config.service_name
                ));
            }
        }
        Ok(())
    }

    fn target_entity(&self, relationship: &JoinerRelationship) -> Option<String> {
        relationship.entity.clone().or_else(|| {
            self.services
                .get(&relationship.service_name)
                .and_then(|m| m.default_entity().map(String::from))
        })
    }
}
