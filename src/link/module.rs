//! Synthetic link module service
//!
//! A link module is a virtual service synthesized from a joiner config: its
//! entity is the association row between two real modules, stored in its own
//! collection. It implements the same service interface as real modules, so
//! the query composer treats it like any other node in the graph, and it
//! exposes accessor methods named by convention from the relationships'
//! `method_suffix` so real modules can expand their result sets through it.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::datastore::{Datastore, Record, Selection};
use crate::link::config::{JoinerRelationship, ModuleJoinerConfig};
use crate::module::container::ModuleContainer;
use crate::module::traits::{FetchRequest, FetchResult, ModuleError, ModuleService};

/// Virtual module over an association collection.
pub struct LinkModuleService {
    config: ModuleJoinerConfig,
    entity: String,
    datastore: Arc<dyn Datastore>,
}

impl LinkModuleService {
    /// Synthesize the link service, creating its collection if needed.
    pub fn new(
        config: ModuleJoinerConfig,
        datastore: Arc<dyn Datastore>,
    ) -> Result<Self, ModuleError> {
        if !config.is_link {
            return Err(ModuleError::Configuration(format!(
                "{} is not a link config",
                config.service_name
            )));
        }
        let entity = config
            .default_entity()
            .ok_or_else(|| {
                ModuleError::Configuration(format!(
                    "link {} declares no entities",
                    config.service_name
                ))
            })?
            .to_string();

        datastore.create_collection(&config.service_name)?;
        Ok(Self {
            config,
            entity,
            datastore,
        })
    }

    /// Create an association row. A missing `id` is generated.
    pub fn attach(&self, mut keys: Record) -> Result<Record, ModuleError> {
        if !keys.contains_key("id") {
            keys.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        for key in &self.config.primary_keys {
            if !keys.contains_key(key) {
                return Err(ModuleError::Configuration(format!(
                    "association row missing key {key}"
                )));
            }
        }
        let collection = self.datastore.collection(&self.config.service_name)?;
        collection.insert(keys.clone())?;
        Ok(keys)
    }

    /// Remove association rows matching the filters, returning the count.
    pub fn dismiss(&self, filters: &Record) -> Result<usize, ModuleError> {
        let collection = self.datastore.collection(&self.config.service_name)?;
        Ok(collection.remove(filters)?)
    }

    /// Accessor method names this link exposes: `list` plus one
    /// `list_<suffix>` per relationship declaring a method suffix.
    pub fn method_names(&self) -> Vec<String> {
        let mut names = vec!["list".to_string()];
        for relationship in &self.config.relationships {
            if let Some(suffix) = relationship
                .args
                .as_ref()
                .and_then(|a| a.method_suffix.as_deref())
            {
                names.push(format!("list_{}", to_snake_case(suffix)));
            }
        }
        names
    }

    /// Invoke an accessor method.
    ///
    /// `list` selects association rows by filter. `list_<suffix>` selects
    /// association rows by filter, then delegates to the suffixed
    /// relationship's target module, returning the related entity rows.
    pub async fn invoke(
        &self,
        container: &ModuleContainer,
        method: &str,
        filters: Record,
    ) -> Result<Vec<Record>, ModuleError> {
        if method == "list" {
            return Ok(self.select(filters)?.rows);
        }

        let relationship = self
            .config
            .relationships
            .iter()
            .find(|r| {
                r.args
                    .as_ref()
                    .and_then(|a| a.method_suffix.as_deref())
                    .map(|s| format!("list_{}", to_snake_case(s)) == method)
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                ModuleError::NotFound(format!(
                    "method {method} on link {}",
                    self.config.service_name
                ))
            })?;

        let rows = self.select(filters)?.rows;
        self.expand(container, relationship, &rows).await
    }

    fn select(&self, filters: Record) -> Result<crate::datastore::SelectionResult, ModuleError> {
        let collection = self.datastore.collection(&self.config.service_name)?;
        Ok(collection.select(&Selection {
            filters,
            ..Default::default()
        })?)
    }

    /// Fetch the relationship's target rows for the given association rows.
    async fn expand(
        &self,
        container: &ModuleContainer,
        relationship: &JoinerRelationship,
        rows: &[Record],
    ) -> Result<Vec<Record>, ModuleError> {
        let keys: Vec<Value> = rows
            .iter()
            .filter_map(|r| r.get(&relationship.foreign_key).cloned())
            .filter(|v| !v.is_null())
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let target = container
            .resolve_service_name(&relationship.service_name)
            .ok_or_else(|| ModuleError::NotFound(relationship.service_name.clone()))?;
        let entity = relationship
            .entity
            .clone()
            .or_else(|| target.joiner_config().default_entity().map(String::from))
            .ok_or_else(|| ModuleError::UnknownEntity {
                service: relationship.service_name.clone(),
                entity: "<default>".to_string(),
            })?;

        let mut filters = Record::new();
        filters.insert(relationship.primary_key.clone(), Value::Array(keys));
        let result = target.fetch(FetchRequest::all(entity, filters)).await?;
        Ok(result.rows)
    }
}

#[async_trait]
impl ModuleService for LinkModuleService {
    fn service_name(&self) -> &str {
        &self.config.service_name
    }

    fn joiner_config(&self) -> ModuleJoinerConfig {
        self.config.clone()
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResult, ModuleError> {
        if request.entity != self.entity {
            return Err(ModuleError::UnknownEntity {
                service: self.config.service_name.clone(),
                entity: request.entity,
            });
        }
        let collection = self.datastore.collection(&self.config.service_name)?;
        let result = collection.select(&Selection {
            filters: request.filters,
            order: request.order,
            skip: request.skip.unwrap_or(0),
            take: request.take,
        })?;
        Ok(FetchResult {
            rows: result.rows,
            count: result.count,
        })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

fn to_snake_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    for (i, c) in input.chars().enumerate() {
        if c.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::MemoryStore;
    use crate::link::definitions::product_variant_inventory_item;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn link_service() -> LinkModuleService {
        LinkModuleService::new(
            product_variant_inventory_item(),
            Arc::new(MemoryStore::new()),
        )
        .unwrap()
    }

    #[test]
    fn attach_generates_missing_id() {
        let link = link_service();
        let row = link
            .attach(record(&[
                ("variant_id", json!("var_1")),
                ("inventory_item_id", json!("inv_1")),
            ]))
            .unwrap();
        assert!(row.contains_key("id"));
    }

    #[test]
    fn attach_rejects_missing_keys() {
        let link = link_service();
        let result = link.attach(record(&[("variant_id", json!("var_1"))]));
        assert!(matches!(result, Err(ModuleError::Configuration(_))));
    }

    #[test]
    fn dismiss_removes_matching_rows() {
        let link = link_service();
        link.attach(record(&[
            ("variant_id", json!("var_1")),
            ("inventory_item_id", json!("inv_1")),
        ]))
        .unwrap();
        link.attach(record(&[
            ("variant_id", json!("var_2")),
            ("inventory_item_id", json!("inv_1")),
        ]))
        .unwrap();

        let removed = link
            .dismiss(&record(&[("variant_id", json!("var_1"))]))
            .unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn method_names_follow_suffix_convention() {
        let link = link_service();
        let names = link.method_names();
        assert!(names.contains(&"list".to_string()));
        assert!(names.contains(&"list_variants".to_string()));
    }

    #[tokio::test]
    async fn fetch_rejects_unknown_entity() {
        let link = link_service();
        let result = link
            .fetch(FetchRequest::all("variant", Record::new()))
            .await;
        assert!(matches!(result, Err(ModuleError::UnknownEntity { .. })));
    }

    #[test]
    fn snake_case_conversion() {
        assert_eq!(to_snake_case("Variants"), "variants");
        assert_eq!(to_snake_case("InventoryItems"), "inventory_items");
    }
}
