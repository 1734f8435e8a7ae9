//! Inventory module
//!
//! Owns inventory items. Joined to product variants through the
//! variant ⇄ inventory-item link.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::datastore::{Datastore, Record};
use crate::link::config::{EntityShape, JoinerAlias, ModuleJoinerConfig};
use crate::module::traits::{
    FetchRequest, FetchResult, ModuleError, ModuleInitContext, ModuleProvider, ModuleService,
    ResourceMode,
};
use crate::modules::{fetch_collection, new_id};

const INVENTORY_ITEMS: &str = "inventory_items";

/// Inventory module provider.
pub struct InventoryModuleProvider;

impl InventoryModuleProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InventoryModuleProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleProvider for InventoryModuleProvider {
    fn name(&self) -> &str {
        "inventory"
    }

    fn default_resources(&self) -> Option<ResourceMode> {
        Some(ResourceMode::Shared)
    }

    async fn migrate(&self, datastore: &Arc<dyn Datastore>) -> Result<(), ModuleError> {
        datastore.create_collection(INVENTORY_ITEMS)?;
        Ok(())
    }

    async fn run_loaders(&self, datastore: &Arc<dyn Datastore>) -> Result<(), ModuleError> {
        self.migrate(datastore).await
    }

    async fn build(&self, ctx: ModuleInitContext) -> Result<Arc<dyn ModuleService>, ModuleError> {
        Ok(Arc::new(InventoryModuleService {
            datastore: ctx.datastore,
        }))
    }
}

/// Live inventory service.
pub struct InventoryModuleService {
    datastore: Arc<dyn Datastore>,
}

impl InventoryModuleService {
    /// Create an inventory item, generating its id.
    pub fn create_inventory_item(&self, mut item: Record) -> Result<Record, ModuleError> {
        item.entry("id".to_string())
            .or_insert_with(|| Value::String(new_id("iitem")));
        item.entry("requires_shipping".to_string())
            .or_insert_with(|| json!(true));
        self.datastore
            .collection(INVENTORY_ITEMS)?
            .insert(item.clone())?;
        Ok(item)
    }
}

#[async_trait]
impl ModuleService for InventoryModuleService {
    fn service_name(&self) -> &str {
        "inventory"
    }

    fn joiner_config(&self) -> ModuleJoinerConfig {
        inventory_joiner_config()
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResult, ModuleError> {
        if request.entity != "inventory_item" {
            return Err(ModuleError::UnknownEntity {
                service: "inventory".to_string(),
                entity: request.entity,
            });
        }
        fetch_collection(&self.datastore, INVENTORY_ITEMS, &request)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn inventory_joiner_config() -> ModuleJoinerConfig {
    ModuleJoinerConfig {
        service_name: "inventory".to_string(),
        is_link: false,
        primary_keys: vec!["id".to_string()],
        alias: vec![
            JoinerAlias::new("inventory_item"),
            JoinerAlias::new("inventory_items"),
        ],
        entities: vec![EntityShape::new(
            "inventory_item",
            &["id", "sku", "title", "requires_shipping"],
        )],
        relationships: vec![],
        extends: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::MemoryStore;
    use crate::modules::record;

    #[tokio::test]
    async fn create_and_fetch_item() {
        let datastore: Arc<dyn Datastore> = Arc::new(MemoryStore::new());
        let provider = InventoryModuleProvider::new();
        provider.migrate(&datastore).await.unwrap();
        let service = InventoryModuleService { datastore };

        let item = service
            .create_inventory_item(record(&[("sku", json!("SHIRT-S"))]))
            .unwrap();
        assert!(item.contains_key("id"));
        assert_eq!(item["requires_shipping"], json!(true));

        let result = service
            .fetch(FetchRequest::all(
                "inventory_item",
                record(&[("sku", json!("SHIRT-S"))]),
            ))
            .await
            .unwrap();
        assert_eq!(result.count, 1);
    }
}
