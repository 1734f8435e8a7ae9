//! Order module
//!
//! Owns orders and order edits. Order-edit creation is a side-effecting
//! operation serialized per order id through the in-flight registry: two
//! concurrent begin requests for the same order cannot both create an edit,
//! while edits for different orders proceed independently.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::datastore::{Datastore, Record, Selection};
use crate::link::config::{EntityShape, JoinerAlias, JoinerRelationship, ModuleJoinerConfig};
use crate::module::traits::{
    FetchRequest, FetchResult, ModuleError, ModuleInitContext, ModuleProvider, ModuleService,
    ResourceMode,
};
use crate::modules::{fetch_collection, new_id};
use crate::utils::InFlightRegistry;

const ORDERS: &str = "orders";
const ORDER_EDITS: &str = "order_edits";

/// Order module provider.
pub struct OrderModuleProvider;

impl OrderModuleProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OrderModuleProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleProvider for OrderModuleProvider {
    fn name(&self) -> &str {
        "order"
    }

    fn default_resources(&self) -> Option<ResourceMode> {
        Some(ResourceMode::Shared)
    }

    async fn migrate(&self, datastore: &Arc<dyn Datastore>) -> Result<(), ModuleError> {
        datastore.create_collection(ORDERS)?;
        datastore.create_collection(ORDER_EDITS)?;
        Ok(())
    }

    async fn run_loaders(&self, datastore: &Arc<dyn Datastore>) -> Result<(), ModuleError> {
        self.migrate(datastore).await
    }

    async fn build(&self, ctx: ModuleInitContext) -> Result<Arc<dyn ModuleService>, ModuleError> {
        Ok(Arc::new(OrderModuleService {
            datastore: ctx.datastore,
            edit_creations: InFlightRegistry::new(),
        }))
    }
}

/// Live order service.
pub struct OrderModuleService {
    datastore: Arc<dyn Datastore>,
    /// One in-flight edit creation per order id
    edit_creations: InFlightRegistry,
}

impl OrderModuleService {
    /// Create an order, generating its id.
    pub fn create_order(&self, mut order: Record) -> Result<Record, ModuleError> {
        order
            .entry("id".to_string())
            .or_insert_with(|| Value::String(new_id("order")));
        order
            .entry("status".to_string())
            .or_insert_with(|| json!("pending"));
        self.datastore.collection(ORDERS)?.insert(order.clone())?;
        Ok(order)
    }

    /// Begin an order edit.
    ///
    /// At most one creation is in flight per order, and an order can have at
    /// most one active edit; both violations surface as conflicts.
    pub async fn begin_edit(
        &self,
        order_id: &str,
        created_by: &str,
    ) -> Result<Record, ModuleError> {
        let _permit = self
            .edit_creations
            .try_acquire(order_id)
            .ok_or_else(|| {
                ModuleError::Conflict(format!(
                    "an edit creation for order {order_id} is already running"
                ))
            })?;

        let orders = self.datastore.collection(ORDERS)?;
        let existing = orders.select(&Selection {
            filters: [("id".to_string(), json!(order_id))].into_iter().collect(),
            ..Default::default()
        })?;
        if existing.rows.is_empty() {
            return Err(ModuleError::NotFound(format!("order {order_id}")));
        }

        let edits = self.datastore.collection(ORDER_EDITS)?;
        let active = edits.select(&Selection {
            filters: [
                ("order_id".to_string(), json!(order_id)),
                ("status".to_string(), json!("created")),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        })?;
        if !active.rows.is_empty() {
            return Err(ModuleError::Conflict(format!(
                "order {order_id} already has an active edit"
            )));
        }

        let edit: Record = [
            ("id".to_string(), Value::String(new_id("oe"))),
            ("order_id".to_string(), json!(order_id)),
            ("status".to_string(), json!("created")),
            ("created_by".to_string(), json!(created_by)),
        ]
        .into_iter()
        .collect();
        edits.insert(edit.clone())?;
        Ok(edit)
    }

    /// Confirm an active edit.
    pub fn confirm_edit(&self, edit_id: &str) -> Result<(), ModuleError> {
        let edits = self.datastore.collection(ORDER_EDITS)?;
        let updated = edits.update(
            &[
                ("id".to_string(), json!(edit_id)),
                ("status".to_string(), json!("created")),
            ]
            .into_iter()
            .collect(),
            &[("status".to_string(), json!("confirmed"))]
                .into_iter()
                .collect(),
        )?;
        if updated == 0 {
            return Err(ModuleError::NotFound(format!("active edit {edit_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ModuleService for OrderModuleService {
    fn service_name(&self) -> &str {
        "order"
    }

    fn joiner_config(&self) -> ModuleJoinerConfig {
        order_joiner_config()
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResult, ModuleError> {
        let collection = match request.entity.as_str() {
            "order" => ORDERS,
            "order_edit" => ORDER_EDITS,
            _ => {
                return Err(ModuleError::UnknownEntity {
                    service: "order".to_string(),
                    entity: request.entity,
                })
            }
        };
        fetch_collection(&self.datastore, collection, &request)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn order_joiner_config() -> ModuleJoinerConfig {
    ModuleJoinerConfig {
        service_name: "order".to_string(),
        is_link: false,
        primary_keys: vec!["id".to_string()],
        alias: vec![
            JoinerAlias::for_entity("orders", "order"),
            JoinerAlias::for_entity("order_edit", "order_edit"),
            JoinerAlias::for_entity("order_edits", "order_edit"),
        ],
        entities: vec![
            EntityShape::new("order", &["id", "display_id", "status", "email"]),
            EntityShape::new("order_edit", &["id", "order_id", "status", "created_by"]),
        ],
        relationships: vec![
            JoinerRelationship {
                service_name: "order".to_string(),
                entity: Some("order".to_string()),
                primary_key: "id".to_string(),
                foreign_key: "order_id".to_string(),
                alias: "order".to_string(),
                is_list: false,
                args: None,
            },
            JoinerRelationship {
                service_name: "order".to_string(),
                entity: Some("order_edit".to_string()),
                primary_key: "order_id".to_string(),
                foreign_key: "id".to_string(),
                alias: "edits".to_string(),
                is_list: true,
                args: None,
            },
        ],
        extends: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::MemoryStore;
    use crate::modules::record;

    async fn service() -> OrderModuleService {
        let datastore: Arc<dyn Datastore> = Arc::new(MemoryStore::new());
        OrderModuleProvider::new().migrate(&datastore).await.unwrap();
        OrderModuleService {
            datastore,
            edit_creations: InFlightRegistry::new(),
        }
    }

    #[tokio::test]
    async fn begin_edit_requires_existing_order() {
        let service = service().await;
        let result = service.begin_edit("order_missing", "admin").await;
        assert!(matches!(result, Err(ModuleError::NotFound(_))));
    }

    #[tokio::test]
    async fn second_active_edit_is_a_conflict() {
        let service = service().await;
        let order = service
            .create_order(record(&[("email", json!("a@b.test"))]))
            .unwrap();
        let order_id = order["id"].as_str().unwrap().to_string();

        service.begin_edit(&order_id, "admin").await.unwrap();
        let second = service.begin_edit(&order_id, "admin").await;
        assert!(matches!(second, Err(ModuleError::Conflict(_))));
    }

    #[tokio::test]
    async fn confirmed_edit_allows_a_new_one() {
        let service = service().await;
        let order = service
            .create_order(record(&[("email", json!("a@b.test"))]))
            .unwrap();
        let order_id = order["id"].as_str().unwrap().to_string();

        let edit = service.begin_edit(&order_id, "admin").await.unwrap();
        service
            .confirm_edit(edit["id"].as_str().unwrap())
            .unwrap();

        assert!(service.begin_edit(&order_id, "admin").await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_begin_edits_create_exactly_one() {
        let service = Arc::new(service().await);
        let order = service
            .create_order(record(&[("email", json!("a@b.test"))]))
            .unwrap();
        let order_id = order["id"].as_str().unwrap().to_string();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = Arc::clone(&service);
            let order_id = order_id.clone();
            handles.push(tokio::spawn(async move {
                service.begin_edit(&order_id, "admin").await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);

        let edits = service
            .fetch(FetchRequest::all(
                "order_edit",
                record(&[("order_id", json!(order_id))]),
            ))
            .await
            .unwrap();
        assert_eq!(edits.count, 1);
    }
}
