//! Product module
//!
//! Owns products and their variants. Variants are the platform's most-joined
//! entity: the variant ⇄ inventory-item link extends them with
//! `inventory_items`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::datastore::{Datastore, Record};
use crate::link::config::{EntityShape, JoinerAlias, JoinerRelationship, ModuleJoinerConfig};
use crate::module::traits::{
    FetchRequest, FetchResult, ModuleError, ModuleInitContext, ModuleProvider, ModuleService,
    ResourceMode,
};
use crate::modules::{fetch_collection, new_id};

const PRODUCTS: &str = "products";
const VARIANTS: &str = "variants";

/// Product module provider (registration contract).
pub struct ProductModuleProvider;

impl ProductModuleProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProductModuleProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleProvider for ProductModuleProvider {
    fn name(&self) -> &str {
        "product"
    }

    fn default_resources(&self) -> Option<ResourceMode> {
        Some(ResourceMode::Shared)
    }

    async fn migrate(&self, datastore: &Arc<dyn Datastore>) -> Result<(), ModuleError> {
        datastore.create_collection(PRODUCTS)?;
        datastore.create_collection(VARIANTS)?;
        Ok(())
    }

    async fn run_loaders(&self, datastore: &Arc<dyn Datastore>) -> Result<(), ModuleError> {
        // Loaders need their collections even on loader-only boots.
        self.migrate(datastore).await?;
        debug!("Product module loaders complete");
        Ok(())
    }

    async fn build(&self, ctx: ModuleInitContext) -> Result<Arc<dyn ModuleService>, ModuleError> {
        Ok(Arc::new(ProductModuleService {
            datastore: ctx.datastore,
        }))
    }
}

/// Live product service.
pub struct ProductModuleService {
    datastore: Arc<dyn Datastore>,
}

impl ProductModuleService {
    /// Create a product, generating its id.
    pub fn create_product(&self, mut product: Record) -> Result<Record, ModuleError> {
        product
            .entry("id".to_string())
            .or_insert_with(|| Value::String(new_id("prod")));
        product
            .entry("status".to_string())
            .or_insert_with(|| json!("draft"));
        self.datastore.collection(PRODUCTS)?.insert(product.clone())?;
        Ok(product)
    }

    /// Create product variants, generating ids. The command-executor surface
    /// the HTTP layer drives.
    pub fn create_variants(&self, variants: Vec<Record>) -> Result<Vec<Record>, ModuleError> {
        let collection = self.datastore.collection(VARIANTS)?;
        let mut created = Vec::with_capacity(variants.len());
        for mut variant in variants {
            if !variant.contains_key("product_id") {
                return Err(ModuleError::Configuration(
                    "variant requires a product_id".to_string(),
                ));
            }
            variant
                .entry("id".to_string())
                .or_insert_with(|| Value::String(new_id("var")));
            collection.insert(variant.clone())?;
            created.push(variant);
        }
        Ok(created)
    }
}

#[async_trait]
impl ModuleService for ProductModuleService {
    fn service_name(&self) -> &str {
        "product"
    }

    fn joiner_config(&self) -> ModuleJoinerConfig {
        product_joiner_config()
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResult, ModuleError> {
        let collection = match request.entity.as_str() {
            "product" => PRODUCTS,
            "variant" => VARIANTS,
            _ => {
                return Err(ModuleError::UnknownEntity {
                    service: "product".to_string(),
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

/// The product module's joiner config: two entities, entry aliases for both,
/// and the intra-service edges between them.
pub fn product_joiner_config() -> ModuleJoinerConfig {
    ModuleJoinerConfig {
        service_name: "product".to_string(),
        is_link: false,
        primary_keys: vec!["id".to_string()],
        alias: vec![
            JoinerAlias::for_entity("products", "product"),
            JoinerAlias::for_entity("variant", "variant"),
            JoinerAlias::for_entity("variants", "variant"),
        ],
        entities: vec![
            EntityShape::new("product", &["id", "title", "handle", "status"]),
            EntityShape::new("variant", &["id", "product_id", "title", "sku"]),
        ],
        relationships: vec![
            JoinerRelationship {
                service_name: "product".to_string(),
                entity: Some("product".to_string()),
                primary_key: "id".to_string(),
                foreign_key: "product_id".to_string(),
                alias: "product".to_string(),
                is_list: false,
                args: None,
            },
            JoinerRelationship {
                service_name: "product".to_string(),
                entity: Some("variant".to_string()),
                primary_key: "product_id".to_string(),
                foreign_key: "id".to_string(),
                alias: "variants".to_string(),
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

    async fn service() -> ProductModuleService {
        let datastore: Arc<dyn Datastore> = Arc::new(MemoryStore::new());
        let provider = ProductModuleProvider::new();
        provider.migrate(&datastore).await.unwrap();
        ProductModuleService { datastore }
    }

    #[tokio::test]
    async fn create_variants_requires_product_id() {
        let service = service().await;
        let result = service.create_variants(vec![record(&[("title", json!("Small"))])]);
        assert!(matches!(result, Err(ModuleError::Configuration(_))));
    }

    #[tokio::test]
    async fn create_and_fetch_variants() {
        let service = service().await;
        let product = service
            .create_product(record(&[("title", json!("Shirt"))]))
            .unwrap();
        let product_id = product["id"].clone();

        service
            .create_variants(vec![
                record(&[("product_id", product_id.clone()), ("sku", json!("S"))]),
                record(&[("product_id", product_id.clone()), ("sku", json!("M"))]),
            ])
            .unwrap();

        let result = service
            .fetch(FetchRequest::all(
                "variant",
                record(&[("product_id", product_id)]),
            ))
            .await
            .unwrap();
        assert_eq!(result.count, 2);
    }

    #[tokio::test]
    async fn fetch_projects_requested_fields() {
        let service = service().await;
        service
            .create_variants(vec![record(&[
                ("product_id", json!("prod_1")),
                ("sku", json!("S")),
                ("title", json!("Small")),
            ])])
            .unwrap();

        let result = service
            .fetch(FetchRequest {
                entity: "variant".to_string(),
                fields: vec!["sku".to_string()],
                filters: Record::new(),
                order: vec![],
                skip: None,
                take: None,
            })
            .await
            .unwrap();

        assert_eq!(result.rows[0].len(), 1);
        assert!(result.rows[0].contains_key("sku"));
    }

    #[tokio::test]
    async fn unknown_entity_is_rejected() {
        let service = service().await;
        let result = service
            .fetch(FetchRequest::all("collection", Record::new()))
            .await;
        assert!(matches!(result, Err(ModuleError::UnknownEntity { .. })));
    }
}
