//! Test utilities for integration tests
//!
//! Provides an application fixture with all built-in modules enabled and
//! helpers for seeding a small catalog across the product, inventory, and
//! link collections.

// Each integration test binary compiles this module separately and uses a
// different subset of it.
#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;

use commerce_core::config::{AppConfig, ModuleDeclaration, ModuleScope, ModuleSetting};
use commerce_core::link::definitions::PRODUCT_VARIANT_INVENTORY_ITEM;
use commerce_core::link::module::LinkModuleService;
use commerce_core::module::traits::ResourceMode;
use commerce_core::modules::inventory::InventoryModuleService;
use commerce_core::modules::order::OrderModuleService;
use commerce_core::modules::product::ProductModuleService;
use commerce_core::{CommerceApp, Record};

/// A booted application with every built-in module enabled (internal,
/// shared resources).
pub struct AppFixture {
    pub app: Arc<CommerceApp>,
}

/// Ids of the seeded catalog rows.
pub struct SeededCatalog {
    pub product_id: String,
    pub variant_ids: Vec<String>,
    pub inventory_ids: Vec<String>,
}

/// Configuration enabling all built-in modules internally.
pub fn full_config() -> AppConfig {
    let mut config = AppConfig::default();
    for name in ["product", "inventory", "order", "auth"] {
        config.modules.set(
            name,
            ModuleSetting::Declaration(ModuleDeclaration {
                scope: Some(ModuleScope::Internal),
                resources: Some(ResourceMode::Shared),
                ..Default::default()
            }),
        );
    }
    config
}

pub fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

impl AppFixture {
    /// Boot with all built-in modules.
    pub async fn bootstrap_full() -> Self {
        let app = CommerceApp::bootstrap(&full_config())
            .await
            .expect("full bootstrap succeeds");
        Self { app: Arc::new(app) }
    }

    /// Seed one product with `count` variants, a matching inventory item per
    /// variant, and a link row associating each pair.
    pub fn seed_catalog(&self, count: usize) -> SeededCatalog {
        let container = self.app.container();

        let product_service = container.resolve("product_module").unwrap();
        let products = product_service
            .as_any()
            .downcast_ref::<ProductModuleService>()
            .unwrap();

        let inventory_service = container.resolve("inventory_module").unwrap();
        let inventory = inventory_service
            .as_any()
            .downcast_ref::<InventoryModuleService>()
            .unwrap();

        let link_service = container
            .resolve(PRODUCT_VARIANT_INVENTORY_ITEM)
            .expect("link module registered");
        let link = link_service
            .as_any()
            .downcast_ref::<LinkModuleService>()
            .unwrap();

        let product = products
            .create_product(record(&[("title", json!("Shirt")), ("handle", json!("shirt"))]))
            .unwrap();
        let product_id = product["id"].as_str().unwrap().to_string();

        let mut variant_ids = Vec::with_capacity(count);
        let mut inventory_ids = Vec::with_capacity(count);
        for i in 0..count {
            let variant = products
                .create_variants(vec![record(&[
                    ("product_id", json!(product_id)),
                    ("title", json!(format!("Variant {i}"))),
                    ("sku", json!(format!("SHIRT-{i}"))),
                ])])
                .unwrap()
                .remove(0);
            let variant_id = variant["id"].as_str().unwrap().to_string();

            let item = inventory
                .create_inventory_item(record(&[("sku", json!(format!("SHIRT-{i}")))]))
                .unwrap();
            let inventory_id = item["id"].as_str().unwrap().to_string();

            link.attach(record(&[
                ("variant_id", json!(variant_id)),
                ("inventory_item_id", json!(inventory_id)),
                ("required_quantity", json!(1)),
            ]))
            .unwrap();

            variant_ids.push(variant_id);
            inventory_ids.push(inventory_id);
        }

        SeededCatalog {
            product_id,
            variant_ids,
            inventory_ids,
        }
    }

    /// Create an order and return its id.
    pub fn seed_order(&self, email: &str) -> String {
        let service = self.app.container().resolve("order_module").unwrap();
        let orders = service
            .as_any()
            .downcast_ref::<OrderModuleService>()
            .unwrap();
        let order = orders
            .create_order(record(&[("email", json!(email))]))
            .unwrap();
        order["id"].as_str().unwrap().to_string()
    }
}
