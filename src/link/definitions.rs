//! Built-in link definitions
//!
//! The platform's shipped association tables between module pairs. Each
//! definition is a plain `ModuleJoinerConfig` value; deployments can add
//! more through configuration.

use crate::link::config::{
    EntityShape, JoinerAlias, JoinerArgs, JoinerExtend, JoinerRelationship, ModuleJoinerConfig,
};

/// Service name of the product-variant ⇄ inventory-item link.
pub const PRODUCT_VARIANT_INVENTORY_ITEM: &str = "product_variant_inventory_item";

/// Association between product variants and inventory items.
///
/// Extends the variant entity with `inventory_items` (to-many link rows) and
/// the inventory item entity with `variant_links`, making the join
/// traversable from either side off this single definition.
pub fn product_variant_inventory_item() -> ModuleJoinerConfig {
    ModuleJoinerConfig {
        service_name: PRODUCT_VARIANT_INVENTORY_ITEM.to_string(),
        is_link: true,
        primary_keys: vec![
            "id".to_string(),
            "variant_id".to_string(),
            "inventory_item_id".to_string(),
        ],
        alias: vec![
            JoinerAlias::new(PRODUCT_VARIANT_INVENTORY_ITEM),
            JoinerAlias::new("product_variant_inventory_items"),
        ],
        entities: vec![EntityShape::new(
            PRODUCT_VARIANT_INVENTORY_ITEM,
            &["id", "variant_id", "inventory_item_id", "required_quantity"],
        )],
        relationships: vec![
            JoinerRelationship {
                service_name: "product".to_string(),
                entity: Some("variant".to_string()),
                primary_key: "id".to_string(),
                foreign_key: "variant_id".to_string(),
                alias: "variant".to_string(),
                is_list: false,
                args: Some(JoinerArgs {
                    method_suffix: Some("Variants".to_string()),
                }),
            },
            JoinerRelationship {
                service_name: "inventory".to_string(),
                entity: Some("inventory_item".to_string()),
                primary_key: "id".to_string(),
                foreign_key: "inventory_item_id".to_string(),
                alias: "inventory".to_string(),
                is_list: false,
                args: None,
            },
        ],
        extends: vec![
            JoinerExtend {
                service_name: "product".to_string(),
                entity: Some("variant".to_string()),
                relationship: JoinerRelationship {
                    service_name: PRODUCT_VARIANT_INVENTORY_ITEM.to_string(),
                    entity: None,
                    primary_key: "variant_id".to_string(),
                    foreign_key: "id".to_string(),
                    alias: "inventory_items".to_string(),
                    is_list: true,
                    args: None,
                },
            },
            JoinerExtend {
                service_name: "inventory".to_string(),
                entity: Some("inventory_item".to_string()),
                relationship: JoinerRelationship {
                    service_name: PRODUCT_VARIANT_INVENTORY_ITEM.to_string(),
                    entity: None,
                    primary_key: "inventory_item_id".to_string(),
                    foreign_key: "id".to_string(),
                    alias: "variant_links".to_string(),
                    is_list: true,
                    args: None,
                },
            },
        ],
    }
}

/// All built-in link definitions.
pub fn builtin_links() -> Vec<ModuleJoinerConfig> {
    vec![product_variant_inventory_item()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_keys_cover_both_foreign_keys() {
        let config = product_variant_inventory_item();
        assert!(config.is_link);
        for relationship in &config.relationships {
            assert!(
                config.primary_keys.contains(&relationship.foreign_key),
                "{} missing from primary keys",
                relationship.foreign_key
            );
        }
    }

    #[test]
    fn extends_point_back_at_the_link() {
        let config = product_variant_inventory_item();
        for extend in &config.extends {
            assert_eq!(extend.relationship.service_name, config.service_name);
        }
    }
}
