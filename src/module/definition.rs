//! Module definition registry
//!
//! Static metadata for every module the platform knows about: identity,
//! registration name, whether the module is required for boot, and the
//! default provider used when a declaration does not supply its own. Pure
//! data, built once, read-only for the process lifetime.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::module::traits::ModuleProvider;

/// Known module identifiers.
///
/// The container is keyed by registration names derived from this set, so
/// lookups are always against an enumerated universe rather than free-form
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleId {
    Product,
    Inventory,
    Order,
    Auth,
}

impl ModuleId {
    /// Configuration key / canonical module name
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleId::Product => "product",
            ModuleId::Inventory => "inventory",
            ModuleId::Order => "order",
            ModuleId::Auth => "auth",
        }
    }

    /// Parse a configuration key into a known module id
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "product" => Some(ModuleId::Product),
            "inventory" => Some(ModuleId::Inventory),
            "order" => Some(ModuleId::Order),
            "auth" => Some(ModuleId::Auth),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static definition of one module.
#[derive(Clone)]
pub struct ModuleDefinition {
    pub id: ModuleId,
    /// Name the live service is registered under in the container
    pub registration_name: &'static str,
    /// Human-readable label for logs and errors
    pub label: &'static str,
    /// Whether a load failure aborts application startup
    pub is_required: bool,
    /// Default provider constructor used when the declaration names none
    pub default_provider: fn() -> Arc<dyn ModuleProvider>,
}

impl std::fmt::Debug for ModuleDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDefinition")
            .field("id", &self.id)
            .field("registration_name", &self.registration_name)
            .field("label", &self.label)
            .field("is_required", &self.is_required)
            .finish()
    }
}

fn product_provider() -> Arc<dyn ModuleProvider> {
    Arc::new(crate::modules::product::ProductModuleProvider::new())
}

fn inventory_provider() -> Arc<dyn ModuleProvider> {
    Arc::new(crate::modules::inventory::InventoryModuleProvider::new())
}

fn order_provider() -> Arc<dyn ModuleProvider> {
    Arc::new(crate::modules::order::OrderModuleProvider::new())
}

fn auth_provider() -> Arc<dyn ModuleProvider> {
    Arc::new(crate::modules::auth::AuthModuleProvider::new())
}

static DEFINITIONS: [ModuleDefinition; 4] = [
    ModuleDefinition {
        id: ModuleId::Product,
        registration_name: "product_module",
        label: "Product",
        is_required: true,
        default_provider: product_provider,
    },
    ModuleDefinition {
        id: ModuleId::Inventory,
        registration_name: "inventory_module",
        label: "Inventory",
        is_required: false,
        default_provider: inventory_provider,
    },
    ModuleDefinition {
        id: ModuleId::Order,
        registration_name: "order_module",
        label: "Order",
        is_required: false,
        default_provider: order_provider,
    },
    ModuleDefinition {
        id: ModuleId::Auth,
        registration_name: "auth_module",
        label: "Auth",
        is_required: false,
        default_provider: auth_provider,
    },
];

/// All module definitions, in the canonical (deterministic) boot order.
///
/// The resolver and loader iterate this slice, so modules that later modules
/// resolve from the container during construction must come earlier here.
pub fn definitions() -> &'static [ModuleDefinition] {
    &DEFINITIONS
}

/// Look up a definition by module id.
pub fn definition(id: ModuleId) -> &'static ModuleDefinition {
    DEFINITIONS
        .iter()
        .find(|d| d.id == id)
        .expect("definition registry covers every ModuleId")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_id() {
        for id in [
            ModuleId::Product,
            ModuleId::Inventory,
            ModuleId::Order,
            ModuleId::Auth,
        ] {
            assert_eq!(definition(id).id, id);
        }
    }

    #[test]
    fn parse_round_trips() {
        for def in definitions() {
            assert_eq!(ModuleId::parse(def.id.as_str()), Some(def.id));
        }
        assert_eq!(ModuleId::parse("payments"), None);
    }

    #[test]
    fn product_is_the_only_required_module() {
        let required: Vec<_> = definitions().iter().filter(|d| d.is_required).collect();
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].id, ModuleId::Product);
    }
}
