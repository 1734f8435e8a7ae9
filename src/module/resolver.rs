//! Module resolution
//!
//! Turns the module configuration into one `ModuleResolution` per defined
//! module, deciding enabled/disabled and normalizing declarations with the
//! provider defaults. Resolution is deterministic: it iterates the definition
//! registry in its fixed order and never consults the environment.

use tracing::warn;

use crate::config::{ModuleDeclaration, ModuleScope, ModuleSetting, ModulesConfig};
use crate::module::definition::{definitions, ModuleDefinition, ModuleId};
use crate::module::traits::ResourceMode;

/// Resolution outcome for one module.
///
/// A disabled module still produces a resolution: the loader registers a
/// placeholder for it so other modules' container lookups always find a
/// defined entry.
#[derive(Debug, Clone)]
pub struct ModuleResolution {
    pub definition: &'static ModuleDefinition,
    /// Normalized declaration; `None` when the module is disabled
    pub declaration: Option<ModuleDeclaration>,
    /// Explicitly disabled (`false` in config, or absent and not required)
    pub disabled: bool,
}

impl ModuleResolution {
    fn disabled(definition: &'static ModuleDefinition) -> Self {
        Self {
            definition,
            declaration: None,
            disabled: true,
        }
    }

    fn enabled(definition: &'static ModuleDefinition, declaration: ModuleDeclaration) -> Self {
        Self {
            definition,
            declaration: Some(declaration),
            disabled: false,
        }
    }

    /// The declared scope, if the module is enabled and a scope was
    /// determined.
    pub fn scope(&self) -> Option<ModuleScope> {
        self.declaration.as_ref().and_then(|d| d.scope)
    }
}

/// Resolve the module configuration against the definition registry.
///
/// Output order follows the definition registry, which is also the load
/// order. Unknown module names in the configuration are warned about and
/// skipped; misconfiguring a name degrades to the module's default behavior
/// rather than aborting resolution.
pub fn resolve(config: &ModulesConfig) -> Vec<ModuleResolution> {
    for name in config.modules.keys() {
        if ModuleId::parse(name).is_none() {
            warn!("Ignoring unknown module in configuration: {}", name);
        }
    }

    definitions()
        .iter()
        .map(|definition| resolve_module(definition, config.get(definition.id.as_str())))
        .collect()
}

fn resolve_module(
    definition: &'static ModuleDefinition,
    setting: Option<&ModuleSetting>,
) -> ModuleResolution {
    match setting {
        None => {
            if definition.is_required {
                ModuleResolution::enabled(definition, default_declaration(definition))
            } else {
                ModuleResolution::disabled(definition)
            }
        }
        Some(ModuleSetting::Enabled(false)) => ModuleResolution::disabled(definition),
        Some(ModuleSetting::Enabled(true)) => {
            ModuleResolution::enabled(definition, default_declaration(definition))
        }
        Some(ModuleSetting::Declaration(declaration)) => {
            ModuleResolution::enabled(definition, normalize(definition, declaration.clone()))
        }
    }
}

/// Declaration for a module enabled without a table: the provider's default
/// resources decide scope, and a provider with no default yields an empty
/// declaration the loader will reject for that module.
fn default_declaration(definition: &'static ModuleDefinition) -> ModuleDeclaration {
    let mut declaration = ModuleDeclaration::default();
    if let Some(resources) = provider_default(definition) {
        declaration.scope = Some(ModuleScope::Internal);
        declaration.resources = Some(resources);
    }
    declaration
}

/// Fill a partial declaration from the provider default. Only a missing
/// scope is defaulted; an explicit internal scope with missing resources is
/// left for the loader to report.
fn normalize(
    definition: &'static ModuleDefinition,
    mut declaration: ModuleDeclaration,
) -> ModuleDeclaration {
    if declaration.scope.is_none() {
        if let Some(resources) = provider_default(definition) {
            declaration.scope = Some(ModuleScope::Internal);
            declaration.resources.get_or_insert(resources);
        }
    }
    declaration
}

fn provider_default(definition: &'static ModuleDefinition) -> Option<ResourceMode> {
    (definition.default_provider)().default_resources()
}
