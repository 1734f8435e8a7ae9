//! Module loader
//!
//! Walks the resolutions in configuration order and populates the container.
//! Internal modules are constructed in-process with their declared resources;
//! external modules get a network proxy. Per-module failures register an
//! `Absent` placeholder and boot continues, unless the failing module is
//! required, in which case loading stops and the error is surfaced. Partial
//! startup is a first-class supported state.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{ModuleDeclaration, ModuleScope};
use crate::datastore::{Datastore, MemoryStore};
use crate::module::container::ModuleContainer;
use crate::module::external::ExternalModuleProxy;
use crate::module::resolver::ModuleResolution;
use crate::module::traits::{ModuleError, ModuleInitContext};

/// Boot-mode flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadFlags {
    /// Run only the schema-migration step, skip full instantiation
    pub migration_only: bool,
    /// Run only static loaders (data seeds) without binding the live service
    pub loader_only: bool,
}

/// Load all resolved modules into the container, sequentially.
///
/// Ordering is the resolutions' own order: a module may resolve earlier
/// modules from the container during its construction, so the loader never
/// reorders or parallelizes.
pub async fn load_modules(
    container: &mut ModuleContainer,
    resolutions: &[ModuleResolution],
    flags: LoadFlags,
) -> Result<(), ModuleError> {
    for resolution in resolutions {
        if let Err(e) = load_module(container, resolution, flags).await {
            if resolution.definition.is_required {
                error!(
                    "Could not resolve required module: {}. Error: {}",
                    resolution.definition.label, e
                );
                return Err(e);
            }
            warn!(
                "Could not resolve module: {}. Error: {}",
                resolution.definition.label, e
            );
        }
    }
    Ok(())
}

/// Load a single module per its resolution.
///
/// Every path out of this function leaves a defined container entry for the
/// module's registration name: a live service on success, a placeholder on
/// disablement or failure.
async fn load_module(
    container: &mut ModuleContainer,
    resolution: &ModuleResolution,
    flags: LoadFlags,
) -> Result<(), ModuleError> {
    let definition = resolution.definition;
    let registration_name = definition.registration_name;

    if resolution.disabled {
        container.register_absent(registration_name);
        if definition.is_required {
            return Err(ModuleError::Configuration(format!(
                "The module {} is required and cannot be disabled",
                definition.label
            )));
        }
        debug!("Module {} disabled, placeholder registered", definition.label);
        return Ok(());
    }

    let declaration = resolution
        .declaration
        .as_ref()
        .expect("enabled resolution carries a declaration");

    match declaration.scope {
        Some(ModuleScope::External) => {
            match load_external_module(definition.id.as_str(), declaration).await {
                Ok(service) => {
                    container.register_service(registration_name, service);
                    info!("Module {} loaded (external)", definition.label);
                    Ok(())
                }
                Err(e) => {
                    container.register_absent(registration_name);
                    Err(e)
                }
            }
        }
        Some(ModuleScope::Internal) => {
            if declaration.resources.is_none() {
                container.register_absent(registration_name);
                return Err(ModuleError::Configuration(format!(
                    "The module {} is missing its resources config",
                    definition.label
                )));
            }
            match load_internal_module(container, resolution, flags).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    container.register_absent(registration_name);
                    Err(e)
                }
            }
        }
        None => {
            container.register_absent(registration_name);
            Err(ModuleError::Configuration(format!(
                "The module {} has to define its scope (internal | external)",
                definition.label
            )))
        }
    }
}

/// External strategy: register a network-backed proxy for the module's
/// service interface. Failures are treated identically to internal failures.
async fn load_external_module(
    module_name: &str,
    declaration: &ModuleDeclaration,
) -> Result<Arc<dyn crate::module::traits::ModuleService>, ModuleError> {
    let server = declaration.server.as_ref().ok_or_else(|| {
        ModuleError::Configuration(format!(
            "External module {module_name} is missing its server config"
        ))
    })?;

    let proxy = ExternalModuleProxy::connect(module_name, server).await?;
    Ok(Arc::new(proxy))
}

/// Internal strategy: construct the module in-process, injecting a shared or
/// module-local datastore per the resources declaration.
async fn load_internal_module(
    container: &mut ModuleContainer,
    resolution: &ModuleResolution,
    flags: LoadFlags,
) -> Result<(), ModuleError> {
    use crate::module::traits::ResourceMode;

    let definition = resolution.definition;
    let declaration = resolution
        .declaration
        .as_ref()
        .expect("internal load requires a declaration");

    let datastore: Arc<dyn Datastore> = match declaration.resources {
        Some(ResourceMode::Shared) => Arc::clone(container.shared_datastore()),
        Some(ResourceMode::Isolated) => Arc::new(MemoryStore::new()),
        None => unreachable!("resources checked by caller"),
    };

    let provider = (definition.default_provider)();

    if flags.migration_only {
        provider.migrate(&datastore).await?;
        container.register_absent(definition.registration_name);
        debug!("Module {} migrated (migration-only boot)", definition.label);
        return Ok(());
    }

    if flags.loader_only {
        provider.run_loaders(&datastore).await?;
        container.register_absent(definition.registration_name);
        debug!("Module {} loaders ran (loader-only boot)", definition.label);
        return Ok(());
    }

    provider.migrate(&datastore).await?;
    provider.run_loaders(&datastore).await?;

    let service = provider
        .build(ModuleInitContext {
            registration_name: definition.registration_name.to_string(),
            datastore,
            options: declaration
                .options
                .clone()
                .unwrap_or(serde_json::Value::Null),
        })
        .await?;

    container.register_service(definition.registration_name, service);
    info!("Module {} loaded", definition.label);
    Ok(())
}
