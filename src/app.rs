//! Application bootstrap
//!
//! Wires the boot sequence: configuration → resolver → loader → populated
//! container → link registration → query composer. The result is the
//! application handle the HTTP layer (and embedders) work against.

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::datastore::MemoryStore;
use crate::link::definitions::builtin_links;
use crate::link::module::LinkModuleService;
use crate::link::registry::LinkRegistry;
use crate::module::container::ModuleContainer;
use crate::module::loader::{load_modules, LoadFlags};
use crate::module::resolver::{resolve, ModuleResolution};
use crate::module::traits::{ModuleError, ResourceMode};
use crate::query::composer::{QueryResult, RemoteQuery};
use crate::query::input::{QueryInput, QueryVariables};
use crate::query::QueryResolutionError;

/// The booted application.
pub struct CommerceApp {
    container: Arc<ModuleContainer>,
    links: Arc<LinkRegistry>,
    query: RemoteQuery,
    resolutions: Vec<ModuleResolution>,
}

impl CommerceApp {
    /// Boot with default flags.
    pub async fn bootstrap(config: &AppConfig) -> anyhow::Result<Self> {
        Self::bootstrap_with(config, LoadFlags::default()).await
    }

    /// Boot with explicit flags (migration-only / loader-only modes).
    pub async fn bootstrap_with(config: &AppConfig, flags: LoadFlags) -> anyhow::Result<Self> {
        let resolutions = resolve(&config.modules);

        let mut container = ModuleContainer::new(Arc::new(MemoryStore::new()));
        load_modules(&mut container, &resolutions, flags)
            .await
            .context("module loading failed")?;

        let mut links = LinkRegistry::new();

        // Service configs first, in load order, so link validation sees the
        // full deployed service set.
        for resolution in &resolutions {
            if let Some(service) = container.resolve(resolution.definition.registration_name) {
                links
                    .register_service_config(&service.joiner_config())
                    .with_context(|| {
                        format!(
                            "invalid joiner config for module {}",
                            resolution.definition.label
                        )
                    })?;
            }
        }

        // Built-in links are skipped (loudly) when a participating module is
        // absent in this deployment; configured links are trusted wiring and
        // fail the boot instead.
        for link_config in builtin_links() {
            if !links.can_register_link(&link_config) {
                warn!(
                    "Skipping link {}: a participating module is not loaded",
                    link_config.service_name
                );
                continue;
            }
            links
                .register_link(&link_config)
                .with_context(|| format!("invalid built-in link {}", link_config.service_name))?;
            let service = LinkModuleService::new(
                link_config.clone(),
                Arc::clone(container.shared_datastore()),
            )?;
            container.register_service(link_config.service_name.clone(), Arc::new(service));
        }

        for link_config in &config.links {
            links
                .register_link(link_config)
                .with_context(|| format!("invalid configured link {}", link_config.service_name))?;
            let service = LinkModuleService::new(
                link_config.clone(),
                Arc::clone(container.shared_datastore()),
            )?;
            container.register_service(link_config.service_name.clone(), Arc::new(service));
        }

        let container = Arc::new(container);
        let links = Arc::new(links);
        let query = RemoteQuery::new(Arc::clone(&container), Arc::clone(&links));

        info!(
            "Application bootstrapped: {} registrations",
            container.registration_names().len()
        );

        Ok(Self {
            container,
            links,
            query,
            resolutions,
        })
    }

    pub fn container(&self) -> &Arc<ModuleContainer> {
        &self.container
    }

    pub fn links(&self) -> &Arc<LinkRegistry> {
        &self.links
    }

    pub fn remote_query(&self) -> &RemoteQuery {
        &self.query
    }

    /// Compose a cross-module query.
    pub async fn query(
        &self,
        input: impl Into<QueryInput>,
    ) -> Result<QueryResult, QueryResolutionError> {
        self.query.query(input).await
    }

    /// Compose a cross-module query with explicit variables.
    pub async fn query_with_variables(
        &self,
        input: impl Into<QueryInput>,
        variables: QueryVariables,
    ) -> Result<QueryResult, QueryResolutionError> {
        self.query.query_with_variables(input, Some(variables)).await
    }

    /// Re-run the schema-migration step of every enabled internal module
    /// against the shared datastore. Isolated modules migrate during their
    /// own construction.
    pub async fn run_migrations(&self) -> Result<(), ModuleError> {
        for resolution in &self.resolutions {
            let Some(declaration) = resolution.declaration.as_ref() else {
                continue;
            };
            if declaration.resources != Some(ResourceMode::Shared) {
                continue;
            }
            let provider = (resolution.definition.default_provider)();
            provider.migrate(self.container.shared_datastore()).await?;
            info!("Migrations complete for {}", resolution.definition.label);
        }
        Ok(())
    }
}
