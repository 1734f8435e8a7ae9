//! Module system traits and interfaces
//!
//! Defines the core traits that business modules and the platform use to
//! communicate: the registration contract a module provider implements, the
//! service interface the container hands out, and the module error taxonomy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

use crate::datastore::{Datastore, DatastoreError, Record, SortDir};
use crate::link::config::ModuleJoinerConfig;

/// How a module's storage resources are provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    /// Module shares the container-owned datastore
    Shared,
    /// Module gets its own datastore instance
    Isolated,
}

/// Context handed to a provider when building its service.
#[derive(Clone)]
pub struct ModuleInitContext {
    /// Registration name the service will be stored under
    pub registration_name: String,
    /// Datastore per the module's resources declaration (shared or isolated)
    pub datastore: Arc<dyn Datastore>,
    /// Module options from the declaration, verbatim
    pub options: Value,
}

/// A field selection + filter request against a single module service.
///
/// `fields` may contain `"*"` to select every field of the entity. Filters
/// follow datastore semantics: scalar equality, array membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Entity within the service to fetch (e.g. `variant` for the product
    /// module). Services declare their entities in their joiner config.
    pub entity: String,
    pub fields: Vec<String>,
    pub filters: Record,
    pub order: Vec<(String, SortDir)>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
}

impl FetchRequest {
    /// A request for all fields of `entity` matching `filters`, unpaginated.
    pub fn all(entity: impl Into<String>, filters: Record) -> Self {
        Self {
            entity: entity.into(),
            fields: vec!["*".to_string()],
            filters,
            order: Vec::new(),
            skip: None,
            take: None,
        }
    }
}

/// Result of a module fetch: the row page plus the pre-pagination count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub rows: Vec<Record>,
    pub count: usize,
}

/// Live module service interface
///
/// This is what the container stores and what the query composer talks to.
/// Both in-process services and external proxies implement it.
#[async_trait]
pub trait ModuleService: Send + Sync {
    /// Service name, matching the joiner config's `service_name`
    fn service_name(&self) -> &str;

    /// The service's own joiner config: aliases, entities, relationships
    fn joiner_config(&self) -> ModuleJoinerConfig;

    /// Fetch entity rows matching the request
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResult, ModuleError>;

    /// Downcast support for callers that need the concrete service type
    fn as_any(&self) -> &dyn Any;
}

/// Module registration contract
///
/// A provider is the static side of a module: it knows how to migrate the
/// module's schema, run its data loaders, and build the live service. The
/// application only ever sees this contract, never the module internals.
#[async_trait]
pub trait ModuleProvider: Send + Sync {
    /// Module name (matches the definition registry)
    fn name(&self) -> &str;

    /// Default resource mode when the declaration omits scope/resources.
    /// Returning `None` makes an explicit declaration mandatory.
    fn default_resources(&self) -> Option<ResourceMode>;

    /// Run the module's schema-migration step (collection creation)
    async fn migrate(&self, datastore: &Arc<dyn Datastore>) -> Result<(), ModuleError>;

    /// Run the module's static loaders (data seeds)
    async fn run_loaders(&self, datastore: &Arc<dyn Datastore>) -> Result<(), ModuleError>;

    /// Build the live service
    async fn build(&self, ctx: ModuleInitContext) -> Result<Arc<dyn ModuleService>, ModuleError>;
}

/// Module system errors
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Module configuration invalid: {0}")]
    Configuration(String),

    #[error("Module load failed: {0}")]
    Load(String),

    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Unknown entity {entity} on service {service}")]
    UnknownEntity { service: String, entity: String },

    #[error("Datastore error: {0}")]
    Datastore(#[from] DatastoreError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Remote module error: {0}")]
    Remote(String),

    #[error("Timeout waiting for module response")]
    Timeout,

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<serde_json::Error> for ModuleError {
    fn from(e: serde_json::Error) -> Self {
        ModuleError::Serialization(e.to_string())
    }
}
