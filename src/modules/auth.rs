//! Auth module
//!
//! The authentication boundary: a service that dispatches to pluggable auth
//! providers and stores identities. Provider implementations beyond the
//! built-in api-key check are deployment concerns, not platform core.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::datastore::{Datastore, Record, Selection};
use crate::link::config::{EntityShape, JoinerAlias, ModuleJoinerConfig};
use crate::module::traits::{
    FetchRequest, FetchResult, ModuleError, ModuleInitContext, ModuleProvider, ModuleService,
    ResourceMode,
};
use crate::modules::fetch_collection;

const AUTH_IDENTITIES: &str = "auth_identities";

/// Authentication failures. Translated to an unauthorized response by the
/// HTTP boundary, never retried automatically.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("Unknown auth provider: {0}")]
    UnknownProvider(String),

    #[error("Authentication failed: {0}")]
    InvalidCredentials(String),
}

/// Request data handed to an auth provider.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationInput {
    /// Auth scope from the route (`admin`, `store`, ...)
    pub scope: String,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

/// A successfully authenticated identity.
#[derive(Debug, Clone, Serialize)]
pub struct AuthIdentity {
    pub id: String,
    pub scope: String,
    pub actor_id: Option<String>,
}

/// Authentication provider contract.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn authenticate(
        &self,
        input: &AuthenticationInput,
        identities: &Arc<dyn Datastore>,
    ) -> Result<AuthIdentity, AuthenticationError>;
}

/// Built-in provider: matches the `x-api-key` header against stored
/// identities for the requested scope.
pub struct ApiKeyAuthProvider;

#[async_trait]
impl AuthProvider for ApiKeyAuthProvider {
    fn name(&self) -> &str {
        "api-key"
    }

    async fn authenticate(
        &self,
        input: &AuthenticationInput,
        identities: &Arc<dyn Datastore>,
    ) -> Result<AuthIdentity, AuthenticationError> {
        let api_key = input
            .headers
            .get("x-api-key")
            .ok_or_else(|| AuthenticationError::InvalidCredentials("missing api key".into()))?;

        let collection = identities
            .collection(AUTH_IDENTITIES)
            .map_err(|e| AuthenticationError::InvalidCredentials(e.to_string()))?;
        let matched = collection
            .select(&Selection {
                filters: [
                    ("provider".to_string(), json!("api-key")),
                    ("scope".to_string(), json!(input.scope)),
                    ("api_key".to_string(), json!(api_key)),
                ]
                .into_iter()
                .collect(),
                ..Default::default()
            })
            .map_err(|e| AuthenticationError::InvalidCredentials(e.to_string()))?;

        let identity = matched
            .rows
            .into_iter()
            .next()
            .ok_or_else(|| AuthenticationError::InvalidCredentials("invalid api key".into()))?;

        Ok(AuthIdentity {
            id: identity
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            scope: input.scope.clone(),
            actor_id: identity
                .get("actor_id")
                .and_then(Value::as_str)
                .map(String::from),
        })
    }
}

/// Auth module provider.
pub struct AuthModuleProvider;

impl AuthModuleProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AuthModuleProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleProvider for AuthModuleProvider {
    fn name(&self) -> &str {
        "auth"
    }

    fn default_resources(&self) -> Option<ResourceMode> {
        Some(ResourceMode::Shared)
    }

    async fn migrate(&self, datastore: &Arc<dyn Datastore>) -> Result<(), ModuleError> {
        datastore.create_collection(AUTH_IDENTITIES)?;
        Ok(())
    }

    async fn run_loaders(&self, datastore: &Arc<dyn Datastore>) -> Result<(), ModuleError> {
        self.migrate(datastore).await
    }

    async fn build(&self, ctx: ModuleInitContext) -> Result<Arc<dyn ModuleService>, ModuleError> {
        let mut providers: HashMap<String, Arc<dyn AuthProvider>> = HashMap::new();
        let api_key: Arc<dyn AuthProvider> = Arc::new(ApiKeyAuthProvider);
        providers.insert(api_key.name().to_string(), api_key);

        Ok(Arc::new(AuthModuleService {
            datastore: ctx.datastore,
            providers,
        }))
    }
}

/// Live auth service.
pub struct AuthModuleService {
    datastore: Arc<dyn Datastore>,
    providers: HashMap<String, Arc<dyn AuthProvider>>,
}

impl AuthModuleService {
    /// Authenticate a request against a named provider.
    pub async fn authenticate(
        &self,
        provider_name: &str,
        input: AuthenticationInput,
    ) -> Result<AuthIdentity, AuthenticationError> {
        let provider = self
            .providers
            .get(provider_name)
            .ok_or_else(|| AuthenticationError::UnknownProvider(provider_name.to_string()))?;
        debug!("Authenticating via provider {}", provider_name);
        provider.authenticate(&input, &self.datastore).await
    }

    /// Store an identity (provider registration / seeding).
    pub fn register_identity(&self, identity: Record) -> Result<(), ModuleError> {
        self.datastore
            .collection(AUTH_IDENTITIES)?
            .insert(identity)?;
        Ok(())
    }
}

#[async_trait]
impl ModuleService for AuthModuleService {
    fn service_name(&self) -> &str {
        "auth"
    }

    fn joiner_config(&self) -> ModuleJoinerConfig {
        auth_joiner_config()
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResult, ModuleError> {
        if request.entity != "auth_identity" {
            return Err(ModuleError::UnknownEntity {
                service: "auth".to_string(),
                entity: request.entity,
            });
        }
        fetch_collection(&self.datastore, AUTH_IDENTITIES, &request)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn auth_joiner_config() -> ModuleJoinerConfig {
    ModuleJoinerConfig {
        service_name: "auth".to_string(),
        is_link: false,
        primary_keys: vec!["id".to_string()],
        alias: vec![
            JoinerAlias::new("auth_identity"),
            JoinerAlias::new("auth_identities"),
        ],
        entities: vec![EntityShape::new(
            "auth_identity",
            &["id", "provider", "scope", "actor_id"],
        )],
        relationships: vec![],
        extends: vec![],
    }
}
