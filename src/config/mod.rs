//! Configuration management for commerce-core
//!
//! Handles application configuration loading and the per-module declaration
//! shapes the resolver consumes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;

use crate::module::traits::ResourceMode;

/// Module scope: where the module's service runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleScope {
    /// Constructed in-process with injected resources
    Internal,
    /// Reached through a network proxy to a remotely hosted service
    External,
}

/// Per-module configuration entry.
///
/// A module key maps to either a bare boolean (`true` = enable with the
/// module's defaults, `false` = explicitly disabled) or a declaration table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModuleSetting {
    Enabled(bool),
    Declaration(ModuleDeclaration),
}

/// Full module declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleDeclaration {
    /// Internal or external; may be omitted when the module's provider
    /// declares a default
    #[serde(default)]
    pub scope: Option<ModuleScope>,

    /// Resource provisioning for internal modules (shared/isolated).
    /// Required for internal scope unless the provider declares a default.
    #[serde(default)]
    pub resources: Option<ResourceMode>,

    /// Module-specific options, passed to the provider verbatim
    #[serde(default)]
    pub options: Option<serde_json::Value>,

    /// Server address for external modules
    #[serde(default)]
    pub server: Option<ExternalServerConfig>,
}

/// External module server location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalServerConfig {
    /// Host:port of the remotely hosted module service
    pub address: String,

    /// Request timeout in seconds
    #[serde(default = "default_external_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_external_timeout_secs() -> u64 {
    30
}

/// Module system configuration: module name → setting.
///
/// A `BTreeMap` keeps serialization deterministic; resolution order is fixed
/// by the definition registry, not by this map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModulesConfig {
    #[serde(flatten)]
    pub modules: BTreeMap<String, ModuleSetting>,
}

impl ModulesConfig {
    /// Look up the setting for a module name.
    pub fn get(&self, name: &str) -> Option<&ModuleSetting> {
        self.modules.get(name)
    }

    /// Set a module's configuration entry.
    pub fn set(&mut self, name: impl Into<String>, setting: ModuleSetting) -> &mut Self {
        self.modules.insert(name.into(), setting);
        self
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Listen address for the admin API
    #[serde(default = "default_api_listen_addr")]
    pub listen_addr: SocketAddr,
}

fn default_api_listen_addr() -> SocketAddr {
    "127.0.0.1:9000".parse().expect("valid default listen addr")
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_listen_addr(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "commerce_core=debug")
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON-formatted logs (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Module declarations
    #[serde(default)]
    pub modules: ModulesConfig,

    /// Admin API settings
    #[serde(default)]
    pub api: Option<ApiConfig>,

    /// Logging settings
    #[serde(default)]
    pub logging: Option<LoggingConfig>,

    /// Extra link definitions beyond the built-in set
    #[serde(default)]
    pub links: Vec<crate::link::config::ModuleJoinerConfig>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}
