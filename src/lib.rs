//! Commerce Core - modular commerce platform backbone
//!
//! This crate provides the core of a modular e-commerce platform: business
//! capabilities (Product, Inventory, Order, Auth) are independently defined
//! modules instantiated at boot, wired through a shared container, related
//! through declarative link configs, and queried through a cross-module
//! remote query composer.
//!
//! ## Boot sequence
//!
//! 1. Configuration → **resolver** decides internal/external/disabled per module
//! 2. **Loader** instantiates modules sequentially into the **container**;
//!    optional-module failures degrade, required failures abort
//! 3. **Link registry** validates joiner configs eagerly and synthesizes link
//!    modules over association rows
//! 4. The **remote query composer** answers field selections spanning modules
//!    by bounded traversal of the join graph
//!
//! ## Design principles
//!
//! 1. **Mutual unawareness**: modules never know each other at compile time;
//!    joins are declarative wiring interpreted against a static graph
//! 2. **Explicit absence**: every configured module has a defined container
//!    entry; resolution returns an `Option`, partial startup is supported
//! 3. **Read-only composition**: query composition never mutates registry
//!    state, so cancellation is always safe

pub mod api;
pub mod app;
pub mod config;
pub mod datastore;
pub mod link;
pub mod module;
pub mod modules;
pub mod query;
pub mod utils;

pub use app::CommerceApp;
pub use config::{AppConfig, ModuleDeclaration, ModuleScope, ModuleSetting, ModulesConfig};
pub use datastore::{Datastore, MemoryStore, Record};
pub use link::{LinkRegistry, LinkValidationError, ModuleJoinerConfig};
pub use module::{
    load_modules, resolve, FetchRequest, FetchResult, LoadFlags, ModuleContainer, ModuleError,
    ModuleId, ModuleService, Registration,
};
pub use query::{QueryInput, QueryResolutionError, QueryVariables, RemoteJoinerQuery};
