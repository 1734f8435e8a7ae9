//! Module system for commerce-core
//!
//! Business capabilities (Product, Inventory, Order, Auth) are independently
//! defined modules wired together at boot without compile-time knowledge of
//! each other.
//!
//! ## Architecture
//!
//! - **Definition registry**: static metadata per module, fixed boot order
//! - **Resolver**: configuration → per-module resolution (internal/external/disabled)
//! - **Loader**: sequential instantiation into the shared container; optional
//!   module failures degrade, required failures abort
//! - **Container**: typed registry; every configured module has a defined
//!   entry, absence is explicit
//! - **External proxy**: network-backed implementation of the service
//!   interface for remotely hosted modules

pub mod container;
pub mod definition;
pub mod external;
pub mod loader;
pub mod resolver;
pub mod traits;

pub use container::{ModuleContainer, Registration};
pub use definition::{definition, definitions, ModuleDefinition, ModuleId};
pub use loader::{load_modules, LoadFlags};
pub use resolver::{resolve, ModuleResolution};
pub use traits::{
    FetchRequest, FetchResult, ModuleError, ModuleInitContext, ModuleProvider, ModuleService,
    ResourceMode,
};
