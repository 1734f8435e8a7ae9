//! Cross-module link layer
//!
//! Declarative joiner configs describe how independently-owned modules'
//! entities relate; link modules are synthesized from them, and the join
//! graph built here drives remote query composition.

pub mod config;
pub mod definitions;
pub mod module;
pub mod registry;

pub use config::{
    EntityShape, JoinerAlias, JoinerArgs, JoinerExtend, JoinerRelationship, ModuleJoinerConfig,
};
pub use module::LinkModuleService;
pub use registry::{JoinEdge, LinkRegistry, LinkValidationError, ServiceMeta};
