//! Remote query composition
//!
//! Answers field-selection queries that may span modules. The composer
//! resolves the entry point through the link registry's alias map, plans the
//! traversal against the join graph up front, then fetches: one paginated
//! primary fetch against the entry service, plus unpaginated expansion
//! fetches per joined field, stitched deterministically by join key.

pub mod composer;
pub mod input;

use thiserror::Error;

use crate::module::traits::ModuleError;

pub use composer::{QueryMetadata, QueryResult, RemoteQuery};
pub use input::{FieldTree, QueryInput, QueryVariables, RemoteJoinerQuery};

/// Per-request query failures. Surfaced to the caller as a rejected query,
/// never retried; composition reads registry state only, so failing at any
/// point leaves nothing to roll back.
#[derive(Debug, Error)]
pub enum QueryResolutionError {
    #[error("Unknown entry point: {0}")]
    UnknownEntryPoint(String),

    #[error("Field {field} is not resolvable on {service}.{entity}")]
    UnresolvableField {
        service: String,
        entity: String,
        field: String,
    },

    #[error("Module {0} is not available in this deployment")]
    ModuleUnavailable(String),

    #[error("Invalid query input: {0}")]
    InvalidInput(String),

    #[error("Module fetch failed: {0}")]
    Fetch(#[from] ModuleError),
}
