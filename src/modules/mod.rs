//! Built-in business modules
//!
//! Default providers for the platform's module definitions. Each module is a
//! thin service over its datastore collections, exposing the registration
//! contract plus its joiner config; the platform core only ever sees those
//! surfaces.

pub mod auth;
pub mod inventory;
pub mod order;
pub mod product;

use serde_json::Value;
use uuid::Uuid;

use crate::datastore::{Datastore, Record, Selection};
use crate::module::traits::{FetchRequest, FetchResult, ModuleError};
use std::sync::Arc;

/// Generate a prefixed entity id (`var_<uuid>` style).
pub(crate) fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// Keep only the requested fields of each row. `"*"` selects everything.
pub(crate) fn project(rows: Vec<Record>, fields: &[String]) -> Vec<Record> {
    if fields.iter().any(|f| f == "*") {
        return rows;
    }
    rows.into_iter()
        .map(|row| {
            fields
                .iter()
                .filter_map(|f| row.get(f).map(|v| (f.clone(), v.clone())))
                .collect()
        })
        .collect()
}

/// Run a fetch request against one collection, applying filters, order,
/// pagination, and field projection.
pub(crate) fn fetch_collection(
    datastore: &Arc<dyn Datastore>,
    collection_name: &str,
    request: &FetchRequest,
) -> Result<FetchResult, ModuleError> {
    let collection = datastore.collection(collection_name)?;
    let result = collection.select(&Selection {
        filters: request.filters.clone(),
        order: request.order.clone(),
        skip: request.skip.unwrap_or(0),
        take: request.take,
    })?;
    Ok(FetchResult {
        rows: project(result.rows, &request.fields),
        count: result.count,
    })
}

/// Build a record from field/value pairs.
pub(crate) fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
