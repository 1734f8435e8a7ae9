//! Remote query composer
//!
//! Walks the joiner graph to turn a normalized `RemoteJoinerQuery` into a
//! single cross-module result set. Pagination and filters apply to the entry
//! point's primary fetch only; joined fields are fetched unpaginated for the
//! matched row set. Sibling expansions run concurrently and are stitched
//! back keyed by the join's key values, so fetch ordering never changes the
//! merged result.

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::datastore::Record;
use crate::link::registry::{JoinEdge, LinkRegistry};
use crate::module::container::ModuleContainer;
use crate::module::traits::FetchRequest;
use crate::query::input::{normalize, FieldTree, QueryInput, QueryVariables};
use crate::query::QueryResolutionError;

/// Pagination metadata echoed alongside the rows.
#[derive(Debug, Clone, Serialize)]
pub struct QueryMetadata {
    /// Total rows matching the entry point's filters, pre-pagination
    pub count: usize,
    pub skip: u64,
    pub take: Option<u64>,
}

/// Composed query result.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub rows: Vec<Record>,
    pub metadata: QueryMetadata,
}

/// Resolved fetch plan for one (service, entity) level of the traversal.
struct Plan {
    service: String,
    entity: String,
    select_all: bool,
    local_fields: Vec<String>,
    expansions: Vec<Expansion>,
}

struct Expansion {
    edge: JoinEdge,
    plan: Plan,
}

/// The remote query composer.
///
/// Holds read-only references to the populated container and the link
/// registry; composing a query never mutates either.
pub struct RemoteQuery {
    container: Arc<ModuleContainer>,
    links: Arc<LinkRegistry>,
}

impl RemoteQuery {
    pub fn new(container: Arc<ModuleContainer>, links: Arc<LinkRegistry>) -> Self {
        Self { container, links }
    }

    /// Compose a query from any accepted input shape.
    pub async fn query(
        &self,
        input: impl Into<QueryInput>,
    ) -> Result<QueryResult, QueryResolutionError> {
        self.query_with_variables(input, None).await
    }

    /// Compose a query, overriding the input's variables when given.
    pub async fn query_with_variables(
        &self,
        input: impl Into<QueryInput>,
        variables: Option<QueryVariables>,
    ) -> Result<QueryResult, QueryResolutionError> {
        let query = normalize(input.into(), variables)?;

        let (service, entity) = self
            .links
            .resolve_entry_point(&query.entry_point)
            .ok_or_else(|| QueryResolutionError::UnknownEntryPoint(query.entry_point.clone()))?;

        // The whole traversal is planned (and therefore validated) before a
        // single fetch is issued.
        let tree = FieldTree::from_fields(&query.fields);
        let plan = self.plan(&service, &entity, &tree)?;

        let entry = self
            .container
            .resolve_service_name(&service)
            .ok_or_else(|| QueryResolutionError::ModuleUnavailable(service.clone()))?;

        let variables = query.variables;
        let result = entry
            .fetch(FetchRequest {
                entity: entity.clone(),
                fields: fetch_fields(&plan),
                filters: variables.filters.clone(),
                order: variables.order.clone(),
                skip: variables.skip,
                take: variables.take,
            })
            .await?;

        debug!(
            "Query {} matched {} rows ({} returned)",
            query.entry_point,
            result.count,
            result.rows.len()
        );

        let mut rows = result.rows;
        self.expand_rows(&plan, &mut rows).await?;

        Ok(QueryResult {
            rows,
            metadata: QueryMetadata {
                count: result.count,
                skip: variables.skip.unwrap_or(0),
                take: variables.take,
            },
        })
    }

    /// Resolve a field tree into a fetch plan, failing on the first path
    /// that matches neither a declared field nor a join edge.
    fn plan(
        &self,
        service: &str,
        entity: &str,
        tree: &FieldTree,
    ) -> Result<Plan, QueryResolutionError> {
        let meta = self
            .links
            .service(service)
            .ok_or_else(|| QueryResolutionError::ModuleUnavailable(service.to_string()))?;
        let shape = meta.entity(entity).ok_or_else(|| {
            QueryResolutionError::UnresolvableField {
                service: service.to_string(),
                entity: entity.to_string(),
                field: entity.to_string(),
            }
        })?;

        let mut plan = Plan {
            service: service.to_string(),
            entity: entity.to_string(),
            select_all: tree.selects_all(),
            local_fields: Vec::new(),
            expansions: Vec::new(),
        };

        for leaf in &tree.leaves {
            if leaf == "*" {
                continue;
            }
            if shape.has_field(leaf) {
                plan.local_fields.push(leaf.clone());
            } else if let Some(edge) = self.links.edge(service, entity, leaf) {
                // An edge alias selected whole expands with all its fields.
                let subtree = FieldTree {
                    leaves: vec!["*".to_string()],
                    children: Default::default(),
                };
                plan.expansions.push(Expansion {
                    plan: self.plan(&edge.target_service, &edge.target_entity, &subtree)?,
                    edge: edge.clone(),
                });
            } else {
                return Err(QueryResolutionError::UnresolvableField {
                    service: service.to_string(),
                    entity: entity.to_string(),
                    field: leaf.clone(),
                });
            }
        }

        for (alias, subtree) in &tree.children {
            let edge = self.links.edge(service, entity, alias).ok_or_else(|| {
                QueryResolutionError::UnresolvableField {
                    service: service.to_string(),
                    entity: entity.to_string(),
                    field: alias.clone(),
                }
            })?;
            plan.expansions.push(Expansion {
                plan: self.plan(&edge.target_service, &edge.target_entity, subtree)?,
                edge: edge.clone(),
            });
        }

        Ok(plan)
    }

    /// Expand a row set in place: run sibling expansions concurrently, then
    /// stitch results back in plan order.
    fn expand_rows<'a>(
        &'a self,
        plan: &'a Plan,
        rows: &'a mut Vec<Record>,
    ) -> BoxFuture<'a, Result<(), QueryResolutionError>> {
        async move {
            if plan.expansions.is_empty() || rows.is_empty() {
                return Ok(());
            }

            let fetches = plan.expansions.iter().map(|expansion| {
                let keys = collect_keys(rows, &expansion.edge.source_key);
                self.fetch_expansion(expansion, keys)
            });
            let grouped_sets = futures::future::try_join_all(fetches).await?;

            for (expansion, grouped) in plan.expansions.iter().zip(grouped_sets) {
                stitch(rows, &expansion.edge, &grouped);
            }
            Ok(())
        }
        .boxed()
    }

    /// Fetch one expansion's target rows for the collected key values and
    /// group them by join key, recursing into nested expansions.
    async fn fetch_expansion(
        &self,
        expansion: &Expansion,
        keys: Vec<Value>,
    ) -> Result<HashMap<String, Vec<Record>>, QueryResolutionError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let edge = &expansion.edge;
        let target = self
            .container
            .resolve_service_name(&edge.target_service)
            .ok_or_else(|| QueryResolutionError::ModuleUnavailable(edge.target_service.clone()))?;

        let mut filters = Record::new();
        filters.insert(edge.target_key.clone(), Value::Array(keys));

        // The stitch key must survive projection even when not requested.
        let mut fields = fetch_fields(&expansion.plan);
        if !fields.iter().any(|f| f == "*" || f == &edge.target_key) {
            fields.push(edge.target_key.clone());
        }

        let result = target
            .fetch(FetchRequest {
                entity: edge.target_entity.clone(),
                fields,
                filters,
                order: Vec::new(),
                skip: None,
                take: None,
            })
            .await?;

        let mut rows = result.rows;
        self.expand_rows(&expansion.plan, &mut rows).await?;

        let mut grouped: HashMap<String, Vec<Record>> = HashMap::new();
        for row in rows {
            let key = canonical_key(row.get(&edge.target_key).unwrap_or(&Value::Null));
            grouped.entry(key).or_default().push(row);
        }
        Ok(grouped)
    }
}

/// Field list for a plan's fetch: the requested locals plus every join key
/// its expansions stitch by.
fn fetch_fields(plan: &Plan) -> Vec<String> {
    if plan.select_all {
        return vec!["*".to_string()];
    }
    let mut fields = plan.local_fields.clone();
    for expansion in &plan.expansions {
        if !fields.iter().any(|f| f == &expansion.edge.source_key) {
            fields.push(expansion.edge.source_key.clone());
        }
    }
    fields
}

/// Distinct non-null key values from a row set, in first-seen order.
fn collect_keys(rows: &[Record], key: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for row in rows {
        let value = row.get(key).unwrap_or(&Value::Null);
        if value.is_null() {
            continue;
        }
        if seen.insert(canonical_key(value)) {
            keys.push(value.clone());
        }
    }
    keys
}

/// Merge grouped target rows back into the sources under the edge alias.
fn stitch(rows: &mut [Record], edge: &JoinEdge, grouped: &HashMap<String, Vec<Record>>) {
    for row in rows.iter_mut() {
        let key = canonical_key(row.get(&edge.source_key).unwrap_or(&Value::Null));
        let matched = grouped.get(&key).cloned().unwrap_or_default();
        let value = if edge.is_list {
            Value::Array(matched.into_iter().map(Value::Object).collect())
        } else {
            matched
                .into_iter()
                .next()
                .map(Value::Object)
                .unwrap_or(Value::Null)
        };
        row.insert(edge.alias.clone(), value);
    }
}

fn canonical_key(value: &Value) -> String {
    value.to_string()
}
