//! Query input normalization
//!
//! The composer accepts three input shapes (a dotted-path text form, the
//! structured `RemoteJoinerQuery`, and a plain JSON object) and normalizes
//! all of them to the same structure before composition.
//!
//! Text form: `entry_point:field,field,nested.path`. The entry point alone
//! (`variant`) selects all local fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::datastore::{Record, SortDir};
use crate::query::QueryResolutionError;

/// Variables applied to the entry point's primary fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryVariables {
    #[serde(default)]
    pub filters: Record,
    /// Ordering as (field, direction) pairs
    #[serde(default, deserialize_with = "deserialize_order")]
    pub order: Vec<(String, SortDir)>,
    #[serde(default)]
    pub skip: Option<u64>,
    #[serde(default)]
    pub take: Option<u64>,
}

/// Normalized cross-module query. Constructed per request, consumed once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteJoinerQuery {
    pub entry_point: String,
    #[serde(default = "all_fields")]
    pub fields: Vec<String>,
    #[serde(default)]
    pub variables: QueryVariables,
}

fn all_fields() -> Vec<String> {
    vec!["*".to_string()]
}

/// Accepted query input shapes.
#[derive(Debug, Clone)]
pub enum QueryInput {
    /// `entry_point:field,field,...`
    Text(String),
    /// Already-structured query
    Structured(RemoteJoinerQuery),
    /// JSON object with `entry_point` / `fields` / `variables` keys
    Object(Value),
}

impl From<&str> for QueryInput {
    fn from(s: &str) -> Self {
        QueryInput::Text(s.to_string())
    }
}

impl From<RemoteJoinerQuery> for QueryInput {
    fn from(q: RemoteJoinerQuery) -> Self {
        QueryInput::Structured(q)
    }
}

impl From<Value> for QueryInput {
    fn from(v: Value) -> Self {
        QueryInput::Object(v)
    }
}

/// Normalize any accepted input into a `RemoteJoinerQuery`.
///
/// `variables` passed alongside the input (the HTTP route shape) replace the
/// input's own variables when given.
pub fn normalize(
    input: QueryInput,
    variables: Option<QueryVariables>,
) -> Result<RemoteJoinerQuery, QueryResolutionError> {
    let mut query = match input {
        QueryInput::Structured(query) => query,
        QueryInput::Text(text) => parse_text(&text)?,
        QueryInput::Object(value) => serde_json::from_value(value)
            .map_err(|e| QueryResolutionError::InvalidInput(e.to_string()))?,
    };
    if let Some(variables) = variables {
        query.variables = variables;
    }
    if query.entry_point.is_empty() {
        return Err(QueryResolutionError::InvalidInput(
            "entry point must not be empty".to_string(),
        ));
    }
    if query.fields.is_empty() {
        query.fields = all_fields();
    }
    Ok(query)
}

fn parse_text(text: &str) -> Result<RemoteJoinerQuery, QueryResolutionError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(QueryResolutionError::InvalidInput(
            "query text must not be empty".to_string(),
        ));
    }

    let (entry_point, fields) = match text.split_once(':') {
        Some((entry, rest)) => {
            let fields: Vec<String> = rest
                .split(',')
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect();
            (entry.trim().to_string(), fields)
        }
        None => (text.to_string(), all_fields()),
    };

    Ok(RemoteJoinerQuery {
        entry_point,
        fields: if fields.is_empty() { all_fields() } else { fields },
        variables: QueryVariables::default(),
    })
}

/// Field selection tree: leaves are field names on the current entity (or
/// edge aliases selected whole), children are nested selections under an
/// edge alias. `BTreeMap` keeps sibling expansion order deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTree {
    pub leaves: Vec<String>,
    pub children: BTreeMap<String, FieldTree>,
}

impl FieldTree {
    /// Build the tree from dotted field paths.
    pub fn from_fields(fields: &[String]) -> Self {
        let mut tree = FieldTree::default();
        for field in fields {
            tree.insert_path(field);
        }
        tree
    }

    fn insert_path(&mut self, path: &str) {
        match path.split_once('.') {
            None => {
                if !self.leaves.iter().any(|l| l == path) {
                    self.leaves.push(path.to_string());
                }
            }
            Some((head, rest)) => {
                self.children
                    .entry(head.to_string())
                    .or_default()
                    .insert_path(rest);
            }
        }
    }

    /// Whether the selection includes every local field.
    pub fn selects_all(&self) -> bool {
        self.leaves.iter().any(|l| l == "*")
    }
}

/// Order accepts either an array of `[field, direction]` pairs or an object
/// mapping field → direction.
fn deserialize_order<'de, D>(deserializer: D) -> Result<Vec<(String, SortDir)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => {
            serde_json::from_value::<Vec<(String, SortDir)>>(value).map_err(D::Error::custom)
        }
        Value::Object(map) => map
            .into_iter()
            .map(|(field, dir)| {
                serde_json::from_value::<SortDir>(dir)
                    .map(|d| (field, d))
                    .map_err(D::Error::custom)
            })
            .collect(),
        other => Err(D::Error::custom(format!(
            "invalid order specification: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_text_with_fields() {
        let query = normalize(QueryInput::from("variant:id,title,inventory_items.sku"), None)
            .unwrap();
        assert_eq!(query.entry_point, "variant");
        assert_eq!(query.fields.len(), 3);
    }

    #[test]
    fn parses_bare_entry_point_as_select_all() {
        let query = normalize(QueryInput::from("variant"), None).unwrap();
        assert_eq!(query.fields, vec!["*".to_string()]);
    }

    #[test]
    fn rejects_empty_text() {
        assert!(matches!(
            normalize(QueryInput::from("  "), None),
            Err(QueryResolutionError::InvalidInput(_))
        ));
    }

    #[test]
    fn normalizes_object_form() {
        let query = normalize(
            QueryInput::Object(json!({
                "entry_point": "variant",
                "fields": ["id", "sku"],
                "variables": {
                    "filters": {"product_id": "prod_1"},
                    "order": {"id": "ASC"},
                    "skip": 5,
                    "take": 10
                }
            })),
            None,
        )
        .unwrap();

        assert_eq!(query.entry_point, "variant");
        assert_eq!(query.variables.skip, Some(5));
        assert_eq!(query.variables.take, Some(10));
        assert_eq!(
            query.variables.order,
            vec![("id".to_string(), SortDir::Asc)]
        );
    }

    #[test]
    fn object_order_accepts_pair_array() {
        let query = normalize(
            QueryInput::Object(json!({
                "entry_point": "variant",
                "variables": { "order": [["sku", "DESC"]] }
            })),
            None,
        )
        .unwrap();
        assert_eq!(
            query.variables.order,
            vec![("sku".to_string(), SortDir::Desc)]
        );
    }

    #[test]
    fn explicit_variables_replace_input_variables() {
        let query = normalize(
            QueryInput::Object(json!({
                "entry_point": "variant",
                "variables": { "take": 3 }
            })),
            Some(QueryVariables {
                take: Some(7),
                ..Default::default()
            }),
        )
        .unwrap();
        assert_eq!(query.variables.take, Some(7));
    }

    #[test]
    fn field_tree_groups_nested_paths() {
        let tree = FieldTree::from_fields(&[
            "id".to_string(),
            "inventory_items.inventory.sku".to_string(),
            "inventory_items.required_quantity".to_string(),
        ]);

        assert_eq!(tree.leaves, vec!["id".to_string()]);
        let items = tree.children.get("inventory_items").unwrap();
        assert_eq!(items.leaves, vec!["required_quantity".to_string()]);
        assert!(items.children.contains_key("inventory"));
    }

    #[test]
    fn field_tree_deduplicates_leaves() {
        let tree = FieldTree::from_fields(&["id".to_string(), "id".to_string()]);
        assert_eq!(tree.leaves.len(), 1);
    }
}
