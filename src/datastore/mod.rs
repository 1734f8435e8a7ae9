//! Datastore abstraction layer
//!
//! Provides a unified interface for record storage that module services are
//! built against. Modules never own a store directly: the container owns the
//! shared instance, and modules declaring isolated resources get their own.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// A stored record: a flat JSON object keyed by field name.
pub type Record = serde_json::Map<String, Value>;

/// Datastore errors
#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Datastore operation failed: {0}")]
    Operation(String),
}

/// Sort direction for ordered selections
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDir {
    Asc,
    Desc,
}

/// A selection against a collection.
///
/// Filters are conjunctive field matches: a scalar value matches records with
/// an equal field value, an array value matches records whose field value is
/// any of the array's elements (IN semantics).
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub filters: Record,
    pub order: Vec<(String, SortDir)>,
    pub skip: u64,
    pub take: Option<u64>,
}

/// Result of a selection: the page of rows plus the pre-pagination match count.
#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub rows: Vec<Record>,
    pub count: usize,
}

/// Datastore abstraction trait
///
/// A datastore is a set of named record collections. Collections are created
/// by module migrations and read/written by module services.
pub trait Datastore: Send + Sync {
    /// Create a collection if it does not exist
    fn create_collection(&self, name: &str) -> Result<(), DatastoreError>;

    /// Open a named collection
    fn collection(&self, name: &str) -> Result<Arc<dyn Collection>, DatastoreError>;

    /// List known collection names
    fn collection_names(&self) -> Vec<String>;
}

/// Record collection trait
pub trait Collection: Send + Sync {
    /// Insert a record
    fn insert(&self, record: Record) -> Result<(), DatastoreError>;

    /// Select records matching the given filters, ordered and paginated
    fn select(&self, selection: &Selection) -> Result<SelectionResult, DatastoreError>;

    /// Remove records matching the filters, returning how many were removed
    fn remove(&self, filters: &Record) -> Result<usize, DatastoreError>;

    /// Update matching records by merging `changes` into them, returning how
    /// many were updated
    fn update(&self, filters: &Record, changes: &Record) -> Result<usize, DatastoreError>;

    /// Number of records in the collection
    fn len(&self) -> usize;

    /// Whether the collection is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether a record matches the conjunctive filter set.
pub fn matches(record: &Record, filters: &Record) -> bool {
    filters.iter().all(|(field, expected)| {
        let actual = record.get(field).unwrap_or(&Value::Null);
        match expected {
            Value::Array(candidates) => candidates.iter().any(|c| c == actual),
            other => other == actual,
        }
    })
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// In-memory datastore
///
/// The default backend. Collections are plain record vectors behind an RwLock;
/// insertion order is preserved so unordered selections are deterministic.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Datastore for MemoryStore {
    fn create_collection(&self, name: &str) -> Result<(), DatastoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| DatastoreError::Operation(e.to_string()))?;
        collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new()));
        Ok(())
    }

    fn collection(&self, name: &str) -> Result<Arc<dyn Collection>, DatastoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| DatastoreError::Operation(e.to_string()))?;
        collections
            .get(name)
            .cloned()
            .map(|c| c as Arc<dyn Collection>)
            .ok_or_else(|| DatastoreError::UnknownCollection(name.to_string()))
    }

    fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

/// In-memory record collection
pub struct MemoryCollection {
    records: RwLock<Vec<Record>>,
}

impl MemoryCollection {
    fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Collection for MemoryCollection {
    fn insert(&self, record: Record) -> Result<(), DatastoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| DatastoreError::Operation(e.to_string()))?;
        records.push(record);
        Ok(())
    }

    fn select(&self, selection: &Selection) -> Result<SelectionResult, DatastoreError> {
        let records = self
            .records
            .read()
            .map_err(|e| DatastoreError::Operation(e.to_string()))?;

        let mut matched: Vec<Record> = records
            .iter()
            .filter(|r| matches(r, &selection.filters))
            .cloned()
            .collect();

        for (field, dir) in selection.order.iter().rev() {
            matched.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                );
                match dir {
                    SortDir::Asc => ord,
                    SortDir::Desc => ord.reverse(),
                }
            });
        }

        let count = matched.len();
        let skip = selection.skip as usize;
        let rows: Vec<Record> = match selection.take {
            Some(take) => matched.into_iter().skip(skip).take(take as usize).collect(),
            None => matched.into_iter().skip(skip).collect(),
        };

        Ok(SelectionResult { rows, count })
    }

    fn remove(&self, filters: &Record) -> Result<usize, DatastoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| DatastoreError::Operation(e.to_string()))?;
        let before = records.len();
        records.retain(|r| !matches(r, filters));
        Ok(before - records.len())
    }

    fn update(&self, filters: &Record, changes: &Record) -> Result<usize, DatastoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| DatastoreError::Operation(e.to_string()))?;
        let mut updated = 0;
        for record in records.iter_mut() {
            if matches(record, filters) {
                for (field, value) in changes {
                    record.insert(field.clone(), value.clone());
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn seeded_store() -> Arc<dyn Datastore> {
        let store = MemoryStore::new();
        store.create_collection("items").unwrap();
        let items = store.collection("items").unwrap();
        for i in 0..5 {
            items
                .insert(record(&[
                    ("id", json!(format!("item_{i}"))),
                    ("rank", json!(i)),
                    ("group", json!(if i % 2 == 0 { "even" } else { "odd" })),
                ]))
                .unwrap();
        }
        Arc::new(store)
    }

    #[test]
    fn select_with_equality_filter() {
        let store = seeded_store();
        let items = store.collection("items").unwrap();

        let result = items
            .select(&Selection {
                filters: record(&[("group", json!("even"))]),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(result.count, 3);
        assert_eq!(result.rows.len(), 3);
    }

    #[test]
    fn select_with_in_filter() {
        let store = seeded_store();
        let items = store.collection("items").unwrap();

        let result = items
            .select(&Selection {
                filters: record(&[("id", json!(["item_1", "item_3", "missing"]))]),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(result.count, 2);
    }

    #[test]
    fn select_paginates_and_reports_full_count() {
        let store = seeded_store();
        let items = store.collection("items").unwrap();

        let result = items
            .select(&Selection {
                skip: 2,
                take: Some(2),
                order: vec![("rank".to_string(), SortDir::Asc)],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(result.count, 5);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0]["id"], json!("item_2"));
    }

    #[test]
    fn select_orders_descending() {
        let store = seeded_store();
        let items = store.collection("items").unwrap();

        let result = items
            .select(&Selection {
                order: vec![("rank".to_string(), SortDir::Desc)],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(result.rows[0]["id"], json!("item_4"));
    }

    #[test]
    fn update_merges_changes() {
        let store = seeded_store();
        let items = store.collection("items").unwrap();

        let updated = items
            .update(
                &record(&[("id", json!("item_0"))]),
                &record(&[("group", json!("updated"))]),
            )
            .unwrap();
        assert_eq!(updated, 1);

        let result = items
            .select(&Selection {
                filters: record(&[("group", json!("updated"))]),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.rows[0]["id"], json!("item_0"));
    }

    #[test]
    fn unknown_collection_is_an_error() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.collection("nope"),
            Err(DatastoreError::UnknownCollection(_))
        ));
    }
}
