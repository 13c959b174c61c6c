//! In-process record store backed by `DashMap`.

use std::cmp::Ordering;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::query::filter::sort_order;
use crate::query::{Include, IncludeMap, SortKey, SortOrder, WhereClause};
use crate::store::{Collection, FindManyArgs, StoreError, StoreResult};

pub type Record = Map<String, Value>;

const ID: &str = "id";
const CREATED_AT: &str = "createdAt";
const UPDATED_AT: &str = "updatedAt";
const DELETED_AT: &str = "deletedAt";

/// Timestamp format used for every managed field.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Named collections of JSON records.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<String, Vec<Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given (empty) collections registered.
    pub fn with_collections<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for name in names {
            store.register(name);
        }
        store
    }

    pub fn register(&self, name: impl Into<String>) {
        self.collections.entry(name.into()).or_default();
    }

    /// Handle for a registered collection.
    pub fn collection(&self, name: &str) -> StoreResult<MemoryCollection<'_>> {
        if self.collections.contains_key(name) {
            Ok(MemoryCollection {
                store: self,
                name: name.to_string(),
            })
        } else {
            Err(StoreError::UnknownCollection(name.to_string()))
        }
    }

    /// Load `{ "collection": [records...] }` from a JSON file.
    ///
    /// Unknown collections in the file are registered. Returns the number of
    /// records inserted.
    pub fn load_seed(&self, path: &Path) -> StoreResult<usize> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Seed(format!("{}: {}", path.display(), e)))?;
        let seed: Map<String, Value> =
            serde_json::from_str(&content).map_err(|e| StoreError::Seed(e.to_string()))?;

        let mut inserted = 0;
        for (name, records) in seed {
            let Value::Array(records) = records else {
                return Err(StoreError::Seed(format!("{name} is not an array")));
            };
            self.register(name.clone());
            let collection = self.collection(&name)?;
            for record in records {
                collection.insert(record)?;
                inserted += 1;
            }
        }
        tracing::info!(path = %path.display(), records = inserted, "Seed data loaded");
        Ok(inserted)
    }
}

/// Borrowed handle onto one collection of a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryCollection<'a> {
    store: &'a MemoryStore,
    name: String,
}

impl MemoryCollection<'_> {
    /// Insert a record, assigning `id` and `createdAt` when missing.
    pub fn insert(&self, record: Value) -> StoreResult<Value> {
        let Value::Object(mut record) = record else {
            return Err(StoreError::InvalidRecord("expected a JSON object".into()));
        };
        if !record.contains_key(ID) {
            record.insert(ID.into(), Value::String(Uuid::new_v4().to_string()));
        }
        if !record.contains_key(CREATED_AT) {
            record.insert(CREATED_AT.into(), Value::String(now_timestamp()));
        }

        let mut records = self.records_mut()?;
        records.push(record.clone());
        Ok(Value::Object(record))
    }

    /// Fetch one live record, loading only the included relations.
    pub fn get(&self, id: &str, include: &IncludeMap) -> StoreResult<Value> {
        let records = self
            .store
            .collections
            .get(&self.name)
            .ok_or_else(|| StoreError::UnknownCollection(self.name.clone()))?;
        records
            .iter()
            .find(|r| is_live(r) && has_id(r, id))
            .map(|r| Value::Object(project(r, include)))
            .ok_or_else(|| self.not_found(id))
    }

    /// Shallow-merge `patch` into a live record.
    pub fn update(&self, id: &str, patch: Value) -> StoreResult<Value> {
        let Value::Object(patch) = patch else {
            return Err(StoreError::InvalidRecord("expected a JSON object".into()));
        };
        if patch.contains_key(ID) || patch.contains_key(CREATED_AT) || patch.contains_key(DELETED_AT) {
            return Err(StoreError::InvalidRecord(format!(
                "{ID}, {CREATED_AT} and {DELETED_AT} are managed by the store"
            )));
        }

        let mut records = self.records_mut()?;
        let record = records
            .iter_mut()
            .find(|r| is_live(r) && has_id(r, id))
            .ok_or_else(|| self.not_found(id))?;
        record.extend(patch);
        record.insert(UPDATED_AT.into(), Value::String(now_timestamp()));
        Ok(Value::Object(record.clone()))
    }

    /// Mark a live record deleted. It stays stored but leaves every scoped list.
    pub fn soft_delete(&self, id: &str) -> StoreResult<Value> {
        let mut records = self.records_mut()?;
        let record = records
            .iter_mut()
            .find(|r| is_live(r) && has_id(r, id))
            .ok_or_else(|| self.not_found(id))?;
        record.insert(DELETED_AT.into(), Value::String(now_timestamp()));
        Ok(Value::Object(record.clone()))
    }

    fn records_mut(&self) -> StoreResult<dashmap::mapref::one::RefMut<'_, String, Vec<Record>>> {
        self.store
            .collections
            .get_mut(&self.name)
            .ok_or_else(|| StoreError::UnknownCollection(self.name.clone()))
    }

    fn not_found(&self, id: &str) -> StoreError {
        StoreError::NotFound {
            collection: self.name.clone(),
            id: id.to_string(),
        }
    }
}

impl Collection for MemoryCollection<'_> {
    async fn find_many(&self, args: &FindManyArgs<'_>) -> StoreResult<Vec<Value>> {
        let mut matched: Vec<Record> = {
            let records = self
                .store
                .collections
                .get(&self.name)
                .ok_or_else(|| StoreError::UnknownCollection(self.name.clone()))?;
            records
                .iter()
                .filter(|r| args.where_clause.matches(r))
                .cloned()
                .collect()
        };

        matched.sort_by(|a, b| compare_records(a, b, args.order_by));

        let skip = usize::try_from(args.skip).unwrap_or(usize::MAX);
        let take = usize::try_from(args.take).unwrap_or(usize::MAX);
        Ok(matched
            .iter()
            .skip(skip)
            .take(take)
            .map(|r| Value::Object(project(r, args.include)))
            .collect())
    }

    async fn count(&self, where_clause: &WhereClause) -> StoreResult<u64> {
        let records = self
            .store
            .collections
            .get(&self.name)
            .ok_or_else(|| StoreError::UnknownCollection(self.name.clone()))?;
        Ok(records.iter().filter(|r| where_clause.matches(r)).count() as u64)
    }
}

fn is_live(record: &Record) -> bool {
    record.get(DELETED_AT).map_or(true, Value::is_null)
}

fn has_id(record: &Record, id: &str) -> bool {
    match record.get(ID) {
        Some(Value::String(s)) => s == id,
        Some(Value::Number(n)) => n.to_string() == id,
        _ => false,
    }
}

/// Nulls and missing fields sort first in ascending order; mixed kinds order
/// by kind.
fn compare_records(a: &Record, b: &Record, order_by: &[SortKey]) -> Ordering {
    for key in order_by {
        let left = a.get(&key.field).filter(|v| !v.is_null());
        let right = b.get(&key.field).filter(|v| !v.is_null());
        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(l), Some(r)) => sort_order(l, r),
        };
        let ordering = match key.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn is_relation(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_object),
        _ => false,
    }
}

fn select_fields(value: &Value, fields: &[String]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| fields.iter().any(|f| f == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|i| select_fields(i, fields)).collect()),
        other => other.clone(),
    }
}

fn project(record: &Record, include: &IncludeMap) -> Record {
    record
        .iter()
        .filter_map(|(key, value)| {
            if !is_relation(value) {
                return Some((key.clone(), value.clone()));
            }
            match include.get(key)? {
                Include::All => Some((key.clone(), value.clone())),
                Include::Select(fields) => Some((key.clone(), select_fields(value, fields))),
            }
        })
        .collect()
}
