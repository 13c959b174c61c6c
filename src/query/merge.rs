//! Merging a resolved descriptor with the caller's forced scope.
//!
//! # Precedence
//! - Scope filter entries win; a query entry on the same field is dropped
//! - The scope is always ANDed, outside any `OR` over the query's entries
//! - Population: query entries first, caller defaults after; a later entry
//!   for the same path replaces an earlier one
//! - Ordering: explicit sort keys, then `createdAt desc` as a tie-breaker

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::query::descriptor::{Condition, Populate, QueryDescriptor, SortKey};
use crate::query::filter::{Filter, FilterOp};
use crate::query::pagination::Pagination;

/// Field appended to every ordering so equal sort keys page deterministically.
pub const FALLBACK_SORT_FIELD: &str = "createdAt";

/// Filters and default relations imposed by the endpoint, not the client.
#[derive(Debug, Clone, Default)]
pub struct ForcedScope {
    filter: Filter,
    default_population: Vec<Populate>,
}

impl ForcedScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, field: impl Into<String>, op: FilterOp) -> Self {
        self.filter.insert(field.into(), op);
        self
    }

    /// Relation loaded when the client asks for `includePopulate`.
    pub fn with_default_populate(mut self, populate: Populate) -> Self {
        self.default_population.push(populate);
        self
    }
}

/// What to load for one relation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Include {
    All,
    Select(Vec<String>),
}

impl Serialize for Include {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Include::All => serializer.serialize_bool(true),
            Include::Select(fields) => {
                let select: BTreeMap<&str, bool> =
                    fields.iter().map(|f| (f.as_str(), true)).collect();
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("select", &select)?;
                map.end()
            }
        }
    }
}

pub type IncludeMap = BTreeMap<String, Include>;

/// Combined `where` input: scope entries ANDed with the query's entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    pub scope: Filter,
    pub filter: Filter,
    pub condition: Condition,
}

impl WhereClause {
    /// Evaluate against one record.
    pub fn matches(&self, record: &Map<String, Value>) -> bool {
        let scoped = self
            .scope
            .iter()
            .all(|(field, op)| op.matches(record.get(field)));
        if !scoped {
            return false;
        }
        if self.filter.is_empty() {
            return true;
        }
        let mut entries = self.filter.iter();
        match self.condition {
            Condition::And => entries.all(|(field, op)| op.matches(record.get(field))),
            Condition::Or => entries.any(|(field, op)| op.matches(record.get(field))),
        }
    }
}

impl Serialize for WhereClause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (field, op) in &self.scope {
            map.serialize_entry(field, op)?;
        }
        match self.condition {
            Condition::Or if !self.filter.is_empty() => {
                let branches: Vec<BTreeMap<&String, &FilterOp>> = self
                    .filter
                    .iter()
                    .map(|(field, op)| BTreeMap::from([(field, op)]))
                    .collect();
                map.serialize_entry("OR", &branches)?;
            }
            _ => {
                for (field, op) in &self.filter {
                    map.serialize_entry(field, op)?;
                }
            }
        }
        map.end()
    }
}

/// Fully merged request handed to [`crate::store::list`].
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub where_clause: WhereClause,
    pub order_by: Vec<SortKey>,
    pub pagination: Pagination,
    pub include: IncludeMap,
}

/// Merge a client descriptor with the endpoint's forced scope.
pub fn merge(descriptor: QueryDescriptor, scope: ForcedScope) -> ListRequest {
    let QueryDescriptor {
        pagination,
        mut filter,
        sort,
        population,
        condition,
        include_populate,
    } = descriptor;

    filter.retain(|field, _| !scope.filter.contains_key(field));

    let defaults = if include_populate {
        scope.default_population
    } else {
        Vec::new()
    };
    let include = population
        .into_iter()
        .chain(defaults)
        .fold(IncludeMap::new(), |mut acc, populate| {
            let include = match populate.select {
                Some(fields) if !fields.is_empty() => Include::Select(fields),
                _ => Include::All,
            };
            acc.insert(populate.path, include);
            acc
        });

    ListRequest {
        where_clause: WhereClause {
            scope: scope.filter,
            filter,
            condition,
        },
        order_by: order_by(sort),
        pagination,
        include,
    }
}

fn order_by(sort: Option<Vec<SortKey>>) -> Vec<SortKey> {
    let mut keys = sort.unwrap_or_default();
    if !keys.iter().any(|k| k.field == FALLBACK_SORT_FIELD) {
        keys.push(SortKey::desc(FALLBACK_SORT_FIELD));
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::resolver::QueryResolver;
    use serde_json::json;

    fn resolve(query: &str) -> QueryDescriptor {
        QueryResolver::default().resolve(query)
    }

    #[test]
    fn test_scope_wins_over_query() {
        let scope = ForcedScope::new()
            .with_filter("patientId", FilterOp::Equals(json!("p-1")))
            .with_filter("deletedAt", FilterOp::Exists(false));
        let request = merge(resolve("patientId=p-2&status=TAKEN"), scope);

        assert!(!request.where_clause.filter.contains_key("patientId"));
        assert_eq!(
            serde_json::to_value(&request.where_clause).unwrap(),
            json!({ "deletedAt": null, "patientId": "p-1", "status": "TAKEN" })
        );
    }

    #[test]
    fn test_or_stays_inside_scope() {
        let scope = ForcedScope::new().with_filter("doctorId", FilterOp::Equals(json!("d-1")));
        let request = merge(resolve("condition=or&status=MISSED&note=late"), scope);

        assert_eq!(
            serde_json::to_value(&request.where_clause).unwrap(),
            json!({ "doctorId": "d-1", "OR": [ { "note": "late" }, { "status": "MISSED" } ] })
        );

        let other_doctor = json!({ "doctorId": "d-2", "status": "MISSED" });
        assert!(!request.where_clause.matches(other_doctor.as_object().unwrap()));
        let own = json!({ "doctorId": "d-1", "status": "TAKEN", "note": "late" });
        assert!(request.where_clause.matches(own.as_object().unwrap()));
    }

    #[test]
    fn test_fallback_order() {
        let request = merge(resolve("sort=name,-dose"), ForcedScope::new());
        assert_eq!(
            request.order_by,
            vec![SortKey::asc("name"), SortKey::desc("dose"), SortKey::desc("createdAt")]
        );

        let request = merge(resolve(""), ForcedScope::new());
        assert_eq!(request.order_by, vec![SortKey::desc("createdAt")]);

        let request = merge(resolve("sort=createdAt"), ForcedScope::new());
        assert_eq!(request.order_by, vec![SortKey::asc("createdAt")]);
    }

    #[test]
    fn test_population_reduced_by_path() {
        let scope = ForcedScope::new()
            .with_default_populate(Populate::select("doctor", ["name"]))
            .with_default_populate(Populate::all("medication"));

        let request = merge(resolve("populate=doctor,patient:email"), scope.clone());
        assert_eq!(request.include.len(), 2);
        assert_eq!(request.include["doctor"], Include::All);

        let request = merge(resolve("populate=doctor,patient:email&includePopulate=true"), scope);
        assert_eq!(request.include["doctor"], Include::Select(vec!["name".into()]));
        assert_eq!(request.include["patient"], Include::Select(vec!["email".into()]));
        assert_eq!(request.include["medication"], Include::All);
        assert_eq!(
            serde_json::to_value(&request.include).unwrap(),
            json!({
                "doctor": { "select": { "name": true } },
                "medication": true,
                "patient": { "select": { "email": true } }
            })
        );
    }
}
