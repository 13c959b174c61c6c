//! Normalized list-query descriptor.

use serde::Serialize;

use crate::query::filter::Filter;
use crate::query::pagination::Pagination;

/// How the query's own filter entries are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Condition {
    #[default]
    And,
    Or,
}

impl Condition {
    /// `Or` only when the value upper-cases to `OR`.
    pub fn parse(raw: &str) -> Self {
        if raw.to_uppercase() == "OR" {
            Condition::Or
        } else {
            Condition::And
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: SortOrder::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: SortOrder::Desc }
    }
}

/// A relation to eagerly load; `select` restricts the loaded fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Populate {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
}

impl Populate {
    pub fn all(path: impl Into<String>) -> Self {
        Self { path: path.into(), select: None }
    }

    pub fn select<I, S>(path: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            select: Some(fields.into_iter().map(Into::into).collect()),
        }
    }
}

/// Result of resolving one list request's query string.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    pub pagination: Pagination,
    pub filter: Filter,
    pub sort: Option<Vec<SortKey>>,
    pub population: Vec<Populate>,
    pub condition: Condition,
    pub include_populate: bool,
}
