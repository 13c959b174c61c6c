//! Query-string → [`QueryDescriptor`] resolution.
//!
//! # Conventions
//! - `page`, `limit`, `condition`, `includePopulate`, `isExactly` are control
//!   keys and never reach the filter
//! - `sort=-createdAt,name` orders by the listed fields (`-` = descending)
//! - `populate=doctor,patient:name|email` loads relations, optionally
//!   restricted to the fields after `:`
//! - `field=a`, `field=a,b`, `field!=a`, `field>a`, `field>=a`, `field<a`,
//!   `field<=a`, bare `field` and bare `!field` become filter operators
//!
//! Resolution never fails: anything unparsable falls back to a default or
//! is skipped.

use url::form_urlencoded;

use crate::config::PaginationConfig;
use crate::query::descriptor::{Condition, Populate, QueryDescriptor, SortKey};
use crate::query::filter::{coerce_value, Filter, FilterOp};
use crate::query::pagination::Pagination;

const PAGE: &str = "page";
const LIMIT: &str = "limit";
const CONDITION: &str = "condition";
const INCLUDE_POPULATE: &str = "includePopulate";
const IS_EXACTLY: &str = "isExactly";
const SORT: &str = "sort";
const POPULATE: &str = "populate";

/// Keys consumed by the resolver itself.
pub const CONTROL_KEYS: [&str; 5] = [PAGE, LIMIT, CONDITION, INCLUDE_POPULATE, IS_EXACTLY];

/// One `key[=value]` segment. `value` is `None` when no `=` was present.
#[derive(Debug)]
struct RawParam {
    key: String,
    value: Option<String>,
}

/// Stateless resolver; limits come from configuration.
#[derive(Debug, Clone)]
pub struct QueryResolver {
    default_limit: u64,
    max_limit: Option<u64>,
}

impl Default for QueryResolver {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: None,
        }
    }
}

impl QueryResolver {
    pub fn new(config: &PaginationConfig) -> Self {
        Self {
            default_limit: config.default_limit.max(1),
            max_limit: config.max_limit,
        }
    }

    /// Resolve a raw query string (with or without the leading `?`).
    pub fn resolve(&self, query: &str) -> QueryDescriptor {
        let query = query.strip_prefix('?').unwrap_or(query);

        let mut page: Option<String> = None;
        let mut limit: Option<String> = None;
        let mut condition = Condition::And;
        let mut include_populate = false;
        let mut sort: Option<Vec<SortKey>> = None;
        let mut population = Vec::new();
        let mut filter = Filter::new();

        let params: Vec<RawParam> = split_params(query).collect();
        let is_exactly = params
            .iter()
            .rev()
            .find(|param| param.key == IS_EXACTLY)
            .is_some_and(|param| parse_flag(param.value.as_deref()));

        for param in params {
            match param.key.as_str() {
                PAGE => page = param.value,
                LIMIT => limit = param.value,
                CONDITION => condition = Condition::parse(param.value.as_deref().unwrap_or("")),
                INCLUDE_POPULATE => include_populate = parse_flag(param.value.as_deref()),
                IS_EXACTLY => {}
                SORT => sort = param.value.as_deref().and_then(parse_sort),
                POPULATE => {
                    if let Some(raw) = param.value.as_deref() {
                        population.extend(parse_populate(raw));
                    }
                }
                _ => {
                    if let Some((field, op)) = parse_filter(&param, is_exactly) {
                        if !is_reserved(&field) {
                            filter.insert(field, op);
                        }
                    }
                }
            }
        }

        let current_page = parse_positive(page.as_deref()).unwrap_or(1);
        let mut limit = parse_positive(limit.as_deref()).unwrap_or(self.default_limit);
        if let Some(max) = self.max_limit {
            limit = limit.min(max.max(1));
        }

        QueryDescriptor {
            pagination: Pagination::new(current_page, limit),
            filter,
            sort,
            population,
            condition,
            include_populate,
        }
    }
}

fn is_reserved(field: &str) -> bool {
    CONTROL_KEYS.contains(&field) || field == SORT || field == POPULATE
}

fn split_params(query: &str) -> impl Iterator<Item = RawParam> + '_ {
    query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| {
            let has_value = segment.contains('=');
            let (key, value) = form_urlencoded::parse(segment.as_bytes()).next()?;
            let key = key.trim().to_string();
            if key.is_empty() {
                return None;
            }
            Some(RawParam {
                key,
                value: has_value.then(|| value.into_owned()),
            })
        })
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw?.trim().parse::<u64>().ok().filter(|n| *n >= 1)
}

/// A bare key counts as set.
fn parse_flag(raw: Option<&str>) -> bool {
    match raw {
        None => true,
        Some(value) => matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
    }
}

fn parse_sort(raw: &str) -> Option<Vec<SortKey>> {
    let keys: Vec<SortKey> = raw
        .split(',')
        .map(str::trim)
        .filter_map(|entry| {
            if let Some(field) = entry.strip_prefix('-') {
                (!field.is_empty()).then(|| SortKey::desc(field))
            } else {
                let field = entry.strip_prefix('+').unwrap_or(entry);
                (!field.is_empty()).then(|| SortKey::asc(field))
            }
        })
        .collect();
    (!keys.is_empty()).then_some(keys)
}

/// Parse `path` / `path:field|field` entries separated by commas.
pub fn parse_populate(raw: &str) -> Vec<Populate> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.split_once(':') {
            None => Some(Populate::all(entry)),
            Some((path, select)) => {
                let path = path.trim();
                if path.is_empty() {
                    return None;
                }
                let fields: Vec<&str> = select
                    .split(&['|', ' '][..])
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .collect();
                if fields.is_empty() {
                    Some(Populate::all(path))
                } else {
                    Some(Populate::select(path, fields))
                }
            }
        })
        .collect()
}

fn parse_list(raw: &str) -> Vec<serde_json::Value> {
    raw.split(',').map(|item| coerce_value(item.trim())).collect()
}

/// With `is_exactly`, a plain `field=value` becomes a case-insensitive
/// substring match on the raw value; operator keys keep their operator.
fn parse_filter(param: &RawParam, is_exactly: bool) -> Option<(String, FilterOp)> {
    let key = param.key.as_str();

    let Some(value) = param.value.as_deref() else {
        // `age>18`, `age<18`, `!field`, `field`; a fully encoded `age%3E%3D18`
        // arrives here as the bare key `age>=18`
        if let Some(pos) = key.find(&['>', '<'][..]) {
            let (field, rest) = key.split_at(pos);
            let greater = rest.starts_with('>');
            let op = match rest[1..].strip_prefix('=') {
                Some(bound) if greater => FilterOp::Gte(coerce_value(bound.trim())),
                Some(bound) => FilterOp::Lte(coerce_value(bound.trim())),
                None if greater => FilterOp::Gt(coerce_value(rest[1..].trim())),
                None => FilterOp::Lt(coerce_value(rest[1..].trim())),
            };
            return named(field, op);
        }
        if let Some(field) = key.strip_prefix('!') {
            return named(field, FilterOp::Exists(false));
        }
        return named(key, FilterOp::Exists(true));
    };

    if let Some(field) = key.strip_suffix('!') {
        let op = if value.contains(',') {
            FilterOp::NotIn(parse_list(value))
        } else {
            FilterOp::Not(coerce_value(value))
        };
        return named(field, op);
    }
    if let Some(field) = key.strip_suffix('>') {
        return named(field, FilterOp::Gte(coerce_value(value)));
    }
    if let Some(field) = key.strip_suffix('<') {
        return named(field, FilterOp::Lte(coerce_value(value)));
    }

    let op = if is_exactly {
        FilterOp::contains_insensitive(value)
    } else if value.contains(',') {
        FilterOp::In(parse_list(value))
    } else {
        FilterOp::Equals(coerce_value(value))
    };
    named(key, op)
}

fn named(field: &str, op: FilterOp) -> Option<(String, FilterOp)> {
    let field = field.trim();
    if field.is_empty() || field.contains(&['>', '<', '!'][..]) {
        return None;
    }
    Some((field.to_string(), op))
}
