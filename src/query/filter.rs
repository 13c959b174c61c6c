//! Filter operators, value coercion and record matching.
//!
//! Operators serialize to the shape the ORM `where` input expects:
//! plain values for equality, `{ "gt": .. }` style objects for comparisons
//! and `{ "contains": .., "mode": "insensitive" }` for substring matches.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Number, Value};

/// Field name → operator. Ordered so serialized output is stable.
pub type Filter = BTreeMap<String, FilterOp>;

/// A single field condition.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Equals(Value),
    Not(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    /// `true`: field is present and not null.
    Exists(bool),
    /// Case-insensitive substring match.
    ContainsInsensitive(String),
}

impl FilterOp {
    pub fn contains_insensitive(value: impl Into<String>) -> Self {
        FilterOp::ContainsInsensitive(value.into())
    }

    /// Evaluate against a record field. `None` means the field is absent.
    pub fn matches(&self, field: Option<&Value>) -> bool {
        let present = field.filter(|v| !v.is_null());
        match self {
            FilterOp::Equals(Value::Null) => present.is_none(),
            FilterOp::Equals(expected) => present.is_some_and(|v| values_equal(v, expected)),
            FilterOp::Not(Value::Null) => present.is_some(),
            FilterOp::Not(expected) => !present.is_some_and(|v| values_equal(v, expected)),
            FilterOp::In(options) => {
                present.is_some_and(|v| options.iter().any(|o| values_equal(v, o)))
            }
            FilterOp::NotIn(options) => {
                !present.is_some_and(|v| options.iter().any(|o| values_equal(v, o)))
            }
            FilterOp::Gt(bound) => compare(present, bound) == Some(Ordering::Greater),
            FilterOp::Gte(bound) => matches!(
                compare(present, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt(bound) => compare(present, bound) == Some(Ordering::Less),
            FilterOp::Lte(bound) => matches!(
                compare(present, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::Exists(expected) => present.is_some() == *expected,
            FilterOp::ContainsInsensitive(value) => match present {
                Some(Value::Object(_)) | Some(Value::Array(_)) | None => false,
                Some(field) => value_text(field)
                    .to_lowercase()
                    .contains(&value.to_lowercase()),
            },
        }
    }
}

impl Serialize for FilterOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FilterOp::Equals(v) => v.serialize(serializer),
            FilterOp::Not(v) => single_entry(serializer, "not", v),
            FilterOp::In(vs) => single_entry(serializer, "in", vs),
            FilterOp::NotIn(vs) => single_entry(serializer, "notIn", vs),
            FilterOp::Gt(v) => single_entry(serializer, "gt", v),
            FilterOp::Gte(v) => single_entry(serializer, "gte", v),
            FilterOp::Lt(v) => single_entry(serializer, "lt", v),
            FilterOp::Lte(v) => single_entry(serializer, "lte", v),
            FilterOp::Exists(true) => single_entry(serializer, "not", &Value::Null),
            FilterOp::Exists(false) => serializer.serialize_unit(),
            FilterOp::ContainsInsensitive(value) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("contains", value)?;
                map.serialize_entry("mode", "insensitive")?;
                map.end()
            }
        }
    }
}

fn single_entry<S, T>(serializer: S, key: &str, value: &T) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize + ?Sized,
{
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(key, value)?;
    map.end()
}

/// Coerce a raw query-string value into a JSON scalar.
///
/// Numbers with a leading zero (phone numbers, zero-padded codes) stay strings.
pub fn coerce_value(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let zero_padded = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    if raw.is_empty() || zero_padded {
        return Value::String(raw.to_string());
    }

    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    if raw.bytes().all(|b| b.is_ascii_digit() || b == b'.' || b == b'-') {
        if let Some(number) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(number);
        }
    }
    Value::String(raw.to_string())
}

/// Textual form used for substring matching.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between two JSON scalars of the same kind.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order over JSON values for sorting: values of different kinds order
/// by kind (null, bool, number, string, array, object), arrays and objects
/// compare equal within their kind.
pub fn sort_order(a: &Value, b: &Value) -> Ordering {
    kind_rank(a).cmp(&kind_rank(b)).then_with(|| match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_f64(x).total_cmp(&number_f64(y)),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    })
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn number_f64(n: &Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

fn compare(field: Option<&Value>, bound: &Value) -> Option<Ordering> {
    compare_values(field?, bound)
}
