//! Payload filters: metadata key -> required value, all must hold.

use serde_json::{Number, Value};

use docqa_core::types::Metadata;
use docqa_core::{Error, Result};

/// Reject filters that are not plain scalars.
pub fn validate(filters: &Metadata) -> Result<()> {
    for (key, value) in filters {
        if key.trim().is_empty() {
            return Err(Error::Validation("filter keys must not be empty".into()));
        }
        match value {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {}
            other => {
                return Err(Error::Validation(format!(
                    "filter '{key}' must be a string, number or bool, got {other}"
                )))
            }
        }
    }
    Ok(())
}

/// Whether `metadata` satisfies every condition in `filters`.
pub fn matches(filters: &Metadata, metadata: &Metadata) -> bool {
    filters
        .iter()
        .all(|(key, want)| metadata.get(key).is_some_and(|have| values_equal(have, want)))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// SQL prefilter for the LanceDB backend.
///
/// `document_id` and `chunk_index` map onto their own columns. Other keys
/// match against the serialized metadata column with LIKE. A number matches
/// every way it may have been serialized (`3`, `3.0`), so the prefilter never
/// drops a row [`matches`] would keep; it may admit extra rows, which the
/// re-check removes.
pub(crate) fn to_predicate(filters: &Metadata) -> Option<String> {
    let clauses: Vec<String> = filters
        .iter()
        .map(|(key, value)| column_clause(key, value).unwrap_or_else(|| metadata_clause(key, value)))
        .collect();
    (!clauses.is_empty()).then(|| clauses.join(" AND "))
}

pub(crate) fn sql_quote(s: &str) -> String {
    s.replace('\'', "''")
}

fn column_clause(key: &str, value: &Value) -> Option<String> {
    match (key, value) {
        ("document_id", Value::String(s)) => Some(format!("document_id = '{}'", sql_quote(s))),
        ("chunk_index", Value::Number(n)) => whole_number(n).map(|i| format!("chunk_index = {i}")),
        _ => None,
    }
}

fn metadata_clause(key: &str, value: &Value) -> String {
    let key = Value::String(key.to_string());
    let literals = match value {
        Value::Number(n) => number_literals(n),
        other => vec![other.to_string()],
    };
    let likes: Vec<String> = literals
        .iter()
        .flat_map(|literal| {
            // Backslashes become single-char wildcards so escaping rules of
            // the LIKE implementation cannot cause a miss.
            let pattern = sql_quote(&format!("{key}:{literal}").replace('\\', "_"));
            [format!("metadata LIKE '%{pattern},%'"), format!("metadata LIKE '%{pattern}}}%'")]
        })
        .collect();
    format!("({})", likes.join(" OR "))
}

fn whole_number(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
            .map(|f| f as i64)
    })
}

/// Every JSON spelling of a value numerically equal to `n`.
fn number_literals(n: &Number) -> Vec<String> {
    let mut literals = vec![n.to_string()];
    if let Some(whole) = whole_number(n) {
        literals.push(whole.to_string());
        literals.push(format!("{whole}.0"));
    }
    if let Some(float) = n.as_f64().and_then(Number::from_f64) {
        literals.push(float.to_string());
    }
    literals.sort();
    literals.dedup();
    literals
}
