use serde_json::Value;
use std::cmp::Ordering;

use super::types::{SortDirection, SortKey};

/// Insertion-order column every table carries; breaks ties between equal sort keys
pub const TIEBREAK_COLUMN: &str = "seq";

pub struct FilterOrder;

impl FilterOrder {
    pub fn generate(keys: &[SortKey]) -> String {
        let mut parts: Vec<String> = keys
            .iter()
            .map(|k| format!("\"{}\" {}", k.field.column, k.direction.to_sql()))
            .collect();
        parts.push(format!("\"{}\" ASC", TIEBREAK_COLUMN));
        format!("ORDER BY {}", parts.join(", "))
    }

    /// Compare two documents by `keys`. Nulls sort as the largest value,
    /// matching PostgreSQL's default. Callers use a stable sort so equal
    /// documents keep insertion order.
    pub fn compare(keys: &[SortKey], a: &Value, b: &Value) -> Ordering {
        for key in keys {
            let left = a.get(key.field.name).and_then(|v| key.field.kind.from_json(v));
            let right = b.get(key.field.name).and_then(|v| key.field.kind.from_json(v));
            let ordering = match (left, right) {
                (Some(l), Some(r)) => l.compare(&r).unwrap_or(Ordering::Equal),
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}
