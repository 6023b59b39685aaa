use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::filter::Scalar;

/// Storage type of a resource field. Drives query-string coercion, parameter
/// binding and in-memory comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Uuid,
    Json,
}

impl FieldKind {
    /// Coerce a raw query-string value. `None` means the value does not fit.
    pub fn parse_param(&self, raw: &str) -> Option<Scalar> {
        match self {
            FieldKind::Text => Some(Scalar::Text(raw.to_string())),
            FieldKind::Integer => raw.trim().parse().ok().map(Scalar::Integer),
            FieldKind::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Scalar::Float),
            FieldKind::Boolean => match raw.trim() {
                "true" => Some(Scalar::Boolean(true)),
                "false" => Some(Scalar::Boolean(false)),
                _ => None,
            },
            FieldKind::Timestamp => parse_timestamp(raw.trim()).map(Scalar::Timestamp),
            FieldKind::Uuid => Uuid::parse_str(raw.trim()).ok().map(Scalar::Uuid),
            FieldKind::Json => None,
        }
    }

    /// Read a stored JSON value as a comparable scalar
    pub fn from_json(&self, value: &Value) -> Option<Scalar> {
        match (self, value) {
            (FieldKind::Text, Value::String(s)) => Some(Scalar::Text(s.clone())),
            (FieldKind::Integer, Value::Number(n)) => n.as_i64().map(Scalar::Integer),
            (FieldKind::Float, Value::Number(n)) => n.as_f64().map(Scalar::Float),
            (FieldKind::Boolean, Value::Bool(b)) => Some(Scalar::Boolean(*b)),
            (FieldKind::Timestamp, Value::String(s)) => parse_timestamp(s).map(Scalar::Timestamp),
            (FieldKind::Uuid, Value::String(s)) => Uuid::parse_str(s).ok().map(Scalar::Uuid),
            _ => None,
        }
    }

    /// Whether range comparators (`gt`, `gte`, `lt`, `lte`) make sense
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            FieldKind::Text | FieldKind::Integer | FieldKind::Float | FieldKind::Timestamp
        )
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[derive(Debug, PartialEq)]
pub struct FieldDef {
    /// Name on the wire (camelCase)
    pub name: &'static str,
    /// Column in the table
    pub column: &'static str,
    pub kind: FieldKind,
    /// Bookkeeping field: stored and sortable, never returned to clients
    pub internal: bool,
    /// May appear as a filter key in a query string
    pub filterable: bool,
}

impl FieldDef {
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self { name, column, kind, internal: false, filterable: true }
    }

    pub const fn internal(mut self) -> Self {
        self.internal = true;
        self.filterable = false;
        self
    }

    pub const fn unfilterable(mut self) -> Self {
        self.filterable = false;
        self
    }
}

#[derive(Debug)]
pub struct UniqueConstraint {
    /// Constraint name as created by the migration
    pub name: &'static str,
    pub fields: &'static [&'static str],
}

/// Static description of a resource collection
#[derive(Debug)]
pub struct Schema {
    pub table: &'static str,
    pub singular: &'static str,
    pub plural: &'static str,
    /// First entry is always the `id` field
    pub fields: &'static [FieldDef],
    pub unique: &'static [UniqueConstraint],
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn id_field(&self) -> &'static FieldDef {
        &self.fields[0]
    }

    pub fn visible_fields(&self) -> impl Iterator<Item = &'static FieldDef> {
        self.fields.iter().filter(|f| !f.internal)
    }

    /// Remove internal fields from a full document
    pub fn strip_internal(&self, doc: Value) -> Value {
        match doc {
            Value::Object(map) => {
                let visible: Map<String, Value> = map
                    .into_iter()
                    .filter(|(k, _)| self.field(k).map(|f| !f.internal).unwrap_or(true))
                    .collect();
                Value::Object(visible)
            }
            other => other,
        }
    }

    /// Find the unique constraint by name, for reporting duplicate values
    pub fn constraint(&self, name: &str) -> Option<&'static UniqueConstraint> {
        self.unique.iter().find(|c| c.name == name)
    }
}
