use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{FieldDef, FieldKind, Schema};
use crate::filter::{Filter, Scalar};

/// A value bound to a typed column. Nulls carry their column type so
/// Postgres never has to infer it from a text parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(Option<String>),
    Integer(Option<i64>),
    Float(Option<f64>),
    Boolean(Option<bool>),
    Timestamp(Option<DateTime<Utc>>),
    Uuid(Option<Uuid>),
    Json(Value),
}

impl Cell {
    /// Read `field` out of a serialized document
    pub fn from_field(field: &FieldDef, doc: &Value) -> Result<Self, DatabaseError> {
        let value = doc.get(field.name).unwrap_or(&Value::Null);
        if field.kind == FieldKind::Json {
            return Ok(Cell::Json(value.clone()));
        }
        if value.is_null() {
            return Ok(Self::null(field.kind));
        }
        match field.kind.from_json(value) {
            Some(scalar) => Ok(Self::from(scalar)),
            None => Err(DatabaseError::Decode(format!(
                "field {} holds {} which is not a {:?}",
                field.name, value, field.kind
            ))),
        }
    }

    pub fn null(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text => Cell::Text(None),
            FieldKind::Integer => Cell::Integer(None),
            FieldKind::Float => Cell::Float(None),
            FieldKind::Boolean => Cell::Boolean(None),
            FieldKind::Timestamp => Cell::Timestamp(None),
            FieldKind::Uuid => Cell::Uuid(None),
            FieldKind::Json => Cell::Json(Value::Null),
        }
    }
}

impl From<Scalar> for Cell {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Text(v) => Cell::Text(Some(v)),
            Scalar::Integer(v) => Cell::Integer(Some(v)),
            Scalar::Float(v) => Cell::Float(Some(v)),
            Scalar::Boolean(v) => Cell::Boolean(Some(v)),
            Scalar::Timestamp(v) => Cell::Timestamp(Some(v)),
            Scalar::Uuid(v) => Cell::Uuid(Some(v)),
        }
    }
}

pub fn bind_cell<'q>(q: Query<'q, Postgres, PgArguments>, cell: Cell) -> Query<'q, Postgres, PgArguments> {
    match cell {
        Cell::Text(v) => q.bind(v),
        Cell::Integer(v) => q.bind(v),
        Cell::Float(v) => q.bind(v),
        Cell::Boolean(v) => q.bind(v),
        Cell::Timestamp(v) => q.bind(v),
        Cell::Uuid(v) => q.bind(v),
        Cell::Json(v) => q.bind(sqlx::types::Json(v)),
    }
}

pub fn bind_cells<'q>(
    mut q: Query<'q, Postgres, PgArguments>,
    cells: impl IntoIterator<Item = Cell>,
) -> Query<'q, Postgres, PgArguments> {
    for cell in cells {
        q = bind_cell(q, cell);
    }
    q
}

/// Single-row statements for one table. Every statement addresses rows by
/// the schema's `id` field and reads documents back as one JSON column
/// named `doc`.
pub struct QueryBuilder {
    schema: &'static Schema,
}

impl QueryBuilder {
    pub fn new(schema: &'static Schema) -> Self {
        Self { schema }
    }

    /// Every schema column in field order, as bound by `insert` and `update`
    pub fn cells(&self, doc: &Value) -> Result<Vec<Cell>, DatabaseError> {
        self.schema.fields.iter().map(|f| Cell::from_field(f, doc)).collect()
    }

    /// Full document including internal fields
    pub fn select_by_id(&self) -> String {
        format!(
            "SELECT {} AS doc FROM \"{}\" WHERE \"{}\" = $1",
            Filter::json_object(self.schema.fields.iter()),
            self.schema.table,
            self.schema.id_field().column
        )
    }

    /// INSERT of every schema column followed by `extra` columns
    pub fn insert(&self, extra: &[&str]) -> String {
        let columns: Vec<String> = self
            .schema
            .fields
            .iter()
            .map(|f| f.column)
            .chain(extra.iter().copied())
            .map(|c| format!("\"{}\"", c))
            .collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
        format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            self.schema.table,
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    /// UPDATE of every non-id column; binds in the same order as `cells`
    pub fn update(&self) -> String {
        let assignments: Vec<String> = self
            .schema
            .fields
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, f)| format!("\"{}\" = ${}", f.column, i + 1))
            .collect();
        format!(
            "UPDATE \"{}\" SET {} WHERE \"{}\" = $1",
            self.schema.table,
            assignments.join(", "),
            self.schema.id_field().column
        )
    }

    /// UPDATE of arbitrary `columns` for one row; the id binds last
    pub fn update_columns(&self, columns: &[&str]) -> String {
        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("\"{}\" = ${}", c, i + 1))
            .collect();
        format!(
            "UPDATE \"{}\" SET {} WHERE \"{}\" = ${}",
            self.schema.table,
            assignments.join(", "),
            self.schema.id_field().column,
            columns.len() + 1
        )
    }

    /// DELETE of every row whose `field` equals $1
    pub fn delete_where(&self, field: &str) -> Result<String, DatabaseError> {
        let field = self
            .schema
            .field(field)
            .ok_or_else(|| DatabaseError::Decode(format!("{} has no field {}", self.schema.table, field)))?;
        Ok(format!("DELETE FROM \"{}\" WHERE \"{}\" = $1", self.schema.table, field.column))
    }

    pub fn delete_by_id(&self) -> String {
        format!(
            "DELETE FROM \"{}\" WHERE \"{}\" = $1",
            self.schema.table,
            self.schema.id_field().column
        )
    }
}
