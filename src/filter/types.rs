use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::database::models::FieldDef;

/// A typed value coerced from a query string or read from a stored document
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl Scalar {
    /// Ordering between two scalars of compatible kinds. Integers and floats
    /// compare numerically; anything else across kinds is unordered.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            (Scalar::Integer(a), Scalar::Integer(b)) => Some(a.cmp(b)),
            (Scalar::Integer(a), Scalar::Float(b)) => (*a as f64).partial_cmp(b),
            (Scalar::Float(a), Scalar::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Scalar::Float(a), Scalar::Float(b)) => a.partial_cmp(b),
            (Scalar::Boolean(a), Scalar::Boolean(b)) => Some(a.cmp(b)),
            (Scalar::Timestamp(a), Scalar::Timestamp(b)) => Some(a.cmp(b)),
            (Scalar::Uuid(a), Scalar::Uuid(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl Comparator {
    /// Operator named inside brackets: `price[gte]=500`
    pub fn from_bracket(op: &str) -> Option<Self> {
        match op {
            "gte" => Some(Comparator::Gte),
            "gt" => Some(Comparator::Gt),
            "lte" => Some(Comparator::Lte),
            "lt" => Some(Comparator::Lt),
            _ => None,
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
            Comparator::In => "IN",
        }
    }

    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Comparator::Eq | Comparator::In => ordering == Ordering::Equal,
            Comparator::Gt => ordering == Ordering::Greater,
            Comparator::Gte => ordering != Ordering::Less,
            Comparator::Lt => ordering == Ordering::Less,
            Comparator::Lte => ordering != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: &'static FieldDef,
    pub comparator: Comparator,
    /// One value, except for `In`
    pub values: Vec<Scalar>,
}

impl Predicate {
    pub fn eq(field: &'static FieldDef, value: Scalar) -> Self {
        Self { field, comparator: Comparator::Eq, values: vec![value] }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: &'static FieldDef,
    pub direction: SortDirection,
}

/// Which fields a list response carries
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Include(Vec<&'static FieldDef>),
    Exclude(Vec<&'static FieldDef>),
}

impl Projection {
    pub fn includes(&self, field: &FieldDef) -> bool {
        if field.internal {
            return false;
        }
        if field.name == "id" {
            return true;
        }
        match self {
            Projection::All => true,
            Projection::Include(fields) => fields.iter().any(|f| f.name == field.name),
            Projection::Exclude(fields) => !fields.iter().any(|f| f.name == field.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-based
    pub number: u32,
    pub size: u32,
    /// The request named a page explicitly
    pub explicit: bool,
}

impl Page {
    pub fn skip(&self) -> u64 {
        u64::from(self.number.saturating_sub(1)) * u64::from(self.size)
    }

    /// An explicitly requested page beyond the first that starts past the
    /// last matching document
    pub fn is_past_end(&self, total: u64) -> bool {
        self.explicit && self.number > 1 && self.skip() >= total
    }
}

/// Normalized, validated description of a list query
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub predicates: Vec<Predicate>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub page: Option<Page>,
}

impl QuerySpec {
    /// Unpaged, unsorted query matching everything
    pub fn all() -> Self {
        Self {
            predicates: vec![],
            sort: vec![],
            projection: Projection::All,
            page: None,
        }
    }

    /// Restrict the query further (parent scope, server-side filters)
    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Scalar>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_scalars_compare_across_kinds() {
        assert_eq!(Scalar::Integer(5).compare(&Scalar::Float(4.5)), Some(Ordering::Greater));
        assert_eq!(Scalar::Float(5.0).compare(&Scalar::Integer(5)), Some(Ordering::Equal));
        assert_eq!(Scalar::Text("5".into()).compare(&Scalar::Integer(5)), None);
    }

    #[test]
    fn page_past_end_needs_explicit_page() {
        let page = Page { number: 3, size: 10, explicit: true };
        assert_eq!(page.skip(), 20);
        assert!(page.is_past_end(20));
        assert!(!page.is_past_end(21));

        let implicit = Page { number: 1, size: 10, explicit: false };
        assert!(!implicit.is_past_end(0));
        let first = Page { number: 1, size: 10, explicit: true };
        assert!(!first.is_past_end(0));
    }
}
