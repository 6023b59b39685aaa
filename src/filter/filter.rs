use serde_json::{Map, Value};

use super::filter_order::FilterOrder;
use super::filter_params::FilterParams;
use super::filter_where::FilterWhere;
use super::types::{QuerySpec, SqlResult};
use crate::config::QueryConfig;
use crate::database::models::{FieldDef, Schema};

/// A `QuerySpec` bound to the collection it runs against. Renders the spec
/// as PostgreSQL or evaluates it over documents held in memory.
pub struct Filter<'s> {
    schema: &'static Schema,
    spec: &'s QuerySpec,
}

impl<'s> Filter<'s> {
    pub fn new(schema: &'static Schema, spec: &'s QuerySpec) -> Self {
        Self { schema, spec }
    }

    /// Parse query-string pairs for `schema`
    pub fn parse(schema: &'static Schema, pairs: &[(String, String)], config: &QueryConfig) -> QuerySpec {
        FilterParams::new(schema, config).parse(pairs)
    }

    /// `json_build_object(...)` over `fields`, aliasing columns to their wire names
    pub fn json_object<'f>(fields: impl Iterator<Item = &'f FieldDef>) -> String {
        let pairs: Vec<String> = fields
            .map(|f| format!("'{}', \"{}\"", f.name, f.column))
            .collect();
        format!("json_build_object({})", pairs.join(", "))
    }

    pub fn to_sql(&self) -> SqlResult {
        let select_clause = Self::json_object(self.selected_fields());
        let (where_clause, params) = FilterWhere::generate(&self.spec.predicates, 0);
        let order_clause = FilterOrder::generate(&self.spec.sort);
        let limit_clause = self.build_limit_clause();

        let query = [
            format!("SELECT {} AS doc", select_clause),
            format!("FROM \"{}\"", self.schema.table),
            format!("WHERE {}", where_clause),
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params }
    }

    pub fn to_count_sql(&self) -> SqlResult {
        let (where_clause, params) = FilterWhere::generate(&self.spec.predicates, 0);
        let query = format!(
            "SELECT COUNT(*) AS count FROM \"{}\" WHERE {}",
            self.schema.table, where_clause
        );
        SqlResult { query, params }
    }

    /// Filter, sort, paginate and project `docs`, which must be in insertion order
    pub fn apply(&self, docs: impl IntoIterator<Item = Value>) -> Vec<Value> {
        let mut matched: Vec<Value> = docs
            .into_iter()
            .filter(|doc| FilterWhere::matches(&self.spec.predicates, doc))
            .collect();
        matched.sort_by(|a, b| FilterOrder::compare(&self.spec.sort, a, b));

        let paged: Box<dyn Iterator<Item = Value>> = match self.spec.page {
            Some(page) => Box::new(
                matched
                    .into_iter()
                    .skip(page.skip() as usize)
                    .take(page.size as usize),
            ),
            None => Box::new(matched.into_iter()),
        };
        paged.map(|doc| self.project(doc)).collect()
    }

    pub fn count<'d>(&self, docs: impl IntoIterator<Item = &'d Value>) -> u64 {
        docs.into_iter()
            .filter(|doc| FilterWhere::matches(&self.spec.predicates, doc))
            .count() as u64
    }

    /// Keep only the projected fields of a full document
    pub fn project(&self, doc: Value) -> Value {
        let Value::Object(mut full) = doc else {
            return doc;
        };
        let mut out = Map::new();
        for field in self.selected_fields() {
            if let Some(value) = full.remove(field.name) {
                out.insert(field.name.to_string(), value);
            }
        }
        Value::Object(out)
    }

    fn selected_fields(&self) -> impl Iterator<Item = &'static FieldDef> + '_ {
        self.schema
            .fields
            .iter()
            .filter(move |f| self.spec.projection.includes(f))
    }

    fn build_limit_clause(&self) -> String {
        match self.spec.page {
            Some(page) => format!("LIMIT {} OFFSET {}", page.size, page.skip()),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::tour::TOUR_SCHEMA;
    use serde_json::json;

    fn config() -> QueryConfig {
        QueryConfig { default_limit: 100, max_limit: None, pollution_allow_list: vec![] }
    }

    fn spec(raw: &[(&str, &str)]) -> QuerySpec {
        let pairs: Vec<(String, String)> = raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Filter::parse(&TOUR_SCHEMA, &pairs, &config())
    }

    #[test]
    fn select_sql_with_projection_and_paging() {
        let spec = spec(&[("fields", "name,price"), ("price[lte]", "500"), ("sort", "price"), ("page", "2"), ("limit", "10")]);
        let sql = Filter::new(&TOUR_SCHEMA, &spec).to_sql();
        assert_eq!(
            sql.query,
            "SELECT json_build_object('id', \"id\", 'name', \"name\", 'price', \"price\") AS doc \
             FROM \"tours\" WHERE \"price\" <= $1 ORDER BY \"price\" ASC, \"seq\" ASC LIMIT 10 OFFSET 10"
        );
        assert_eq!(sql.params.len(), 1);
    }

    #[test]
    fn default_select_hides_internal_columns() {
        let spec = spec(&[]);
        let sql = Filter::new(&TOUR_SCHEMA, &spec).to_sql();
        assert!(sql.query.contains("'imageCover', \"image_cover\""));
        assert!(!sql.query.contains("secret_tour"));
        assert!(sql.query.contains("ORDER BY \"created_at\" DESC"));
    }

    #[test]
    fn count_sql_ignores_paging() {
        let spec = spec(&[("duration", "5"), ("page", "3")]);
        let sql = Filter::new(&TOUR_SCHEMA, &spec).to_count_sql();
        assert_eq!(sql.query, "SELECT COUNT(*) AS count FROM \"tours\" WHERE \"duration\" = $1");
    }

    #[test]
    fn in_memory_apply_pages_and_projects() {
        let docs: Vec<Value> = (1..=25)
            .map(|i| json!({"id": i.to_string(), "name": format!("Tour {}", i), "price": i as f64, "secretTour": false}))
            .collect();
        let spec = spec(&[("sort", "price"), ("page", "2"), ("limit", "10"), ("fields", "price")]);
        let filter = Filter::new(&TOUR_SCHEMA, &spec);

        let out = filter.apply(docs.clone());
        assert_eq!(out.len(), 10);
        assert_eq!(out[0], json!({"id": "11", "price": 11.0}));
        assert_eq!(out[9]["price"], json!(20.0));
        assert_eq!(filter.count(&docs), 25);
    }
}
