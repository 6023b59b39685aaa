use serde_json::Value;

use super::types::{Comparator, Predicate, Scalar};

/// WHERE clause generation and the matching in-memory evaluation
pub struct FilterWhere {
    param_values: Vec<Scalar>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Conditions joined with AND; `1=1` when there are none. Placeholders
    /// start after `starting_param_index`.
    pub fn generate(predicates: &[Predicate], starting_param_index: usize) -> (String, Vec<Scalar>) {
        let mut filter_where = Self::new(starting_param_index);
        let conditions: Vec<String> = predicates
            .iter()
            .map(|p| filter_where.build_sql_condition(p))
            .collect();
        let where_clause = if conditions.is_empty() { "1=1".to_string() } else { conditions.join(" AND ") };
        (where_clause, filter_where.param_values)
    }

    fn build_sql_condition(&mut self, predicate: &Predicate) -> String {
        let quoted_column = format!("\"{}\"", predicate.field.column);
        match predicate.comparator {
            Comparator::In => {
                if predicate.values.is_empty() {
                    return "1=0".to_string();
                }
                let params: Vec<String> = predicate.values.iter().map(|v| self.param(v.clone())).collect();
                format!("{} IN ({})", quoted_column, params.join(", "))
            }
            comparator => match predicate.values.first() {
                Some(value) => format!("{} {} {}", quoted_column, comparator.to_sql(), self.param(value.clone())),
                None => "1=0".to_string(),
            },
        }
    }

    fn param(&mut self, value: Scalar) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }

    /// True when `doc` satisfies every predicate. A missing or null field
    /// never matches, as with SQL NULL.
    pub fn matches(predicates: &[Predicate], doc: &Value) -> bool {
        predicates.iter().all(|p| Self::matches_one(p, doc))
    }

    fn matches_one(predicate: &Predicate, doc: &Value) -> bool {
        let Some(actual) = doc.get(predicate.field.name).and_then(|v| predicate.field.kind.from_json(v)) else {
            return false;
        };
        match predicate.comparator {
            Comparator::In => predicate
                .values
                .iter()
                .any(|v| actual.compare(v).map(|o| o.is_eq()).unwrap_or(false)),
            comparator => predicate
                .values
                .first()
                .and_then(|v| actual.compare(v))
                .map(|o| comparator.holds(o))
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::tour::TOUR_SCHEMA;
    use serde_json::json;

    fn predicate(name: &str, comparator: Comparator, values: Vec<Scalar>) -> Predicate {
        Predicate { field: TOUR_SCHEMA.field(name).unwrap(), comparator, values }
    }

    #[test]
    fn generates_numbered_placeholders() {
        let predicates = vec![
            predicate("price", Comparator::Gte, vec![Scalar::Float(500.0)]),
            predicate("difficulty", Comparator::In, vec![Scalar::Text("easy".into()), Scalar::Text("medium".into())]),
        ];
        let (sql, params) = FilterWhere::generate(&predicates, 0);
        assert_eq!(sql, "\"price\" >= $1 AND \"difficulty\" IN ($2, $3)");
        assert_eq!(params.len(), 3);

        let (sql, _) = FilterWhere::generate(&predicates[..1], 2);
        assert_eq!(sql, "\"price\" >= $3");
    }

    #[test]
    fn uses_column_names() {
        let predicates = vec![predicate("maxGroupSize", Comparator::Lt, vec![Scalar::Integer(10)])];
        let (sql, _) = FilterWhere::generate(&predicates, 0);
        assert_eq!(sql, "\"max_group_size\" < $1");
    }

    #[test]
    fn empty_conditions() {
        let (sql, params) = FilterWhere::generate(&[], 0);
        assert_eq!(sql, "1=1");
        assert!(params.is_empty());
        let (sql, _) = FilterWhere::generate(&[predicate("price", Comparator::In, vec![])], 0);
        assert_eq!(sql, "1=0");
    }

    #[test]
    fn in_memory_matching() {
        let doc = json!({"price": 497.0, "difficulty": "medium", "priceDiscount": null, "duration": 7});
        let gte = predicate("price", Comparator::Gte, vec![Scalar::Float(497.0)]);
        let gt = predicate("price", Comparator::Gt, vec![Scalar::Float(497.0)]);
        let within = predicate("difficulty", Comparator::In, vec![Scalar::Text("easy".into()), Scalar::Text("medium".into())]);
        let discount = predicate("priceDiscount", Comparator::Lt, vec![Scalar::Float(1000.0)]);
        let duration = predicate("duration", Comparator::Eq, vec![Scalar::Integer(7)]);

        assert!(FilterWhere::matches(&[gte.clone(), within.clone(), duration], &doc));
        assert!(!FilterWhere::matches(&[gt], &doc));
        assert!(!FilterWhere::matches(&[discount], &doc));
        assert!(FilterWhere::matches(&[], &doc));
    }
}
