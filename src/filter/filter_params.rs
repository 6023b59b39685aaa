use tracing::debug;

use super::types::{Comparator, Page, Predicate, Projection, QuerySpec, Scalar, SortDirection, SortKey};
use crate::config::QueryConfig;
use crate::database::models::{FieldDef, FieldKind, Schema};

/// Field used when the request names no usable sort key
const DEFAULT_SORT: &str = "-createdAt";

/// Turns query-string pairs into a `QuerySpec` for one resource.
///
/// Anything it cannot make sense of (unknown fields, unknown operators,
/// malformed keys, values that do not fit the field type) is dropped rather
/// than reported, so a query can only ever narrow to declared fields.
pub struct FilterParams<'a> {
    schema: &'static Schema,
    config: &'a QueryConfig,
}

#[derive(Default)]
struct Reserved<'p> {
    page: Option<&'p str>,
    sort: Option<&'p str>,
    limit: Option<&'p str>,
    fields: Option<&'p str>,
}

impl<'a> FilterParams<'a> {
    pub fn new(schema: &'static Schema, config: &'a QueryConfig) -> Self {
        Self { schema, config }
    }

    pub fn parse(&self, pairs: &[(String, String)]) -> QuerySpec {
        let mut reserved = Reserved::default();
        let mut equality: Vec<(&'static FieldDef, Vec<Scalar>)> = Vec::new();
        let mut ranges: Vec<Predicate> = Vec::new();

        for (key, value) in pairs {
            // `page`, `sort`, `limit` and `fields` are never filters; the last one wins
            match key.as_str() {
                "page" => { reserved.page = Some(value.as_str()); continue; }
                "sort" => { reserved.sort = Some(value.as_str()); continue; }
                "limit" => { reserved.limit = Some(value.as_str()); continue; }
                "fields" => { reserved.fields = Some(value.as_str()); continue; }
                _ => {}
            }

            let Some((name, op)) = split_key(key) else {
                debug!("Ignoring malformed query key {:?}", key);
                continue;
            };
            let Some(field) = self.schema.field(name).filter(|f| f.filterable) else {
                debug!("Ignoring filter on unknown field {:?} for {}", name, self.schema.plural);
                continue;
            };
            let Some(scalar) = field.kind.parse_param(value) else {
                debug!("Ignoring value {:?} for {}: not a {:?}", value, field.name, field.kind);
                continue;
            };

            match op {
                None => self.push_equality(&mut equality, field, scalar),
                Some(op) => {
                    let Some(comparator) = Comparator::from_bracket(op) else {
                        debug!("Ignoring unknown operator {:?} on {}", op, field.name);
                        continue;
                    };
                    if !field.kind.is_ordered() {
                        debug!("Ignoring {:?} on unordered field {}", op, field.name);
                        continue;
                    }
                    let predicate = Predicate { field, comparator, values: vec![scalar] };
                    match ranges.iter_mut().find(|p| p.field.name == field.name && p.comparator == comparator) {
                        Some(existing) => *existing = predicate,
                        None => ranges.push(predicate),
                    }
                }
            }
        }

        let mut predicates: Vec<Predicate> = equality
            .into_iter()
            .map(|(field, values)| {
                let comparator = if values.len() > 1 { Comparator::In } else { Comparator::Eq };
                Predicate { field, comparator, values }
            })
            .collect();
        predicates.extend(ranges);

        QuerySpec {
            predicates,
            sort: self.parse_sort(reserved.sort),
            projection: self.parse_fields(reserved.fields),
            page: Some(self.parse_page(reserved.page, reserved.limit)),
        }
    }

    fn push_equality(
        &self,
        equality: &mut Vec<(&'static FieldDef, Vec<Scalar>)>,
        field: &'static FieldDef,
        scalar: Scalar,
    ) {
        match equality.iter_mut().find(|(f, _)| f.name == field.name) {
            Some((_, values)) if self.config.pollution_allow_list.iter().any(|n| n == field.name) => {
                if !values.contains(&scalar) {
                    values.push(scalar);
                }
            }
            Some((_, values)) => {
                debug!("Repeated filter {} is not allow-listed; keeping the last value", field.name);
                *values = vec![scalar];
            }
            None => equality.push((field, vec![scalar])),
        }
    }

    fn parse_sort(&self, raw: Option<&str>) -> Vec<SortKey> {
        let keys = raw.map(|s| self.sort_keys(s)).unwrap_or_default();
        if keys.is_empty() {
            self.sort_keys(DEFAULT_SORT)
        } else {
            keys
        }
    }

    fn sort_keys(&self, raw: &str) -> Vec<SortKey> {
        let mut keys: Vec<SortKey> = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, direction) = match part.strip_prefix('-') {
                Some(name) => (name, SortDirection::Desc),
                None => (part, SortDirection::Asc),
            };
            let Some(field) = self.schema.field(name).filter(|f| f.kind != FieldKind::Json) else {
                debug!("Ignoring sort on unknown field {:?}", name);
                continue;
            };
            if keys.iter().any(|k| k.field.name == field.name) {
                continue;
            }
            keys.push(SortKey { field, direction });
        }
        keys
    }

    fn parse_fields(&self, raw: Option<&str>) -> Projection {
        let Some(raw) = raw else {
            return Projection::All;
        };
        let parts: Vec<&str> = raw.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            return Projection::All;
        }

        let excluding = parts.iter().all(|p| p.starts_with('-'));
        if !excluding && parts.iter().any(|p| p.starts_with('-')) {
            debug!("Ignoring field list mixing inclusion and exclusion: {:?}", raw);
            return Projection::All;
        }

        let fields: Vec<&'static FieldDef> = parts
            .iter()
            .filter_map(|p| self.schema.field(p.trim_start_matches('-')))
            .filter(|f| !f.internal)
            .collect();

        match (fields.is_empty(), excluding) {
            (true, _) => Projection::All,
            (false, true) => Projection::Exclude(fields),
            (false, false) => Projection::Include(fields),
        }
    }

    fn parse_page(&self, page: Option<&str>, limit: Option<&str>) -> Page {
        let mut size = limit
            .and_then(|l| l.trim().parse::<u32>().ok())
            .filter(|l| *l > 0)
            .unwrap_or(self.config.default_limit);
        if let Some(max) = self.config.max_limit {
            size = size.min(max);
        }
        let number = page
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1);
        Page { number, size, explicit: page.is_some() }
    }
}

/// `price` → (`price`, None); `price[gte]` → (`price`, Some(`gte`))
fn split_key(key: &str) -> Option<(&str, Option<&str>)> {
    match key.find('[') {
        None if !key.is_empty() && !key.contains(']') => Some((key, None)),
        None => None,
        Some(0) => None,
        Some(open) => {
            let inner = key[open + 1..].strip_suffix(']')?;
            if inner.is_empty() || inner.contains('[') || inner.contains(']') {
                return None;
            }
            Some((&key[..open], Some(inner)))
        }
    }
}
