//! The five collection operations, written once for every resource.
//!
//! Each function takes the store it works against plus already-extracted
//! request pieces, so resource modules stay thin wrappers that only decide
//! scopes, joins and which fields a body may carry.

use async_trait::async_trait;
use axum::extract::FromRequest;
use chrono::Utc;
use futures::future::try_join_all;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::QueryConfig;
use crate::database::models::Resource;
use crate::database::{DatabaseError, ResourceStore};
use crate::error::ApiError;
use crate::filter::{Filter, FilterError, Predicate};
use crate::middleware::{ApiResponse, ApiResult};

/// JSON body extractor whose rejections use the API error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Eager-load step applied to serialized documents before they are returned
#[async_trait]
pub trait Join: Send + Sync {
    async fn expand(&self, doc: &mut Value) -> Result<(), ApiError>;
}

pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid id: {}", raw)))
}

/// Decode a raw query string into ordered pairs, repeats preserved
pub fn query_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

pub fn not_found<R: Resource>() -> ApiError {
    ApiError::not_found(format!("No {} found with that ID", R::schema().singular))
}

/// Serialize a document for clients, without its internal fields
pub fn to_document<R: Resource>(doc: &R) -> Result<Value, ApiError> {
    serialize(doc).map(|value| R::schema().strip_internal(value))
}

/// Full stored form, internal fields included
pub fn serialize<R: Resource>(doc: &R) -> Result<Value, ApiError> {
    serde_json::to_value(doc)
        .map_err(|e| ApiError::internal_server_error(format!("Failed to serialize {}: {}", R::schema().singular, e)))
}

/// Report a uniqueness violation with the offending values, as in
/// `Duplicate field value: "The Forest Hiker". Please use another value!`
pub fn store_error<R: Resource>(err: DatabaseError, doc: &Value) -> ApiError {
    if let DatabaseError::Duplicate { constraint } = &err {
        if let Some(unique) = R::schema().constraint(constraint) {
            let values: Vec<String> = unique
                .fields
                .iter()
                .filter_map(|f| doc.get(*f))
                .map(|v| match v {
                    Value::String(s) => format!("\"{}\"", s),
                    other => other.to_string(),
                })
                .collect();
            if !values.is_empty() {
                return ApiError::bad_request(format!(
                    "Duplicate field value: {}. Please use another value!",
                    values.join(", ")
                ));
            }
        }
    }
    err.into()
}

fn wrap<R: Resource>(doc: Value) -> Value {
    let mut data = Map::new();
    data.insert(R::schema().singular.to_string(), doc);
    Value::Object(data)
}

async fn expand_all(joins: &[&dyn Join], doc: &mut Value) -> Result<(), ApiError> {
    for join in joins {
        join.expand(doc).await?;
    }
    Ok(())
}

/// Build, validate and insert a new document
pub async fn insert_new<R, S>(store: &S, input: R::Create) -> Result<R, ApiError>
where
    R: Resource,
    S: ResourceStore<R> + ?Sized,
{
    let doc = R::build(input, Uuid::new_v4(), Utc::now()).map_err(ApiError::invalid_fields)?;
    doc.validate().map_err(ApiError::invalid_fields)?;

    let value = serialize::<R>(&doc)?;
    let created = store.insert(doc).await.map_err(|e| store_error::<R>(e, &value))?;
    tracing::info!(resource = R::schema().singular, id = %created.id(), "Created");
    Ok(created)
}

pub async fn create_one<R, S>(store: &S, input: R::Create) -> ApiResult<Value>
where
    R: Resource,
    S: ResourceStore<R> + ?Sized,
{
    let created = insert_new(store, input).await?;
    Ok(ApiResponse::created(wrap::<R>(to_document(&created)?)))
}

pub async fn get_one<R, S>(store: &S, id: Uuid, joins: &[&dyn Join]) -> ApiResult<Value>
where
    R: Resource,
    S: ResourceStore<R> + ?Sized,
{
    let doc = store.find_by_id(id).await?.ok_or_else(not_found::<R>)?;
    let mut value = to_document(&doc)?;
    expand_all(joins, &mut value).await?;
    Ok(ApiResponse::success(wrap::<R>(value)))
}

/// List a collection from query-string pairs. `scope` narrows the
/// collection before any client filter applies.
pub async fn get_all<R, S>(
    store: &S,
    config: &QueryConfig,
    pairs: &[(String, String)],
    scope: Vec<Predicate>,
    joins: &[&dyn Join],
) -> ApiResult<Value>
where
    R: Resource,
    S: ResourceStore<R> + ?Sized,
{
    let mut spec = Filter::parse(R::schema(), pairs, config);
    spec.predicates.extend(scope);

    if let Some(page) = spec.page.filter(|p| p.explicit && p.number > 1) {
        let total = store.count(&spec).await?;
        if page.is_past_end(total) {
            return Err(FilterError::PageNotFound.into());
        }
    }

    let mut docs = store.find(&spec).await?;
    try_join_all(docs.iter_mut().map(|doc| expand_all(joins, doc))).await?;

    let results = docs.len();
    let mut data = Map::new();
    data.insert(R::schema().plural.to_string(), Value::Array(docs));
    Ok(ApiResponse::success(Value::Object(data)).with_results(results))
}

/// Apply a patch and validate the result before writing it back
pub async fn patch_existing<R, S>(store: &S, id: Uuid, patch: R::Patch) -> Result<R, ApiError>
where
    R: Resource,
    S: ResourceStore<R> + ?Sized,
{
    let mut doc = store.find_by_id(id).await?.ok_or_else(not_found::<R>)?;
    doc.apply(patch);
    doc.validate().map_err(ApiError::invalid_fields)?;

    let value = serialize::<R>(&doc)?;
    store
        .update(doc)
        .await
        .map_err(|e| store_error::<R>(e, &value))?
        .ok_or_else(not_found::<R>)
}

pub async fn update_one<R, S>(store: &S, id: Uuid, patch: R::Patch) -> ApiResult<Value>
where
    R: Resource,
    S: ResourceStore<R> + ?Sized,
{
    let updated = patch_existing(store, id, patch).await?;
    Ok(ApiResponse::success(wrap::<R>(to_document(&updated)?)))
}

pub async fn delete_one<R, S>(store: &S, id: Uuid) -> ApiResult<()>
where
    R: Resource,
    S: ResourceStore<R> + ?Sized,
{
    if !store.delete_by_id(id).await? {
        return Err(not_found::<R>());
    }
    tracing::info!(resource = R::schema().singular, %id, "Deleted");
    Ok(ApiResponse::no_content())
}
