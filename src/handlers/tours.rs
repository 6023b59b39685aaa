use async_trait::async_trait;
use axum::{
    extract::{Path, RawQuery, State},
    routing::get,
    Router,
};
use serde_json::Value;
use std::sync::Arc;

use crate::database::models::{review::REVIEW_SCHEMA, tour::TOUR_SCHEMA, Review, Role, Tour, TourInput, TourPatch};
use crate::database::ResourceStore;
use crate::error::ApiError;
use crate::filter::{Predicate, QuerySpec, Scalar};
use crate::middleware::{guarded, ApiResult};
use crate::AppState;

use super::factory::{self, parse_id, query_pairs, ApiJson, Join};
use super::reviews;

pub const TOUR_EDITORS: &[Role] = &[Role::Admin, Role::LeadGuide];

/// Query appended by the `top-5-cheap` alias; later keys win
const TOP_CHEAP: [(&str, &str); 3] = [
    ("limit", "5"),
    ("sort", "-ratingsAverage,price"),
    ("fields", "name,price,ratingsAverage,summary,difficulty"),
];

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(get_all_tours).merge(guarded(state, TOUR_EDITORS, axum::routing::post(create_tour))),
        )
        .route("/top-5-cheap", get(top_cheap_tours))
        .route(
            "/:id",
            get(get_tour).merge(guarded(
                state,
                TOUR_EDITORS,
                axum::routing::patch(update_tour).delete(delete_tour),
            )),
        )
        .route("/:id/reviews", reviews::nested_route(state))
}

/// Secret tours never show up in listings
fn listing_scope() -> Vec<Predicate> {
    TOUR_SCHEMA
        .field("secretTour")
        .map(|field| Predicate::eq(field, Scalar::Boolean(false)))
        .into_iter()
        .collect()
}

/// Attaches the reviews written for a tour
struct TourReviews {
    reviews: Arc<dyn ResourceStore<Review>>,
}

#[async_trait]
impl Join for TourReviews {
    async fn expand(&self, doc: &mut Value) -> Result<(), ApiError> {
        let (Some(tour_field), Some(id)) = (
            REVIEW_SCHEMA.field("tour"),
            doc.get("id").and_then(Value::as_str).and_then(|s| s.parse().ok()),
        ) else {
            return Ok(());
        };
        let spec = QuerySpec::all().and(Predicate::eq(tour_field, Scalar::Uuid(id)));
        let reviews = self.reviews.find(&spec).await?;
        if let Value::Object(map) = doc {
            map.insert("reviews".to_string(), Value::Array(reviews));
        }
        Ok(())
    }
}

pub async fn get_all_tours(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Value> {
    let pairs = query_pairs(query.as_deref());
    factory::get_all::<Tour, _>(state.tours.as_ref(), &state.config.query, &pairs, listing_scope(), &[]).await
}

pub async fn top_cheap_tours(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Value> {
    let mut pairs = query_pairs(query.as_deref());
    pairs.extend(TOP_CHEAP.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    factory::get_all::<Tour, _>(state.tours.as_ref(), &state.config.query, &pairs, listing_scope(), &[]).await
}

pub async fn get_tour(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let join = TourReviews { reviews: state.reviews.clone() };
    factory::get_one::<Tour, _>(state.tours.as_ref(), parse_id(&id)?, &[&join]).await
}

pub async fn create_tour(State(state): State<AppState>, ApiJson(input): ApiJson<TourInput>) -> ApiResult<Value> {
    factory::create_one::<Tour, _>(state.tours.as_ref(), input).await
}

pub async fn update_tour(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<TourPatch>,
) -> ApiResult<Value> {
    factory::update_one::<Tour, _>(state.tours.as_ref(), parse_id(&id)?, patch).await
}

/// A deleted tour takes its reviews with it
pub async fn delete_tour(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let id = parse_id(&id)?;
    let response = factory::delete_one::<Tour, _>(state.tours.as_ref(), id).await?;
    let removed = state.reviews.delete_referencing("tour", id).await?;
    tracing::debug!(tour_id = %id, removed, "Removed reviews of deleted tour");
    Ok(response)
}
