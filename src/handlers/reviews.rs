use async_trait::async_trait;
use axum::{
    extract::{Path, RawQuery, State},
    routing::{get, post, MethodRouter},
    Extension, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::{review::REVIEW_SCHEMA, Review, ReviewInput, ReviewPatch, Role, Tour, User};
use crate::database::ResourceStore;
use crate::error::ApiError;
use crate::filter::{Predicate, Scalar};
use crate::middleware::{authenticated, guarded, ApiResult, Principal};
use crate::AppState;

use super::factory::{self, parse_id, query_pairs, ApiJson, Join};

pub const REVIEW_EDITORS: &[Role] = &[Role::User, Role::Admin];

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_all_reviews).merge(authenticated(state, post(create_review))))
        .route(
            "/:id",
            get(get_review).merge(guarded(
                state,
                REVIEW_EDITORS,
                axum::routing::patch(update_review).delete(delete_review),
            )),
        )
}

/// `/tours/:id/reviews`: listing and posting scoped to one tour
pub fn nested_route(state: &AppState) -> MethodRouter<AppState> {
    get(get_tour_reviews).merge(authenticated(state, post(create_tour_review)))
}

/// Replaces the author id with the author's public profile
struct ReviewAuthor {
    users: Arc<dyn ResourceStore<User>>,
}

#[async_trait]
impl Join for ReviewAuthor {
    async fn expand(&self, doc: &mut Value) -> Result<(), ApiError> {
        let Some(id) = uuid_at(doc, "user") else {
            return Ok(());
        };
        if let Some(user) = self.users.find_by_id(id).await? {
            doc["user"] = json!({ "id": user.id, "name": user.name, "photo": user.photo });
        }
        Ok(())
    }
}

/// Replaces the tour id with the tour's id and name
struct ReviewTour {
    tours: Arc<dyn ResourceStore<Tour>>,
}

#[async_trait]
impl Join for ReviewTour {
    async fn expand(&self, doc: &mut Value) -> Result<(), ApiError> {
        let Some(id) = uuid_at(doc, "tour") else {
            return Ok(());
        };
        if let Some(tour) = self.tours.find_by_id(id).await? {
            doc["tour"] = json!({ "id": tour.id, "name": tour.name });
        }
        Ok(())
    }
}

fn uuid_at(doc: &Value, key: &str) -> Option<Uuid> {
    doc.get(key).and_then(Value::as_str).and_then(|s| s.parse().ok())
}

async fn list(state: &AppState, query: Option<String>, scope: Vec<Predicate>) -> ApiResult<Value> {
    let pairs = query_pairs(query.as_deref());
    let author = ReviewAuthor { users: state.user_records.clone() };
    factory::get_all::<Review, _>(state.reviews.as_ref(), &state.config.query, &pairs, scope, &[&author]).await
}

async fn create(state: &AppState, mut input: ReviewInput, principal: &Principal) -> ApiResult<Value> {
    // The author is always the caller
    input.user = Some(principal.user.id);

    if let Some(tour_id) = input.tour {
        if state.tours.find_by_id(tour_id).await?.is_none() {
            return Err(ApiError::not_found("No tour found with that ID"));
        }
    }
    factory::create_one::<Review, _>(state.reviews.as_ref(), input).await
}

pub async fn get_all_reviews(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Value> {
    list(&state, query, vec![]).await
}

pub async fn get_tour_reviews(
    State(state): State<AppState>,
    Path(tour_id): Path<String>,
    RawQuery(query): RawQuery,
) -> ApiResult<Value> {
    let tour_id = parse_id(&tour_id)?;
    let scope = REVIEW_SCHEMA
        .field("tour")
        .map(|field| Predicate::eq(field, Scalar::Uuid(tour_id)))
        .into_iter()
        .collect();
    list(&state, query, scope).await
}

pub async fn create_review(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiJson(input): ApiJson<ReviewInput>,
) -> ApiResult<Value> {
    create(&state, input, &principal).await
}

pub async fn create_tour_review(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(tour_id): Path<String>,
    ApiJson(mut input): ApiJson<ReviewInput>,
) -> ApiResult<Value> {
    input.tour = Some(parse_id(&tour_id)?);
    create(&state, input, &principal).await
}

pub async fn get_review(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let author = ReviewAuthor { users: state.user_records.clone() };
    let tour = ReviewTour { tours: state.tours.clone() };
    factory::get_one::<Review, _>(state.reviews.as_ref(), parse_id(&id)?, &[&author, &tour]).await
}

/// Only the author or an admin may change a review
async fn authorize_edit(state: &AppState, id: Uuid, principal: &Principal) -> Result<(), ApiError> {
    let review = state
        .reviews
        .find_by_id(id)
        .await?
        .ok_or_else(factory::not_found::<Review>)?;
    if principal.user.role != Role::Admin && review.user != principal.user.id {
        tracing::debug!(review_id = %id, user_id = %principal.user.id, "Rejected edit by non-author");
        return Err(ApiError::forbidden("You do not have permission to perform this action"));
    }
    Ok(())
}

pub async fn update_review(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ReviewPatch>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    authorize_edit(&state, id, &principal).await?;
    factory::update_one::<Review, _>(state.reviews.as_ref(), id, patch).await
}

pub async fn delete_review(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&id)?;
    authorize_edit(&state, id, &principal).await?;
    factory::delete_one::<Review, _>(state.reviews.as_ref(), id).await
}
