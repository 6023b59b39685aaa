use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    routing::{delete, get, patch},
    Extension, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::{user::UserInput, user::USER_SCHEMA, Role, User, UserPatch};
use crate::error::ApiError;
use crate::filter::{Predicate, Scalar};
use crate::middleware::{authenticated, guarded, ApiResponse, ApiResult, Principal};
use crate::AppState;

use super::auth::{self, register};
use super::factory::{self, parse_id, query_pairs, to_document, ApiJson};

pub const USER_ADMINS: &[Role] = &[Role::Admin];

/// Public auth routes, then self-service routes for any signed-in user,
/// then the admin-only collection
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(auth::routes(state))
        .route("/me", authenticated(state, get(get_me).patch(update_me)))
        .route("/updateMe", authenticated(state, patch(update_me)))
        .route("/deleteMe", authenticated(state, delete(delete_me)))
        .route("/", guarded(state, USER_ADMINS, get(get_all_users).post(create_user)))
        .route(
            "/:id",
            guarded(state, USER_ADMINS, get(get_user).patch(update_user).delete(delete_user)),
        )
}

/// Profile fields a user may change on their own account. Anything else in
/// the body, role included, is dropped during deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<Value>,
    pub password_confirm: Option<Value>,
}

/// Empty values (`""`, `0`, `false`, `null`) do not count as a password attempt
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Deactivated users stay stored but are hidden from listings
fn active_scope() -> Vec<Predicate> {
    USER_SCHEMA
        .field("active")
        .map(|field| Predicate::eq(field, Scalar::Boolean(true)))
        .into_iter()
        .collect()
}

pub async fn get_me(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> ApiResult<Value> {
    factory::get_one::<User, _>(state.user_records.as_ref(), principal.user.id, &[]).await
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiJson(body): ApiJson<UpdateMeRequest>,
) -> ApiResult<Value> {
    if body.password.as_ref().is_some_and(is_set) || body.password_confirm.as_ref().is_some_and(is_set) {
        return Err(ApiError::bad_request(
            "This route is not for password updates. Please use /updatePassword.",
        ));
    }

    let patch = UserPatch { name: body.name, email: body.email, ..Default::default() };
    let user = factory::patch_existing::<User, _>(state.user_records.as_ref(), principal.user.id, patch).await?;
    Ok(ApiResponse::success(json!({ "user": to_document(&user)? })))
}

pub async fn delete_me(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> ApiResult<()> {
    if !state.users.set_active(principal.user.id, false).await? {
        return Err(ApiError::not_found("No user found with that ID"));
    }
    tracing::info!(user_id = %principal.user.id, "Account deactivated");
    Ok(ApiResponse::no_content())
}

pub async fn get_all_users(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Value> {
    let pairs = query_pairs(query.as_deref());
    factory::get_all::<User, _>(state.user_records.as_ref(), &state.config.query, &pairs, active_scope(), &[]).await
}

/// Admin-created accounts go through the same password checks as signup but
/// may carry any role
pub async fn create_user(State(state): State<AppState>, ApiJson(input): ApiJson<UserInput>) -> ApiResult<Value> {
    let user = register(&state, input).await?;
    Ok(ApiResponse::success(json!({ "user": to_document(&user)? })).with_status(StatusCode::CREATED))
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    factory::get_one::<User, _>(state.user_records.as_ref(), parse_id(&id)?, &[]).await
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<UserPatch>,
) -> ApiResult<Value> {
    factory::update_one::<User, _>(state.user_records.as_ref(), parse_id(&id)?, patch).await
}

/// Removes the account and every review it wrote
pub async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let id = parse_id(&id)?;
    let response = factory::delete_one::<User, _>(state.user_records.as_ref(), id).await?;
    let removed = state.reviews.delete_referencing("user", id).await?;
    tracing::debug!(user_id = %id, removed, "Removed reviews of deleted user");
    Ok(response)
}
