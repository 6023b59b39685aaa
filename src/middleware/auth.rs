use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use crate::database::models::{Role, User};
use crate::error::ApiError;
use crate::AppState;

/// The authenticated actor, inserted into request extensions by `protect`
#[derive(Clone, Debug)]
pub struct Principal {
    pub user: User,
}

/// Verify the bearer token and load the user it names.
///
/// Rejects missing tokens, bad signatures, expired tokens, users that were
/// removed or deactivated, and tokens issued before the last password change.
pub async fn protect(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers())
        .ok_or_else(|| ApiError::unauthorized("You are not logged in! Please log in to get access."))?;

    let claims = state.tokens.verify(token)?;

    let account = state
        .users
        .find_account(claims.sub)
        .await?
        .filter(|account| account.user.active)
        .ok_or_else(|| ApiError::unauthorized("The user belonging to this token does no longer exist."))?;

    if account.credentials.changed_after(claims.iat) {
        return Err(ApiError::unauthorized("User recently changed password! Please log in again."));
    }

    tracing::debug!(user_id = %account.user.id, role = ?account.user.role, "Authenticated request");
    request.extensions_mut().insert(Principal { user: account.user });
    Ok(next.run(request).await)
}

/// Allow the request through only for the listed roles. Runs after `protect`.
pub async fn restrict_to(roles: &'static [Role], request: Request, next: Next) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .ok_or_else(|| ApiError::unauthorized("You are not logged in! Please log in to get access."))?;

    if !roles.contains(&principal.user.role) {
        return Err(ApiError::forbidden("You do not have permission to perform this action"));
    }
    Ok(next.run(request).await)
}

/// Wrap a route so only authenticated users reach it
pub fn authenticated(state: &AppState, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(state.clone(), protect))
}

/// Wrap a route so only authenticated users with one of `roles` reach it
pub fn guarded(state: &AppState, roles: &'static [Role], route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    // Layers run outside-in, so `protect` (added last) runs first
    route
        .route_layer(middleware::from_fn(move |request: Request, next: Next| {
            restrict_to(roles, request, next)
        }))
        .route_layer(middleware::from_fn_with_state(state.clone(), protect))
}

/// Extract the token from `Authorization: Bearer <token>`
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
