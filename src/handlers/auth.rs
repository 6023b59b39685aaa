//! Signup, signin and the password flows.

use axum::{
    extract::{Path, State},
    routing::{patch, post},
    Extension, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{PasswordHasher, ResetToken};
use crate::database::models::user::{normalize_email, UserInput};
use crate::database::models::{Checks, Credentials, Resource, User, UserAccount};
use crate::error::ApiError;
use crate::middleware::{authenticated, ApiResponse, ApiResult, Principal};
use crate::AppState;

use super::factory::{serialize, store_error, to_document, ApiJson};

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/forgotPassword", post(forgot_password))
        .route("/resetPassword/:token", patch(reset_password))
        .route("/updatePassword", authenticated(state, patch(update_password)))
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub password_current: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// Check a new password and its confirmation, recording failures in `checks`
fn check_new_password(checks: &mut Checks, password: Option<String>, confirm: Option<String>) -> Option<String> {
    let password = checks.require(password, "password", "Please provide a password")?;
    checks.check(
        password.chars().count() >= MIN_PASSWORD_LENGTH,
        "password",
        format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH),
    );
    let confirm = checks.require(confirm, "passwordConfirm", "Please confirm your password")?;
    checks.check(confirm == password, "passwordConfirm", "Passwords are not the same!");
    Some(password)
}

fn new_password(password: Option<String>, confirm: Option<String>) -> Result<String, ApiError> {
    let mut checks = Checks::new();
    let password = check_new_password(&mut checks, password, confirm);
    checks.finish().map_err(ApiError::invalid_fields)?;
    password.ok_or_else(|| ApiError::bad_request("Please provide a password"))
}

/// Hashing blocks; run it on the blocking pool
async fn hash_password(hasher: &PasswordHasher, password: String) -> Result<String, ApiError> {
    let hasher = hasher.clone();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| ApiError::internal_server_error(format!("Hashing task failed: {}", e)))?
        .map_err(ApiError::from)
}

async fn verify_password(hasher: &PasswordHasher, password: String, hash: String) -> Result<bool, ApiError> {
    let hasher = hasher.clone();
    tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
        .await
        .map_err(|e| ApiError::internal_server_error(format!("Hashing task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// `{status, token, data: {user}}` for a freshly authenticated user
fn token_response(state: &AppState, user: &User) -> ApiResult<Value> {
    let token = state.tokens.issue(user.id)?;
    Ok(ApiResponse::success(json!({ "user": to_document(user)? })).with_token(token))
}

/// Create an account with a hashed password. Shared by signup (which
/// always passes a plain user role) and the admin create route.
pub async fn register(state: &AppState, mut input: UserInput) -> Result<User, ApiError> {
    let mut checks = Checks::new();
    let password = check_new_password(&mut checks, input.password.take(), input.password_confirm.take());

    let user = match User::build(input, Uuid::new_v4(), Utc::now()) {
        Ok(user) => Some(user),
        Err(errors) => {
            for (field, message) in errors {
                checks.fail(&field, message);
            }
            None
        }
    };
    if let Some(user) = &user {
        if let Err(errors) = user.validate() {
            for (field, message) in errors {
                checks.fail(&field, message);
            }
        }
    }
    checks.finish().map_err(ApiError::invalid_fields)?;

    let (Some(user), Some(password)) = (user, password) else {
        return Err(ApiError::bad_request("Invalid input data"));
    };

    let password_hash = hash_password(&state.passwords, password).await?;
    let value = serialize::<User>(&user)?;
    let account = UserAccount { user, credentials: Credentials::new(password_hash) };
    let user = state
        .users
        .create_account(account)
        .await
        .map_err(|e| store_error::<User>(e, &value))?;

    tracing::info!(user_id = %user.id, role = ?user.role, "Account created");
    Ok(user)
}

pub async fn signup(State(state): State<AppState>, ApiJson(mut input): ApiJson<UserInput>) -> ApiResult<Value> {
    // Roles are never chosen through self-service
    input.role = None;
    let user = register(&state, input).await?;
    Ok(token_response(&state, &user)?.with_status(axum::http::StatusCode::CREATED))
}

pub async fn signin(State(state): State<AppState>, ApiJson(body): ApiJson<SigninRequest>) -> ApiResult<Value> {
    let (Some(email), Some(password)) = (body.email, body.password) else {
        return Err(ApiError::bad_request("Please provide email and password!"));
    };

    let incorrect = || ApiError::unauthorized("Incorrect email or password");
    let account = state
        .users
        .find_account_by_email(&normalize_email(&email))
        .await?
        .filter(|account| account.user.active)
        .ok_or_else(incorrect)?;

    if !verify_password(&state.passwords, password, account.credentials.password_hash.clone()).await? {
        tracing::debug!(user_id = %account.user.id, "Rejected signin");
        return Err(incorrect());
    }
    token_response(&state, &account.user)
}

pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> ApiResult<()> {
    let email = body.email.ok_or_else(|| ApiError::bad_request("Please provide your email address"))?;
    let UserAccount { user, mut credentials } = state
        .users
        .find_account_by_email(&normalize_email(&email))
        .await?
        .filter(|account| account.user.active)
        .ok_or_else(|| ApiError::not_found("There is no user with that email address."))?;

    let token = ResetToken::generate();
    credentials.start_reset(token.digest.clone(), Utc::now() + state.config.password_reset_ttl());
    state.users.save_credentials(user.id, &credentials).await?;

    let reset_url = format!(
        "{}/api/v1/users/resetPassword/{}",
        state.config.server.public_base_url, token.plain
    );
    if let Err(e) = state.notifier.send_reset(&user, &reset_url).await {
        tracing::error!(user_id = %user.id, error = %e, "Reset notification failed");
        credentials.clear_reset();
        state.users.save_credentials(user.id, &credentials).await?;
        return Err(ApiError::internal_server_error(
            "There was an error sending the email. Try again later!",
        ));
    }

    Ok(ApiResponse::message("Token sent to email!"))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> ApiResult<Value> {
    let now = Utc::now();
    let UserAccount { user, mut credentials } = state
        .users
        .find_account_by_reset_token(&ResetToken::digest(&token))
        .await?
        .filter(|account| account.credentials.reset_valid_at(now))
        .ok_or_else(|| ApiError::bad_request("Token is invalid or has expired"))?;

    let password = new_password(body.password, body.password_confirm)?;
    credentials.change_password(hash_password(&state.passwords, password).await?, now);
    state.users.save_credentials(user.id, &credentials).await?;

    tracing::info!(user_id = %user.id, "Password reset");
    token_response(&state, &user)
}

pub async fn update_password(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiJson(body): ApiJson<UpdatePasswordRequest>,
) -> ApiResult<Value> {
    let UserAccount { user, mut credentials } = state
        .users
        .find_account(principal.user.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("The user belonging to this token does no longer exist."))?;

    let current = body.password_current.unwrap_or_default();
    if !verify_password(&state.passwords, current, credentials.password_hash.clone()).await? {
        return Err(ApiError::unauthorized("Your current password is wrong."));
    }

    let password = new_password(body.password, body.password_confirm)?;
    credentials.change_password(hash_password(&state.passwords, password).await?, Utc::now());
    state.users.save_credentials(user.id, &credentials).await?;

    tracing::info!(user_id = %user.id, "Password updated");
    token_response(&state, &user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_passwords_must_be_long_and_confirmed() {
        let err = new_password(Some("short".into()), Some("short".into())).unwrap_err();
        assert_eq!(err.message(), "Invalid input data. Password must be at least 8 characters");

        let err = new_password(Some("pass1234".into()), Some("pass4321".into())).unwrap_err();
        assert_eq!(err.message(), "Invalid input data. Passwords are not the same!");

        let err = new_password(Some("pass1234".into()), None).unwrap_err();
        assert_eq!(err.message(), "Invalid input data. Please confirm your password");

        assert_eq!(new_password(Some("pass1234".into()), Some("pass1234".into())).unwrap(), "pass1234");
    }
}
