mod common;

use std::sync::atomic::Ordering;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use common::{signup_body, TestApp, PASSWORD, SECRET};
use natours_api::auth::TokenIssuer;
use natours_api::config::Environment;
use natours_api::database::models::Role;

#[tokio::test]
async fn signup_signin_and_me() -> Result<()> {
    let app = TestApp::new();

    let body = json!({"name": "A", "email": "a@x.com", "password": "secret123", "passwordConfirm": "secret123"});
    let res = app.post("/api/v1/users/signup", None, body).await?;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    assert_eq!(res.body["status"], "success");
    assert!(res.body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(res.body["data"]["user"]["email"], "a@x.com");
    assert!(res.body["data"]["user"].get("password").is_none());
    assert!(res.body["data"]["user"].get("active").is_none());

    let res = app
        .post("/api/v1/users/signin", None, json!({"email": "a@x.com", "password": "secret123"}))
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let token = res.body["token"].as_str().unwrap_or_default().to_string();

    let res = app.get("/api/v1/users/me", Some(&token)).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["data"]["user"]["email"], "a@x.com");
    Ok(())
}

#[tokio::test]
async fn signup_never_grants_a_role() -> Result<()> {
    let app = TestApp::new();
    let mut body = signup_body("Mallory", "mallory@x.com");
    body["role"] = json!("admin");

    let res = app.post("/api/v1/users/signup", None, body).await?;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["data"]["user"]["role"], "user");
    Ok(())
}

#[tokio::test]
async fn signup_validates_input() -> Result<()> {
    let app = TestApp::new();

    let mut body = signup_body("Ann", "ann@x.com");
    body["passwordConfirm"] = json!("different1");
    let res = app.post("/api/v1/users/signup", None, body).await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["fieldErrors"]["passwordConfirm"], "Passwords are not the same!");

    let res = app.post("/api/v1/users/signup", None, signup_body("Ann", "not-an-email")).await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

    let res = app.post("/api/v1/users/signup", None, signup_body("Ann", "ann@x.com")).await?;
    assert_eq!(res.status, StatusCode::CREATED);
    let res = app.post("/api/v1/users/signup", None, signup_body("Ann Again", "ANN@x.com")).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Duplicate field value: \"ann@x.com\". Please use another value!");
    Ok(())
}

#[tokio::test]
async fn signin_rejects_bad_credentials() -> Result<()> {
    let app = TestApp::new();
    app.create_user("bob@x.com", Role::User).await?;

    let res = app.post("/api/v1/users/signin", None, json!({"email": "bob@x.com"})).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post("/api/v1/users/signin", None, json!({"email": "bob@x.com", "password": "wrong-password"}))
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Incorrect email or password");

    let res = app
        .post("/api/v1/users/signin", None, json!({"email": "nobody@x.com", "password": PASSWORD}))
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .post("/api/v1/users/signin", None, json!({"email": "BOB@x.com", "password": PASSWORD}))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn protect_rejects_missing_and_invalid_tokens() -> Result<()> {
    let app = TestApp::new();
    let (user, _) = app.create_user("carol@x.com", Role::User).await?;

    let res = app.get("/api/v1/users/me", None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "You are not logged in! Please log in to get access.");

    let res = app.get("/api/v1/users/me", Some("not-a-token")).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Invalid token. Please log in again!");

    let forged = TokenIssuer::new("some-other-secret", Duration::days(90)).issue(user.id)?;
    let res = app.get("/api/v1/users/me", Some(&forged)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let expired = TokenIssuer::new(SECRET, Duration::days(90)).issue_at(user.id, Utc::now() - Duration::days(91))?;
    let res = app.get("/api/v1/users/me", Some(&expired)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Your token has expired! Please log in again.");
    Ok(())
}

#[tokio::test]
async fn deactivated_users_lose_access() -> Result<()> {
    let app = TestApp::new();
    let (_, token) = app.create_user("dave@x.com", Role::User).await?;

    let res = app.delete("/api/v1/users/deleteMe", Some(&token)).await?;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert!(res.body.is_null());

    let res = app.get("/api/v1/users/me", Some(&token)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "The user belonging to this token does no longer exist.");

    let res = app
        .post("/api/v1/users/signin", None, json!({"email": "dave@x.com", "password": PASSWORD}))
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.post("/api/v1/users/forgotPassword", None, json!({"email": "dave@x.com"})).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "There is no user with that email address.");
    assert!(app.notifier.last_token().is_none());
    Ok(())
}

#[tokio::test]
async fn password_change_invalidates_older_tokens() -> Result<()> {
    let app = TestApp::new();
    let (user, current) = app.create_user("erin@x.com", Role::User).await?;
    let older = app.state.tokens.issue_at(user.id, Utc::now() - Duration::minutes(5))?;

    let res = app
        .patch(
            "/api/v1/users/updatePassword",
            Some(&current),
            json!({"passwordCurrent": "wrong-one", "password": "newpass123", "passwordConfirm": "newpass123"}),
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Your current password is wrong.");

    let res = app
        .patch(
            "/api/v1/users/updatePassword",
            Some(&current),
            json!({"passwordCurrent": PASSWORD, "password": "newpass123", "passwordConfirm": "newpass123"}),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let fresh = res.body["token"].as_str().unwrap_or_default().to_string();

    let res = app.get("/api/v1/users/me", Some(&older)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "User recently changed password! Please log in again.");

    let res = app.get("/api/v1/users/me", Some(&fresh)).await?;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .post("/api/v1/users/signin", None, json!({"email": "erin@x.com", "password": "newpass123"}))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn forgot_and_reset_password() -> Result<()> {
    let app = TestApp::new();
    app.create_user("fay@x.com", Role::User).await?;

    let res = app.post("/api/v1/users/forgotPassword", None, json!({"email": "nobody@x.com"})).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app.post("/api/v1/users/forgotPassword", None, json!({"email": "fay@x.com"})).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["message"], "Token sent to email!");
    let reset_token = app.notifier.last_token().unwrap_or_default();
    assert_eq!(reset_token.len(), 64);

    let body = json!({"password": "resetpass1", "passwordConfirm": "resetpass1"});
    let res = app.patch("/api/v1/users/resetPassword/not-the-token", None, body.clone()).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Token is invalid or has expired");

    let uri = format!("/api/v1/users/resetPassword/{}", reset_token);
    let res = app.patch(&uri, None, body.clone()).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let token = res.body["token"].as_str().unwrap_or_default().to_string();
    assert_eq!(app.get("/api/v1/users/me", Some(&token)).await?.status, StatusCode::OK);

    // Single use
    let res = app.patch(&uri, None, body).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post("/api/v1/users/signin", None, json!({"email": "fay@x.com", "password": "resetpass1"}))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn expired_reset_tokens_are_rejected() -> Result<()> {
    let app = TestApp::with_config(|config| config.security.password_reset_ttl_minutes = 0);
    app.create_user("gus@x.com", Role::User).await?;

    app.post("/api/v1/users/forgotPassword", None, json!({"email": "gus@x.com"})).await?;
    let uri = format!("/api/v1/users/resetPassword/{}", app.notifier.last_token().unwrap_or_default());
    let res = app
        .patch(&uri, None, json!({"password": "resetpass1", "passwordConfirm": "resetpass1"}))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn failed_notification_clears_the_reset() -> Result<()> {
    let app = TestApp::with_config(|config| config.environment = Environment::Production);
    app.create_user("hal@x.com", Role::User).await?;
    app.notifier.fail.store(true, Ordering::SeqCst);

    let res = app.post("/api/v1/users/forgotPassword", None, json!({"email": "hal@x.com"})).await?;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body, json!({"status": "error", "message": "Something went wrong!"}));

    let uri = format!("/api/v1/users/resetPassword/{}", app.notifier.last_token().unwrap_or_default());
    let res = app
        .patch(&uri, None, json!({"password": "resetpass1", "passwordConfirm": "resetpass1"}))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn development_errors_carry_detail() -> Result<()> {
    let app = TestApp::new();
    let res = app.get("/api/v1/users/me", None).await?;
    assert_eq!(res.body["code"], "UNAUTHORIZED");
    assert!(res.body["detail"].is_string());

    let app = TestApp::with_config(|config| config.environment = Environment::Production);
    let res = app.get("/api/v1/users/me", None).await?;
    assert_eq!(
        res.body,
        json!({"status": "error", "message": "You are not logged in! Please log in to get access."})
    );
    Ok(())
}
