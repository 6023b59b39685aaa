#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use natours_api::auth::{NotifyError, PasswordHasher, ResetNotifier};
use natours_api::config::AppConfig;
use natours_api::database::models::{Credentials, Role, User, UserAccount};
use natours_api::{app, AppState};

pub const PASSWORD: &str = "pass1234";
pub const SECRET: &str = "integration-test-secret-0123456789";

/// Records every reset link instead of mailing it; can be told to fail
#[derive(Default)]
pub struct CapturingNotifier {
    pub urls: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl CapturingNotifier {
    pub fn last_token(&self) -> Option<String> {
        let urls = self.urls.lock().unwrap();
        urls.last().and_then(|url| url.rsplit('/').next()).map(str::to_string)
    }
}

#[async_trait]
impl ResetNotifier for CapturingNotifier {
    async fn send_reset(&self, _user: &User, reset_url: &str) -> Result<(), NotifyError> {
        self.urls.lock().unwrap().push(reset_url.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError("smtp connection refused".to_string()));
        }
        Ok(())
    }
}

/// The full router over in-memory stores, driven in-process
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub notifier: Arc<CapturingNotifier>,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig::development();
        config.security.jwt_secret = SECRET.to_string();
        adjust(&mut config);

        let notifier = Arc::new(CapturingNotifier::default());
        let state = AppState::in_memory(config)
            .with_passwords(PasswordHasher::new(1024, 1, 1).unwrap())
            .with_notifier(notifier.clone());
        Self { router: app(state.clone()), state, notifier }
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<Reply> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body: {:?}", bytes))?
        };
        Ok(Reply { status, headers, body })
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<Reply> {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Result<Reply> {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> Result<Reply> {
        self.send(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Result<Reply> {
        self.send(Method::DELETE, uri, token, None).await
    }

    /// Store an account directly and return it with a session token
    pub async fn create_user(&self, email: &str, role: Role) -> Result<(User, String)> {
        let hash = self.state.passwords.hash(PASSWORD)?;
        let user = User {
            id: Uuid::new_v4(),
            name: email.split('@').next().unwrap_or("user").to_string(),
            email: email.to_string(),
            photo: "default.jpg".to_string(),
            role,
            active: true,
            created_at: Utc::now(),
        };
        let user = self
            .state
            .users
            .create_account(UserAccount { user, credentials: Credentials::new(hash) })
            .await?;
        let token = self.state.tokens.issue(user.id)?;
        Ok((user, token))
    }

    pub async fn admin(&self) -> Result<String> {
        Ok(self.create_user("admin@natours.io", Role::Admin).await?.1)
    }

    /// Create a tour as `token`, returning its id
    pub async fn create_tour(&self, token: &str, body: Value) -> Result<String> {
        let reply = self.post("/api/v1/tours", Some(token), body).await?;
        anyhow::ensure!(reply.status == StatusCode::CREATED, "create tour failed: {}", reply.body);
        Ok(reply.body["data"]["tour"]["id"].as_str().unwrap_or_default().to_string())
    }
}

pub fn tour(name: &str, price: f64) -> Value {
    json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 10,
        "difficulty": "easy",
        "price": price,
        "summary": "Breathtaking hike through the national park",
        "imageCover": "tour-cover.jpg",
    })
}

pub fn signup_body(name: &str, email: &str) -> Value {
    json!({
        "name": name,
        "email": email,
        "password": PASSWORD,
        "passwordConfirm": PASSWORD,
    })
}

/// Names of a list response, in order
pub fn names(body: &Value, key: &str) -> Vec<String> {
    body["data"][key]
        .as_array()
        .map(|docs| docs.iter().filter_map(|d| d["name"].as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}
