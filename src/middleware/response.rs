use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::ApiError;

/// Success envelope: `{status: "success", token?, results?, data?, message?}`
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub status_code: Option<StatusCode>,
    pub results: Option<usize>,
    pub token: Option<String>,
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            status_code: None,
            results: None,
            token: None,
            message: None,
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self::success(data).with_status(StatusCode::CREATED)
    }

    pub fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Number of documents in a list response
    pub fn with_results(mut self, results: usize) -> Self {
        self.results = Some(results);
        self
    }

    /// Session token handed out by the auth routes
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }
}

impl ApiResponse<()> {
    /// 204 No Content
    pub fn no_content() -> Self {
        Self {
            data: None,
            status_code: Some(StatusCode::NO_CONTENT),
            results: None,
            token: None,
            message: None,
        }
    }

    /// `{status: "success", message}` without data
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            data: None,
            status_code: None,
            results: None,
            token: None,
            message: Some(message.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        // For 204 No Content, return empty response
        if status == StatusCode::NO_CONTENT {
            return status.into_response();
        }

        let mut envelope = Map::new();
        envelope.insert("status".to_string(), json!("success"));
        if let Some(token) = self.token {
            envelope.insert("token".to_string(), json!(token));
        }
        if let Some(results) = self.results {
            envelope.insert("results".to_string(), json!(results));
        }
        if let Some(data) = self.data {
            match serde_json::to_value(&data) {
                Ok(value) => {
                    envelope.insert("data".to_string(), value);
                }
                Err(e) => {
                    return ApiError::internal_server_error(format!("Failed to serialize response data: {}", e))
                        .into_response();
                }
            }
        }
        if let Some(message) = self.message {
            envelope.insert("message".to_string(), json!(message));
        }

        (status, Json(Value::Object(envelope))).into_response()
    }
}

// Convenience type alias
pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn list_envelope() {
        let response = ApiResponse::success(json!({"tours": []})).with_results(0).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, json!({"status": "success", "results": 0, "data": {"tours": []}}));
    }

    #[tokio::test]
    async fn token_and_message_envelopes() {
        let response = ApiResponse::created(json!({"user": {}})).with_token("abc".into()).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_of(response).await["token"], "abc");

        let response = ApiResponse::message("Token sent to email!").into_response();
        assert_eq!(body_of(response).await, json!({"status": "success", "message": "Token sent to email!"}));
    }

    #[tokio::test]
    async fn no_content_is_empty() {
        let response = ApiResponse::no_content().into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }
}
