use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{ErrorReport, GENERIC_MESSAGE};

/// Centralized error responder: every 4xx/5xx leaving the router passes
/// through here and gets its final `{status, message}` body. Development
/// adds `code`, `detail` and `fieldErrors`; elsewhere 5xx messages are
/// replaced with a generic one. Server errors are logged in full.
pub async fn error_responder(State(config): State<Arc<AppConfig>>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let report = response.extensions().get::<ErrorReport>().cloned().unwrap_or_else(|| ErrorReport {
        code: "HTTP_ERROR",
        message: status.canonical_reason().unwrap_or("Error").to_string(),
        detail: format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or_default()),
        field_errors: None,
    });

    if status.is_server_error() {
        tracing::error!(%method, path = %path, status = status.as_u16(), code = report.code, detail = %report.detail, "{}", report.message);
    } else {
        tracing::debug!(%method, path = %path, status = status.as_u16(), "{}", report.message);
    }

    let body = render(&report, status.is_server_error(), config.is_development());
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Response::from_parts(parts, Body::from(body.to_string()))
}

fn render(report: &ErrorReport, server_error: bool, development: bool) -> Value {
    if !development {
        let message = if server_error { GENERIC_MESSAGE } else { report.message.as_str() };
        return json!({ "status": "error", "message": message });
    }

    let mut body = json!({
        "status": "error",
        "message": report.message,
        "code": report.code,
        "detail": report.detail,
    });
    if let Some(field_errors) = &report.field_errors {
        body["fieldErrors"] = json!(field_errors);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::FieldErrors;

    fn report() -> ErrorReport {
        let mut field_errors = FieldErrors::new();
        field_errors.insert("price".into(), "Price cannot be negative".into());
        ErrorReport {
            code: "VALIDATION_ERROR",
            message: "Invalid input data. Price cannot be negative".into(),
            detail: "ValidationError { .. }".into(),
            field_errors: Some(field_errors),
        }
    }

    #[test]
    fn production_bodies_stay_minimal() {
        let body = render(&report(), false, false);
        assert_eq!(body, json!({"status": "error", "message": "Invalid input data. Price cannot be negative"}));

        let body = render(&report(), true, false);
        assert_eq!(body["message"], GENERIC_MESSAGE);
    }

    #[test]
    fn development_bodies_carry_detail() {
        let body = render(&report(), true, true);
        assert_eq!(body["message"], "Invalid input data. Price cannot be negative");
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["fieldErrors"]["price"], "Price cannot be negative");
        assert!(body["detail"].is_string());
    }
}
