use axum::extract::{OriginalUri, State};
use serde_json::json;

use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::AppState;

pub async fn root() -> ApiResult<serde_json::Value> {
    Ok(ApiResponse::success(json!({
        "name": "Natours API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "tours": "/api/v1/tours[/:id] (GET public, writes admin/lead-guide)",
            "top": "/api/v1/tours/top-5-cheap (public)",
            "reviews": "/api/v1/reviews[/:id], /api/v1/tours/:id/reviews",
            "auth": "/api/v1/users/{signup,signin,forgotPassword,resetPassword/:token}",
            "me": "/api/v1/users/{me,updateMe,deleteMe,updatePassword} (token)",
            "users": "/api/v1/users[/:id] (admin)",
        }
    })))
}

pub async fn health(State(state): State<AppState>) -> ApiResult<serde_json::Value> {
    let now = chrono::Utc::now();

    let Some(pool) = &state.database else {
        return Ok(ApiResponse::success(json!({ "timestamp": now, "database": "memory" })));
    };

    DatabaseManager::health_check(pool).await.map_err(|e| {
        tracing::warn!(error = %e, "Health check failed");
        ApiError::service_unavailable("Database unavailable")
    })?;
    Ok(ApiResponse::success(json!({ "timestamp": now, "database": "ok" })))
}

/// Fallback for unmatched routes
pub async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::not_found(format!("Can't find {} on this server!", uri.path()))
}
