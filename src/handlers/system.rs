use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::auth;
use crate::database::manager::DatabaseManager;
use crate::error::ApiError;

pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "name": "Protocol API",
        "version": version,
        "description": "JSON Schema validated CRUD for protocols and protocol schemas",
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "auth_check": "/auth/check (any recognized role)",
            "protocols": "/protocols[/:id|/full|/validator] (reads public, writes moderator|admin)",
            "protocolschemas": "/protocolschemas[/:id|/full|/validator] (reads public, writes moderator|admin)",
        }
    }))
}

pub async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok",
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "timestamp": now,
                "database_error": e.to_string(),
            })),
        ),
    }
}

/// Token smoke test: succeeds for any recognized role.
pub async fn auth_check(headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    auth::authorize(&headers, None, auth::ANY_ROLES)?;
    Ok(Json(json!({ "message": "Success" })))
}
