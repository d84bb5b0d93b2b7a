//! HTTP API handlers

pub mod admin;
pub mod auth;
pub mod health;
pub mod intake;
pub mod results;

use axum::{extract::rejection::JsonRejection, routing::get, Json, Router};

use crate::business_types::{BusinessCategory, BUSINESS_CATEGORIES};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub use admin::admin_routes;
pub use auth::{admin_middleware, AdminUser, USER_ID_HEADER};
pub use health::health_routes;
pub use intake::intake_routes;
pub use results::results_routes;

/// Unwrap a JSON body, turning extractor rejections into 400s
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e.body_text())))
}

/// GET /api/business-types
pub async fn business_types() -> Json<&'static [BusinessCategory]> {
    Json(BUSINESS_CATEGORIES)
}

pub fn catalogue_routes() -> Router<AppState> {
    Router::new().route("/api/business-types", get(business_types))
}
