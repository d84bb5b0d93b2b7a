//! Admin access guard
//!
//! Sessions are handled by the upstream auth proxy, which forwards the
//! authenticated user id in `X-User-Id`. This middleware only checks that the
//! id is present and belongs to a profile flagged as admin.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use leadgen_common::db;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated admin id, inserted into request extensions by the guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser(pub String);

/// Caller's user id from `X-User-Id`, if any
pub fn user_id_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// 401 without an identity, 403 for non-admins
pub async fn admin_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = user_id_from_headers(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    if !db::is_user_admin(&state.db, &user_id).await? {
        warn!(user_id = %user_id, path = %request.uri().path(), "Non-admin attempted admin access");
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }

    debug!(user_id = %user_id, "Admin request authorized");
    request.extensions_mut().insert(AdminUser(user_id));
    Ok(next.run(request).await)
}
