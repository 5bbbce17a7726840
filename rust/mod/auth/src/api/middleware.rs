use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crm_core::ServiceError;

use crate::api::AppState;
use crate::model::TokenKind;

/// Paths that don't require authentication.
const PUBLIC_PATHS: &[&str] = &[
    "/auth/signup",
    "/auth/login",
    "/auth/token/refresh",
];

/// Bearer-token middleware.
///
/// Public paths pass straight through. Everything else needs a valid access
/// token on a live session; its `Claims` are stored as a request extension
/// for handlers to pick up via `Extension<Claims>`.
pub async fn auth_middleware(
    State(svc): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    if is_public_path(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let token = bearer_token(req.headers())
        .ok_or_else(|| ServiceError::Unauthorized("missing authorization header".into()))?;
    let claims = svc.verify_token(token, TokenKind::Access)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Extract the Bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}
