use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use auth::model::Claims;
use crm_core::ServiceError;

use crate::api::AppState;

/// Onboarding gate. Runs after the auth middleware; callers who haven't
/// finished onboarding get 403 on every CRM route.
pub async fn require_onboarding(
    State(svc): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| ServiceError::Unauthorized("missing credentials".into()))?;

    if !svc.auth().is_onboarded(&claims.sub)? {
        return Err(ServiceError::PermissionDenied(
            "complete onboarding before using the CRM".into(),
        ));
    }
    Ok(next.run(req).await)
}
