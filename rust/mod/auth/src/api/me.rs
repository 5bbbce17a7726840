use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};

use crm_core::{JsonBody, ServiceError};

use crate::api::AppState;
use crate::model::{ChangePassword, Claims, Profile, UserSummary};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/me/profile", put(update_profile))
        .route("/me/password", put(change_password))
}

/// GET /auth/me: the caller with profile, role and onboarding state.
async fn me(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserSummary>, ServiceError> {
    Ok(Json(svc.get_user_summary(&claims.sub)?))
}

async fn update_profile(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(patch): JsonBody<serde_json::Value>,
) -> Result<Json<Profile>, ServiceError> {
    Ok(Json(svc.update_profile(&claims.sub, patch)?))
}

async fn change_password(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(body): JsonBody<ChangePassword>,
) -> Result<StatusCode, ServiceError> {
    svc.change_password(&claims.sub, &claims.sid, body)?;
    Ok(StatusCode::NO_CONTENT)
}
