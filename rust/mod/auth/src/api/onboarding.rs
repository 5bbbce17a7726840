use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crm_core::{JsonBody, ServiceError};

use crate::api::AppState;
use crate::model::{Claims, Onboarding, SubmitOnboarding};

pub fn routes() -> Router<AppState> {
    Router::new().route("/onboarding", get(get_onboarding).post(submit_onboarding))
}

async fn get_onboarding(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Onboarding>, ServiceError> {
    Ok(Json(svc.get_onboarding(&claims.sub)?))
}

async fn submit_onboarding(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(body): JsonBody<SubmitOnboarding>,
) -> Result<(StatusCode, Json<Onboarding>), ServiceError> {
    let record = svc.submit_onboarding(&claims.sub, body)?;
    Ok((StatusCode::CREATED, Json(record)))
}
