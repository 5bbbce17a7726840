use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use auth::model::Claims;
use crm_core::{JsonBody, ListParams, ListResult, QueryParams, ServiceError};

use crate::api::AppState;
use crate::model::{CreateDeal, Deal, DealFilters};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/deals", get(list).post(create))
        .route("/deals/{id}", get(get_one).put(update).delete(delete))
}

async fn list(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    QueryParams(filters): QueryParams<DealFilters>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<ListResult<Deal>>, ServiceError> {
    Ok(Json(svc.list_deals(&claims.sub, &filters, &params)?))
}

async fn create(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(body): JsonBody<CreateDeal>,
) -> Result<(StatusCode, Json<Deal>), ServiceError> {
    let deal = svc.create_deal(&claims.sub, body)?;
    Ok((StatusCode::CREATED, Json(deal)))
}

async fn get_one(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Deal>, ServiceError> {
    Ok(Json(svc.get_deal(&claims.sub, &id)?))
}

async fn update(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<serde_json::Value>,
) -> Result<Json<Deal>, ServiceError> {
    Ok(Json(svc.update_deal(&claims.sub, &id, patch)?))
}

async fn delete(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    svc.delete_deal(&claims.sub, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
