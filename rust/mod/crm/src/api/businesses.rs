use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};

use auth::model::Claims;
use crm_core::{JsonBody, ListParams, ListResult, QueryParams, ServiceError};

use crate::api::AppState;
use crate::model::{AddMember, BusinessSummary, BusinessView, CreateBusiness, Member, UpdateMember};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/businesses", get(list).post(create))
        .route("/businesses/{id}", get(get_one).put(update).delete(delete))
        .route("/businesses/{id}/summary", get(summary))
        .route("/businesses/{id}/members", get(list_members).post(add_member))
        .route(
            "/businesses/{id}/members/{user_id}",
            put(update_member).delete(remove_member),
        )
}

async fn list(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<ListResult<BusinessView>>, ServiceError> {
    Ok(Json(svc.list_businesses(&claims.sub, &params)?))
}

async fn create(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(body): JsonBody<CreateBusiness>,
) -> Result<(StatusCode, Json<BusinessView>), ServiceError> {
    let business = svc.create_business(&claims.sub, body)?;
    Ok((StatusCode::CREATED, Json(business)))
}

async fn get_one(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<BusinessView>, ServiceError> {
    Ok(Json(svc.get_business(&claims.sub, &id)?))
}

async fn update(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<serde_json::Value>,
) -> Result<Json<BusinessView>, ServiceError> {
    Ok(Json(svc.update_business(&claims.sub, &id, patch)?))
}

async fn delete(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    svc.delete_business(&claims.sub, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn summary(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<BusinessSummary>, ServiceError> {
    Ok(Json(svc.business_summary(&claims.sub, &id)?))
}

async fn list_members(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Member>>, ServiceError> {
    Ok(Json(svc.list_members(&claims.sub, &id)?))
}

async fn add_member(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<AddMember>,
) -> Result<(StatusCode, Json<Member>), ServiceError> {
    let member = svc.add_member(&claims.sub, &id, body)?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn update_member(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, user_id)): Path<(String, String)>,
    JsonBody(body): JsonBody<UpdateMember>,
) -> Result<Json<Member>, ServiceError> {
    Ok(Json(svc.update_member(&claims.sub, &id, &user_id, body)?))
}

async fn remove_member(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, user_id)): Path<(String, String)>,
) -> Result<StatusCode, ServiceError> {
    svc.remove_member(&claims.sub, &id, &user_id)?;
    Ok(StatusCode::NO_CONTENT)
}
