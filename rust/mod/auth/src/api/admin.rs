use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crm_core::{JsonBody, ListParams, ListResult, QueryParams, ServiceError};

use crate::api::AppState;
use crate::model::{Claims, CreateUser, DeleteUserReport, UpdateUser, UserSummary};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users).post(create_user))
        .route(
            "/admin/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

async fn list_users(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<ListResult<UserSummary>>, ServiceError> {
    Ok(Json(svc.admin_list_users(&claims.sub, &params)?))
}

async fn create_user(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(body): JsonBody<CreateUser>,
) -> Result<(StatusCode, Json<UserSummary>), ServiceError> {
    let user = svc.admin_create_user(&claims.sub, body)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<UserSummary>, ServiceError> {
    Ok(Json(svc.admin_get_user(&claims.sub, &id)?))
}

async fn update_user(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateUser>,
) -> Result<Json<UserSummary>, ServiceError> {
    Ok(Json(svc.admin_update_user(&claims.sub, &id, body)?))
}

/// DELETE /auth/admin/users/{id}: cascading delete with a per-table report.
async fn delete_user(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<DeleteUserReport>, ServiceError> {
    Ok(Json(svc.delete_user(&claims.sub, &id)?))
}
