use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use auth::model::Claims;
use crm_core::{JsonBody, ListParams, ListResult, QueryParams, ServiceError};

use crate::api::AppState;
use crate::model::{CreateContact, Contact, ContactFilters};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(list).post(create))
        .route("/contacts/{id}", get(get_one).put(update).delete(delete))
}

async fn list(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    QueryParams(filters): QueryParams<ContactFilters>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<ListResult<Contact>>, ServiceError> {
    Ok(Json(svc.list_contacts(&claims.sub, &filters, &params)?))
}

async fn create(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(body): JsonBody<CreateContact>,
) -> Result<(StatusCode, Json<Contact>), ServiceError> {
    let contact = svc.create_contact(&claims.sub, body)?;
    Ok((StatusCode::CREATED, Json(contact)))
}

async fn get_one(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Contact>, ServiceError> {
    Ok(Json(svc.get_contact(&claims.sub, &id)?))
}

async fn update(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<serde_json::Value>,
) -> Result<Json<Contact>, ServiceError> {
    Ok(Json(svc.update_contact(&claims.sub, &id, patch)?))
}

async fn delete(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    svc.delete_contact(&claims.sub, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
