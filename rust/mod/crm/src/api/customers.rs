use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use auth::model::Claims;
use crm_core::{JsonBody, ListParams, ListResult, QueryParams, ServiceError};

use crate::api::AppState;
use crate::model::{CreateCustomer, Customer, CustomerFilters, ImportCustomers, ImportReport};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list).post(create))
        .route("/customers/import", post(import))
        .route("/customers/{id}", get(get_one).put(update).delete(delete))
}

async fn list(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    QueryParams(filters): QueryParams<CustomerFilters>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<ListResult<Customer>>, ServiceError> {
    Ok(Json(svc.list_customers(&claims.sub, &filters, &params)?))
}

async fn create(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(body): JsonBody<CreateCustomer>,
) -> Result<(StatusCode, Json<Customer>), ServiceError> {
    let customer = svc.create_customer(&claims.sub, body)?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// POST /crm/customers/import: per-row results, never all-or-nothing.
async fn import(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(body): JsonBody<ImportCustomers>,
) -> Result<Json<ImportReport>, ServiceError> {
    Ok(Json(svc.import_customers(&claims.sub, body)?))
}

async fn get_one(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Customer>, ServiceError> {
    Ok(Json(svc.get_customer(&claims.sub, &id)?))
}

async fn update(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<serde_json::Value>,
) -> Result<Json<Customer>, ServiceError> {
    Ok(Json(svc.update_customer(&claims.sub, &id, patch)?))
}

async fn delete(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    svc.delete_customer(&claims.sub, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
