mod businesses;
mod contacts;
mod customers;
mod deals;
mod middleware;

use std::sync::Arc;

use axum::Router;

use crate::service::CrmService;

pub use middleware::require_onboarding;

/// Shared application state.
pub type AppState = Arc<CrmService>;

/// Build the complete CRM API router, mounted under `/crm`.
///
/// Every route needs a bearer access token and a finished onboarding.
pub fn build_router(svc: Arc<CrmService>) -> Router {
    let api = Router::new()
        .merge(businesses::routes())
        .merge(customers::routes())
        .merge(deals::routes())
        .merge(contacts::routes());

    // Layers run bottom-up: the token check before the onboarding gate.
    Router::new()
        .nest("/crm", api)
        .route_layer(axum::middleware::from_fn_with_state(
            svc.clone(),
            middleware::require_onboarding,
        ))
        .route_layer(axum::middleware::from_fn_with_state(
            svc.auth().clone(),
            auth::api::auth_middleware,
        ))
        .with_state(svc)
}
