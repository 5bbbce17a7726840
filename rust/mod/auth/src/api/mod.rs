mod admin;
mod me;
mod middleware;
mod onboarding;
mod session;

use std::sync::Arc;

use axum::Router;

use crate::service::AuthService;

pub use middleware::{auth_middleware, bearer_token};

/// Shared application state.
pub type AppState = Arc<AuthService>;

/// Build the complete auth API router.
///
/// Routes are mounted under `/auth`; everything except sign-up, login and
/// token refresh requires a bearer access token.
pub fn build_router(svc: Arc<AuthService>) -> Router {
    let api = Router::new()
        .merge(session::routes())
        .merge(me::routes())
        .merge(onboarding::routes())
        .merge(admin::routes());

    Router::new()
        .nest("/auth", api)
        .route_layer(axum::middleware::from_fn_with_state(
            svc.clone(),
            middleware::auth_middleware,
        ))
        .with_state(svc)
}
