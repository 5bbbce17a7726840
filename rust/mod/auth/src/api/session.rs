use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use crm_core::{JsonBody, ServiceError};

use crate::api::AppState;
use crate::model::{Claims, RefreshRequest, SignIn, SignUp, TokenPair, User};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/token/refresh", post(refresh))
        .route("/logout", post(logout))
}

#[derive(Serialize)]
struct SignUpResponse {
    user: User,
    tokens: TokenPair,
}

/// POST /auth/signup: register and sign in at once.
async fn signup(
    State(svc): State<AppState>,
    JsonBody(body): JsonBody<SignUp>,
) -> Result<(StatusCode, Json<SignUpResponse>), ServiceError> {
    let user = svc.sign_up(body)?;
    let tokens = svc.issue_tokens(&user)?;
    Ok((StatusCode::CREATED, Json(SignUpResponse { user, tokens })))
}

/// POST /auth/login
async fn login(
    State(svc): State<AppState>,
    JsonBody(body): JsonBody<SignIn>,
) -> Result<Json<TokenPair>, ServiceError> {
    Ok(Json(svc.sign_in(body)?))
}

/// POST /auth/token/refresh
async fn refresh(
    State(svc): State<AppState>,
    JsonBody(body): JsonBody<RefreshRequest>,
) -> Result<Json<TokenPair>, ServiceError> {
    Ok(Json(svc.refresh_tokens(&body.refresh_token)?))
}

/// POST /auth/logout: revoke the session behind the presented token.
async fn logout(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ServiceError> {
    svc.revoke_session(&claims.sid)?;
    tracing::info!(user_id = %claims.sub, "signed out");
    Ok(StatusCode::NO_CONTENT)
}
