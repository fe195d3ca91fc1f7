//! Routes for sessions and user accounts.

use axum::{
    Extension, Json, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use axum_extra::extract::{WithRejection, cookie::CookieJar};
use db::models::user::CreateUser;
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::auth::{LoginRequest, SessionUser};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::session::{expired_session_cookie, session_cookie},
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UserResponse {
    pub user: SessionUser,
}

/// POST /api/auth/login
pub async fn login(
    State(deployment): State<DeploymentImpl>,
    jar: CookieJar,
    WithRejection(Json(payload), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<(CookieJar, ResponseJson<ApiResponse<UserResponse>>), ApiError> {
    let (user, token) = deployment
        .auth()
        .login(&deployment.db().pool, &payload)
        .await?;
    let jar = jar.add(session_cookie(token, deployment.config().production));
    Ok((jar, ResponseJson(ApiResponse::success(UserResponse { user }))))
}

/// POST /api/auth/logout
pub async fn logout(jar: CookieJar) -> (CookieJar, ResponseJson<ApiResponse<()>>) {
    (
        jar.remove(expired_session_cookie()),
        ResponseJson(ApiResponse::success(())),
    )
}

/// GET /api/auth/me
pub async fn me(
    Extension(user): Extension<SessionUser>,
) -> ResponseJson<ApiResponse<UserResponse>> {
    ResponseJson(ApiResponse::success(UserResponse { user }))
}

/// POST /api/auth/register
/// Create an account; administrators only
pub async fn register(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<SessionUser>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateUser>, ApiError>,
) -> Result<ResponseJson<ApiResponse<UserResponse>>, ApiError> {
    if !caller.is_admin() {
        return Err(ApiError::Forbidden);
    }
    let user = deployment
        .auth()
        .register(&deployment.db().pool, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(UserResponse { user })))
}

/// Routes reachable without a session.
pub fn public_router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/register", post(register))
}
