use axum::{Extension, Router, extract::State, response::Json as ResponseJson, routing::get};
use deployment::Deployment;
use services::services::{
    auth::SessionUser,
    dashboard::{DashboardStats, stats_for},
};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

/// GET /api/dashboard/stats
pub async fn get_stats(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
) -> Result<ResponseJson<ApiResponse<DashboardStats>>, ApiError> {
    let stats = stats_for(&deployment.db().pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/dashboard/stats", get(get_stats))
}
