//! Routes for weighted evaluation criteria.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use axum_extra::extract::WithRejection;
use db::models::criterion::{CreateCriterion, Criterion, UpdateCriterion};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{auth::SessionUser, criteria::ClassCriteria};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CriterionResponse {
    pub criterion: Criterion,
}

/// GET /api/classes/{id}/criteria
/// Criteria of a class with its used and free weight
pub async fn list_criteria(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(class_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<ResponseJson<ApiResponse<ClassCriteria>>, ApiError> {
    let criteria = deployment
        .criteria()
        .list(&deployment.db().pool, class_id, user.id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(criteria)))
}

/// POST /api/classes/{id}/criteria
pub async fn create_criterion(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(class_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateCriterion>, ApiError>,
) -> Result<ResponseJson<ApiResponse<CriterionResponse>>, ApiError> {
    let criterion = deployment
        .criteria()
        .create(&deployment.db().pool, class_id, user.id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(CriterionResponse {
        criterion,
    })))
}

/// GET /api/criteria/{id}
pub async fn get_criterion(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<ResponseJson<ApiResponse<CriterionResponse>>, ApiError> {
    let criterion = deployment
        .criteria()
        .get(&deployment.db().pool, id, user.id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(CriterionResponse {
        criterion,
    })))
}

/// PUT /api/criteria/{id}
pub async fn update_criterion(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateCriterion>, ApiError>,
) -> Result<ResponseJson<ApiResponse<CriterionResponse>>, ApiError> {
    let criterion = deployment
        .criteria()
        .update(&deployment.db().pool, id, user.id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(CriterionResponse {
        criterion,
    })))
}

/// DELETE /api/criteria/{id}
pub async fn delete_criterion(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment
        .criteria()
        .delete(&deployment.db().pool, id, user.id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    // `{id}` is the class here; the segment name has to match `/classes/{id}`.
    Router::new()
        .route(
            "/classes/{id}/criteria",
            get(list_criteria).post(create_criterion),
        )
        .route(
            "/criteria/{id}",
            get(get_criterion)
                .put(update_criterion)
                .delete(delete_criterion),
        )
}
