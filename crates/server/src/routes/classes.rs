//! Routes for classes owned by the signed-in teacher.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::{Json as ResponseJson, Response},
    routing::get,
};
use axum_extra::extract::WithRejection;
use db::models::class::{Class, ClassFilter, ClassWithCounts, CreateClass, UpdateClass};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{
    auth::SessionUser,
    classes::{ClassDetail, ClassService},
    export::ExportService,
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use super::csv_response;
use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ClassListResponse {
    pub classes: Vec<ClassWithCounts>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ClassResponse {
    pub class: Class,
}

/// GET /api/classes
pub async fn list_classes(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Query(filter), _): WithRejection<Query<ClassFilter>, ApiError>,
) -> Result<ResponseJson<ApiResponse<ClassListResponse>>, ApiError> {
    let classes = ClassService::list(&deployment.db().pool, user.id, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(ClassListResponse { classes })))
}

/// POST /api/classes
pub async fn create_class(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateClass>, ApiError>,
) -> Result<ResponseJson<ApiResponse<ClassResponse>>, ApiError> {
    let class = ClassService::create(&deployment.db().pool, user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(ClassResponse { class })))
}

/// GET /api/classes/{id}
/// Class with its enrolled students and evaluation criteria
pub async fn get_class(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<ResponseJson<ApiResponse<ClassDetail>>, ApiError> {
    let detail = ClassService::get(&deployment.db().pool, id, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

/// PUT /api/classes/{id}
pub async fn update_class(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateClass>, ApiError>,
) -> Result<ResponseJson<ApiResponse<ClassResponse>>, ApiError> {
    let class = ClassService::update(&deployment.db().pool, id, user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(ClassResponse { class })))
}

/// DELETE /api/classes/{id}
pub async fn delete_class(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ClassService::delete(&deployment.db().pool, id, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// GET /api/classes/export
pub async fn export_classes(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
) -> Result<Response, ApiError> {
    let export = ExportService::classes(&deployment.db().pool, user.id).await?;
    Ok(csv_response(export))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/classes", get(list_classes).post(create_class))
        .route("/classes/export", get(export_classes))
        .route(
            "/classes/{id}",
            get(get_class).put(update_class).delete(delete_class),
        )
}
