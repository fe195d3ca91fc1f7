//! Routes for the caller's notifications.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use axum_extra::extract::WithRejection;
use db::models::notification::{CreateNotification, Notification};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{
    auth::SessionUser,
    notification::{NotificationPage, NotificationQuery, NotificationService},
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct NotificationResponse {
    pub notification: Notification,
}

/// GET /api/notifications
pub async fn list_notifications(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Query(query), _): WithRejection<Query<NotificationQuery>, ApiError>,
) -> Result<ResponseJson<ApiResponse<NotificationPage>>, ApiError> {
    let page = NotificationService::list(&deployment.db().pool, user.id, &query).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

/// POST /api/notifications
pub async fn create_notification(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateNotification>, ApiError>,
) -> Result<ResponseJson<ApiResponse<NotificationResponse>>, ApiError> {
    let notification =
        NotificationService::create(&deployment.db().pool, user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(NotificationResponse {
        notification,
    })))
}

/// GET /api/notifications/{id}
pub async fn get_notification(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<ResponseJson<ApiResponse<NotificationResponse>>, ApiError> {
    let notification = NotificationService::get(&deployment.db().pool, id, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(NotificationResponse {
        notification,
    })))
}

/// PATCH /api/notifications/{id}
/// Mark a notification as read
pub async fn mark_notification_read(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<ResponseJson<ApiResponse<NotificationResponse>>, ApiError> {
    let notification = NotificationService::mark_read(&deployment.db().pool, id, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(NotificationResponse {
        notification,
    })))
}

/// DELETE /api/notifications/{id}
pub async fn delete_notification(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    NotificationService::delete(&deployment.db().pool, id, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/notifications",
            get(list_notifications).post(create_notification),
        )
        .route(
            "/notifications/{id}",
            get(get_notification)
                .patch(mark_notification_read)
                .delete(delete_notification),
        )
}
