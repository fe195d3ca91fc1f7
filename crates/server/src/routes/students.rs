//! Routes for students visible to the signed-in teacher.

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    response::{Json as ResponseJson, Response},
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use db::models::student::{
    CreateStudent, Student, StudentFilter, StudentWithClasses, UpdateStudent,
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{
    auth::SessionUser,
    export::ExportService,
    students::{StudentDetail, StudentService},
    uploads::{MAX_PHOTO_BYTES, PhotoUpload, UploadError},
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use super::csv_response;
use crate::{DeploymentImpl, error::ApiError};

/// Room for the multipart framing around the photo itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct StudentListResponse {
    pub students: Vec<StudentWithClasses>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct StudentResponse {
    pub student: Student,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PhotoResponse {
    pub url: String,
}

/// GET /api/students
pub async fn list_students(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Query(filter), _): WithRejection<Query<StudentFilter>, ApiError>,
) -> Result<ResponseJson<ApiResponse<StudentListResponse>>, ApiError> {
    let students = StudentService::list(&deployment.db().pool, user.id, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(StudentListResponse {
        students,
    })))
}

/// POST /api/students
pub async fn create_student(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateStudent>, ApiError>,
) -> Result<ResponseJson<ApiResponse<StudentResponse>>, ApiError> {
    let student = StudentService::create(&deployment.db().pool, user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(StudentResponse { student })))
}

/// GET /api/students/{id}
pub async fn get_student(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<ResponseJson<ApiResponse<StudentDetail>>, ApiError> {
    let detail = StudentService::get(&deployment.db().pool, id, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

/// PUT /api/students/{id}
pub async fn update_student(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateStudent>, ApiError>,
) -> Result<ResponseJson<ApiResponse<StudentResponse>>, ApiError> {
    let student = StudentService::update(&deployment.db().pool, id, user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(StudentResponse { student })))
}

/// DELETE /api/students/{id}
pub async fn delete_student(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    StudentService::delete(&deployment.db().pool, id, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/students/{id}/photo
/// Store a profile photo sent as the multipart field `file`
pub async fn upload_photo(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    mut multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<PhotoResponse>>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("photo").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        upload = Some(PhotoUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }
    let upload = upload.ok_or(UploadError::Missing)?;

    let url = StudentService::set_photo(
        &deployment.db().pool,
        deployment.photos(),
        id,
        user.id,
        upload,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(PhotoResponse { url })))
}

/// GET /api/students/export
pub async fn export_students(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Query(filter), _): WithRejection<Query<StudentFilter>, ApiError>,
) -> Result<Response, ApiError> {
    let export = ExportService::students(&deployment.db().pool, user.id, &filter).await?;
    Ok(csv_response(export))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/students", get(list_students).post(create_student))
        .route("/students/export", get(export_students))
        .route(
            "/students/{id}",
            get(get_student).put(update_student).delete(delete_student),
        )
        .route(
            "/students/{id}/photo",
            post(upload_photo).layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES + MULTIPART_OVERHEAD)),
        )
}
