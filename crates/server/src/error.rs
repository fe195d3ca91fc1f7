use axum::{
    Json,
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use services::services::{
    auth::AuthError,
    classes::ClassError,
    criteria::CriterionError,
    export::ExportError,
    notification::NotificationError,
    students::StudentError,
    uploads::UploadError,
    weights::WeightError,
};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Class(#[from] ClassError),
    #[error(transparent)]
    Student(#[from] StudentError),
    #[error(transparent)]
    Criterion(#[from] CriterionError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Json(#[from] JsonRejection),
    #[error(transparent)]
    Query(#[from] QueryRejection),
    #[error(transparent)]
    Path(#[from] PathRejection),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error("{0}")]
    BadRequest(String),
    #[error("Not authenticated")]
    Unauthorized,
    #[error("Access denied")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
}

/// Status for each failure; `None` marks an internal error whose details stay
/// in the logs.
fn classify(err: &ApiError) -> Option<StatusCode> {
    let status = match err {
        ApiError::Auth(e) => match e {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::Database(_) | AuthError::Hash(_) | AuthError::Join(_) | AuthError::Token(_) => {
                return None;
            }
        },
        ApiError::Class(e) => match e {
            ClassError::Validation(_) => StatusCode::BAD_REQUEST,
            ClassError::NotFound => StatusCode::NOT_FOUND,
            ClassError::Database(_) => return None,
        },
        ApiError::Student(e) => match e {
            StudentError::Validation(_) => StatusCode::BAD_REQUEST,
            StudentError::NotFound => StatusCode::NOT_FOUND,
            StudentError::RegistrationTaken(_) => StatusCode::CONFLICT,
            StudentError::Upload(upload) => return upload_status(upload),
            StudentError::Database(_) => return None,
        },
        ApiError::Criterion(e) => match e {
            CriterionError::Validation(_) | CriterionError::Weight(_) => StatusCode::BAD_REQUEST,
            CriterionError::ClassNotFound | CriterionError::NotFound => StatusCode::NOT_FOUND,
            CriterionError::Database(_) => return None,
        },
        ApiError::Notification(e) => match e {
            NotificationError::Validation(_) => StatusCode::BAD_REQUEST,
            NotificationError::NotFound => StatusCode::NOT_FOUND,
            NotificationError::Database(_) => return None,
        },
        ApiError::Upload(e) => return upload_status(e),
        ApiError::Export(_) | ApiError::Database(_) => return None,
        ApiError::Multipart(rejection) => rejection.status(),
        ApiError::Json(_) | ApiError::Query(_) | ApiError::Path(_) | ApiError::BadRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        ApiError::Forbidden => StatusCode::FORBIDDEN,
        ApiError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    Some(status)
}

fn upload_status(err: &UploadError) -> Option<StatusCode> {
    match err {
        UploadError::Missing | UploadError::NotAnImage => Some(StatusCode::BAD_REQUEST),
        UploadError::TooLarge => Some(StatusCode::PAYLOAD_TOO_LARGE),
        UploadError::Io(_) => None,
    }
}

impl ApiError {
    fn error_data(&self) -> Option<Value> {
        match self {
            ApiError::Criterion(CriterionError::Weight(WeightError::Exceeded {
                current_sum,
                available,
            })) => Some(json!({
                "current_sum": current_sum,
                "available": available,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let Some(status) = classify(&self) else {
            error!(error = %self, "Request failed");
            let body = ApiResponse::<(), Value>::error("Internal server error");
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
        };

        let message = match &self {
            ApiError::Json(rejection) => rejection.body_text(),
            ApiError::Query(rejection) => rejection.body_text(),
            ApiError::Path(rejection) => rejection.body_text(),
            ApiError::Multipart(rejection) => rejection.body_text(),
            other => other.to_string(),
        };
        let body = match self.error_data() {
            Some(data) => ApiResponse::<(), Value>::error_with_data(&message, data),
            None => ApiResponse::<(), Value>::error(&message),
        };
        (status, Json(body)).into_response()
    }
}
