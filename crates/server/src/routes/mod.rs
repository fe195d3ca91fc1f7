use axum::{
    Router,
    http::header,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
};
use deployment::Deployment;
use services::services::export::CsvExport;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::{page_gate, require_session},
};

pub mod auth;
pub mod classes;
pub mod criteria;
pub mod dashboard;
pub mod forms;
pub mod notifications;
pub mod students;

pub fn router(deployment: DeploymentImpl) -> Router {
    let protected = Router::new()
        .merge(auth::router(&deployment))
        .merge(classes::router(&deployment))
        .merge(students::router(&deployment))
        .merge(criteria::router(&deployment))
        .merge(notifications::router(&deployment))
        .merge(dashboard::router(&deployment))
        .merge(forms::router(&deployment))
        .route_layer(from_fn_with_state(deployment.clone(), require_session));

    let api = Router::new()
        .merge(auth::public_router(&deployment))
        .merge(protected)
        .fallback(api_not_found);

    let static_dir = deployment.config().static_dir.clone();
    let upload_dir = deployment.config().upload_dir.clone();
    let pages = ServeDir::new(&static_dir)
        .append_index_html_on_directories(true)
        .fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .fallback_service(pages)
        .layer(from_fn_with_state(deployment.clone(), page_gate))
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}

async fn api_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

pub(crate) fn csv_response(export: CsvExport) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        export.body,
    )
        .into_response()
}
