//! Form schemas rendered by the frontend.

use std::str::FromStr;

use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use axum_extra::extract::WithRejection;
use db::models::class::{Class, ClassFilter};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{
    auth::SessionUser,
    forms::{FormContext, FormResource, FormSchema, SelectOption},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct FormQuery {
    /// Class a criterion form is opened for; fills in the free weight.
    pub class_id: Option<Uuid>,
}

/// GET /api/forms/{resource}
pub async fn get_form(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<SessionUser>,
    WithRejection(Path(resource), _): WithRejection<Path<String>, ApiError>,
    WithRejection(Query(query), _): WithRejection<Query<FormQuery>, ApiError>,
) -> Result<ResponseJson<ApiResponse<FormSchema>>, ApiError> {
    let resource = FormResource::from_str(&resource)
        .map_err(|_| ApiError::NotFound(format!("Unknown form: {resource}")))?;
    let pool = &deployment.db().pool;

    let mut ctx = FormContext::default();
    match resource {
        FormResource::Student => {
            let classes = Class::find_owned_by_teacher(pool, user.id, &ClassFilter::default()).await?;
            ctx.classes = classes.iter().map(|c| SelectOption::from(&c.class)).collect();
        }
        FormResource::Criterion => {
            if let Some(class_id) = query.class_id {
                let criteria = deployment.criteria().list(pool, class_id, user.id).await?;
                ctx.available_weight = Some(criteria.available_weight);
            }
        }
        FormResource::Class | FormResource::Login | FormResource::Register => {}
    }

    Ok(ResponseJson(ApiResponse::success(FormSchema::for_resource(
        resource, &ctx,
    ))))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/forms/{resource}", get(get_form))
}
