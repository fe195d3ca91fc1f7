//! Redirects for the HTML pages served next to the API.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use deployment::Deployment;
use services::services::auth::SESSION_COOKIE;

use super::session::expired_session_cookie;
use crate::DeploymentImpl;

const PROTECTED_PAGES: [&str; 6] = [
    "/dashboard",
    "/students",
    "/classes",
    "/criteria",
    "/notifications",
    "/admin",
];
const ADMIN_PAGES: [&str; 1] = ["/admin"];
const LOGIN_PAGE: &str = "/login";
const HOME_PAGE: &str = "/dashboard";

fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('.'))
}

fn login_redirect(path: &str) -> String {
    let target: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
    format!("{LOGIN_PAGE}?redirect={target}")
}

/// Guards page routes by session cookie. API and asset paths pass through
/// untouched; the API does its own checks.
pub async fn page_gate(
    State(deployment): State<DeploymentImpl>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let user = token
        .as_deref()
        .and_then(|token| deployment.auth().verify_token(token));

    if under(&path, LOGIN_PAGE) && user.is_some() {
        return Redirect::to(HOME_PAGE).into_response();
    }

    if PROTECTED_PAGES.iter().any(|prefix| under(&path, prefix)) {
        let Some(user) = user else {
            let redirect = Redirect::to(&login_redirect(&path));
            return match token {
                Some(_) => (jar.remove(expired_session_cookie()), redirect).into_response(),
                None => redirect.into_response(),
            };
        };
        if ADMIN_PAGES.iter().any(|prefix| under(&path, prefix)) && !user.is_admin() {
            return Redirect::to(HOME_PAGE).into_response();
        }
    }

    next.run(request).await
}
