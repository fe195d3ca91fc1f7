//! Session cookie handling for the JSON API.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    extract::cookie::{Cookie, CookieJar, SameSite},
    headers::{Authorization, HeaderMapExt, authorization::Bearer},
};
use deployment::Deployment;
use services::services::auth::{SESSION_COOKIE, SESSION_TTL_HOURS, SessionUser};

use crate::{DeploymentImpl, error::ApiError};

/// Raw session token of the request: the `auth-token` cookie, or a bearer
/// token for non-browser clients.
pub fn session_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::hours(SESSION_TTL_HOURS))
        .build()
}

/// Cookie matching [`session_cookie`]'s path, for removal from a jar.
pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// Rejects the request with 401 unless it carries a valid session; the
/// caller is then available to handlers as `Extension<SessionUser>`.
pub async fn require_session(
    State(deployment): State<DeploymentImpl>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user: SessionUser = session_token(&jar, request.headers())
        .and_then(|token| deployment.auth().verify_token(&token))
        .ok_or(ApiError::Unauthorized)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
