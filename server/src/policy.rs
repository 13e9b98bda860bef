//! Route policy gate, run in front of every handler.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use platform_authn::SESSION_COOKIE;
use platform_authz::{Principal, RouteDecision};
use tracing::info;

use crate::http::{AppState, HttpError};

/// Session token from the `Authorization: Bearer` header, falling back to
/// the provider's session cookie.
pub fn session_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|text| text.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Resolves the principal, evaluates the policy table against the request
/// path and either redirects or hands the request on with the principal
/// attached.
pub async fn enforce(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let principal =
        session_token(request.headers(), &jar).and_then(|token| state.verifier.principal(&token));
    let role = principal.as_ref().and_then(|principal| principal.role);

    match state.policy.evaluate(request.uri().path(), role) {
        RouteDecision::Redirect(target) => {
            info!(
                path = request.uri().path(),
                role = role.map_or("none", |role| role.as_str()),
                %target,
                "route policy redirect"
            );
            return Redirect::temporary(&target).into_response();
        }
        RouteDecision::Allow | RouteDecision::PassThrough => {}
    }

    if let Some(principal) = principal {
        request.extensions_mut().insert(principal);
    }
    next.run(request).await
}

/// Principal attached by [`enforce`]. Rejects with 401 when the request
/// carried no valid session.
#[derive(Clone, Debug)]
pub struct Caller(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(Caller)
            .ok_or_else(HttpError::unauthenticated)
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Principal>().cloned().map(Caller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "from-cookie"));
        assert_eq!(session_token(&headers, &jar).as_deref(), Some("abc"));

        assert_eq!(
            session_token(&HeaderMap::new(), &jar).as_deref(),
            Some("from-cookie")
        );
    }

    #[test]
    fn empty_credentials_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(session_token(&headers, &CookieJar::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(session_token(&headers, &CookieJar::new()), None);
    }
}
