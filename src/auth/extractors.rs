use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::Redirect,
};
use std::convert::Infallible;
use tracing::{debug, warn};

use crate::auth::session::{self, SessionKeys};
use crate::state::AppState;

/// Caller identity for protected routes.
///
/// Resolves the session cookie once; handlers receive the user id as a value
/// and never look at raw request state themselves. An anonymous request is
/// answered with a 303 redirect to the login page instead of an error body.
pub struct AuthUser(pub i64);

/// Caller identity for routes that only branch on logged-in state.
pub struct MaybeUser(pub Option<i64>);

async fn resolve(parts: &Parts, state: &AppState) -> Option<i64> {
    let keys = SessionKeys::from_ref(state);
    let token = session::token_from_headers(&parts.headers, &keys.cookie_name)?;
    let claims = match keys.verify(token) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "session cookie rejected");
            return None;
        }
    };
    match session::is_revoked(&state.db, claims.jti).await {
        Ok(false) => Some(claims.sub),
        Ok(true) => {
            debug!(jti = %claims.jti, "replayed revoked session");
            None
        }
        Err(e) => {
            // Failing open here would let a logged-out token through.
            warn!(error = %e, "revocation lookup failed");
            None
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve(parts, state)
            .await
            .map(AuthUser)
            .ok_or_else(|| Redirect::to("/login"))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve(parts, state).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, Request, StatusCode};
    use axum::response::IntoResponse;

    fn parts_with_cookie(cookie: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/recipes");
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[tokio::test]
    async fn anonymous_request_redirects_to_login() {
        let state = AppState::fake();
        let mut parts = parts_with_cookie(None);
        let rejection = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("no session must be rejected");
        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn tampered_cookie_redirects_to_login() {
        let state = AppState::fake();
        let mut parts =
            parts_with_cookie(Some("recipebook_session=not.a.real.token"));
        assert!(AuthUser::from_request_parts(&mut parts, &state)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn maybe_user_is_none_for_anonymous() {
        let state = AppState::fake();
        let mut parts = parts_with_cookie(None);
        let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn maybe_user_is_none_for_garbage_cookie() {
        let state = AppState::fake();
        let mut parts = parts_with_cookie(Some("recipebook_session=garbage"));
        let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(user.is_none());
    }
}
