use axum::{
    extract::{FromRef, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    routing::get,
    Form, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginForm, SignupForm},
        extractors::MaybeUser,
        password::{hash_password, verify_password},
        repo::User,
        session::{self, SessionKeys},
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/signup", get(signup_form).post(signup))
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout))
}

fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9._-]{3,32}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

/// Logged-in callers land on their recipe list, everyone else on login.
pub async fn home(MaybeUser(user): MaybeUser) -> Redirect {
    if user.is_some() {
        Redirect::to("/recipes")
    } else {
        Redirect::to("/login")
    }
}

/// The signup page itself is rendered by the frontend.
pub async fn signup_form() -> StatusCode {
    StatusCode::OK
}

/// The login page itself is rendered by the frontend.
pub async fn login_form() -> StatusCode {
    StatusCode::OK
}

#[instrument(skip(state, form))]
pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> AppResult<Redirect> {
    if !is_valid_username(&form.username) {
        warn!(username = %form.username, "invalid username");
        return Err(AppError::Validation(
            "Username must be 3-32 characters of letters, digits, '.', '_' or '-'".into(),
        ));
    }
    if form.password.len() < 8 {
        warn!("password too short");
        return Err(AppError::Validation("Password too short".into()));
    }

    let hash = hash_password(&form.password)?;
    let user = User::create(&state.db, &form.username, &hash).await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(Redirect::to("/login"))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<impl IntoResponse> {
    // Absent username and wrong password collapse into one failure so the
    // response never confirms which usernames exist.
    let user = match User::find_by_username(&state.db, &form.username).await? {
        Some(u) => u,
        None => {
            warn!("login for unknown username");
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_password(&form.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let keys = SessionKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok((
        [(header::SET_COOKIE, keys.cookie(&token))],
        Redirect::to("/recipes"),
    ))
}

#[instrument(skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let keys = SessionKeys::from_ref(&state);

    // Denylist the token's id so a replay of the same cookie stays dead.
    if let Some(token) = session::token_from_headers(&headers, &keys.cookie_name) {
        if let Ok(claims) = keys.verify(token) {
            session::revoke(&state.db, &claims).await?;
            info!(user_id = %claims.sub, "user logged out");
        }
    }

    Ok((
        [(header::SET_COOKIE, keys.clear_cookie())],
        Redirect::to("/"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("a.b_c-d1"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username(&"x".repeat(33)));
    }
}
