use axum::extract::FromRef;
use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::state::AppState;

/// Signed payload carried in the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: i64,
    pub jti: Uuid,
    pub iat: usize,
    pub exp: usize,
}

/// Signing and verification keys for session tokens, derived once per use
/// from the process-wide secret in config.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub cookie_name: String,
    pub ttl: TimeDuration,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        let SessionConfig {
            secret,
            cookie_name,
            ttl_minutes,
        } = state.config.session.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            cookie_name,
            ttl: TimeDuration::minutes(ttl_minutes),
        }
    }
}

impl SessionKeys {
    /// Issues a new session token bound to `user_id`.
    pub fn sign(&self, user_id: i64) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + self.ttl;
        let claims = SessionClaims {
            sub: user_id,
            jti: Uuid::new_v4(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, jti = %claims.jti, "session signed");
        Ok(token)
    }

    /// Validates signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }

    pub fn cookie(&self, token: &str) -> String {
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            self.cookie_name,
            token,
            self.ttl.whole_seconds()
        )
    }

    pub fn clear_cookie(&self) -> String {
        format!(
            "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
            self.cookie_name
        )
    }
}

/// Pulls the session token out of the Cookie header(s), if present.
pub fn token_from_headers<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == cookie_name {
                Some(val)
            } else {
                None
            }
        })
}

/// Records a logout. The cookie itself stays valid until `exp`, so the jti
/// goes on a denylist that the resolving extractors consult.
pub async fn revoke(db: &PgPool, claims: &SessionClaims) -> anyhow::Result<()> {
    let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp as i64)?;
    sqlx::query(
        r#"
        INSERT INTO revoked_sessions (jti, expires_at)
        VALUES ($1, $2)
        ON CONFLICT (jti) DO NOTHING
        "#,
    )
    .bind(claims.jti)
    .bind(expires_at)
    .execute(db)
    .await?;
    debug!(jti = %claims.jti, "session revoked");
    Ok(())
}

pub async fn is_revoked(db: &PgPool, jti: Uuid) -> anyhow::Result<bool> {
    let hit = sqlx::query_scalar::<_, i32>(r#"SELECT 1 FROM revoked_sessions WHERE jti = $1"#)
        .bind(jti)
        .fetch_optional(db)
        .await?;
    Ok(hit.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn make_keys() -> SessionKeys {
        let state = AppState::fake();
        SessionKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_roundtrip() {
        let keys = make_keys();
        let token = keys.sign(42).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, 42);
    }

    #[tokio::test]
    async fn each_token_gets_a_fresh_jti() {
        let keys = make_keys();
        let a = keys.verify(&keys.sign(1).unwrap()).unwrap();
        let b = keys.verify(&keys.sign(1).unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[tokio::test]
    async fn verify_rejects_tampered_token() {
        let keys = make_keys();
        let mut token = keys.sign(7).unwrap();
        // flip a payload character
        let mid = token.len() / 2;
        let replacement = if token.as_bytes()[mid] == b'A' { "B" } else { "A" };
        token.replace_range(mid..mid + 1, replacement);
        assert!(keys.verify(&token).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_token_signed_with_other_secret() {
        let keys = make_keys();
        let other = EncodingKey::from_secret(b"some-other-secret");
        let now = OffsetDateTime::now_utc();
        let claims = SessionClaims {
            sub: 9,
            jti: Uuid::new_v4(),
            iat: now.unix_timestamp() as usize,
            exp: (now + TimeDuration::minutes(5)).unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &other).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc();
        let claims = SessionClaims {
            sub: 3,
            jti: Uuid::new_v4(),
            iat: (now - TimeDuration::minutes(10)).unix_timestamp() as usize,
            exp: (now - TimeDuration::minutes(5)).unix_timestamp() as usize,
        };
        let state = AppState::fake();
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(state.config.session.secret.as_bytes()),
        )
        .unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[tokio::test]
    async fn cookie_carries_token_and_attributes() {
        let keys = make_keys();
        let cookie = keys.cookie("tok123");
        assert!(cookie.starts_with("recipebook_session=tok123;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=300"));
    }

    #[tokio::test]
    async fn clear_cookie_zeroes_max_age() {
        let keys = make_keys();
        let cookie = keys.clear_cookie();
        assert!(cookie.starts_with("recipebook_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn token_from_headers_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; recipebook_session=abc; other=1"),
        );
        assert_eq!(
            token_from_headers(&headers, "recipebook_session"),
            Some("abc")
        );
    }

    #[test]
    fn token_from_headers_none_when_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(token_from_headers(&headers, "recipebook_session"), None);
        assert_eq!(token_from_headers(&HeaderMap::new(), "recipebook_session"), None);
    }
}
