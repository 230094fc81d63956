// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session authentication middleware and session cookies.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// HttpOnly cookie carrying the session JWT.
pub const SESSION_COOKIE: &str = "racetrack_token";
/// Script-readable marker telling the frontend a session exists.
pub const LOGGED_IN_COOKIE: &str = "racetrack_logged_in";

const SESSION_DAYS: i64 = 30;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (identity-provider user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Session token from the cookie, or else from a `Bearer` header.
fn session_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Decode and check a session token.
pub fn verify_session(token: &str, signing_key: &[u8]) -> Option<AuthUser> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(token, &key, &validation).ok()?;
    if token_data.claims.sub.is_empty() {
        return None;
    }

    Some(AuthUser {
        user_id: token_data.claims.sub,
    })
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = session_token(&jar, request.headers()).ok_or(StatusCode::UNAUTHORIZED)?;
    let auth_user =
        verify_session(&token, &state.config.jwt_signing_key).ok_or(StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Guard for the sign-in page: visitors who already hold a valid session
/// are sent to the frontend instead.
pub async fn redirect_if_authenticated(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let signed_in = session_token(&jar, request.headers())
        .and_then(|token| verify_session(&token, &state.config.jwt_signing_key));

    if let Some(user) = signed_in {
        tracing::debug!(user_id = %user.user_id, "Already signed in, redirecting");
        return Redirect::temporary(&state.config.frontend_url).into_response();
    }

    next.run(request).await
}

/// Create a JWT for a user session.
pub fn create_jwt(user_id: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + (SESSION_DAYS as usize) * 24 * 60 * 60,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Session cookies are `Secure` whenever the frontend is served over HTTPS.
fn secure_cookies(frontend_url: &str) -> bool {
    frontend_url.starts_with("https://")
}

fn session_cookie(value: String, frontend_url: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure_cookies(frontend_url))
        .max_age(time::Duration::days(SESSION_DAYS))
        .build()
}

fn logged_in_cookie(value: String, frontend_url: &str) -> Cookie<'static> {
    Cookie::build((LOGGED_IN_COOKIE, value))
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure_cookies(frontend_url))
        .max_age(time::Duration::days(SESSION_DAYS))
        .build()
}

/// Add both session cookies for a fresh session token.
pub fn with_session_cookies(jar: CookieJar, token: &str, frontend_url: &str) -> CookieJar {
    jar.add(session_cookie(token.to_string(), frontend_url))
        .add(logged_in_cookie("1".to_string(), frontend_url))
}

/// Expire both session cookies, whether or not the request carried them.
/// Removal cookies carry the same attributes as the ones set at sign-in so
/// that browsers match and drop them.
pub fn without_session_cookies(jar: CookieJar, frontend_url: &str) -> CookieJar {
    let mut session = session_cookie(String::new(), frontend_url);
    session.make_removal();
    let mut logged_in = logged_in_cookie(String::new(), frontend_url);
    logged_in.make_removal();

    jar.add(session).add(logged_in)
}
