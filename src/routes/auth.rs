// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google sign-in and session routes.

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::{
    create_jwt, redirect_if_authenticated, with_session_cookies, without_session_cookies,
};
use crate::services::OidcError;
use crate::AppState;

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let login = Router::new()
        .route("/auth/login", get(sign_in_config))
        .route_layer(middleware::from_fn_with_state(
            state,
            redirect_if_authenticated,
        ));

    Router::new()
        .route("/auth/google", post(google_sign_in))
        .route("/auth/logout", post(logout))
        .merge(login)
}

/// Sign-in page configuration for visitors without a session.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SignInConfig {
    pub google_client_id: String,
    pub sign_in_path: String,
}

async fn sign_in_config(State(state): State<Arc<AppState>>) -> Json<SignInConfig> {
    Json(SignInConfig {
        google_client_id: state.config.google_client_id.clone(),
        sign_in_path: "/auth/google".to_string(),
    })
}

#[derive(Deserialize)]
pub struct GoogleSignInRequest {
    /// ID token returned by the Google sign-in popup
    pub id_token: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SignInResponse {
    pub user_id: String,
    pub name: Option<String>,
    pub token: String,
}

/// Exchange a Google ID token for a session.
async fn google_sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<GoogleSignInRequest>,
) -> Result<(CookieJar, Json<SignInResponse>)> {
    let identity = state
        .google_oidc_verifier
        .verify_id_token(&body.id_token)
        .await
        .map_err(|e| match e {
            OidcError::Rejected(reason) => {
                tracing::warn!(reason = %reason, "Rejected Google ID token");
                AppError::InvalidToken
            }
            OidcError::Transient(reason) => {
                AppError::Internal(anyhow::anyhow!("Google sign-in unavailable: {}", reason))
            }
        })?;

    let token = create_jwt(&identity.subject, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    tracing::info!(user_id = %identity.subject, "Signed in with Google");

    let jar = with_session_cookies(jar, &token, &state.config.frontend_url);
    Ok((
        jar,
        Json(SignInResponse {
            user_id: identity.subject,
            name: identity.name,
            token,
        }),
    ))
}

/// End the session by expiring both session cookies.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    (
        without_session_cookies(jar, &state.config.frontend_url),
        StatusCode::NO_CONTENT,
    )
}
