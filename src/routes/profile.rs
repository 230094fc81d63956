// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Racer profile routes.

use axum::{extract::State, routing::get, Extension, Json, Router};
use std::sync::Arc;
use validator::Validate;

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::User;
use crate::services::settle_document;
use crate::AppState;

/// Profile routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/profile", get(get_profile).put(save_profile))
}

/// The caller's own profile.
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<User>> {
    let profile = settle_document(
        state.db.get_user(&user.user_id),
        state.config.not_found_grace,
        "profile",
    )
    .await?;

    Ok(Json(profile))
}

/// Create or update the caller's profile.
async fn save_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(mut profile): Json<User>,
) -> Result<Json<User>> {
    profile.full_name = profile.full_name.trim().to_string();
    profile.validate()?;

    state.db.upsert_user(&user.user_id, &profile).await?;
    Ok(Json(profile))
}
