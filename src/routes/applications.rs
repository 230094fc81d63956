// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration routes: apply, change, cancel, and the caller's races.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::applied::ApplicationResponse;
use crate::models::{Applied, ApplyForm, Discipline, Race, ShirtSize};
use crate::routes::races::load_race;
use crate::services::ranking::status_of;
use crate::services::FinishStatus;
use crate::time_utils::{format_elapsed, format_race_date, format_utc_rfc3339};
use crate::AppState;

/// Registration routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/races/{race_id}/application",
            get(get_application)
                .post(apply)
                .put(update_application)
                .delete(cancel_application),
        )
        .route("/api/me/races", get(my_races))
}

async fn current_application(state: &AppState, race_id: &str, user_id: &str) -> Result<Applied> {
    state
        .db
        .find_application(race_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("registration".to_string()))
}

/// The caller's registration for a race, or `null` when not registered.
async fn get_application(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(race_id): Path<String>,
) -> Result<Json<Option<ApplicationResponse>>> {
    let applied = state.db.find_application(&race_id, &user.user_id).await?;
    Ok(Json(applied.as_ref().map(ApplicationResponse::from)))
}

/// Register the caller for a discipline.
async fn apply(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(race_id): Path<String>,
    Json(form): Json<ApplyForm>,
) -> Result<(StatusCode, Json<ApplicationResponse>)> {
    form.validate()?;

    let applied = state
        .db
        .apply_for_race(&race_id, &user.user_id, &form, chrono::Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(ApplicationResponse::from(&applied))))
}

/// Change the caller's registration.
///
/// Club and shirt size are patched in place; a different discipline moves
/// the registration.
async fn update_application(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(race_id): Path<String>,
    Json(form): Json<ApplyForm>,
) -> Result<Json<ApplicationResponse>> {
    form.validate()?;
    let now = chrono::Utc::now();

    let current = current_application(&state, &race_id, &user.user_id).await?;

    let applied = if current.discipline_id == form.discipline {
        let race = load_race(&state, &race_id).await?;
        if !race.is_applying_open(now) {
            return Err(AppError::BadRequest(
                "Registration for this race is closed".to_string(),
            ));
        }

        let updated = Applied {
            club: form.club(),
            shirt_size: form.shirt_size,
            ..current
        };
        state.db.update_application_details(&updated).await?;
        updated
    } else {
        state
            .db
            .change_application_discipline(
                &race_id,
                &user.user_id,
                &current.discipline_id,
                &form,
                now,
            )
            .await?
    };

    Ok(Json(ApplicationResponse::from(&applied)))
}

/// Cancel the caller's registration.
async fn cancel_application(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(race_id): Path<String>,
) -> Result<StatusCode> {
    let current = current_application(&state, &race_id, &user.user_id).await?;

    state
        .db
        .cancel_application(&race_id, &current.discipline_id, &user.user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ─── My Races ────────────────────────────────────────────────

/// One of the caller's registrations with race and discipline details.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MyRaceEntry {
    pub race_id: String,
    pub race_title: String,
    pub date_time: String,
    pub date_time_display: String,
    pub discipline_id: String,
    pub discipline_title: String,
    pub length: f64,
    pub club: Option<String>,
    pub shirt_size: ShirtSize,
    pub position: Option<u32>,
    pub gender_position: Option<u32>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub total_time: Option<i64>,
    pub total_time_display: Option<String>,
    pub status: FinishStatus,
}

impl MyRaceEntry {
    fn new(applied: &Applied, race: &Race, discipline: &Discipline) -> Self {
        Self {
            race_id: race.id.clone(),
            race_title: race.title.clone(),
            date_time: format_utc_rfc3339(race.date_time),
            date_time_display: format_race_date(race.date_time),
            discipline_id: discipline.id.clone(),
            discipline_title: discipline.title.clone(),
            length: discipline.length,
            club: applied.club.clone(),
            shirt_size: applied.shirt_size,
            position: applied.position,
            gender_position: applied.gender_position,
            total_time: applied.total_time,
            total_time_display: applied.total_time.map(format_elapsed),
            status: status_of(applied),
        }
    }
}

/// Every race the caller registered for, most recent first.
async fn my_races(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<MyRaceEntry>>> {
    let applications = state.db.list_user_applications(&user.user_id).await?;

    let mut races: HashMap<String, Option<(Race, Vec<Discipline>)>> = HashMap::new();
    let mut entries = Vec::with_capacity(applications.len());

    for applied in &applications {
        if !races.contains_key(&applied.race_id) {
            let loaded = match state.db.get_race(&applied.race_id).await? {
                Some(race) => {
                    let disciplines = state.db.list_disciplines(&race.id).await?;
                    Some((race, disciplines))
                }
                None => None,
            };
            races.insert(applied.race_id.clone(), loaded);
        }

        let Some(Some((race, disciplines))) = races.get(&applied.race_id) else {
            tracing::warn!(race_id = %applied.race_id, "Registration for missing race");
            continue;
        };
        let Some(discipline) = disciplines.iter().find(|d| d.id == applied.discipline_id) else {
            tracing::warn!(
                race_id = %applied.race_id,
                discipline_id = %applied.discipline_id,
                "Registration for missing discipline"
            );
            continue;
        };

        entries.push((race.date_time, MyRaceEntry::new(applied, race, discipline)));
    }

    entries.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(Json(entries.into_iter().map(|(_, entry)| entry).collect()))
}
