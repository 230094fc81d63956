// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Finish-line results and timing routes.

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::Gender;
use crate::routes::races::{load_discipline, load_race};
use crate::services::{rank_results, settle_document, FinishStatus, Ranked};
use crate::time_utils::{format_elapsed, format_utc_rfc3339};
use crate::AppState;

/// Result routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/races/{race_id}/disciplines/{discipline_id}/results",
            get(get_results),
        )
        .route(
            "/api/races/{race_id}/disciplines/{discipline_id}/applied/{user_id}/timing",
            put(record_timing),
        )
}

/// Gender filter for result lists.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderFilter {
    #[default]
    Both,
    Male,
    Female,
}

impl GenderFilter {
    fn gender(self) -> Option<Gender> {
        match self {
            GenderFilter::Both => None,
            GenderFilter::Male => Some(Gender::Male),
            GenderFilter::Female => Some(Gender::Female),
        }
    }
}

#[derive(Deserialize)]
struct ResultsQuery {
    #[serde(default)]
    gender: GenderFilter,
}

/// One row of a result list.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ResultEntry {
    pub id: String,
    pub racer: String,
    pub gender: Gender,
    pub age: i32,
    pub club: Option<String>,
    pub position: Option<u32>,
    pub gender_position: Option<u32>,
    /// Elapsed milliseconds
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub total_time: Option<i64>,
    pub total_time_display: Option<String>,
    pub started: Option<String>,
    pub finished: Option<String>,
    pub status: FinishStatus,
}

impl From<&Ranked> for ResultEntry {
    fn from(ranked: &Ranked) -> Self {
        let entry = &ranked.entry;
        Self {
            id: entry.user_id.clone(),
            racer: entry.racer.clone(),
            gender: entry.gender,
            age: entry.age,
            club: entry.club.clone(),
            position: ranked.position,
            gender_position: ranked.gender_position,
            total_time: ranked.total_time,
            total_time_display: ranked.total_time.map(format_elapsed),
            started: entry.started.map(format_utc_rfc3339),
            finished: entry.finished.map(format_utc_rfc3339),
            status: ranked.status,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ResultsResponse {
    pub race_id: String,
    pub race_title: String,
    pub discipline_id: String,
    pub discipline_title: String,
    pub results: Vec<ResultEntry>,
}

/// Ranked results of a discipline, optionally for one gender.
async fn get_results(
    State(state): State<Arc<AppState>>,
    Path((race_id, discipline_id)): Path<(String, String)>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<ResultsResponse>> {
    let race = load_race(&state, &race_id).await?;
    let discipline = load_discipline(&state, &race_id, &discipline_id).await?;
    let applied = state.db.list_applied(&race_id, &discipline_id).await?;

    let ranked = rank_results(applied, query.gender.gender());

    Ok(Json(ResultsResponse {
        race_id: race.id,
        race_title: race.title,
        discipline_id: discipline.id,
        discipline_title: discipline.title,
        results: ranked.iter().map(ResultEntry::from).collect(),
    }))
}

/// Start and finish times of one registrant.
#[derive(Debug, Deserialize)]
pub struct TimingForm {
    #[serde(default)]
    pub started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished: Option<DateTime<Utc>>,
}

impl TimingForm {
    fn check(&self) -> Result<()> {
        match (self.started, self.finished) {
            (None, Some(_)) => Err(AppError::BadRequest(
                "A finish time needs a start time".to_string(),
            )),
            (Some(started), Some(finished)) if finished < started => Err(AppError::BadRequest(
                "Finish time cannot be before start time".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TimingResponse {
    pub entry: ResultEntry,
    pub finishers: u32,
}

/// Record a registrant's times and republish the discipline's positions.
///
/// Only the race creator may record times.
async fn record_timing(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((race_id, discipline_id, racer_id)): Path<(String, String, String)>,
    Json(form): Json<TimingForm>,
) -> Result<Json<TimingResponse>> {
    form.check()?;

    let race = load_race(&state, &race_id).await?;
    if race.created_by != user.user_id {
        return Err(AppError::Forbidden(
            "Only the race creator can record times".to_string(),
        ));
    }

    let mut applied = settle_document(
        state.db.get_applied(&race_id, &discipline_id, &racer_id),
        state.config.not_found_grace,
        "registration",
    )
    .await?;
    applied.started = form.started;
    applied.finished = form.finished;
    state.db.set_timing(&applied).await?;

    // Re-read so that ranking sees every registrant's latest times.
    let mut registrants = state.db.list_applied(&race_id, &discipline_id).await?;
    if let Some(stored) = registrants.iter_mut().find(|a| a.user_id == racer_id) {
        stored.started = applied.started;
        stored.finished = applied.finished;
    }
    let ranked = rank_results(registrants, None);
    let finishers = state
        .db
        .publish_results(&race_id, &discipline_id, &ranked)
        .await?;

    let entry = ranked
        .iter()
        .find(|r| r.entry.user_id == racer_id)
        .map(ResultEntry::from)
        .ok_or_else(|| AppError::NotFound("registration".to_string()))?;

    tracing::info!(
        race_id = %race_id,
        discipline_id = %discipline_id,
        racer_id = %racer_id,
        status = ?entry.status,
        "Timing recorded"
    );

    Ok(Json(TimingResponse { entry, finishers }))
}
