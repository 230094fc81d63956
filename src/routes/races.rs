// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Race listing, detail and management routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::applied::AppliedEntry;
use crate::models::discipline::DisciplineResponse;
use crate::models::race::{RaceDetail, RaceSummary};
use crate::models::{sort_by_racer, Discipline, Race, RaceForm, RaceWindow};
use crate::services::{new_document_id, plan_discipline_changes, settle_document};
use crate::AppState;

/// Race routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/races", get(list_races).post(create_race))
        .route(
            "/api/races/{race_id}",
            get(get_race).put(update_race).delete(delete_race),
        )
        .route("/api/races/{race_id}/disciplines", get(list_disciplines))
        .route(
            "/api/races/{race_id}/disciplines/{discipline_id}/applied",
            get(list_applied),
        )
}

/// Load a race, reporting a missing document as not found.
pub(crate) async fn load_race(state: &AppState, race_id: &str) -> Result<Race> {
    settle_document(
        state.db.get_race(race_id),
        state.config.not_found_grace,
        &format!("race {}", race_id),
    )
    .await
}

/// Load a discipline of a race, reporting a missing document as not found.
pub(crate) async fn load_discipline(
    state: &AppState,
    race_id: &str,
    discipline_id: &str,
) -> Result<Discipline> {
    settle_document(
        state.db.get_discipline(race_id, discipline_id),
        state.config.not_found_grace,
        &format!("discipline {}", discipline_id),
    )
    .await
}

// ─── Listing ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct ListRacesQuery {
    #[serde(default)]
    when: RaceWindow,
}

/// List upcoming or past races.
async fn list_races(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListRacesQuery>,
) -> Result<Json<Vec<RaceSummary>>> {
    let now = chrono::Utc::now();
    let races = state.db.list_races(now, query.when).await?;

    Ok(Json(
        races
            .iter()
            .map(|race| RaceSummary::from_race(race, now))
            .collect(),
    ))
}

/// Race with its disciplines.
async fn get_race(
    State(state): State<Arc<AppState>>,
    Path(race_id): Path<String>,
) -> Result<Json<RaceDetail>> {
    let race = load_race(&state, &race_id).await?;
    let disciplines = state.db.list_disciplines(&race_id).await?;

    Ok(Json(RaceDetail::new(&race, &disciplines, chrono::Utc::now())))
}

/// Disciplines of a race, shortest first.
async fn list_disciplines(
    State(state): State<Arc<AppState>>,
    Path(race_id): Path<String>,
) -> Result<Json<Vec<DisciplineResponse>>> {
    let disciplines = state.db.list_disciplines(&race_id).await?;
    Ok(Json(disciplines.iter().map(DisciplineResponse::from).collect()))
}

/// Start list of a discipline, sorted by racer name.
async fn list_applied(
    State(state): State<Arc<AppState>>,
    Path((race_id, discipline_id)): Path<(String, String)>,
) -> Result<Json<Vec<AppliedEntry>>> {
    let mut applied = state.db.list_applied(&race_id, &discipline_id).await?;
    sort_by_racer(&mut applied);

    Ok(Json(applied.iter().map(AppliedEntry::from).collect()))
}

// ─── Management ──────────────────────────────────────────────

/// Create a race owned by the caller.
async fn create_race(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(mut form): Json<RaceForm>,
) -> Result<(StatusCode, Json<RaceDetail>)> {
    form.trim_titles();
    form.validate()?;
    let now = chrono::Utc::now();
    form.check_schedule(now)?;

    let race = Race::from_form(new_document_id()?, &form, &user.user_id);
    let mut disciplines = form
        .disciplines
        .iter()
        .map(|d| -> Result<Discipline> {
            Ok(Discipline {
                id: new_document_id()?,
                race_id: race.id.clone(),
                title: d.title.clone(),
                length: d.length,
                applied: None,
                finished: None,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    state.db.create_race(&race, &disciplines).await?;

    disciplines.sort_by(|a, b| a.length.total_cmp(&b.length));
    Ok((
        StatusCode::CREATED,
        Json(RaceDetail::new(&race, &disciplines, now)),
    ))
}

/// Replace race details and its discipline list.
///
/// Only the creator may edit, and only while nobody has registered.
async fn update_race(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(race_id): Path<String>,
    Json(mut form): Json<RaceForm>,
) -> Result<Json<RaceDetail>> {
    form.trim_titles();
    form.validate()?;
    let now = chrono::Utc::now();
    form.check_schedule(now)?;

    let stored = load_race(&state, &race_id).await?;
    stored.ensure_editable_by(&user.user_id)?;

    let stored_disciplines = state.db.list_disciplines(&race_id).await?;
    let plan = plan_discipline_changes(
        &race_id,
        &stored_disciplines,
        &form.disciplines,
        new_document_id,
    )?;

    let race = Race {
        applied: stored.applied,
        finished: stored.finished,
        ..Race::from_form(race_id, &form, &stored.created_by)
    };
    state.db.update_race(&race, &plan, &user.user_id).await?;

    let mut disciplines = plan.upserted;
    disciplines.sort_by(|a, b| a.length.total_cmp(&b.length));
    Ok(Json(RaceDetail::new(&race, &disciplines, now)))
}

/// Delete a race with its disciplines.
async fn delete_race(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(race_id): Path<String>,
) -> Result<StatusCode> {
    state.db.delete_race(&race_id, &user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
