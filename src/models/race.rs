// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Race model for storage and API.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidationError};

use crate::error::AppError;
use crate::models::discipline::{Discipline, DisciplineForm, DisciplineResponse};
use crate::time_utils::{format_race_date, format_utc_rfc3339};

/// Races must be scheduled at least this many days ahead.
pub const MIN_DAYS_AHEAD: i64 = 7;

/// Stored race record in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Race {
    /// Document ID
    pub id: String,
    pub title: String,
    /// Start date/time
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub date_time: DateTime<Utc>,
    /// Registration closes at this time
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub apply_until: DateTime<Utc>,
    /// Free text or HTML
    pub description: String,
    /// UID of the creator
    pub created_by: String,
    #[serde(default)]
    pub disciplines_count: u32,
    /// Registrant count; the field is absent rather than zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied: Option<u32>,
    /// Finisher count across disciplines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<u32>,
}

impl Race {
    /// Build a new race owned by `created_by` from a submitted form.
    pub fn from_form(id: String, form: &RaceForm, created_by: &str) -> Self {
        Self {
            id,
            title: form.title.clone(),
            date_time: form.date_time,
            apply_until: form.apply_until,
            description: form.description.clone(),
            created_by: created_by.to_string(),
            disciplines_count: form.disciplines.len() as u32,
            applied: None,
            finished: None,
        }
    }

    pub fn applied_count(&self) -> u32 {
        self.applied.unwrap_or(0)
    }

    pub fn is_applying_open(&self, now: DateTime<Utc>) -> bool {
        now <= self.apply_until
    }

    /// A race may be changed only by its creator and only while nobody
    /// has registered.
    pub fn ensure_editable_by(&self, uid: &str) -> Result<(), AppError> {
        if self.created_by != uid {
            return Err(AppError::Forbidden(
                "Only the race creator can change this race".to_string(),
            ));
        }
        if self.applied_count() > 0 {
            return Err(AppError::Conflict(
                "Race already has registrations".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which side of "now" a race listing covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceWindow {
    /// Races starting after now, soonest first
    #[default]
    Upcoming,
    /// Races already started, most recent first
    Past,
}

/// Race create/update form body.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_race_form"))]
pub struct RaceForm {
    #[validate(length(min = 5, max = 100, message = "Title must be 5-100 characters."))]
    pub title: String,
    pub date_time: DateTime<Utc>,
    pub apply_until: DateTime<Utc>,
    #[validate(length(min = 1, message = "Description is required."))]
    pub description: String,
    #[validate(length(min = 1, max = 5, message = "A race needs 1-5 disciplines."), nested)]
    pub disciplines: Vec<DisciplineForm>,
}

fn validate_race_form(form: &RaceForm) -> Result<(), ValidationError> {
    if form.apply_until >= form.date_time {
        return Err(ValidationError::new("apply_until").with_message(
            "Applies open until date cannot be after starting date & time.".into(),
        ));
    }

    let mut seen = HashSet::new();
    let repeated = form
        .disciplines
        .iter()
        .filter_map(|d| d.id.as_deref().filter(|id| !id.is_empty()))
        .any(|id| !seen.insert(id));
    if repeated {
        return Err(ValidationError::new("disciplines")
            .with_message("A discipline can be listed only once.".into()));
    }
    Ok(())
}

impl RaceForm {
    /// Strip surrounding whitespace from the race and discipline titles.
    /// Call before `validate()` so length rules apply to the stored text.
    pub fn trim_titles(&mut self) {
        self.title = self.title.trim().to_string();
        for discipline in &mut self.disciplines {
            discipline.title = discipline.title.trim().to_string();
        }
    }

    /// Reject schedules sooner than [`MIN_DAYS_AHEAD`] days from `now`.
    pub fn check_schedule(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        let earliest = now + Duration::days(MIN_DAYS_AHEAD);
        if self.date_time < earliest {
            return Err(AppError::BadRequest(format!(
                "Starting date cannot be sooner than {} days",
                MIN_DAYS_AHEAD
            )));
        }
        if self.apply_until < earliest {
            return Err(AppError::BadRequest(format!(
                "Applies open until date cannot be sooner than {} days",
                MIN_DAYS_AHEAD
            )));
        }
        Ok(())
    }
}

/// Race row for list views.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RaceSummary {
    pub id: String,
    pub title: String,
    pub date_time: String,
    pub date_time_display: String,
    pub apply_until: String,
    pub applying_open: bool,
    pub disciplines_count: u32,
    pub applied: u32,
    pub finished: u32,
}

impl RaceSummary {
    pub fn from_race(race: &Race, now: DateTime<Utc>) -> Self {
        Self {
            id: race.id.clone(),
            title: race.title.clone(),
            date_time: format_utc_rfc3339(race.date_time),
            date_time_display: format_race_date(race.date_time),
            apply_until: format_utc_rfc3339(race.apply_until),
            applying_open: race.is_applying_open(now),
            disciplines_count: race.disciplines_count,
            applied: race.applied_count(),
            finished: race.finished.unwrap_or(0),
        }
    }
}

/// Full race view with its disciplines.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RaceDetail {
    #[serde(flatten)]
    pub summary: RaceSummary,
    pub apply_until_display: String,
    pub description: String,
    pub created_by: String,
    pub disciplines: Vec<DisciplineResponse>,
}

impl RaceDetail {
    pub fn new(race: &Race, disciplines: &[Discipline], now: DateTime<Utc>) -> Self {
        Self {
            summary: RaceSummary::from_race(race, now),
            apply_until_display: format_race_date(race.apply_until),
            description: race.description.clone(),
            created_by: race.created_by.clone(),
            disciplines: disciplines.iter().map(DisciplineResponse::from).collect(),
        }
    }
}
