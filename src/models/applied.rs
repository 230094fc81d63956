// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Registration ("applied") model: one record per user per discipline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::error::AppError;
use crate::models::user::{Gender, User};
use crate::time_utils::calculate_age;

/// Shirt sizes offered at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ShirtSize {
    XS,
    S,
    M,
    L,
    XL,
    XXL,
}

/// Stored registration record.
///
/// Stored at `races/{race_id}/disciplines/{discipline_id}/applied/{user_id}`.
/// Timing and position fields are filled in once the race is run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applied {
    /// UID of the registrant (also used as document ID)
    pub user_id: String,
    pub race_id: String,
    pub discipline_id: String,
    /// Racer name snapshot from the profile
    pub racer: String,
    pub gender: Gender,
    /// Age derived from the profile birth date at registration time
    pub age: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club: Option<String>,
    pub shirt_size: ShirtSize,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub applied_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "firestore::serialize_as_optional_timestamp"
    )]
    pub started: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "firestore::serialize_as_optional_timestamp"
    )]
    pub finished: Option<DateTime<Utc>>,
    /// Elapsed time in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender_position: Option<u32>,
}

impl Applied {
    /// Build a fresh registration, snapshotting name, gender and age from
    /// the registrant's profile.
    pub fn from_profile(
        user_id: &str,
        race_id: &str,
        discipline_id: &str,
        profile: &User,
        form: &ApplyForm,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let age = calculate_age(&profile.birth_date, now.date_naive()).map_err(|_| {
            AppError::BadRequest("Profile birth date must be YYYY-MM-DD".to_string())
        })?;

        Ok(Self {
            user_id: user_id.to_string(),
            race_id: race_id.to_string(),
            discipline_id: discipline_id.to_string(),
            racer: profile.full_name.clone(),
            gender: profile.gender,
            age,
            club: form.club(),
            shirt_size: form.shirt_size,
            applied_at: now,
            started: None,
            finished: None,
            total_time: None,
            position: None,
            gender_position: None,
        })
    }
}

/// Registration form body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ApplyForm {
    #[validate(length(min = 1, message = "Discipline is required."))]
    pub discipline: String,
    #[validate(length(max = 100, message = "Maximum racing club length is 100."))]
    #[serde(default)]
    pub club: Option<String>,
    pub shirt_size: ShirtSize,
}

impl ApplyForm {
    /// Club name with blanks treated as absent.
    pub fn club(&self) -> Option<String> {
        self.club
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }
}

/// Order a start list by racer name, ignoring case.
pub fn sort_by_racer(entries: &mut [Applied]) {
    entries.sort_by_cached_key(|a| a.racer.to_lowercase());
}

/// Registrant row in a discipline's start list.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AppliedEntry {
    pub id: String,
    pub racer: String,
    pub gender: Gender,
    pub age: i32,
    pub club: Option<String>,
}

impl From<&Applied> for AppliedEntry {
    fn from(applied: &Applied) -> Self {
        Self {
            id: applied.user_id.clone(),
            racer: applied.racer.clone(),
            gender: applied.gender,
            age: applied.age,
            club: applied.club.clone(),
        }
    }
}

/// The caller's own registration for a race.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ApplicationResponse {
    pub race_id: String,
    pub discipline_id: String,
    pub racer: String,
    pub gender: Gender,
    pub age: i32,
    pub club: Option<String>,
    pub shirt_size: ShirtSize,
}

impl From<&Applied> for ApplicationResponse {
    fn from(applied: &Applied) -> Self {
        Self {
            race_id: applied.race_id.clone(),
            discipline_id: applied.discipline_id.clone(),
            racer: applied.racer.clone(),
            gender: applied.gender,
            age: applied.age,
            club: applied.club.clone(),
            shirt_size: applied.shirt_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn profile() -> User {
        User {
            full_name: "Ivan Kovač".to_string(),
            birth_date: "2000-06-15".to_string(),
            gender: Gender::Male,
        }
    }

    fn form(club: Option<&str>) -> ApplyForm {
        ApplyForm {
            discipline: "d1".to_string(),
            club: club.map(str::to_string),
            shirt_size: ShirtSize::M,
        }
    }

    #[test]
    fn test_from_profile_snapshots_profile_fields() {
        let now = Utc.with_ymd_and_hms(2024, 6, 14, 10, 0, 0).unwrap();
        let applied =
            Applied::from_profile("uid-1", "r1", "d1", &profile(), &form(Some("AK Sljeme")), now)
                .unwrap();

        assert_eq!(applied.racer, "Ivan Kovač");
        assert_eq!(applied.gender, Gender::Male);
        assert_eq!(applied.age, 23);
        assert_eq!(applied.club.as_deref(), Some("AK Sljeme"));
        assert_eq!(applied.applied_at, now);
        assert!(applied.started.is_none());
    }

    #[test]
    fn test_blank_club_is_absent() {
        assert_eq!(form(Some("   ")).club(), None);
        assert_eq!(form(None).club(), None);
    }

    #[test]
    fn test_malformed_birth_date_is_bad_request() {
        let mut p = profile();
        p.birth_date = "June 2000".to_string();
        let result = Applied::from_profile("uid-1", "r1", "d1", &p, &form(None), Utc::now());
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_start_list_ignores_case() {
        let now = Utc::now();
        let mut entries: Vec<Applied> = ["ivan Horvat", "Marija Babić", "ana Kovač", "Zoran Perić"]
            .iter()
            .map(|name| {
                let p = User {
                    full_name: name.to_string(),
                    ..profile()
                };
                Applied::from_profile(name, "r1", "d1", &p, &form(None), now).unwrap()
            })
            .collect();

        sort_by_racer(&mut entries);
        let names: Vec<&str> = entries.iter().map(|a| a.racer.as_str()).collect();
        assert_eq!(names, vec!["ana Kovač", "ivan Horvat", "Marija Babić", "Zoran Perić"]);
    }

    #[test]
    fn test_club_length_validated() {
        let long = "x".repeat(101);
        assert!(form(Some(&long)).validate().is_err());
        assert!(form(Some("AK Sljeme")).validate().is_ok());
    }
}
