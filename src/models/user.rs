// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! User profile model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidationError};

/// Racer gender as recorded on the profile and copied onto registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// User profile stored in Firestore.
///
/// Stored at `users/{uid}`, keyed by the identity-provider subject.
/// Also used as the profile form body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct User {
    #[validate(length(min = 1, max = 100, message = "Full name must be 1-100 characters."))]
    pub full_name: String,
    /// Birth date as `YYYY-MM-DD`
    #[validate(custom(function = "validate_birth_date"))]
    pub birth_date: String,
    pub gender: Gender,
}

fn validate_birth_date(birth_date: &str) -> Result<(), ValidationError> {
    let date = chrono::NaiveDate::parse_from_str(birth_date, "%Y-%m-%d").map_err(|_| {
        ValidationError::new("birth_date").with_message("Birth date must be YYYY-MM-DD.".into())
    })?;

    if date > chrono::Utc::now().date_naive() {
        return Err(ValidationError::new("birth_date")
            .with_message("Birth date cannot be in the future.".into()));
    }

    Ok(())
}
