// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Race discipline model.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Stored discipline record, at `races/{race_id}/disciplines/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discipline {
    /// Document ID
    pub id: String,
    /// Parent race document ID
    pub race_id: String,
    pub title: String,
    /// Length in kilometers
    pub length: f64,
    /// Registrant count; the field is absent rather than zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<u32>,
}

impl Discipline {
    pub fn applied_count(&self) -> u32 {
        self.applied.unwrap_or(0)
    }
}

/// Discipline entry in a race form. Entries with an `id` update the stored
/// discipline of that id; entries without one create a new discipline.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DisciplineForm {
    #[serde(default)]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Discipline title must be 1-100 characters."))]
    pub title: String,
    #[validate(range(exclusive_min = 0.0, message = "Discipline length must be positive."))]
    pub length: f64,
}

/// Discipline summary for API responses.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DisciplineResponse {
    pub id: String,
    pub title: String,
    pub length: f64,
    pub applied: u32,
    pub finished: u32,
}

impl From<&Discipline> for DisciplineResponse {
    fn from(discipline: &Discipline) -> Self {
        Self {
            id: discipline.id.clone(),
            title: discipline.title.clone(),
            length: discipline.length,
            applied: discipline.applied_count(),
            finished: discipline.finished.unwrap_or(0),
        }
    }
}
