// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Finish-line result ranking.
//!
//! Registrants are ordered by elapsed time. Anyone without an elapsed time
//! sorts after every finisher; among those, racers who started come before
//! racers who never started.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{Applied, Gender};

/// Result status of a registrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum FinishStatus {
    Finished,
    /// Did not finish
    Dnf,
    /// Did not start
    Dns,
}

/// A registrant with its computed rank.
#[derive(Debug, Clone)]
pub struct Ranked {
    pub entry: Applied,
    pub total_time: Option<i64>,
    pub position: Option<u32>,
    pub gender_position: Option<u32>,
    pub status: FinishStatus,
}

/// Elapsed milliseconds between start and finish, when both are recorded.
///
/// A finish before the start is not a valid elapsed time.
pub fn elapsed_ms(started: Option<DateTime<Utc>>, finished: Option<DateTime<Utc>>) -> Option<i64> {
    let elapsed = (finished? - started?).num_milliseconds();
    (elapsed >= 0).then_some(elapsed)
}

pub fn status_of(entry: &Applied) -> FinishStatus {
    match (elapsed_ms(entry.started, entry.finished), entry.started) {
        (Some(_), _) => FinishStatus::Finished,
        (None, Some(_)) => FinishStatus::Dnf,
        (None, None) => FinishStatus::Dns,
    }
}

/// Order two registrants for the result list.
pub fn compare_results(a: &Applied, b: &Applied) -> Ordering {
    let a_time = elapsed_ms(a.started, a.finished);
    let b_time = elapsed_ms(b.started, b.finished);

    match (a_time, b_time) {
        (Some(a_time), Some(b_time)) => a_time.cmp(&b_time),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => match (a.started.is_some(), b.started.is_some()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        },
    }
}

/// Rank registrants of one discipline, optionally limited to one gender.
///
/// Positions are 1-based and given only to finishers; the gender position
/// counts finishers of the same gender.
pub fn rank_results(mut entries: Vec<Applied>, gender: Option<Gender>) -> Vec<Ranked> {
    if let Some(gender) = gender {
        entries.retain(|e| e.gender == gender);
    }

    // Stable: ties keep their input order.
    entries.sort_by(compare_results);

    let mut finishers = 0u32;
    let mut by_gender: HashMap<Gender, u32> = HashMap::new();

    entries
        .into_iter()
        .map(|entry| {
            let total_time = elapsed_ms(entry.started, entry.finished);
            let status = status_of(&entry);

            let (position, gender_position) = if total_time.is_some() {
                finishers += 1;
                let gender_count = by_gender.entry(entry.gender).or_insert(0);
                *gender_count += 1;
                (Some(finishers), Some(*gender_count))
            } else {
                (None, None)
            };

            Ranked {
                entry,
                total_time,
                position,
                gender_position,
                status,
            }
        })
        .collect()
}
