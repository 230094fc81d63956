// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and age derivation.

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Human-readable race date, e.g. `01.05.2025. 09:00`.
pub fn format_race_date(date: DateTime<Utc>) -> String {
    date.format("%d.%m.%Y. %H:%M").to_string()
}

/// Format an elapsed time in milliseconds as `H:MM:SS.mmm`.
pub fn format_elapsed(ms: i64) -> String {
    let ms = ms.max(0);
    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1000) % 60;
    let millis = ms % 1000;
    format!("{}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

/// Age in whole years as of `today` for a `YYYY-MM-DD` birth date.
///
/// The age counts the most recently passed birthday.
pub fn calculate_age(birth_date: &str, today: NaiveDate) -> Result<i32, chrono::ParseError> {
    let birth = NaiveDate::parse_from_str(birth_date.trim(), "%Y-%m-%d")?;

    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }

    Ok(age)
}
