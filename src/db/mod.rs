// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const RACES: &str = "races";
    /// Sub-collection of a race
    pub const DISCIPLINES: &str = "disciplines";
    /// Sub-collection of a discipline, keyed by user ID
    pub const APPLIED: &str = "applied";
}

/// Document field names used in masked updates and queries.
pub mod fields {
    pub const APPLIED: &str = "applied";
    pub const FINISHED: &str = "finished";
    pub const DATE_TIME: &str = "date_time";
    pub const LENGTH: &str = "length";
    pub const USER_ID: &str = "user_id";

    pub const RACE_DETAILS: [&str; 5] = [
        "title",
        "date_time",
        "apply_until",
        "description",
        "disciplines_count",
    ];
    pub const DISCIPLINE_DETAILS: [&str; 4] = ["id", "race_id", "title", "length"];
    pub const PROFILE: [&str; 3] = ["full_name", "birth_date", "gender"];
    pub const APPLICATION_DETAILS: [&str; 2] = ["club", "shirt_size"];
    pub const TIMING: [&str; 2] = ["started", "finished"];
    pub const RESULT: [&str; 3] = ["total_time", "position", "gender_position"];
}
