// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod applied;
pub mod discipline;
pub mod race;
pub mod user;

pub use applied::{sort_by_racer, Applied, ApplyForm, ShirtSize};
pub use discipline::{Discipline, DisciplineForm};
pub use race::{Race, RaceForm, RaceWindow};
pub use user::{Gender, User};
