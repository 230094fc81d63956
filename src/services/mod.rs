// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod counters;
pub mod disciplines;
pub mod google_oidc;
pub mod ids;
pub mod lookup;
pub mod ranking;

pub use disciplines::{plan_discipline_changes, DisciplinePlan};
pub use google_oidc::{GoogleOidcVerifier, OidcError, VerifiedIdentity};
pub use ids::new_document_id;
pub use lookup::settle_document;
pub use ranking::{compare_results, rank_results, FinishStatus, Ranked};
