// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! RaceTrack: organize footraces, registrations and finish-line results.
//!
//! This crate provides the backend API for browsing races, registering
//! for race disciplines, managing race metadata and ranking results.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::GoogleOidcVerifier;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub google_oidc_verifier: Arc<GoogleOidcVerifier>,
}
