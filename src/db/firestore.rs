// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (racer profiles)
//! - Races and their disciplines
//! - Registrations (`applied` documents) and the counters kept in sync with them
//! - Finish-line timing and published results
//!
//! Every multi-document mutation goes through a batch write or a
//! transaction. Transactions are run with `run_transaction`, which retries
//! on contention; a rejected business rule aborts the transaction without
//! writing anything and is returned as the inner `AppError`.

use chrono::{DateTime, Utc};
use firestore::errors::{BackoffError, FirestoreError};
use firestore::{
    FirestoreQueryCollection, FirestoreQueryDirection, FirestoreTimestamp,
    FirestoreWritePrecondition, ParentPathBuilder,
};
use futures_util::{stream, StreamExt};

use crate::db::{collections, fields};
use crate::error::AppError;
use crate::models::{Applied, ApplyForm, Discipline, Race, RaceWindow, User};
use crate::services::counters;
use crate::services::disciplines::DisciplinePlan;
use crate::services::ranking::Ranked;

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

type DbResult<T> = Result<T, FirestoreError>;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

fn db_err(e: FirestoreError) -> AppError {
    AppError::Database(e.to_string())
}

/// Map a failed `Exists(true)` precondition on a registration write.
fn registration_err(e: FirestoreError, applied: &Applied) -> AppError {
    match e {
        FirestoreError::DataNotFoundError(_) => AppError::NotFound(format!(
            "registration of {} in discipline {}",
            applied.user_id, applied.discipline_id
        )),
        e => db_err(e),
    }
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator accepts any bearer token, so skip loading credentials.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJyYWNldHJhY2sifQ."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user profile by UID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        read_user(self.get_client()?, user_id).await.map_err(db_err)
    }

    /// Create or merge a user profile.
    pub async fn upsert_user(&self, user_id: &str, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(fields::PROFILE)
            .in_col(collections::USERS)
            .document_id(user_id)
            .object(user)
            .execute()
            .await
            .map_err(db_err)?;

        tracing::info!(user_id, "Profile saved");
        Ok(())
    }

    // ─── Race Reads ──────────────────────────────────────────────

    /// Get a race by document ID.
    pub async fn get_race(&self, race_id: &str) -> Result<Option<Race>, AppError> {
        read_race(self.get_client()?, race_id).await.map_err(db_err)
    }

    /// List upcoming races (soonest first) or past races (most recent first).
    pub async fn list_races(
        &self,
        now: DateTime<Utc>,
        window: RaceWindow,
    ) -> Result<Vec<Race>, AppError> {
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::RACES);

        let query = match window {
            RaceWindow::Upcoming => query
                .filter(move |q| {
                    q.field(fields::DATE_TIME)
                        .greater_than(FirestoreTimestamp(now))
                })
                .order_by([(fields::DATE_TIME, FirestoreQueryDirection::Ascending)]),
            RaceWindow::Past => query
                .filter(move |q| {
                    q.field(fields::DATE_TIME)
                        .less_than_or_equal(FirestoreTimestamp(now))
                })
                .order_by([(fields::DATE_TIME, FirestoreQueryDirection::Descending)]),
        };

        query.obj().query().await.map_err(db_err)
    }

    /// List disciplines of a race, shortest first.
    pub async fn list_disciplines(&self, race_id: &str) -> Result<Vec<Discipline>, AppError> {
        query_disciplines(self.get_client()?, race_id)
            .await
            .map_err(db_err)
    }

    /// Get one discipline of a race.
    pub async fn get_discipline(
        &self,
        race_id: &str,
        discipline_id: &str,
    ) -> Result<Option<Discipline>, AppError> {
        read_discipline(self.get_client()?, race_id, discipline_id)
            .await
            .map_err(db_err)
    }

    // ─── Registration Reads ──────────────────────────────────────

    /// List all registrations of a discipline.
    pub async fn list_applied(
        &self,
        race_id: &str,
        discipline_id: &str,
    ) -> Result<Vec<Applied>, AppError> {
        query_applied(self.get_client()?, race_id, discipline_id)
            .await
            .map_err(db_err)
    }

    /// Get one user's registration in a discipline.
    pub async fn get_applied(
        &self,
        race_id: &str,
        discipline_id: &str,
        user_id: &str,
    ) -> Result<Option<Applied>, AppError> {
        read_applied(self.get_client()?, race_id, discipline_id, user_id)
            .await
            .map_err(db_err)
    }

    /// Find a user's registration for a race by probing every discipline.
    pub async fn find_application(
        &self,
        race_id: &str,
        user_id: &str,
    ) -> Result<Option<Applied>, AppError> {
        let client = self.get_client()?;
        let disciplines = query_disciplines(client, race_id).await.map_err(db_err)?;

        let found = stream::iter(disciplines)
            .map(|discipline| async move {
                read_applied(client, race_id, &discipline.id, user_id)
                    .await
                    .map_err(db_err)
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<Applied>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<Applied>>, AppError>>()?;

        Ok(found.into_iter().flatten().next())
    }

    /// List every registration of a user across all races.
    ///
    /// Collection-group query over all `applied` sub-collections.
    pub async fn list_user_applications(&self, user_id: &str) -> Result<Vec<Applied>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(FirestoreQueryCollection::Group(vec![
                collections::APPLIED.to_string()
            ]))
            .filter(move |q| q.field(fields::USER_ID).eq(user_id.clone()))
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    // ─── Race Writes ─────────────────────────────────────────────

    /// Create a race and its disciplines in one batch.
    pub async fn create_race(&self, race: &Race, disciplines: &[Discipline]) -> Result<(), AppError> {
        let client = self.get_client()?;
        let parent = race_path(client, &race.id).map_err(db_err)?;

        let batch_writer = client.create_simple_batch_writer().await.map_err(db_err)?;
        let mut batch = batch_writer.new_batch();

        client
            .fluent()
            .update()
            .in_col(collections::RACES)
            .document_id(&race.id)
            .object(race)
            .add_to_batch(&mut batch)
            .map_err(db_err)?;

        for discipline in disciplines {
            client
                .fluent()
                .update()
                .in_col(collections::DISCIPLINES)
                .document_id(&discipline.id)
                .parent(&parent)
                .object(discipline)
                .add_to_batch(&mut batch)
                .map_err(db_err)?;
        }

        batch
            .write()
            .await
            .map_err(|e| AppError::Database(format!("Failed to create race: {}", e)))?;

        tracing::info!(
            race_id = %race.id,
            created_by = %race.created_by,
            disciplines = disciplines.len(),
            "Race created"
        );
        Ok(())
    }

    /// Update race details and apply a discipline diff in one transaction.
    ///
    /// The stored race is re-read inside the transaction, so a registration
    /// that lands after the caller's check still blocks the edit. Counters on
    /// the race and on kept disciplines are left untouched.
    pub async fn update_race(
        &self,
        race: &Race,
        plan: &DisciplinePlan,
        user_id: &str,
    ) -> Result<(), AppError> {
        let user_id = user_id.to_string();

        let outcome = self
            .get_client()?
            .run_transaction(|db, transaction| {
                let race = race.clone();
                let plan = plan.clone();
                let user_id = user_id.clone();

                Box::pin(async move {
                    let Some(stored) = read_race(&db, &race.id).await? else {
                        return Ok(Err(AppError::NotFound(format!("race {}", race.id))));
                    };
                    if let Err(e) = stored.ensure_editable_by(&user_id) {
                        return Ok(Err(e));
                    }

                    let parent = race_path(&db, &race.id)?;

                    db.fluent()
                        .update()
                        .fields(fields::RACE_DETAILS)
                        .in_col(collections::RACES)
                        .document_id(&race.id)
                        .object(&race)
                        .add_to_transaction(transaction)?;

                    for discipline_id in &plan.deleted {
                        db.fluent()
                            .delete()
                            .from(collections::DISCIPLINES)
                            .document_id(discipline_id)
                            .parent(&parent)
                            .add_to_transaction(transaction)?;
                    }

                    for discipline in &plan.upserted {
                        db.fluent()
                            .update()
                            .fields(fields::DISCIPLINE_DETAILS)
                            .in_col(collections::DISCIPLINES)
                            .document_id(&discipline.id)
                            .parent(&parent)
                            .object(discipline)
                            .add_to_transaction(transaction)?;
                    }

                    Ok::<_, BackoffError<FirestoreError>>(Ok(()))
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Race update failed: {}", e)))?;

        outcome?;
        tracing::info!(
            race_id = %race.id,
            deleted = plan.deleted.len(),
            upserted = plan.upserted.len(),
            "Race updated"
        );
        Ok(())
    }

    /// Delete a race with all of its disciplines and registrations.
    ///
    /// Only the creator may delete, and only while nobody is registered.
    pub async fn delete_race(&self, race_id: &str, user_id: &str) -> Result<(), AppError> {
        let race_id = race_id.to_string();
        let user_id = user_id.to_string();

        let outcome = self
            .get_client()?
            .run_transaction(|db, transaction| {
                let race_id = race_id.clone();
                let user_id = user_id.clone();

                Box::pin(async move {
                    let Some(race) = read_race(&db, &race_id).await? else {
                        return Ok(Err(AppError::NotFound(format!("race {}", race_id))));
                    };
                    if let Err(e) = race.ensure_editable_by(&user_id) {
                        return Ok(Err(e));
                    }

                    let parent = race_path(&db, &race_id)?;
                    let disciplines = query_disciplines(&db, &race_id).await?;

                    let mut registrations = Vec::new();
                    for discipline in &disciplines {
                        registrations.extend(query_applied(&db, &race_id, &discipline.id).await?);
                    }

                    for applied in &registrations {
                        db.fluent()
                            .delete()
                            .from(collections::APPLIED)
                            .document_id(&applied.user_id)
                            .parent(applied_path(&db, &race_id, &applied.discipline_id)?)
                            .add_to_transaction(transaction)?;
                    }
                    for discipline in &disciplines {
                        db.fluent()
                            .delete()
                            .from(collections::DISCIPLINES)
                            .document_id(&discipline.id)
                            .parent(&parent)
                            .add_to_transaction(transaction)?;
                    }
                    db.fluent()
                        .delete()
                        .from(collections::RACES)
                        .document_id(&race_id)
                        .add_to_transaction(transaction)?;

                    Ok::<_, BackoffError<FirestoreError>>(Ok(disciplines.len()))
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Race deletion failed: {}", e)))?;

        let disciplines = outcome?;
        tracing::info!(race_id = %race_id, disciplines, "Race deleted");
        Ok(())
    }

    // ─── Registration Writes ─────────────────────────────────────

    /// Register a user for a discipline of a race.
    ///
    /// Requires a saved profile, open registration and no existing
    /// registration in any discipline of the race. Increments the race and
    /// discipline counters together with the registration write.
    pub async fn apply_for_race(
        &self,
        race_id: &str,
        user_id: &str,
        form: &ApplyForm,
        now: DateTime<Utc>,
    ) -> Result<Applied, AppError> {
        let race_id = race_id.to_string();
        let user_id = user_id.to_string();
        let form = form.clone();

        let outcome = self
            .get_client()?
            .run_transaction(|db, transaction| {
                let race_id = race_id.clone();
                let user_id = user_id.clone();
                let form = form.clone();

                Box::pin(async move {
                    let Some(profile) = read_user(&db, &user_id).await? else {
                        return Ok(Err(profile_required()));
                    };
                    let Some(mut race) = read_race(&db, &race_id).await? else {
                        return Ok(Err(AppError::NotFound(format!("race {}", race_id))));
                    };
                    if !race.is_applying_open(now) {
                        return Ok(Err(registration_closed()));
                    }

                    let disciplines = query_disciplines(&db, &race_id).await?;
                    let Some(mut discipline) = disciplines
                        .iter()
                        .find(|d| d.id == form.discipline)
                        .cloned()
                    else {
                        return Ok(Err(AppError::NotFound(format!(
                            "discipline {}",
                            form.discipline
                        ))));
                    };

                    for other in &disciplines {
                        if read_applied(&db, &race_id, &other.id, &user_id)
                            .await?
                            .is_some()
                        {
                            return Ok(Err(AppError::Conflict(
                                "Already registered for this race".to_string(),
                            )));
                        }
                    }

                    let applied = match Applied::from_profile(
                        &user_id,
                        &race_id,
                        &discipline.id,
                        &profile,
                        &form,
                        now,
                    ) {
                        Ok(applied) => applied,
                        Err(e) => return Ok(Err(e)),
                    };

                    race.applied = counters::increment(race.applied);
                    discipline.applied = counters::increment(discipline.applied);

                    write_race_counter(&db, transaction, &race)?;
                    write_discipline_counter(&db, transaction, &discipline)?;
                    db.fluent()
                        .update()
                        .in_col(collections::APPLIED)
                        .document_id(&user_id)
                        .parent(applied_path(&db, &race_id, &discipline.id)?)
                        .object(&applied)
                        .add_to_transaction(transaction)?;

                    Ok::<_, BackoffError<FirestoreError>>(Ok(applied))
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Registration failed: {}", e)))?;

        let applied = outcome?;
        tracing::info!(
            race_id = %applied.race_id,
            discipline_id = %applied.discipline_id,
            user_id = %applied.user_id,
            "Registered for race"
        );
        Ok(applied)
    }

    /// Change club and shirt size of an existing registration in place.
    pub async fn update_application_details(&self, applied: &Applied) -> Result<(), AppError> {
        let client = self.get_client()?;
        let parent =
            applied_path(client, &applied.race_id, &applied.discipline_id).map_err(db_err)?;

        let _: () = client
            .fluent()
            .update()
            .fields(fields::APPLICATION_DETAILS)
            .in_col(collections::APPLIED)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(&applied.user_id)
            .parent(&parent)
            .object(applied)
            .execute()
            .await
            .map_err(|e| registration_err(e, applied))?;

        tracing::info!(
            race_id = %applied.race_id,
            user_id = %applied.user_id,
            "Registration details updated"
        );
        Ok(())
    }

    /// Move a registration to another discipline of the same race.
    ///
    /// The old registration is deleted and a new one is written with profile
    /// fields derived afresh. The old discipline counter is decremented and
    /// the new one incremented; the race counter does not change.
    pub async fn change_application_discipline(
        &self,
        race_id: &str,
        user_id: &str,
        from_discipline_id: &str,
        form: &ApplyForm,
        now: DateTime<Utc>,
    ) -> Result<Applied, AppError> {
        let race_id = race_id.to_string();
        let user_id = user_id.to_string();
        let from_discipline_id = from_discipline_id.to_string();
        let form = form.clone();

        let outcome = self
            .get_client()?
            .run_transaction(|db, transaction| {
                let race_id = race_id.clone();
                let user_id = user_id.clone();
                let from_discipline_id = from_discipline_id.clone();
                let form = form.clone();

                Box::pin(async move {
                    let Some(profile) = read_user(&db, &user_id).await? else {
                        return Ok(Err(profile_required()));
                    };
                    let Some(race) = read_race(&db, &race_id).await? else {
                        return Ok(Err(AppError::NotFound(format!("race {}", race_id))));
                    };
                    if !race.is_applying_open(now) {
                        return Ok(Err(registration_closed()));
                    }

                    let Some(previous) =
                        read_applied(&db, &race_id, &from_discipline_id, &user_id).await?
                    else {
                        return Ok(Err(AppError::NotFound("registration".to_string())));
                    };
                    let Some(mut from) =
                        read_discipline(&db, &race_id, &from_discipline_id).await?
                    else {
                        return Ok(Err(AppError::NotFound(format!(
                            "discipline {}",
                            from_discipline_id
                        ))));
                    };
                    let Some(mut to) = read_discipline(&db, &race_id, &form.discipline).await?
                    else {
                        return Ok(Err(AppError::NotFound(format!(
                            "discipline {}",
                            form.discipline
                        ))));
                    };

                    let mut applied = match Applied::from_profile(
                        &user_id, &race_id, &to.id, &profile, &form, now,
                    ) {
                        Ok(applied) => applied,
                        Err(e) => return Ok(Err(e)),
                    };
                    applied.applied_at = previous.applied_at;

                    from.applied = counters::decrement(from.applied);
                    to.applied = counters::increment(to.applied);

                    write_discipline_counter(&db, transaction, &from)?;
                    write_discipline_counter(&db, transaction, &to)?;
                    db.fluent()
                        .delete()
                        .from(collections::APPLIED)
                        .document_id(&user_id)
                        .parent(applied_path(&db, &race_id, &from.id)?)
                        .add_to_transaction(transaction)?;
                    db.fluent()
                        .update()
                        .in_col(collections::APPLIED)
                        .document_id(&user_id)
                        .parent(applied_path(&db, &race_id, &to.id)?)
                        .object(&applied)
                        .add_to_transaction(transaction)?;

                    Ok::<_, BackoffError<FirestoreError>>(Ok(applied))
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Changing discipline failed: {}", e)))?;

        let applied = outcome?;
        tracing::info!(
            race_id = %applied.race_id,
            user_id = %applied.user_id,
            from = %from_discipline_id,
            to = %applied.discipline_id,
            "Registration moved to another discipline"
        );
        Ok(applied)
    }

    /// Cancel a registration, decrementing race and discipline counters.
    pub async fn cancel_application(
        &self,
        race_id: &str,
        discipline_id: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        let race_id = race_id.to_string();
        let discipline_id = discipline_id.to_string();
        let user_id = user_id.to_string();

        let outcome = self
            .get_client()?
            .run_transaction(|db, transaction| {
                let race_id = race_id.clone();
                let discipline_id = discipline_id.clone();
                let user_id = user_id.clone();

                Box::pin(async move {
                    if read_applied(&db, &race_id, &discipline_id, &user_id)
                        .await?
                        .is_none()
                    {
                        return Ok(Err(AppError::NotFound("registration".to_string())));
                    }
                    let Some(mut race) = read_race(&db, &race_id).await? else {
                        return Ok(Err(AppError::NotFound(format!("race {}", race_id))));
                    };
                    let Some(mut discipline) =
                        read_discipline(&db, &race_id, &discipline_id).await?
                    else {
                        return Ok(Err(AppError::NotFound(format!(
                            "discipline {}",
                            discipline_id
                        ))));
                    };

                    race.applied = counters::decrement(race.applied);
                    discipline.applied = counters::decrement(discipline.applied);

                    write_race_counter(&db, transaction, &race)?;
                    write_discipline_counter(&db, transaction, &discipline)?;
                    db.fluent()
                        .delete()
                        .from(collections::APPLIED)
                        .document_id(&user_id)
                        .parent(applied_path(&db, &race_id, &discipline_id)?)
                        .add_to_transaction(transaction)?;

                    Ok::<_, BackoffError<FirestoreError>>(Ok(()))
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Cancelling registration failed: {}", e)))?;

        outcome?;
        tracing::info!(race_id = %race_id, discipline_id = %discipline_id, user_id = %user_id, "Registration cancelled");
        Ok(())
    }

    // ─── Timing & Results ────────────────────────────────────────

    /// Store start and finish times of a registrant.
    ///
    /// A missing time removes the stored one.
    pub async fn set_timing(&self, applied: &Applied) -> Result<(), AppError> {
        let client = self.get_client()?;
        let parent =
            applied_path(client, &applied.race_id, &applied.discipline_id).map_err(db_err)?;

        let _: () = client
            .fluent()
            .update()
            .fields(fields::TIMING)
            .in_col(collections::APPLIED)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(&applied.user_id)
            .parent(&parent)
            .object(applied)
            .execute()
            .await
            .map_err(|e| registration_err(e, applied))?;
        Ok(())
    }

    /// Write computed positions of a discipline and refresh finisher counts.
    ///
    /// `ranked` must hold every registrant of the discipline (no gender
    /// filter). Registrant updates are written in chunks; the discipline and
    /// race `finished` counters go in the last batch.
    pub async fn publish_results(
        &self,
        race_id: &str,
        discipline_id: &str,
        ranked: &[Ranked],
    ) -> Result<u32, AppError> {
        let client = self.get_client()?;
        let race = read_race(client, race_id)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::NotFound(format!("race {}", race_id)))?;
        let disciplines = query_disciplines(client, race_id).await.map_err(db_err)?;
        let parent = applied_path(client, race_id, discipline_id).map_err(db_err)?;

        let batch_writer = client.create_simple_batch_writer().await.map_err(db_err)?;

        for chunk in ranked.chunks(BATCH_SIZE) {
            let mut batch = batch_writer.new_batch();
            for result in chunk {
                let mut entry = result.entry.clone();
                entry.total_time = result.total_time;
                entry.position = result.position;
                entry.gender_position = result.gender_position;

                client
                    .fluent()
                    .update()
                    .fields(fields::RESULT)
                    .in_col(collections::APPLIED)
                    .precondition(FirestoreWritePrecondition::Exists(true))
                    .document_id(&entry.user_id)
                    .parent(&parent)
                    .object(&entry)
                    .add_to_batch(&mut batch)
                    .map_err(db_err)?;
            }
            batch.write().await.map_err(|e| match e {
                FirestoreError::DataNotFoundError(_) => AppError::Conflict(
                    "Registrations changed while publishing results".to_string(),
                ),
                e => AppError::Database(format!("Failed to write results: {}", e)),
            })?;
        }

        let finishers = ranked.iter().filter(|r| r.position.is_some()).count() as u32;
        let mut race = race;
        let mut race_finished = finishers;
        let mut updated = None;
        for discipline in disciplines {
            if discipline.id == discipline_id {
                updated = Some(Discipline {
                    finished: counters::non_zero(finishers),
                    ..discipline
                });
            } else {
                race_finished += discipline.finished.unwrap_or(0);
            }
        }
        let discipline = updated
            .ok_or_else(|| AppError::NotFound(format!("discipline {}", discipline_id)))?;
        race.finished = counters::non_zero(race_finished);

        let race_parent = race_path(client, race_id).map_err(db_err)?;
        let mut batch = batch_writer.new_batch();
        client
            .fluent()
            .update()
            .fields([fields::FINISHED])
            .in_col(collections::DISCIPLINES)
            .document_id(&discipline.id)
            .parent(&race_parent)
            .object(&discipline)
            .add_to_batch(&mut batch)
            .map_err(db_err)?;
        client
            .fluent()
            .update()
            .fields([fields::FINISHED])
            .in_col(collections::RACES)
            .document_id(&race.id)
            .object(&race)
            .add_to_batch(&mut batch)
            .map_err(db_err)?;
        batch
            .write()
            .await
            .map_err(|e| AppError::Database(format!("Failed to write finisher counts: {}", e)))?;

        tracing::info!(
            race_id,
            discipline_id,
            registrants = ranked.len(),
            finishers,
            "Results published"
        );
        Ok(finishers)
    }
}

fn profile_required() -> AppError {
    AppError::BadRequest("Fill in your profile before registering".to_string())
}

fn registration_closed() -> AppError {
    AppError::BadRequest("Registration for this race is closed".to_string())
}

// ─── Document Access Helpers ─────────────────────────────────────
//
// These take the raw client so that the same reads serve both plain
// lookups and transactions (where `db` is bound to the transaction).

fn race_path(db: &firestore::FirestoreDb, race_id: &str) -> DbResult<ParentPathBuilder> {
    db.parent_path(collections::RACES, race_id)
}

fn applied_path(
    db: &firestore::FirestoreDb,
    race_id: &str,
    discipline_id: &str,
) -> DbResult<ParentPathBuilder> {
    race_path(db, race_id)?.at(collections::DISCIPLINES, discipline_id)
}

async fn read_user(db: &firestore::FirestoreDb, user_id: &str) -> DbResult<Option<User>> {
    db.fluent()
        .select()
        .by_id_in(collections::USERS)
        .obj()
        .one(user_id)
        .await
}

async fn read_race(db: &firestore::FirestoreDb, race_id: &str) -> DbResult<Option<Race>> {
    db.fluent()
        .select()
        .by_id_in(collections::RACES)
        .obj()
        .one(race_id)
        .await
}

async fn read_discipline(
    db: &firestore::FirestoreDb,
    race_id: &str,
    discipline_id: &str,
) -> DbResult<Option<Discipline>> {
    let parent = race_path(db, race_id)?;
    db.fluent()
        .select()
        .by_id_in(collections::DISCIPLINES)
        .parent(&parent)
        .obj()
        .one(discipline_id)
        .await
}

async fn query_disciplines(
    db: &firestore::FirestoreDb,
    race_id: &str,
) -> DbResult<Vec<Discipline>> {
    let parent = race_path(db, race_id)?;
    db.fluent()
        .select()
        .from(collections::DISCIPLINES)
        .parent(&parent)
        .order_by([(fields::LENGTH, FirestoreQueryDirection::Ascending)])
        .obj()
        .query()
        .await
}

async fn read_applied(
    db: &firestore::FirestoreDb,
    race_id: &str,
    discipline_id: &str,
    user_id: &str,
) -> DbResult<Option<Applied>> {
    let parent = applied_path(db, race_id, discipline_id)?;
    db.fluent()
        .select()
        .by_id_in(collections::APPLIED)
        .parent(&parent)
        .obj()
        .one(user_id)
        .await
}

async fn query_applied(
    db: &firestore::FirestoreDb,
    race_id: &str,
    discipline_id: &str,
) -> DbResult<Vec<Applied>> {
    let parent = applied_path(db, race_id, discipline_id)?;
    db.fluent()
        .select()
        .from(collections::APPLIED)
        .parent(&parent)
        .obj()
        .query()
        .await
}

/// Write only the `applied` counter of a race; `None` removes the field.
fn write_race_counter(
    db: &firestore::FirestoreDb,
    transaction: &mut firestore::FirestoreTransaction,
    race: &Race,
) -> DbResult<()> {
    db.fluent()
        .update()
        .fields([fields::APPLIED])
        .in_col(collections::RACES)
        .document_id(&race.id)
        .object(race)
        .add_to_transaction(transaction)?;
    Ok(())
}

/// Write only the `applied` counter of a discipline; `None` removes the field.
fn write_discipline_counter(
    db: &firestore::FirestoreDb,
    transaction: &mut firestore::FirestoreTransaction,
    discipline: &Discipline,
) -> DbResult<()> {
    db.fluent()
        .update()
        .fields([fields::APPLIED])
        .in_col(collections::DISCIPLINES)
        .document_id(&discipline.id)
        .parent(race_path(db, &discipline.race_id)?)
        .object(discipline)
        .add_to_transaction(transaction)?;
    Ok(())
}
