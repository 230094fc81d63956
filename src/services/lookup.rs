// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-document lookups that report a missing document as not found.

use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Await a single-document read, turning "no document" into `NotFound`.
///
/// A read that has not settled within `grace` is also reported as not
/// found. Errors from the read itself are passed through unchanged.
pub async fn settle_document<T, F>(read: F, grace: Duration, what: &str) -> Result<T>
where
    F: Future<Output = Result<Option<T>>>,
{
    match tokio::time::timeout(grace, read).await {
        Ok(Ok(Some(document))) => Ok(document),
        Ok(Ok(None)) => Err(AppError::NotFound(what.to_string())),
        Ok(Err(e)) => Err(e),
        Err(_) => {
            tracing::warn!(
                what,
                grace_ms = grace.as_millis() as u64,
                "Document read did not settle, reporting not found"
            );
            Err(AppError::NotFound(what.to_string()))
        }
    }
}
