// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Discipline list diffing for race updates.

use std::collections::HashSet;

use crate::error::AppError;
use crate::models::{Discipline, DisciplineForm};

/// Writes needed to bring stored disciplines in line with a submitted list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisciplinePlan {
    /// Stored discipline IDs missing from the submission
    pub deleted: Vec<String>,
    /// Disciplines to write, existing ones under their own ID
    pub upserted: Vec<Discipline>,
}

/// Diff `submitted` against `stored` disciplines of race `race_id`.
///
/// Stored disciplines whose ID is not submitted are deleted. Submitted
/// entries with an ID are upserted under that ID (keeping stored counters);
/// entries without one get an ID from `new_id`.
pub fn plan_discipline_changes<F>(
    race_id: &str,
    stored: &[Discipline],
    submitted: &[DisciplineForm],
    mut new_id: F,
) -> Result<DisciplinePlan, AppError>
where
    F: FnMut() -> Result<String, AppError>,
{
    let submitted_ids: HashSet<&str> = submitted
        .iter()
        .filter_map(|d| d.id.as_deref())
        .collect();

    let deleted = stored
        .iter()
        .filter(|d| !submitted_ids.contains(d.id.as_str()))
        .map(|d| d.id.clone())
        .collect();

    let mut upserted = Vec::with_capacity(submitted.len());
    for form in submitted {
        let id = match form.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => new_id()?,
        };
        let existing = stored.iter().find(|d| d.id == id);

        upserted.push(Discipline {
            id,
            race_id: race_id.to_string(),
            title: form.title.clone(),
            length: form.length,
            applied: existing.and_then(|d| d.applied),
            finished: existing.and_then(|d| d.finished),
        });
    }

    Ok(DisciplinePlan { deleted, upserted })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(id: &str, title: &str) -> Discipline {
        Discipline {
            id: id.to_string(),
            race_id: "r1".to_string(),
            title: title.to_string(),
            length: 10.0,
            applied: None,
            finished: None,
        }
    }

    fn submitted(id: Option<&str>, title: &str, length: f64) -> DisciplineForm {
        DisciplineForm {
            id: id.map(str::to_string),
            title: title.to_string(),
            length,
        }
    }

    fn counter_ids() -> impl FnMut() -> Result<String, AppError> {
        let mut n = 0;
        move || {
            n += 1;
            Ok(format!("new-{}", n))
        }
    }

    #[test]
    fn test_omitted_discipline_is_deleted_others_upserted() {
        let plan = plan_discipline_changes(
            "r1",
            &[stored("a", "5K"), stored("b", "10K"), stored("c", "21K")],
            &[
                submitted(Some("a"), "5K fun run", 5.0),
                submitted(Some("c"), "Half", 21.1),
            ],
            counter_ids(),
        )
        .unwrap();

        assert_eq!(plan.deleted, vec!["b".to_string()]);
        let ids: Vec<_> = plan.upserted.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(plan.upserted[0].title, "5K fun run");
        assert_eq!(plan.upserted[1].length, 21.1);
    }

    #[test]
    fn test_entries_without_id_are_created() {
        let plan = plan_discipline_changes(
            "r1",
            &[stored("a", "5K")],
            &[submitted(Some("a"), "5K", 5.0), submitted(None, "Marathon", 42.195)],
            counter_ids(),
        )
        .unwrap();

        assert!(plan.deleted.is_empty());
        assert_eq!(plan.upserted[1].id, "new-1");
        assert_eq!(plan.upserted[1].race_id, "r1");
    }

    #[test]
    fn test_unchanged_list_deletes_nothing() {
        let plan = plan_discipline_changes(
            "r1",
            &[stored("a", "5K"), stored("b", "10K")],
            &[submitted(Some("a"), "5K", 5.0), submitted(Some("b"), "10K", 10.0)],
            counter_ids(),
        )
        .unwrap();

        assert!(plan.deleted.is_empty());
        assert_eq!(plan.upserted.len(), 2);
    }

    #[test]
    fn test_id_generation_failure_propagates() {
        let result = plan_discipline_changes(
            "r1",
            &[],
            &[submitted(None, "5K", 5.0)],
            || Err(AppError::Internal(anyhow::anyhow!("rng unavailable"))),
        );
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
