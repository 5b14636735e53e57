//! Analysis set repository: arming, due queries, and evaluation outcomes.

use chrono::{DateTime, Utc};

use verdict_core::entities::{AnalysisSet, EvaluationResult};
use verdict_core::enums::SetStatus;

use crate::PREFIX_SET;
use crate::error::DatabaseError;
use crate::helpers::{
    format_datetime, get_opt_string, parse_datetime, parse_enum, parse_optional_datetime,
    parse_optional_json,
};
use crate::service::VerdictService;

const SELECT_COLS: &str = "id, subject_id, status, next_evaluation_due_at, best_record_id, \
     evaluation_result, evaluated_at, created_at, updated_at";

fn row_to_set(row: &libsql::Row) -> Result<AnalysisSet, DatabaseError> {
    Ok(AnalysisSet {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        status: parse_enum(&row.get::<String>(2)?)?,
        next_evaluation_due_at: parse_datetime(&row.get::<String>(3)?)?,
        best_record_id: get_opt_string(row, 4)?,
        evaluation_result: parse_optional_json(get_opt_string(row, 5)?.as_deref())?,
        evaluated_at: parse_optional_datetime(get_opt_string(row, 6)?.as_deref())?,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
        updated_at: parse_datetime(&row.get::<String>(8)?)?,
    })
}

fn ensure_transition(set: &AnalysisSet, next: SetStatus) -> Result<(), DatabaseError> {
    if set.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(DatabaseError::InvalidState(format!(
            "Cannot transition set {} from {} to {}",
            set.id, set.status, next
        )))
    }
}

impl VerdictService {
    pub async fn get_set(&self, id: &str) -> Result<AnalysisSet, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM analysis_sets WHERE id = ?1"),
                [id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_set(&row)
    }

    pub async fn find_set_for_subject(
        &self,
        subject_id: &str,
    ) -> Result<Option<AnalysisSet>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM analysis_sets WHERE subject_id = ?1"),
                [subject_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_set(&row)?)),
            None => Ok(None),
        }
    }

    /// Make sure the subject has a pending set.
    ///
    /// Creates the set on first use. A set that is already `evaluated` or
    /// `error` is returned to `pending` with `due_at` as its new due time; a
    /// pending set keeps its existing due time.
    pub async fn arm_set(
        &self,
        subject_id: &str,
        due_at: DateTime<Utc>,
    ) -> Result<AnalysisSet, DatabaseError> {
        let now = Utc::now();

        match self.find_set_for_subject(subject_id).await? {
            Some(set) if set.status == SetStatus::Pending => Ok(set),
            Some(set) => {
                ensure_transition(&set, SetStatus::Pending)?;
                self.db()
                    .conn()
                    .execute(
                        "UPDATE analysis_sets SET status = ?1, next_evaluation_due_at = ?2, \
                         updated_at = ?3 WHERE id = ?4",
                        libsql::params![
                            SetStatus::Pending.as_str(),
                            format_datetime(due_at),
                            format_datetime(now),
                            set.id.as_str()
                        ],
                    )
                    .await?;
                tracing::debug!(set_id = %set.id, subject_id, "re-armed analysis set");
                Ok(AnalysisSet {
                    status: SetStatus::Pending,
                    next_evaluation_due_at: due_at,
                    updated_at: now,
                    ..set
                })
            }
            None => {
                let id = self.db().generate_id(PREFIX_SET).await?;
                self.db()
                    .conn()
                    .execute(
                        &format!(
                            "INSERT INTO analysis_sets ({SELECT_COLS}) \
                             VALUES (?1, ?2, ?3, ?4, NULL, NULL, NULL, ?5, ?6)"
                        ),
                        libsql::params![
                            id.as_str(),
                            subject_id,
                            SetStatus::Pending.as_str(),
                            format_datetime(due_at),
                            format_datetime(now),
                            format_datetime(now)
                        ],
                    )
                    .await?;
                Ok(AnalysisSet {
                    id,
                    subject_id: subject_id.to_string(),
                    status: SetStatus::Pending,
                    next_evaluation_due_at: due_at,
                    best_record_id: None,
                    evaluation_result: None,
                    evaluated_at: None,
                    created_at: now,
                    updated_at: now,
                })
            }
        }
    }

    /// Pending sets whose due time has passed and that hold at least
    /// `min_candidates` un-evaluated, non-deleted records.
    pub async fn due_sets(
        &self,
        now: DateTime<Utc>,
        min_candidates: usize,
        limit: u32,
    ) -> Result<Vec<AnalysisSet>, DatabaseError> {
        let min = i64::try_from(min_candidates).unwrap_or(i64::MAX);
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM analysis_sets s \
                     WHERE s.status = ?1 AND s.next_evaluation_due_at <= ?2 \
                       AND (SELECT COUNT(*) FROM analysis_records r \
                            WHERE r.set_id = s.id AND r.evaluated = 0 AND r.deleted_flag = 0) >= ?3 \
                     ORDER BY s.next_evaluation_due_at LIMIT ?4"
                ),
                libsql::params![
                    SetStatus::Pending.as_str(),
                    format_datetime(now),
                    min,
                    i64::from(limit)
                ],
            )
            .await?;

        let mut sets = Vec::new();
        while let Some(row) = rows.next().await? {
            sets.push(row_to_set(&row)?);
        }
        Ok(sets)
    }

    /// Persist a successful evaluation.
    ///
    /// Every id in `evaluated_ids` is flagged evaluated with the rank and score
    /// the evaluator gave it; the set moves to `evaluated` with `best_record_id`.
    pub async fn save_evaluation(
        &self,
        set_id: &str,
        evaluated_ids: &[String],
        result: &EvaluationResult,
        best_record_id: &str,
    ) -> Result<AnalysisSet, DatabaseError> {
        let current = self.get_set(set_id).await?;
        ensure_transition(&current, SetStatus::Evaluated)?;

        for record_id in evaluated_ids {
            let eval = result
                .evaluations
                .iter()
                .find(|e| &e.analysis_id == record_id);
            let rank = eval.and_then(|e| e.quality_rank).map(i64::from);
            let score = eval.map(|e| e.total_score);
            self.db()
                .conn()
                .execute(
                    "UPDATE analysis_records SET evaluated = 1, evaluation_rank = ?1, \
                     evaluation_score = ?2 WHERE id = ?3 AND set_id = ?4",
                    libsql::params![rank, score, record_id.as_str(), set_id],
                )
                .await?;
        }

        let now = Utc::now();
        let result_json =
            serde_json::to_string(result).map_err(|e| DatabaseError::Other(e.into()))?;
        self.db()
            .conn()
            .execute(
                "UPDATE analysis_sets SET status = ?1, best_record_id = ?2, evaluation_result = ?3, \
                 evaluated_at = ?4, updated_at = ?5 WHERE id = ?6",
                libsql::params![
                    SetStatus::Evaluated.as_str(),
                    best_record_id,
                    result_json,
                    format_datetime(now),
                    format_datetime(now),
                    set_id
                ],
            )
            .await?;

        self.get_set(set_id).await
    }

    /// Move a set to `error`, capturing the message as its evaluation result.
    pub async fn mark_set_error(
        &self,
        set_id: &str,
        message: &str,
    ) -> Result<AnalysisSet, DatabaseError> {
        let current = self.get_set(set_id).await?;
        ensure_transition(&current, SetStatus::Error)?;

        let now = Utc::now();
        let payload = serde_json::json!({ "error": message }).to_string();
        self.db()
            .conn()
            .execute(
                "UPDATE analysis_sets SET status = ?1, evaluation_result = ?2, updated_at = ?3 \
                 WHERE id = ?4",
                libsql::params![
                    SetStatus::Error.as_str(),
                    payload,
                    format_datetime(now),
                    set_id
                ],
            )
            .await?;

        self.get_set(set_id).await
    }
}
