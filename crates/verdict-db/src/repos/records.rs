//! Analysis record repository.

use chrono::{DateTime, Utc};

use verdict_core::entities::AnalysisRecord;
use verdict_core::enums::RecordOutcome;

use crate::PREFIX_RECORD;
use crate::error::DatabaseError;
use crate::helpers::{format_datetime, get_bool, get_opt_string, parse_datetime, parse_enum};
use crate::service::VerdictService;

const SELECT_COLS: &str = "id, set_id, subject_id, created_at, raw_text, outcome, quality_score, \
     artifact_ref, evaluation_rank, evaluation_score, evaluated, deleted_flag";

/// Fields supplied by the pipeline when an analysis completes.
#[derive(Debug, Clone)]
pub struct NewRecord<'a> {
    pub subject_id: &'a str,
    pub raw_text: &'a str,
    pub outcome: RecordOutcome,
    pub quality_score: u8,
}

fn row_to_record(row: &libsql::Row) -> Result<AnalysisRecord, DatabaseError> {
    let quality_score = u8::try_from(row.get::<i64>(6)?)
        .map_err(|e| DatabaseError::Query(format!("quality_score out of range: {e}")))?;
    let evaluation_rank = row
        .get::<Option<i64>>(8)?
        .map(u32::try_from)
        .transpose()
        .map_err(|e| DatabaseError::Query(format!("evaluation_rank out of range: {e}")))?;

    Ok(AnalysisRecord {
        id: row.get(0)?,
        set_id: row.get(1)?,
        subject_id: row.get(2)?,
        created_at: parse_datetime(&row.get::<String>(3)?)?,
        raw_text: row.get(4)?,
        outcome: parse_enum(&row.get::<String>(5)?)?,
        quality_score,
        artifact_ref: get_opt_string(row, 7)?,
        evaluation_rank,
        evaluation_score: row.get::<Option<f64>>(9)?,
        evaluated: get_bool(row, 10)?,
        deleted_flag: get_bool(row, 11)?,
    })
}

impl VerdictService {
    /// Persist a completed analysis and arm its subject's set.
    ///
    /// `due_at` is only used when the set is created or re-armed.
    pub async fn create_record(
        &self,
        new: &NewRecord<'_>,
        due_at: DateTime<Utc>,
    ) -> Result<AnalysisRecord, DatabaseError> {
        let set = self.arm_set(new.subject_id, due_at).await?;
        let now = Utc::now();
        let id = self.db().generate_id(PREFIX_RECORD).await?;
        let quality_score = new.quality_score.min(100);

        self.db()
            .conn()
            .execute(
                &format!(
                    "INSERT INTO analysis_records ({SELECT_COLS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, NULL, NULL, 0, 0)"
                ),
                libsql::params![
                    id.as_str(),
                    set.id.as_str(),
                    new.subject_id,
                    format_datetime(now),
                    new.raw_text,
                    new.outcome.as_str(),
                    i64::from(quality_score)
                ],
            )
            .await?;

        tracing::debug!(record_id = %id, set_id = %set.id, subject_id = new.subject_id, "created analysis record");

        Ok(AnalysisRecord {
            id,
            set_id: set.id,
            subject_id: new.subject_id.to_string(),
            created_at: now,
            raw_text: new.raw_text.to_string(),
            outcome: new.outcome,
            quality_score,
            artifact_ref: None,
            evaluation_rank: None,
            evaluation_score: None,
            evaluated: false,
            deleted_flag: false,
        })
    }

    pub async fn get_record(&self, id: &str) -> Result<AnalysisRecord, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM analysis_records WHERE id = ?1"),
                [id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_record(&row)
    }

    pub async fn set_artifact_ref(
        &self,
        id: &str,
        artifact_ref: &str,
    ) -> Result<(), DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE analysis_records SET artifact_ref = ?1 WHERE id = ?2",
                libsql::params![artifact_ref, id],
            )
            .await?;
        if changed == 0 {
            return Err(DatabaseError::NoResult);
        }
        Ok(())
    }

    /// Delete a record row. Returns `false` when the row was already gone.
    ///
    /// Only used to roll back an analysis that was cancelled mid-flight.
    pub async fn delete_record(&self, id: &str) -> Result<bool, DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute("DELETE FROM analysis_records WHERE id = ?1", [id])
            .await?;
        Ok(changed > 0)
    }

    /// Un-evaluated, non-deleted records of a set, oldest first.
    pub async fn candidate_records(
        &self,
        set_id: &str,
    ) -> Result<Vec<AnalysisRecord>, DatabaseError> {
        self.query_records(
            &format!(
                "SELECT {SELECT_COLS} FROM analysis_records \
                 WHERE set_id = ?1 AND evaluated = 0 AND deleted_flag = 0 \
                 ORDER BY created_at, id"
            ),
            set_id,
        )
        .await
    }

    /// All records of a set, oldest first.
    pub async fn records_for_set(
        &self,
        set_id: &str,
    ) -> Result<Vec<AnalysisRecord>, DatabaseError> {
        self.query_records(
            &format!(
                "SELECT {SELECT_COLS} FROM analysis_records WHERE set_id = ?1 \
                 ORDER BY created_at, id"
            ),
            set_id,
        )
        .await
    }

    /// Flag a record whose artifact has been removed. The text row stays.
    pub async fn mark_artifact_deleted(&self, id: &str) -> Result<(), DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE analysis_records SET deleted_flag = 1 WHERE id = ?1",
                [id],
            )
            .await?;
        if changed == 0 {
            return Err(DatabaseError::NoResult);
        }
        Ok(())
    }

    async fn query_records(
        &self,
        sql: &str,
        set_id: &str,
    ) -> Result<Vec<AnalysisRecord>, DatabaseError> {
        let mut rows = self.db().conn().query(sql, [set_id]).await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_record(&row)?);
        }
        Ok(records)
    }
}
