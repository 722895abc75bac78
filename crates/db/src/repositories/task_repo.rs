//! Repository for the `promotion_tasks` table.
//!
//! Claiming uses `FOR UPDATE SKIP LOCKED` so two scheduler instances never
//! pick up the same task.

use sqlx::PgPool;

use seco_core::status::RoundKind;
use seco_core::store::TaskStatus;
use seco_core::types::DbId;

use crate::models::TaskRow;

const COLUMNS: &str = "id, environment_id, kind, status, requested_by, error, created_at";

pub struct TaskRepo;

impl TaskRepo {
    pub async fn enqueue(
        pool: &PgPool,
        environment_id: DbId,
        kind: RoundKind,
        requested_by: DbId,
    ) -> Result<TaskRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO promotion_tasks (environment_id, kind, status, requested_by) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(environment_id)
            .bind(kind.as_str())
            .bind(TaskStatus::Pending.as_str())
            .bind(requested_by)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim up to `limit` pending tasks. Claimed rows are moved
    /// to `claimed` in the same statement, so a concurrent claimant cannot
    /// see them again; they reach `done` or `failed` only once the
    /// promotion attempt has actually run.
    pub async fn claim_pending(pool: &PgPool, limit: i64) -> Result<Vec<TaskRow>, sqlx::Error> {
        let query = format!(
            "UPDATE promotion_tasks \
             SET status = $1 \
             WHERE id IN ( \
                 SELECT id FROM promotion_tasks \
                 WHERE status = $2 \
                 ORDER BY id \
                 LIMIT $3 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(TaskStatus::Claimed.as_str())
            .bind(TaskStatus::Pending.as_str())
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    pub async fn mark_done(pool: &PgPool, task_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE promotion_tasks SET status = $2, error = NULL WHERE id = $1")
            .bind(task_id)
            .bind(TaskStatus::Done.as_str())
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn mark_failed(
        pool: &PgPool,
        task_id: DbId,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE promotion_tasks SET status = $2, error = $3 WHERE id = $1")
            .bind(task_id)
            .bind(TaskStatus::Failed.as_str())
            .bind(error)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn find_by_id(pool: &PgPool, task_id: DbId) -> Result<Option<TaskRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM promotion_tasks WHERE id = $1");
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(task_id)
            .fetch_optional(pool)
            .await
    }
}
