//! Promotion task row.

use sqlx::FromRow;

use seco_core::status::RoundKind;
use seco_core::store::{PromotionTask, TaskStatus};
use seco_core::types::{DbId, Timestamp};
use seco_core::CoreError;

/// A row from the `promotion_tasks` table.
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub id: DbId,
    pub environment_id: DbId,
    pub kind: String,
    pub status: String,
    pub requested_by: DbId,
    pub error: Option<String>,
    pub created_at: Timestamp,
}

impl TaskRow {
    pub fn into_domain(self) -> Result<PromotionTask, CoreError> {
        let kind = RoundKind::parse(&self.kind).ok_or_else(|| {
            CoreError::Storage(format!(
                "promotion task {} has unknown kind {:?}",
                self.id, self.kind
            ))
        })?;
        let status = TaskStatus::parse(&self.status).ok_or_else(|| {
            CoreError::Storage(format!(
                "promotion task {} has unknown status {:?}",
                self.id, self.status
            ))
        })?;
        Ok(PromotionTask {
            id: self.id,
            environment_id: self.environment_id,
            kind,
            status,
            requested_by: self.requested_by,
            error: self.error,
            created_at: self.created_at,
        })
    }
}
