//! Persistence trait seams.
//!
//! The engine and the scheduler only ever see these traits; the `seco-db`
//! crate provides the PostgreSQL implementations and `seco-testkit` the
//! in-memory ones. Every environment write is a whole-document replace
//! guarded by the document's version counter, so concurrent writers are
//! serialized per environment: the loser of a race gets
//! [`CoreError::Conflict`] and can reload and retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::environment::{Environment, NewEnvironment};
use crate::error::CoreError;
use crate::status::RoundKind;
use crate::types::{DbId, Timestamp};
use crate::vote::{DefinitionBallot, PriorityBallot};

// ---------------------------------------------------------------------------
// EnvironmentStore
// ---------------------------------------------------------------------------

/// Key-addressed read/replace persistence for environment documents.
#[async_trait]
pub trait EnvironmentStore: Send + Sync {
    /// Persist a new environment in `created` status. The store assigns the
    /// id and the initial version.
    async fn insert(&self, new_env: NewEnvironment) -> Result<Environment, CoreError>;

    /// Load an environment by id. `NotFound` if it does not exist.
    async fn load(&self, id: DbId) -> Result<Environment, CoreError>;

    async fn list_by_owner(&self, owner_id: DbId) -> Result<Vec<Environment>, CoreError>;

    /// Replace the whole document iff the stored version equals
    /// `env.version`. On success the returned document carries the bumped
    /// version; a mismatch is `Conflict`.
    async fn replace(&self, env: &Environment) -> Result<Environment, CoreError>;

    /// Environments whose round of `kind` is open with a closing date at or
    /// before `now`.
    async fn list_expired(
        &self,
        kind: RoundKind,
        now: Timestamp,
    ) -> Result<Vec<Environment>, CoreError>;
}

// ---------------------------------------------------------------------------
// UserStore
// ---------------------------------------------------------------------------

/// The slice of a user account the lifecycle needs: existence, activity,
/// and where to send notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: DbId,
    pub name: String,
    pub email: String,
    pub status: String,
}

impl UserAccount {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: DbId) -> Result<Option<UserAccount>, CoreError>;
}

// ---------------------------------------------------------------------------
// VoteStore
// ---------------------------------------------------------------------------

/// Ballot persistence. One effective ballot per (environment, round kind,
/// voter): upserts replace the earlier ballot.
#[async_trait]
pub trait VoteStore: Send + Sync {
    async fn upsert_definition(
        &self,
        environment_id: DbId,
        ballot: &DefinitionBallot,
    ) -> Result<(), CoreError>;

    async fn upsert_priority(
        &self,
        environment_id: DbId,
        ballot: &PriorityBallot,
    ) -> Result<(), CoreError>;

    async fn definition_ballots(
        &self,
        environment_id: DbId,
    ) -> Result<Vec<DefinitionBallot>, CoreError>;

    async fn priority_ballots(
        &self,
        environment_id: DbId,
    ) -> Result<Vec<PriorityBallot>, CoreError>;

    /// Distinct voters with an effective ballot for the round.
    async fn count_for_round(
        &self,
        environment_id: DbId,
        kind: RoundKind,
    ) -> Result<i64, CoreError>;
}

// ---------------------------------------------------------------------------
// TaskStore
// ---------------------------------------------------------------------------

/// Execution state of a queued promotion task. A claimed task is owned by
/// a worker but not yet processed; `done` and `failed` are terminal and
/// are only set after the promotion attempt finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Claimed,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Claimed => "claimed",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "claimed" => Some(TaskStatus::Claimed),
            "done" => Some(TaskStatus::Done),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

/// A queued request to close a round ahead of its closing date. Created by
/// the "end voting now" operation; the caller gets the task id back
/// immediately and the scheduler drains pending tasks on its next tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionTask {
    pub id: DbId,
    pub environment_id: DbId,
    pub kind: RoundKind,
    pub status: TaskStatus,
    pub requested_by: DbId,
    pub error: Option<String>,
    pub created_at: Timestamp,
}

/// Queue of promotion tasks with at-most-once claim semantics: a task
/// returned by `claim_pending` is not handed to any other claimant.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn enqueue(
        &self,
        environment_id: DbId,
        kind: RoundKind,
        requested_by: DbId,
    ) -> Result<PromotionTask, CoreError>;

    /// Move up to `limit` pending tasks to `claimed` and return them. A
    /// claimed task stays claimed until `mark_done` or `mark_failed`
    /// records its outcome, so a crash between claim and processing is
    /// visible to anyone polling the task.
    async fn claim_pending(&self, limit: i64) -> Result<Vec<PromotionTask>, CoreError>;

    async fn mark_done(&self, task_id: DbId) -> Result<(), CoreError>;

    async fn mark_failed(&self, task_id: DbId, error: &str) -> Result<(), CoreError>;

    async fn find_by_id(&self, task_id: DbId) -> Result<Option<PromotionTask>, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_activity_gate() {
        let mut user = UserAccount {
            id: 1,
            name: "ana".into(),
            email: "ana@example.org".into(),
            status: "active".into(),
        };
        assert!(user.is_active());
        user.status = "pending".into();
        assert!(!user.is_active());
    }

    #[test]
    fn task_status_round_trips() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Claimed,
            TaskStatus::Done,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("running"), None);
    }
}
