//! Adapters from the repositories to the core store traits.
//!
//! All sqlx errors surface as `CoreError::Storage`; a zero-row replace
//! surfaces as `CoreError::Conflict` so callers can retry against the
//! fresh document.

use async_trait::async_trait;
use sqlx::PgPool;

use seco_core::status::RoundKind;
use seco_core::store::{
    EnvironmentStore, PromotionTask, TaskStore, UserAccount, UserStore, VoteStore,
};
use seco_core::{
    CoreError, DbId, DefinitionBallot, Environment, NewEnvironment, PriorityBallot, Timestamp,
};

use crate::repositories::{EnvironmentRepo, TaskRepo, UserRepo, VoteRepo};

fn storage_err(err: sqlx::Error) -> CoreError {
    CoreError::Storage(err.to_string())
}

// ---------------------------------------------------------------------------
// PgEnvironmentStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgEnvironmentStore {
    pool: PgPool,
}

impl PgEnvironmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnvironmentStore for PgEnvironmentStore {
    async fn insert(&self, new_env: NewEnvironment) -> Result<Environment, CoreError> {
        let row = EnvironmentRepo::insert(&self.pool, &new_env)
            .await
            .map_err(storage_err)?;
        row.into_domain()
    }

    async fn load(&self, id: DbId) -> Result<Environment, CoreError> {
        let row = EnvironmentRepo::find_by_id(&self.pool, id)
            .await
            .map_err(storage_err)?
            .ok_or(CoreError::NotFound {
                entity: "environment",
                id,
            })?;
        row.into_domain()
    }

    async fn list_by_owner(&self, owner_id: DbId) -> Result<Vec<Environment>, CoreError> {
        let rows = EnvironmentRepo::list_by_owner(&self.pool, owner_id)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(|r| r.into_domain()).collect()
    }

    async fn replace(&self, env: &Environment) -> Result<Environment, CoreError> {
        let row = EnvironmentRepo::replace(&self.pool, env)
            .await
            .map_err(storage_err)?
            .ok_or_else(|| {
                CoreError::Conflict(format!(
                    "environment {} was modified concurrently (expected version {})",
                    env.id, env.version
                ))
            })?;
        row.into_domain()
    }

    async fn list_expired(
        &self,
        kind: RoundKind,
        now: Timestamp,
    ) -> Result<Vec<Environment>, CoreError> {
        let rows = EnvironmentRepo::list_expired(&self.pool, kind, now)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(|r| r.into_domain()).collect()
    }
}

// ---------------------------------------------------------------------------
// PgUserStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: DbId) -> Result<Option<UserAccount>, CoreError> {
        let row = UserRepo::find_by_id(&self.pool, id)
            .await
            .map_err(storage_err)?;
        Ok(row.map(Into::into))
    }
}

// ---------------------------------------------------------------------------
// PgVoteStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgVoteStore {
    pool: PgPool,
}

impl PgVoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoteStore for PgVoteStore {
    async fn upsert_definition(
        &self,
        environment_id: DbId,
        ballot: &DefinitionBallot,
    ) -> Result<(), CoreError> {
        VoteRepo::upsert_definition(&self.pool, environment_id, ballot)
            .await
            .map_err(storage_err)
    }

    async fn upsert_priority(
        &self,
        environment_id: DbId,
        ballot: &PriorityBallot,
    ) -> Result<(), CoreError> {
        VoteRepo::upsert_priority(&self.pool, environment_id, ballot)
            .await
            .map_err(storage_err)
    }

    async fn definition_ballots(
        &self,
        environment_id: DbId,
    ) -> Result<Vec<DefinitionBallot>, CoreError> {
        VoteRepo::definition_ballots(&self.pool, environment_id)
            .await
            .map_err(storage_err)
    }

    async fn priority_ballots(
        &self,
        environment_id: DbId,
    ) -> Result<Vec<PriorityBallot>, CoreError> {
        VoteRepo::priority_ballots(&self.pool, environment_id)
            .await
            .map_err(storage_err)
    }

    async fn count_for_round(
        &self,
        environment_id: DbId,
        kind: RoundKind,
    ) -> Result<i64, CoreError> {
        VoteRepo::count_for_round(&self.pool, environment_id, kind)
            .await
            .map_err(storage_err)
    }
}

// ---------------------------------------------------------------------------
// PgTaskStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn enqueue(
        &self,
        environment_id: DbId,
        kind: RoundKind,
        requested_by: DbId,
    ) -> Result<PromotionTask, CoreError> {
        let row = TaskRepo::enqueue(&self.pool, environment_id, kind, requested_by)
            .await
            .map_err(storage_err)?;
        row.into_domain()
    }

    async fn claim_pending(&self, limit: i64) -> Result<Vec<PromotionTask>, CoreError> {
        let rows = TaskRepo::claim_pending(&self.pool, limit)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(|r| r.into_domain()).collect()
    }

    async fn mark_done(&self, task_id: DbId) -> Result<(), CoreError> {
        TaskRepo::mark_done(&self.pool, task_id)
            .await
            .map_err(storage_err)
    }

    async fn mark_failed(&self, task_id: DbId, error: &str) -> Result<(), CoreError> {
        TaskRepo::mark_failed(&self.pool, task_id, error)
            .await
            .map_err(storage_err)
    }

    async fn find_by_id(&self, task_id: DbId) -> Result<Option<PromotionTask>, CoreError> {
        match TaskRepo::find_by_id(&self.pool, task_id)
            .await
            .map_err(storage_err)?
        {
            Some(row) => Ok(Some(row.into_domain()?)),
            None => Ok(None),
        }
    }
}
