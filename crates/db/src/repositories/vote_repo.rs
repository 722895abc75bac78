//! Repository for the `votes` table.
//!
//! One row per (environment, kind, voter). Re-voting is an upsert: the new
//! candidate list and cast time replace the old ones, so tallies only ever
//! see the latest ballot.

use sqlx::PgPool;

use seco_core::status::RoundKind;
use seco_core::types::DbId;
use seco_core::{DefinitionBallot, PriorityBallot};

use crate::models::{DefinitionVoteRow, PriorityVoteRow};

const COLUMNS: &str = "voter_id, candidate_ids, cast_at";

/// Provides ballot persistence for both round kinds.
pub struct VoteRepo;

impl VoteRepo {
    pub async fn upsert_definition(
        pool: &PgPool,
        environment_id: DbId,
        ballot: &DefinitionBallot,
    ) -> Result<(), sqlx::Error> {
        Self::upsert(
            pool,
            environment_id,
            RoundKind::Definition,
            ballot.voter_id,
            &ballot.candidate_ids,
        )
        .await
    }

    pub async fn upsert_priority(
        pool: &PgPool,
        environment_id: DbId,
        ballot: &PriorityBallot,
    ) -> Result<(), sqlx::Error> {
        Self::upsert(
            pool,
            environment_id,
            RoundKind::Priority,
            ballot.voter_id,
            &ballot.ranked_candidate_ids,
        )
        .await
    }

    async fn upsert(
        pool: &PgPool,
        environment_id: DbId,
        kind: RoundKind,
        voter_id: DbId,
        candidate_ids: &[DbId],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO votes (environment_id, kind, voter_id, candidate_ids, cast_at) \
             VALUES ($1, $2, $3, $4, NOW()) \
             ON CONFLICT (environment_id, kind, voter_id) \
             DO UPDATE SET candidate_ids = EXCLUDED.candidate_ids, cast_at = NOW()",
        )
        .bind(environment_id)
        .bind(kind.as_str())
        .bind(voter_id)
        .bind(candidate_ids)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn definition_ballots(
        pool: &PgPool,
        environment_id: DbId,
    ) -> Result<Vec<DefinitionBallot>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM votes \
             WHERE environment_id = $1 AND kind = $2 ORDER BY voter_id"
        );
        let rows = sqlx::query_as::<_, DefinitionVoteRow>(&query)
            .bind(environment_id)
            .bind(RoundKind::Definition.as_str())
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn priority_ballots(
        pool: &PgPool,
        environment_id: DbId,
    ) -> Result<Vec<PriorityBallot>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM votes \
             WHERE environment_id = $1 AND kind = $2 ORDER BY voter_id"
        );
        let rows = sqlx::query_as::<_, PriorityVoteRow>(&query)
            .bind(environment_id)
            .bind(RoundKind::Priority.as_str())
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn count_for_round(
        pool: &PgPool,
        environment_id: DbId,
        kind: RoundKind,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM votes WHERE environment_id = $1 AND kind = $2",
        )
        .bind(environment_id)
        .bind(kind.as_str())
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}
