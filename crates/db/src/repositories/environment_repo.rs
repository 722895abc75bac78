//! Repository for the `environments` table.
//!
//! The document is written whole. `replace` carries the caller's version in
//! the WHERE clause, so a stale writer updates zero rows and the caller
//! sees the conflict instead of silently clobbering a newer document.

use sqlx::types::Json;
use sqlx::PgPool;

use seco_core::round::{RcrCandidate, Round};
use seco_core::status::{EnvironmentStatus, RoundKind};
use seco_core::types::{DbId, Timestamp};
use seco_core::{Environment, MiningSpec, NewEnvironment};

use crate::models::EnvironmentRow;

/// Column list for `environments` queries.
const COLUMNS: &str = "\
    id, name, owner_id, status, mining, mining_data, topic_data, \
    definition_data, priority_data, final_rcr, version, \
    created_at, updated_at";

/// Provides CRUD for environment documents.
pub struct EnvironmentRepo;

impl EnvironmentRepo {
    /// Insert a fresh document in `created` status at version 1, with an
    /// empty definition round.
    pub async fn insert(
        pool: &PgPool,
        new_env: &NewEnvironment,
    ) -> Result<EnvironmentRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO environments (name, owner_id, status, mining, definition_data, version) \
             VALUES ($1, $2, $3, $4, $5, 1) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EnvironmentRow>(&query)
            .bind(&new_env.name)
            .bind(new_env.owner_id)
            .bind(EnvironmentStatus::Created.as_str())
            .bind(Json(&new_env.mining))
            .bind(Json(Round::new(RoundKind::Definition)))
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<EnvironmentRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM environments WHERE id = $1");
        sqlx::query_as::<_, EnvironmentRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Vec<EnvironmentRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM environments WHERE owner_id = $1 ORDER BY id");
        sqlx::query_as::<_, EnvironmentRow>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Replace the whole document if the stored version still matches.
    /// Returns `None` when another writer got there first.
    pub async fn replace(
        pool: &PgPool,
        env: &Environment,
    ) -> Result<Option<EnvironmentRow>, sqlx::Error> {
        let query = format!(
            "UPDATE environments \
             SET name = $2, status = $3, mining = $4, mining_data = $5, \
                 topic_data = $6, definition_data = $7, priority_data = $8, \
                 final_rcr = $9, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $10 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EnvironmentRow>(&query)
            .bind(env.id)
            .bind(&env.name)
            .bind(env.status.as_str())
            .bind(Json::<&MiningSpec>(&env.mining))
            .bind(&env.mining_data)
            .bind(&env.topic_data)
            .bind(Json::<&Round>(&env.definition_round))
            .bind(env.priority_round.as_ref().map(Json::<&Round>))
            .bind(env.final_rcr.as_ref().map(Json::<&RcrCandidate>))
            .bind(env.version)
            .fetch_optional(pool)
            .await
    }

    /// Environments whose round of `kind` is open past its closing date.
    /// Status and kind are checked together so a document cannot match in
    /// the wrong phase.
    pub async fn list_expired(
        pool: &PgPool,
        kind: RoundKind,
        now: Timestamp,
    ) -> Result<Vec<EnvironmentRow>, sqlx::Error> {
        let (status, column) = match kind {
            RoundKind::Definition => (EnvironmentStatus::WaitingRcrVoting, "definition_data"),
            RoundKind::Priority => (EnvironmentStatus::WaitingRcrPriority, "priority_data"),
        };
        let query = format!(
            "SELECT {COLUMNS} FROM environments \
             WHERE status = $1 \
               AND {column}->>'status' = 'open' \
               AND ({column}->>'closing_date')::timestamptz <= $2 \
             ORDER BY id"
        );
        sqlx::query_as::<_, EnvironmentRow>(&query)
            .bind(status.as_str())
            .bind(now)
            .fetch_all(pool)
            .await
    }
}
