//! Ballot rows. One row per (environment, round kind, voter); the payload
//! column holds the candidate id list.

use sqlx::FromRow;

use seco_core::types::{DbId, Timestamp};
use seco_core::{DefinitionBallot, PriorityBallot};

/// A row from `votes` with `kind = 'definition'`.
#[derive(Debug, Clone, FromRow)]
pub struct DefinitionVoteRow {
    pub voter_id: DbId,
    pub candidate_ids: Vec<DbId>,
    pub cast_at: Timestamp,
}

impl From<DefinitionVoteRow> for DefinitionBallot {
    fn from(row: DefinitionVoteRow) -> Self {
        DefinitionBallot {
            voter_id: row.voter_id,
            candidate_ids: row.candidate_ids,
            cast_at: row.cast_at,
        }
    }
}

/// A row from `votes` with `kind = 'priority'`. Array order is the voter's
/// ranking, best first.
#[derive(Debug, Clone, FromRow)]
pub struct PriorityVoteRow {
    pub voter_id: DbId,
    pub candidate_ids: Vec<DbId>,
    pub cast_at: Timestamp,
}

impl From<PriorityVoteRow> for PriorityBallot {
    fn from(row: PriorityVoteRow) -> Self {
        PriorityBallot {
            voter_id: row.voter_id,
            ranked_candidate_ids: row.candidate_ids,
            cast_at: row.cast_at,
        }
    }
}
