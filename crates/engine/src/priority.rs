//! Priority-round ballot recording and read access.
//!
//! The priority round itself is created by promotion (see
//! [`crate::promotion`]); this side only records rankings while it is
//! open.

use chrono::Utc;

use seco_core::round::Round;
use seco_core::status::{EnvironmentStatus, RoundStatus};
use seco_core::{CoreError, DbId, PriorityBallot};

use crate::Engine;

impl Engine {
    /// Record (or overwrite) a voter's priority ranking, most preferred
    /// first.
    pub async fn cast_priority_ballot(
        &self,
        env_id: DbId,
        voter_id: DbId,
        ranked_candidate_ids: Vec<DbId>,
    ) -> Result<(), CoreError> {
        let env = self.environments().load(env_id).await?;
        let round = match (&env.status, &env.priority_round) {
            (EnvironmentStatus::WaitingRcrPriority, Some(round))
                if round.status == RoundStatus::Open =>
            {
                round
            }
            _ => {
                return Err(CoreError::Conflict(
                    "priority round is not accepting votes".into(),
                ))
            }
        };
        for id in &ranked_candidate_ids {
            if !round.contains(*id) {
                return Err(CoreError::Validation(format!(
                    "unknown candidate id {id} in ballot"
                )));
            }
        }
        let ballot = PriorityBallot {
            voter_id,
            ranked_candidate_ids,
            cast_at: Utc::now(),
        };
        self.votes().upsert_priority(env_id, &ballot).await
    }

    pub async fn priority_round(&self, env_id: DbId) -> Result<Option<Round>, CoreError> {
        Ok(self.environments().load(env_id).await?.priority_round)
    }
}
