//! Definition-round candidate elaboration and ballot recording.

use chrono::Utc;

use seco_core::round::{CandidateDraft, CandidateEdit};
use seco_core::status::{EnvironmentStatus, RoundStatus};
use seco_core::{CoreError, DbId, DefinitionBallot, Environment, Timestamp};

use crate::Engine;

impl Engine {
    /// Append a candidate RCR to the definition round. Returns the
    /// assigned candidate id, which is monotonic and never reused across
    /// deletions.
    pub async fn append_candidate(
        &self,
        env_id: DbId,
        draft: CandidateDraft,
    ) -> Result<DbId, CoreError> {
        let (_, id) = self
            .mutate(env_id, |e| e.append_definition_candidate(draft.clone()))
            .await?;
        Ok(id)
    }

    pub async fn update_candidate(
        &self,
        env_id: DbId,
        candidate_id: DbId,
        edit: CandidateEdit,
    ) -> Result<(), CoreError> {
        self.mutate(env_id, |e| {
            e.update_definition_candidate(candidate_id, edit.clone())
        })
        .await?;
        Ok(())
    }

    pub async fn delete_candidate(
        &self,
        env_id: DbId,
        candidate_id: DbId,
    ) -> Result<(), CoreError> {
        self.mutate(env_id, |e| e.delete_definition_candidate(candidate_id))
            .await?;
        Ok(())
    }

    /// Freeze the candidate list and open definition voting until
    /// `closing_date`.
    pub async fn open_definition_voting(
        &self,
        env_id: DbId,
        closing_date: Timestamp,
    ) -> Result<Environment, CoreError> {
        let (env, _) = self
            .mutate(env_id, |e| e.open_definition_voting(closing_date))
            .await?;
        Ok(env)
    }

    /// Record (or overwrite) a voter's definition ballot.
    ///
    /// Only legal while the environment is in `waiting_rcr_voting` with an
    /// open definition round; every listed id must name a round candidate.
    pub async fn cast_definition_ballot(
        &self,
        env_id: DbId,
        voter_id: DbId,
        candidate_ids: Vec<DbId>,
    ) -> Result<(), CoreError> {
        let env = self.environments().load(env_id).await?;
        if env.status != EnvironmentStatus::WaitingRcrVoting
            || env.definition_round.status != RoundStatus::Open
        {
            return Err(CoreError::Conflict(
                "definition round is not accepting votes".into(),
            ));
        }
        for id in &candidate_ids {
            if !env.definition_round.contains(*id) {
                return Err(CoreError::Validation(format!(
                    "unknown candidate id {id} in ballot"
                )));
            }
        }
        let ballot = DefinitionBallot {
            voter_id,
            candidate_ids,
            cast_at: Utc::now(),
        };
        self.votes().upsert_definition(env_id, &ballot).await
    }
}
