//! Round promotion: tallying an expired (or force-ended) round and moving
//! the environment to its next phase.
//!
//! Promotion is idempotent. Each path re-checks the environment status on
//! a fresh load and commits through the version check; losing the race to
//! another promoter surfaces as a conflict and is reported as
//! `AlreadyProcessed` with no duplicate notification.

use seco_core::status::{EnvironmentStatus, RoundKind};
use seco_core::store::PromotionTask;
use seco_core::tally::{tally_definition, tally_priority};
use seco_core::{CoreError, DbId, Environment, Timestamp};

use crate::emails;
use crate::Engine;

/// Result of a promotion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// This call performed the promotion.
    Promoted,
    /// The environment was already past the promoted phase, or a
    /// concurrent promoter committed first.
    AlreadyProcessed,
}

impl Engine {
    /// Close the definition round from the current ballots and open the
    /// priority round over the selected candidates.
    pub async fn promote_definition(
        &self,
        env_id: DbId,
        now: Timestamp,
    ) -> Result<PromotionOutcome, CoreError> {
        let mut env = self.environments().load(env_id).await?;
        if env.status != EnvironmentStatus::WaitingRcrVoting {
            return Ok(PromotionOutcome::AlreadyProcessed);
        }

        let ballots = self.votes().definition_ballots(env_id).await?;
        let outcome = tally_definition(
            &env.definition_round.candidates,
            &ballots,
            &self.settings().definition_policy,
        );
        let closing = now + self.settings().priority_window;

        if let Err(err) = env.close_definition_round(&outcome.selected, closing) {
            return if err.is_conflict() {
                Ok(PromotionOutcome::AlreadyProcessed)
            } else {
                Err(err)
            };
        }
        let env = match self.environments().replace(&env).await {
            Ok(env) => env,
            Err(err) if err.is_conflict() => return Ok(PromotionOutcome::AlreadyProcessed),
            Err(err) => return Err(err),
        };

        tracing::info!(
            environment_id = env.id,
            voters = outcome.voter_count,
            selected = ?outcome.selected,
            "Definition round promoted"
        );
        let (subject, body) = emails::definition_voting_completed(&env.name);
        self.notify_owner(&env, &subject, &body).await;
        Ok(PromotionOutcome::Promoted)
    }

    /// Close the priority round from the current rankings, record the
    /// final RCR and close the environment.
    pub async fn promote_priority(&self, env_id: DbId) -> Result<PromotionOutcome, CoreError> {
        let mut env = self.environments().load(env_id).await?;
        if env.status != EnvironmentStatus::WaitingRcrPriority {
            return Ok(PromotionOutcome::AlreadyProcessed);
        }
        let candidates = match &env.priority_round {
            Some(round) => round.candidates.clone(),
            None => return Ok(PromotionOutcome::AlreadyProcessed),
        };

        let ballots = self.votes().priority_ballots(env_id).await?;
        let outcome = tally_priority(&candidates, &ballots, &self.settings().priority_policy);

        if let Err(err) = env.close_priority_round(outcome.winner) {
            return if err.is_conflict() {
                Ok(PromotionOutcome::AlreadyProcessed)
            } else {
                Err(err)
            };
        }
        let env = match self.environments().replace(&env).await {
            Ok(env) => env,
            Err(err) if err.is_conflict() => return Ok(PromotionOutcome::AlreadyProcessed),
            Err(err) => return Err(err),
        };

        tracing::info!(
            environment_id = env.id,
            winner = ?outcome.winner,
            "Priority round promoted, environment closed"
        );
        let (subject, body) = emails::priority_voting_completed(&env.name);
        self.notify_owner(&env, &subject, &body).await;
        Ok(PromotionOutcome::Promoted)
    }

    /// Request an early end to a round. Returns the queued task so the
    /// caller can poll its outcome instead of firing and forgetting.
    pub async fn end_voting(
        &self,
        env_id: DbId,
        kind: RoundKind,
        requested_by: DbId,
    ) -> Result<PromotionTask, CoreError> {
        // Surface a missing environment at enqueue time, not at drain time.
        self.environments().load(env_id).await?;
        self.tasks().enqueue(env_id, kind, requested_by).await
    }

    /// Look up a queued promotion task, for callers polling the outcome
    /// of an [`end_voting`](Engine::end_voting) request.
    pub async fn promotion_task(
        &self,
        task_id: DbId,
    ) -> Result<Option<PromotionTask>, CoreError> {
        self.tasks().find_by_id(task_id).await
    }

    /// Distinct voters with an effective ballot for the round, for
    /// progress displays while voting is open. Re-votes count once.
    pub async fn voting_progress(&self, env_id: DbId, kind: RoundKind) -> Result<i64, CoreError> {
        self.environments().load(env_id).await?;
        self.votes().count_for_round(env_id, kind).await
    }

    /// Environments whose round of `kind` is open past its closing date.
    pub async fn expired_environments(
        &self,
        kind: RoundKind,
        now: Timestamp,
    ) -> Result<Vec<Environment>, CoreError> {
        self.environments().list_expired(kind, now).await
    }

    /// Claim up to `limit` pending promotion tasks.
    pub async fn claim_promotion_tasks(
        &self,
        limit: i64,
    ) -> Result<Vec<PromotionTask>, CoreError> {
        self.tasks().claim_pending(limit).await
    }

    /// Run one claimed task and record its terminal state.
    pub async fn process_promotion_task(
        &self,
        task: &PromotionTask,
        now: Timestamp,
    ) -> Result<PromotionOutcome, CoreError> {
        let result = match task.kind {
            RoundKind::Definition => self.promote_definition(task.environment_id, now).await,
            RoundKind::Priority => self.promote_priority(task.environment_id).await,
        };
        match &result {
            Ok(_) => self.tasks().mark_done(task.id).await?,
            Err(err) => self.tasks().mark_failed(task.id, &err.to_string()).await?,
        }
        result
    }
}
