//! The environment document.
//!
//! An environment owns its two round sub-documents and the final RCR. All
//! lifecycle mutations live here as pure methods; the engine loads a
//! document, applies one mutation, and replaces it under a version check,
//! so every operation is all-or-nothing.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::round::{CandidateDraft, CandidateEdit, RcrCandidate, Round};
use crate::status::{EnvironmentStatus, RoundKind};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Mining specification
// ---------------------------------------------------------------------------

/// What kind of source the mining crawler walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiningType {
    /// Every repository of a named organization.
    Organization,
    /// An explicit repository list.
    Repos,
}

impl MiningType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MiningType::Organization => "organization",
            MiningType::Repos => "repos",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "organization" => Some(MiningType::Organization),
            "repos" => Some(MiningType::Repos),
            _ => None,
        }
    }
}

/// Issue filters forwarded to the mining crawler. Opaque to the lifecycle
/// engine beyond being stored and replayed on the mining request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningFilters {
    pub filter_type: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub rcr_keywords: Vec<String>,
    pub date_since: Option<String>,
    pub date_until: Option<String>,
    pub issues_status: Option<String>,
}

/// The mining half of an environment specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningSpec {
    pub mining_type: MiningType,
    pub organization_name: Option<String>,
    pub repos: Vec<String>,
    pub details: String,
    #[serde(default)]
    pub filters: MiningFilters,
}

// ---------------------------------------------------------------------------
// NewEnvironment
// ---------------------------------------------------------------------------

/// Creation request for an environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEnvironment {
    pub name: String,
    pub owner_id: DbId,
    pub mining: MiningSpec,
}

impl NewEnvironment {
    /// Shape validation: an organization mining type must carry the
    /// organization name, and at least one repository is required.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation("environment name is required".into()));
        }
        if self.mining.repos.is_empty() {
            return Err(CoreError::Validation(
                "at least one repository is required".into(),
            ));
        }
        if self.mining.mining_type == MiningType::Organization
            && self
                .mining
                .organization_name
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .is_empty()
        {
            return Err(CoreError::Validation(
                "mining type organization requires the organization name".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// One unit of mining-and-voting work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub id: DbId,
    pub name: String,
    pub owner_id: DbId,
    pub mining: MiningSpec,
    /// Opaque crawler output, set by the mining service callback.
    pub mining_data: Option<serde_json::Value>,
    /// Opaque clustering output, set by the topic service callback.
    pub topic_data: Option<serde_json::Value>,
    pub definition_round: Round,
    pub priority_round: Option<Round>,
    pub final_rcr: Option<RcrCandidate>,
    pub status: EnvironmentStatus,
    /// Optimistic-lock counter; bumped by the store on every replace.
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Environment {
    /// Validated status transition. Rejects anything outside the table
    /// before touching the document.
    pub fn set_status(&mut self, to: EnvironmentStatus) -> Result<(), CoreError> {
        self.status.validate_transition(to)?;
        self.status = to;
        Ok(())
    }

    /// The round currently accepting or awaiting votes, if any.
    pub fn active_round(&self) -> Option<&Round> {
        match self.status {
            EnvironmentStatus::WaitingRcrVoting => Some(&self.definition_round),
            EnvironmentStatus::WaitingRcrPriority => self.priority_round.as_ref(),
            _ => None,
        }
    }

    pub fn round(&self, kind: RoundKind) -> Option<&Round> {
        match kind {
            RoundKind::Definition => Some(&self.definition_round),
            RoundKind::Priority => self.priority_round.as_ref(),
        }
    }

    /// Write the mining blob and the new status as one document mutation.
    /// Blob and status are never individually visible.
    pub fn set_mining_data(
        &mut self,
        data: serde_json::Value,
        status: EnvironmentStatus,
    ) -> Result<(), CoreError> {
        self.status.validate_transition(status)?;
        self.mining_data = Some(data);
        self.status = status;
        Ok(())
    }

    /// Write the topic blob and the new status as one document mutation.
    pub fn set_topic_data(
        &mut self,
        data: serde_json::Value,
        status: EnvironmentStatus,
    ) -> Result<(), CoreError> {
        self.status.validate_transition(status)?;
        self.topic_data = Some(data);
        self.status = status;
        Ok(())
    }

    fn require_status(&self, expected: EnvironmentStatus) -> Result<(), CoreError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "environment is {}, expected {}",
                self.status.as_str(),
                expected.as_str()
            )))
        }
    }

    /// Append a definition-round candidate.
    ///
    /// Legal while the environment is elaborating; the first append after
    /// topic generation moves `topics_done` to `elaborating_definition`.
    pub fn append_definition_candidate(
        &mut self,
        draft: CandidateDraft,
    ) -> Result<DbId, CoreError> {
        match self.status {
            EnvironmentStatus::TopicsDone => {
                self.set_status(EnvironmentStatus::ElaboratingDefinition)?;
            }
            EnvironmentStatus::ElaboratingDefinition => {}
            other => {
                return Err(CoreError::Conflict(format!(
                    "candidates cannot be added while environment is {}",
                    other.as_str()
                )))
            }
        }
        self.definition_round.append_candidate(draft)
    }

    /// Edit a definition-round candidate. Rejected once voting is open.
    pub fn update_definition_candidate(
        &mut self,
        id: DbId,
        edit: CandidateEdit,
    ) -> Result<(), CoreError> {
        self.require_status(EnvironmentStatus::ElaboratingDefinition)?;
        self.definition_round.update_candidate(id, edit)
    }

    /// Delete a definition-round candidate. Ids are never reused.
    pub fn delete_definition_candidate(&mut self, id: DbId) -> Result<(), CoreError> {
        self.require_status(EnvironmentStatus::ElaboratingDefinition)?;
        self.definition_round.delete_candidate(id)
    }

    /// Open definition voting: round elaborating → open, environment
    /// `elaborating_definition` → `waiting_rcr_voting`.
    pub fn open_definition_voting(&mut self, closing_date: Timestamp) -> Result<(), CoreError> {
        self.require_status(EnvironmentStatus::ElaboratingDefinition)?;
        self.status
            .validate_transition(EnvironmentStatus::WaitingRcrVoting)?;
        self.definition_round.open_voting(closing_date)?;
        self.status = EnvironmentStatus::WaitingRcrVoting;
        Ok(())
    }

    /// Close the definition round and open the priority round from the
    /// selection. A second invocation without a new definition round is a
    /// conflict (the priority round already exists).
    pub fn close_definition_round(
        &mut self,
        selected_ids: &[DbId],
        priority_closing_date: Timestamp,
    ) -> Result<(), CoreError> {
        self.require_status(EnvironmentStatus::WaitingRcrVoting)?;
        if self.priority_round.is_some() {
            return Err(CoreError::Conflict(
                "priority round already created for this environment".into(),
            ));
        }
        let priority =
            Round::from_selection(&self.definition_round, selected_ids, priority_closing_date)?;
        self.definition_round.close()?;
        self.set_status(EnvironmentStatus::RcrVotingDone)?;
        self.priority_round = Some(priority);
        self.set_status(EnvironmentStatus::WaitingRcrPriority)?;
        Ok(())
    }

    /// Close the priority round: record the final RCR and close the
    /// environment (`priority_voting_done` then `closed`).
    pub fn close_priority_round(&mut self, final_candidate_id: Option<DbId>) -> Result<(), CoreError> {
        self.require_status(EnvironmentStatus::WaitingRcrPriority)?;
        let round = self
            .priority_round
            .as_mut()
            .ok_or_else(|| CoreError::Conflict("environment has no priority round".into()))?;
        let final_rcr = match final_candidate_id {
            Some(id) => Some(
                round
                    .candidate(id)
                    .cloned()
                    .ok_or(CoreError::NotFound {
                        entity: "rcr_candidate",
                        id,
                    })?,
            ),
            None => None,
        };
        round.close()?;
        self.final_rcr = final_rcr;
        self.set_status(EnvironmentStatus::PriorityVotingDone)?;
        self.set_status(EnvironmentStatus::Closed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::RoundStatus;
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn spec() -> NewEnvironment {
        NewEnvironment {
            name: "netdata ecosystem".into(),
            owner_id: 1,
            mining: MiningSpec {
                mining_type: MiningType::Repos,
                organization_name: None,
                repos: vec!["netdata/netdata".into()],
                details: "issue mining for RCR elaboration".into(),
                filters: MiningFilters::default(),
            },
        }
    }

    fn environment(status: EnvironmentStatus) -> Environment {
        let spec = spec();
        Environment {
            id: 1,
            name: spec.name,
            owner_id: spec.owner_id,
            mining: spec.mining,
            mining_data: None,
            topic_data: None,
            definition_round: Round::new(RoundKind::Definition),
            priority_round: None,
            final_rcr: None,
            status,
            version: 1,
            created_at: ts(0),
            updated_at: ts(0),
        }
    }

    fn draft(title: &str) -> CandidateDraft {
        CandidateDraft {
            title: title.into(),
            body: String::new(),
            main_issue: 10,
            related_to_issues: vec![],
            created_by: 1,
        }
    }

    #[test]
    fn organization_type_requires_name() {
        let mut new_env = spec();
        new_env.mining.mining_type = MiningType::Organization;
        assert_matches!(new_env.validate(), Err(CoreError::Validation(_)));
        new_env.mining.organization_name = Some("netdata".into());
        assert!(new_env.validate().is_ok());
    }

    #[test]
    fn repos_are_required() {
        let mut new_env = spec();
        new_env.mining.repos.clear();
        assert_matches!(new_env.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn mining_blob_and_status_move_together() {
        let mut env = environment(EnvironmentStatus::Mining);
        env.set_mining_data(
            serde_json::json!({"issues": [1, 2]}),
            EnvironmentStatus::MiningDone,
        )
        .unwrap();
        assert_eq!(env.status, EnvironmentStatus::MiningDone);
        assert!(env.mining_data.is_some());

        // Invalid transition leaves the blob untouched too.
        let mut env = environment(EnvironmentStatus::Closed);
        let err = env
            .set_mining_data(serde_json::json!({}), EnvironmentStatus::MiningDone)
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(env.mining_data.is_none());
        assert_eq!(env.status, EnvironmentStatus::Closed);
    }

    #[test]
    fn first_candidate_append_starts_elaboration() {
        let mut env = environment(EnvironmentStatus::TopicsDone);
        env.append_definition_candidate(draft("a")).unwrap();
        assert_eq!(env.status, EnvironmentStatus::ElaboratingDefinition);
        env.append_definition_candidate(draft("b")).unwrap();
        assert_eq!(env.definition_round.candidates.len(), 2);
    }

    #[test]
    fn candidate_mutation_rejected_outside_elaboration() {
        let mut env = environment(EnvironmentStatus::Mining);
        assert_matches!(
            env.append_definition_candidate(draft("a")),
            Err(CoreError::Conflict(_))
        );

        let mut env = environment(EnvironmentStatus::ElaboratingDefinition);
        env.append_definition_candidate(draft("a")).unwrap();
        env.open_definition_voting(ts(100)).unwrap();
        assert_matches!(
            env.append_definition_candidate(draft("b")),
            Err(CoreError::Conflict(_))
        );
        assert_matches!(
            env.update_definition_candidate(1, CandidateEdit::default()),
            Err(CoreError::Conflict(_))
        );
        assert_matches!(env.delete_definition_candidate(1), Err(CoreError::Conflict(_)));
    }

    #[test]
    fn open_definition_voting_sets_round_and_status() {
        let mut env = environment(EnvironmentStatus::ElaboratingDefinition);
        env.append_definition_candidate(draft("a")).unwrap();
        env.open_definition_voting(ts(500)).unwrap();
        assert_eq!(env.status, EnvironmentStatus::WaitingRcrVoting);
        assert_eq!(env.definition_round.status, RoundStatus::Open);
        assert_eq!(env.definition_round.closing_date, Some(ts(500)));
    }

    #[test]
    fn close_definition_opens_priority_from_selection() {
        let mut env = environment(EnvironmentStatus::ElaboratingDefinition);
        for t in ["a", "b", "c"] {
            env.append_definition_candidate(draft(t)).unwrap();
        }
        env.open_definition_voting(ts(500)).unwrap();
        env.close_definition_round(&[1, 3], ts(900)).unwrap();

        assert_eq!(env.status, EnvironmentStatus::WaitingRcrPriority);
        assert_eq!(env.definition_round.status, RoundStatus::Closed);
        let priority = env.priority_round.as_ref().unwrap();
        let ids: Vec<DbId> = priority.candidates.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(priority.closing_date, Some(ts(900)));
    }

    #[test]
    fn double_priority_creation_is_a_conflict() {
        let mut env = environment(EnvironmentStatus::ElaboratingDefinition);
        env.append_definition_candidate(draft("a")).unwrap();
        env.open_definition_voting(ts(500)).unwrap();
        env.close_definition_round(&[1], ts(900)).unwrap();
        assert_matches!(
            env.close_definition_round(&[1], ts(900)),
            Err(CoreError::Conflict(_))
        );
    }

    #[test]
    fn close_priority_records_final_rcr_and_closes() {
        let mut env = environment(EnvironmentStatus::ElaboratingDefinition);
        for t in ["a", "b"] {
            env.append_definition_candidate(draft(t)).unwrap();
        }
        env.open_definition_voting(ts(500)).unwrap();
        env.close_definition_round(&[1, 2], ts(900)).unwrap();
        env.close_priority_round(Some(2)).unwrap();

        assert_eq!(env.status, EnvironmentStatus::Closed);
        assert_eq!(env.final_rcr.as_ref().unwrap().id, 2);
        assert_eq!(
            env.priority_round.as_ref().unwrap().status,
            RoundStatus::Closed
        );

        // Re-closing is a conflict, not a second notification's worth of work.
        assert_matches!(env.close_priority_round(Some(2)), Err(CoreError::Conflict(_)));
    }

    #[test]
    fn close_priority_with_unknown_winner_is_not_found() {
        let mut env = environment(EnvironmentStatus::ElaboratingDefinition);
        env.append_definition_candidate(draft("a")).unwrap();
        env.open_definition_voting(ts(500)).unwrap();
        env.close_definition_round(&[1], ts(900)).unwrap();
        assert_matches!(
            env.close_priority_round(Some(42)),
            Err(CoreError::NotFound { entity: "rcr_candidate", id: 42 })
        );
        // Document unchanged: still awaiting priority votes.
        assert_eq!(env.status, EnvironmentStatus::WaitingRcrPriority);
    }

    #[test]
    fn active_round_follows_status() {
        let mut env = environment(EnvironmentStatus::ElaboratingDefinition);
        assert!(env.active_round().is_none());
        env.append_definition_candidate(draft("a")).unwrap();
        env.open_definition_voting(ts(500)).unwrap();
        assert_eq!(env.active_round().unwrap().kind, RoundKind::Definition);
        env.close_definition_round(&[1], ts(900)).unwrap();
        assert_eq!(env.active_round().unwrap().kind, RoundKind::Priority);
        env.close_priority_round(Some(1)).unwrap();
        assert!(env.active_round().is_none());
    }

    #[test]
    fn status_never_regresses_through_lifecycle_methods() {
        let mut env = environment(EnvironmentStatus::ElaboratingDefinition);
        let mut last_rank = env.status.rank();
        env.append_definition_candidate(draft("a")).unwrap();
        for step in [
            env.status.rank(),
            {
                env.open_definition_voting(ts(500)).unwrap();
                env.status.rank()
            },
            {
                env.close_definition_round(&[1], ts(900)).unwrap();
                env.status.rank()
            },
            {
                env.close_priority_round(Some(1)).unwrap();
                env.status.rank()
            },
        ] {
            assert!(step >= last_rank);
            last_rank = step;
        }
    }
}
