//! Environment and round status vocabularies.
//!
//! Status values are stored and exposed verbatim as strings; the enums here
//! exist so that every transition goes through an explicit table instead of
//! an arbitrary overwrite. Terminal states return an empty transition slice.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// EnvironmentStatus
// ---------------------------------------------------------------------------

/// Environment lifecycle status, in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentStatus {
    Created,
    Mining,
    MiningDone,
    MiningError,
    TopicsRequested,
    TopicsDone,
    ElaboratingDefinition,
    WaitingRcrVoting,
    RcrVotingDone,
    WaitingRcrPriority,
    PriorityVotingDone,
    Closed,
}

impl EnvironmentStatus {
    /// String representation, matching the wire and database values.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentStatus::Created => "created",
            EnvironmentStatus::Mining => "mining",
            EnvironmentStatus::MiningDone => "mining_done",
            EnvironmentStatus::MiningError => "mining_error",
            EnvironmentStatus::TopicsRequested => "topics_requested",
            EnvironmentStatus::TopicsDone => "topics_done",
            EnvironmentStatus::ElaboratingDefinition => "elaborating_definition",
            EnvironmentStatus::WaitingRcrVoting => "waiting_rcr_voting",
            EnvironmentStatus::RcrVotingDone => "rcr_voting_done",
            EnvironmentStatus::WaitingRcrPriority => "waiting_rcr_priority",
            EnvironmentStatus::PriorityVotingDone => "priority_voting_done",
            EnvironmentStatus::Closed => "closed",
        }
    }

    /// Parse from the wire/database string.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "created" => EnvironmentStatus::Created,
            "mining" => EnvironmentStatus::Mining,
            "mining_done" => EnvironmentStatus::MiningDone,
            "mining_error" => EnvironmentStatus::MiningError,
            "topics_requested" => EnvironmentStatus::TopicsRequested,
            "topics_done" => EnvironmentStatus::TopicsDone,
            "elaborating_definition" => EnvironmentStatus::ElaboratingDefinition,
            "waiting_rcr_voting" => EnvironmentStatus::WaitingRcrVoting,
            "rcr_voting_done" => EnvironmentStatus::RcrVotingDone,
            "waiting_rcr_priority" => EnvironmentStatus::WaitingRcrPriority,
            "priority_voting_done" => EnvironmentStatus::PriorityVotingDone,
            "closed" => EnvironmentStatus::Closed,
            _ => return None,
        })
    }

    /// Position in the lifecycle partial order. `mining_done` and
    /// `mining_error` share a rank because they are branches of the same
    /// step. A well-behaved environment's rank never decreases.
    pub fn rank(&self) -> u8 {
        match self {
            EnvironmentStatus::Created => 0,
            EnvironmentStatus::Mining => 1,
            EnvironmentStatus::MiningDone | EnvironmentStatus::MiningError => 2,
            EnvironmentStatus::TopicsRequested => 3,
            EnvironmentStatus::TopicsDone => 4,
            EnvironmentStatus::ElaboratingDefinition => 5,
            EnvironmentStatus::WaitingRcrVoting => 6,
            EnvironmentStatus::RcrVotingDone => 7,
            EnvironmentStatus::WaitingRcrPriority => 8,
            EnvironmentStatus::PriorityVotingDone => 9,
            EnvironmentStatus::Closed => 10,
        }
    }

    /// The set of statuses reachable from `self`.
    ///
    /// Terminal states (`mining_error`, `closed`) return an empty slice.
    pub fn valid_transitions(&self) -> &'static [EnvironmentStatus] {
        use EnvironmentStatus::*;
        match self {
            Created => &[Mining, MiningError],
            Mining => &[MiningDone, MiningError],
            MiningDone => &[TopicsRequested],
            TopicsRequested => &[TopicsDone],
            TopicsDone => &[ElaboratingDefinition],
            ElaboratingDefinition => &[WaitingRcrVoting],
            WaitingRcrVoting => &[RcrVotingDone],
            RcrVotingDone => &[WaitingRcrPriority],
            WaitingRcrPriority => &[PriorityVotingDone],
            PriorityVotingDone => &[Closed],
            MiningError | Closed => &[],
        }
    }

    /// Check whether a transition from `self` to `to` is allowed.
    pub fn can_transition(&self, to: EnvironmentStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate a transition, rejecting anything outside the table.
    pub fn validate_transition(&self, to: EnvironmentStatus) -> Result<(), CoreError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "invalid status transition: {} -> {}",
                self.as_str(),
                to.as_str()
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// RoundStatus
// ---------------------------------------------------------------------------

/// Voting-round phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Elaborating,
    Open,
    Closed,
}

impl RoundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundStatus::Elaborating => "elaborating",
            RoundStatus::Open => "open",
            RoundStatus::Closed => "closed",
        }
    }
}

// ---------------------------------------------------------------------------
// RoundKind
// ---------------------------------------------------------------------------

/// Which of the two voting rounds a document or ballot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundKind {
    Definition,
    Priority,
}

impl RoundKind {
    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundKind::Definition => "definition",
            RoundKind::Priority => "priority",
        }
    }

    /// Parse from a database string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "definition" => Some(RoundKind::Definition),
            "priority" => Some(RoundKind::Priority),
            _ => None,
        }
    }
}
