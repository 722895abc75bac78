//! Definition and priority ballots.
//!
//! At most one ballot per (environment, round, voter) is effective: a later
//! ballot from the same voter replaces the earlier one. The store enforces
//! this with an upsert; [`latest_per_voter`] re-applies the same rule inside
//! the tally so the outcome is independent of how ballots are supplied.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Ballot types
// ---------------------------------------------------------------------------

/// A definition-round ballot: the set of candidate ids the voter selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionBallot {
    #[serde(rename = "voterId")]
    pub voter_id: DbId,
    #[serde(rename = "candidateIds")]
    pub candidate_ids: Vec<DbId>,
    #[serde(rename = "castAt")]
    pub cast_at: Timestamp,
}

/// A priority-round ballot: candidate ids ranked most-preferred first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityBallot {
    #[serde(rename = "voterId")]
    pub voter_id: DbId,
    #[serde(rename = "rankedCandidateIds")]
    pub ranked_candidate_ids: Vec<DbId>,
    #[serde(rename = "castAt")]
    pub cast_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Last-write-wins dedupe
// ---------------------------------------------------------------------------

/// Common ballot surface used by the dedupe and the tallies.
pub trait Ballot {
    fn voter_id(&self) -> DbId;
    fn cast_at(&self) -> Timestamp;
    /// Payload used only as a deterministic tie-break when a voter somehow
    /// has two ballots with identical timestamps.
    fn payload(&self) -> &[DbId];
}

impl Ballot for DefinitionBallot {
    fn voter_id(&self) -> DbId {
        self.voter_id
    }
    fn cast_at(&self) -> Timestamp {
        self.cast_at
    }
    fn payload(&self) -> &[DbId] {
        &self.candidate_ids
    }
}

impl Ballot for PriorityBallot {
    fn voter_id(&self) -> DbId {
        self.voter_id
    }
    fn cast_at(&self) -> Timestamp {
        self.cast_at
    }
    fn payload(&self) -> &[DbId] {
        &self.ranked_candidate_ids
    }
}

/// Reduce a ballot set to the latest ballot per voter (last write wins),
/// ordered by ascending voter id.
///
/// The result is a pure function of the input *set*: supplying the same
/// ballots in any order yields the same output.
pub fn latest_per_voter<B: Ballot + Clone>(ballots: &[B]) -> Vec<B> {
    let mut sorted: Vec<&B> = ballots.iter().collect();
    sorted.sort_by(|a, b| {
        a.voter_id()
            .cmp(&b.voter_id())
            .then(a.cast_at().cmp(&b.cast_at()))
            .then_with(|| a.payload().cmp(b.payload()))
    });

    let mut effective: Vec<B> = Vec::new();
    for ballot in sorted {
        match effective.last_mut() {
            Some(last) if last.voter_id() == ballot.voter_id() => *last = ballot.clone(),
            _ => effective.push(ballot.clone()),
        }
    }
    effective
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ballot(voter: DbId, ids: &[DbId], secs: i64) -> DefinitionBallot {
        DefinitionBallot {
            voter_id: voter,
            candidate_ids: ids.to_vec(),
            cast_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn later_ballot_replaces_earlier() {
        let ballots = vec![ballot(1, &[1, 2], 10), ballot(1, &[3], 20)];
        let effective = latest_per_voter(&ballots);
        assert_eq!(effective.len(), 1);
        assert_eq!(effective[0].candidate_ids, vec![3]);
    }

    #[test]
    fn independent_voters_all_kept() {
        let ballots = vec![ballot(2, &[1], 10), ballot(1, &[2], 10), ballot(3, &[3], 5)];
        let effective = latest_per_voter(&ballots);
        let voters: Vec<DbId> = effective.iter().map(|b| b.voter_id).collect();
        assert_eq!(voters, vec![1, 2, 3]);
    }

    #[test]
    fn result_is_order_independent() {
        let a = ballot(1, &[1], 10);
        let b = ballot(1, &[2], 20);
        let c = ballot(2, &[3], 15);
        let forward = latest_per_voter(&[a.clone(), b.clone(), c.clone()]);
        let backward = latest_per_voter(&[c, b, a]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn equal_timestamps_break_ties_deterministically() {
        let x = ballot(1, &[1], 10);
        let y = ballot(1, &[2], 10);
        let one = latest_per_voter(&[x.clone(), y.clone()]);
        let two = latest_per_voter(&[y, x]);
        assert_eq!(one, two);
    }

    #[test]
    fn ballot_wire_shape() {
        let value = serde_json::to_value(ballot(9, &[1, 3], 0)).unwrap();
        assert_eq!(value["voterId"], 9);
        assert_eq!(value["candidateIds"], serde_json::json!([1, 3]));

        let priority = PriorityBallot {
            voter_id: 9,
            ranked_candidate_ids: vec![3, 1],
            cast_at: Utc.timestamp_opt(0, 0).unwrap(),
        };
        let value = serde_json::to_value(priority).unwrap();
        assert_eq!(value["rankedCandidateIds"], serde_json::json!([3, 1]));
    }
}
