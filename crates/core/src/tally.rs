//! Pure vote-tally functions.
//!
//! The exact threshold and scoring formulas are named, swappable policies
//! ([`DefinitionPolicy`], [`PriorityPolicy`]) rather than hard-wired rules.
//! Both tallies are pure: no I/O, and the outcome is a function of the
//! candidate list and the ballot *set*, independent of supply order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::round::RcrCandidate;
use crate::types::{DbId, Timestamp};
use crate::vote::{latest_per_voter, DefinitionBallot, PriorityBallot};

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Selection policy for the definition round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum DefinitionPolicy {
    /// A candidate is selected iff its distinct-voter count strictly
    /// exceeds half the number of distinct voters in the round.
    /// `max_selected` optionally caps the selection at the N candidates
    /// with the highest counts.
    SimpleMajority { max_selected: Option<usize> },
}

impl Default for DefinitionPolicy {
    fn default() -> Self {
        DefinitionPolicy::SimpleMajority { max_selected: None }
    }
}

/// Ranking policy for the priority round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PriorityPolicy {
    /// Borda count: in a round with N candidates, rank position k (1-based)
    /// earns N − k points; the highest aggregate score wins.
    BordaCount,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        PriorityPolicy::BordaCount
    }
}

// ---------------------------------------------------------------------------
// Definition tally
// ---------------------------------------------------------------------------

/// Per-candidate result of the definition tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCount {
    pub candidate_id: DbId,
    /// Distinct voters whose ballot includes this candidate.
    pub votes: usize,
    /// Earliest cast-at among the ballots supporting this candidate.
    pub first_cast_at: Option<Timestamp>,
}

/// Outcome of tallying a definition round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionOutcome {
    /// Distinct voters who cast any definition ballot.
    pub voter_count: usize,
    /// Minimum vote count a candidate needs to be selected.
    pub required_votes: usize,
    /// Counts for every candidate, ascending by candidate id.
    pub counts: Vec<CandidateCount>,
    /// Selected candidate ids, ascending.
    pub selected: Vec<DbId>,
}

/// Tally a definition round under the given policy.
pub fn tally_definition(
    candidates: &[RcrCandidate],
    ballots: &[DefinitionBallot],
    policy: &DefinitionPolicy,
) -> DefinitionOutcome {
    let effective = latest_per_voter(ballots);
    let voter_count = effective.len();
    // Strictly more than half: votes * 2 > voter_count.
    let required_votes = voter_count / 2 + 1;

    let mut counts: Vec<CandidateCount> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let mut votes = 0usize;
        let mut first_cast_at: Option<Timestamp> = None;
        for ballot in &effective {
            // A ballot listing the same id twice still counts one voter.
            if ballot.candidate_ids.contains(&candidate.id) {
                votes += 1;
                first_cast_at = match first_cast_at {
                    Some(t) if t <= ballot.cast_at => Some(t),
                    _ => Some(ballot.cast_at),
                };
            }
        }
        counts.push(CandidateCount {
            candidate_id: candidate.id,
            votes,
            first_cast_at,
        });
    }
    counts.sort_by(|a, b| {
        a.candidate_id
            .cmp(&b.candidate_id)
            .then(a.first_cast_at.cmp(&b.first_cast_at))
    });

    let DefinitionPolicy::SimpleMajority { max_selected } = policy;

    let mut majority: Vec<&CandidateCount> = counts
        .iter()
        .filter(|c| voter_count > 0 && c.votes >= required_votes)
        .collect();

    if let Some(cap) = max_selected {
        // Highest counts first; ties by ascending id, then first cast-at.
        majority.sort_by(|a, b| {
            b.votes
                .cmp(&a.votes)
                .then(a.candidate_id.cmp(&b.candidate_id))
                .then(a.first_cast_at.cmp(&b.first_cast_at))
        });
        majority.truncate(*cap);
    }

    let mut selected: Vec<DbId> = majority.iter().map(|c| c.candidate_id).collect();
    selected.sort_unstable();

    DefinitionOutcome {
        voter_count,
        required_votes,
        counts,
        selected,
    }
}

// ---------------------------------------------------------------------------
// Priority tally
// ---------------------------------------------------------------------------

/// Per-candidate result of the priority tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub candidate_id: DbId,
    pub score: i64,
}

/// Outcome of tallying a priority round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityOutcome {
    /// Distinct voters who cast any priority ballot.
    pub voter_count: usize,
    /// Scores for every candidate, descending by score then ascending id.
    pub scores: Vec<CandidateScore>,
    /// The winning candidate id, if the round has any candidates.
    pub winner: Option<DbId>,
}

/// Tally a priority round under the given policy.
///
/// Ballot entries that do not name a round candidate are skipped and do not
/// consume a rank position; a duplicated id in one ballot scores only once.
pub fn tally_priority(
    candidates: &[RcrCandidate],
    ballots: &[PriorityBallot],
    policy: &PriorityPolicy,
) -> PriorityOutcome {
    let PriorityPolicy::BordaCount = policy;

    let effective = latest_per_voter(ballots);
    let voter_count = effective.len();
    let n = candidates.len() as i64;

    let known: BTreeSet<DbId> = candidates.iter().map(|c| c.id).collect();
    let mut totals: BTreeMap<DbId, i64> = candidates.iter().map(|c| (c.id, 0)).collect();

    for ballot in &effective {
        let mut seen: BTreeSet<DbId> = BTreeSet::new();
        let mut rank: i64 = 1;
        for id in &ballot.ranked_candidate_ids {
            if !known.contains(id) || !seen.insert(*id) {
                continue;
            }
            *totals.entry(*id).or_insert(0) += n - rank;
            rank += 1;
        }
    }

    let mut scores: Vec<CandidateScore> = totals
        .into_iter()
        .map(|(candidate_id, score)| CandidateScore {
            candidate_id,
            score,
        })
        .collect();
    // Ties broken by ascending candidate id; id order is total, so no
    // further tie-break can be reached.
    scores.sort_by(|a, b| b.score.cmp(&a.score).then(a.candidate_id.cmp(&b.candidate_id)));

    let winner = scores.first().map(|s| s.candidate_id);

    PriorityOutcome {
        voter_count,
        scores,
        winner,
    }
}
