//! Round documents and candidate lists.
//!
//! A round owns an ordered list of [`RcrCandidate`]s. Candidate ids are
//! assigned from a high-water mark (`last_assigned_id`), so deleting a
//! candidate never causes a later append to reuse its id.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::{RoundKind, RoundStatus};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// RcrCandidate
// ---------------------------------------------------------------------------

/// One candidate requirement-change-record, derived from a cluster of mined
/// issues. Field names follow the wire shape of the round document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RcrCandidate {
    /// Unique within the round; monotonically increasing, never reused.
    pub id: DbId,
    pub title: String,
    pub body: String,
    #[serde(rename = "mainIssue")]
    pub main_issue: DbId,
    #[serde(rename = "relatedToIssues")]
    pub related_to_issues: Vec<DbId>,
    #[serde(rename = "createdBy")]
    pub created_by: DbId,
}

/// Input for appending a candidate; the round assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDraft {
    pub title: String,
    pub body: String,
    #[serde(rename = "mainIssue")]
    pub main_issue: DbId,
    #[serde(rename = "relatedToIssues", default)]
    pub related_to_issues: Vec<DbId>,
    #[serde(rename = "createdBy")]
    pub created_by: DbId,
}

/// Partial edit of an existing candidate. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateEdit {
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(rename = "relatedToIssues")]
    pub related_to_issues: Option<Vec<DbId>>,
}

// ---------------------------------------------------------------------------
// Round
// ---------------------------------------------------------------------------

/// One voting phase (definition or priority) with its own candidate list,
/// status and closing date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub kind: RoundKind,
    pub status: RoundStatus,
    pub candidates: Vec<RcrCandidate>,
    pub closing_date: Option<Timestamp>,
    /// Highest candidate id ever assigned in this round.
    #[serde(default)]
    pub last_assigned_id: DbId,
}

impl Round {
    /// An empty round in the elaborating phase.
    pub fn new(kind: RoundKind) -> Self {
        Self {
            kind,
            status: RoundStatus::Elaborating,
            candidates: Vec::new(),
            closing_date: None,
            last_assigned_id: 0,
        }
    }

    /// The id the next appended candidate will receive.
    ///
    /// Normally `last_assigned_id + 1`. Documents written before the
    /// high-water mark existed may carry `last_assigned_id = 0` with a
    /// non-empty list, so the live maximum is taken as a floor.
    pub fn next_candidate_id(&self) -> DbId {
        let live_max = self.candidates.iter().map(|c| c.id).max().unwrap_or(0);
        self.last_assigned_id.max(live_max) + 1
    }

    pub fn candidate(&self, id: DbId) -> Option<&RcrCandidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: DbId) -> bool {
        self.candidate(id).is_some()
    }

    /// True when the round is open for votes and its closing date has passed.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.status == RoundStatus::Open
            && self.closing_date.map(|d| d <= now).unwrap_or(false)
    }

    fn require_status(&self, expected: RoundStatus) -> Result<(), CoreError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "{} round is {}, expected {}",
                self.kind.as_str(),
                self.status.as_str(),
                expected.as_str()
            )))
        }
    }

    /// Append a candidate, assigning the next monotonic id.
    ///
    /// Only legal while the round is elaborating.
    pub fn append_candidate(&mut self, draft: CandidateDraft) -> Result<DbId, CoreError> {
        self.require_status(RoundStatus::Elaborating)?;
        if draft.title.trim().is_empty() {
            return Err(CoreError::Validation("candidate title is required".into()));
        }
        let id = self.next_candidate_id();
        self.candidates.push(RcrCandidate {
            id,
            title: draft.title,
            body: draft.body,
            main_issue: draft.main_issue,
            related_to_issues: draft.related_to_issues,
            created_by: draft.created_by,
        });
        self.last_assigned_id = id;
        Ok(id)
    }

    /// Edit an existing candidate in place. Only legal while elaborating.
    pub fn update_candidate(&mut self, id: DbId, edit: CandidateEdit) -> Result<(), CoreError> {
        self.require_status(RoundStatus::Elaborating)?;
        let candidate = self
            .candidates
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(CoreError::NotFound {
                entity: "rcr_candidate",
                id,
            })?;
        if let Some(title) = edit.title {
            if title.trim().is_empty() {
                return Err(CoreError::Validation("candidate title is required".into()));
            }
            candidate.title = title;
        }
        if let Some(body) = edit.body {
            candidate.body = body;
        }
        if let Some(related) = edit.related_to_issues {
            candidate.related_to_issues = related;
        }
        Ok(())
    }

    /// Remove a candidate. The id is retired, never reassigned.
    pub fn delete_candidate(&mut self, id: DbId) -> Result<(), CoreError> {
        self.require_status(RoundStatus::Elaborating)?;
        let before = self.candidates.len();
        self.candidates.retain(|c| c.id != id);
        if self.candidates.len() == before {
            return Err(CoreError::NotFound {
                entity: "rcr_candidate",
                id,
            });
        }
        Ok(())
    }

    /// Open the round for voting with the given closing date.
    pub fn open_voting(&mut self, closing_date: Timestamp) -> Result<(), CoreError> {
        self.require_status(RoundStatus::Elaborating)?;
        if self.candidates.is_empty() {
            return Err(CoreError::Validation(
                "cannot open voting on a round with no candidates".into(),
            ));
        }
        self.status = RoundStatus::Open;
        self.closing_date = Some(closing_date);
        Ok(())
    }

    /// Close an open round.
    pub fn close(&mut self) -> Result<(), CoreError> {
        self.require_status(RoundStatus::Open)?;
        self.status = RoundStatus::Closed;
        Ok(())
    }

    /// Build the priority round from a definition-round selection.
    ///
    /// Candidates keep their ids; list order follows the selection order.
    /// The new round opens immediately with the given closing date.
    pub fn from_selection(
        definition: &Round,
        selected_ids: &[DbId],
        closing_date: Timestamp,
    ) -> Result<Round, CoreError> {
        let mut candidates = Vec::with_capacity(selected_ids.len());
        for id in selected_ids {
            let candidate = definition.candidate(*id).ok_or(CoreError::NotFound {
                entity: "rcr_candidate",
                id: *id,
            })?;
            candidates.push(candidate.clone());
        }
        Ok(Round {
            kind: RoundKind::Priority,
            status: RoundStatus::Open,
            candidates,
            closing_date: Some(closing_date),
            // Carry the mark forward so any future append stays monotonic.
            last_assigned_id: definition.last_assigned_id,
        })
    }
}
