//! Domain model for the SECO-RCR environment lifecycle.
//!
//! An *environment* is one unit of mining-and-voting work: issues are mined
//! from an external tracker, clustered into topics, and then run through two
//! sequential group-voting rounds. The definition round selects candidate
//! requirement-change-records (RCRs) from issue clusters; the priority round
//! ranks the selection down to one final RCR.
//!
//! This crate is pure domain logic plus the trait seams the rest of the
//! workspace plugs into:
//!
//! - [`status`]: the environment status vocabulary and its transition table.
//! - [`round`]: round documents, candidate lists, monotonic candidate ids.
//! - [`environment`]: the environment document and its lifecycle mutations.
//! - [`vote`]: definition and priority ballots, last-write-wins semantics.
//! - [`tally`]: pure vote-tally policies (simple majority, Borda count).
//! - [`store`] / [`gateway`]: async trait seams for persistence and the
//!   outbound mining/topic/email collaborators.

pub mod environment;
pub mod error;
pub mod gateway;
pub mod round;
pub mod status;
pub mod store;
pub mod tally;
pub mod types;
pub mod vote;

pub use environment::{Environment, MiningFilters, MiningSpec, MiningType, NewEnvironment};
pub use error::CoreError;
pub use round::{CandidateDraft, CandidateEdit, RcrCandidate, Round};
pub use status::{EnvironmentStatus, RoundKind, RoundStatus};
pub use tally::{DefinitionOutcome, DefinitionPolicy, PriorityOutcome, PriorityPolicy};
pub use types::{DbId, Timestamp};
pub use vote::{DefinitionBallot, PriorityBallot};
