//! Row types for the persistence layer and their conversions to domain
//! documents.

pub mod environment;
pub mod task;
pub mod user;
pub mod vote;

pub use environment::EnvironmentRow;
pub use task::TaskRow;
pub use user::UserRow;
pub use vote::{DefinitionVoteRow, PriorityVoteRow};
