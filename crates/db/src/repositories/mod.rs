//! Stateless repositories over the connection pool. They speak
//! `sqlx::Error`; mapping to the core error taxonomy happens in
//! [`crate::store`].

pub mod environment_repo;
pub mod task_repo;
pub mod user_repo;
pub mod vote_repo;

pub use environment_repo::EnvironmentRepo;
pub use task_repo::TaskRepo;
pub use user_repo::UserRepo;
pub use vote_repo::VoteRepo;
