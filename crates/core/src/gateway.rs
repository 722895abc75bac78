//! Outbound-collaborator trait seams.
//!
//! Mining, topic generation and email delivery are external services. Each
//! call returns success or failure only; the engine never propagates a
//! gateway failure to its caller, it degrades the environment state (or
//! just logs) instead.

use async_trait::async_trait;

use crate::environment::Environment;
use crate::error::CoreError;
use crate::types::DbId;

/// Requests issue mining for a freshly created environment.
#[async_trait]
pub trait MiningGateway: Send + Sync {
    async fn request_mining(&self, environment: &Environment) -> Result<(), CoreError>;
}

/// Requests topic clustering over an environment's mined issues.
#[async_trait]
pub trait TopicGateway: Send + Sync {
    async fn request_topics(&self, environment_id: DbId) -> Result<(), CoreError>;
}

/// Sends a notification email to an environment owner.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), CoreError>;
}
