//! Orchestration over the environment lifecycle.
//!
//! The [`Engine`] owns the store and gateway seams and drives every
//! multi-step operation: creation with the mining kickoff, callback
//! updates, candidate elaboration, ballot recording and round promotion.
//! Each write is one whole-document replace under a version check, so two
//! engines (or an engine and the scheduler) can target the same
//! environment without interleaving partial updates.

use std::sync::Arc;

use chrono::Duration;

use seco_core::gateway::{MiningGateway, NotificationGateway, TopicGateway};
use seco_core::store::{EnvironmentStore, TaskStore, UserStore, VoteStore};
use seco_core::tally::{DefinitionPolicy, PriorityPolicy};
use seco_core::{CoreError, DbId, Environment};

pub mod definition;
pub mod emails;
pub mod lifecycle;
pub mod priority;
pub mod promotion;

pub use promotion::PromotionOutcome;

/// Attempts for a version-checked read-modify-write before giving up.
const CAS_ATTEMPTS: usize = 3;

/// Default voting window for a scheduler-opened priority round.
const DEFAULT_PRIORITY_WINDOW_HOURS: i64 = 168;

// ---------------------------------------------------------------------------
// EngineSettings
// ---------------------------------------------------------------------------

/// Tally policies and round timing.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub definition_policy: DefinitionPolicy,
    pub priority_policy: PriorityPolicy,
    /// How long the priority round stays open after the definition round
    /// is promoted.
    pub priority_window: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            definition_policy: DefinitionPolicy::default(),
            priority_policy: PriorityPolicy::default(),
            priority_window: Duration::hours(DEFAULT_PRIORITY_WINDOW_HOURS),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The lifecycle engine. Cheap to clone via the shared seams.
#[derive(Clone)]
pub struct Engine {
    environments: Arc<dyn EnvironmentStore>,
    users: Arc<dyn UserStore>,
    votes: Arc<dyn VoteStore>,
    tasks: Arc<dyn TaskStore>,
    mining: Arc<dyn MiningGateway>,
    topics: Arc<dyn TopicGateway>,
    notifier: Arc<dyn NotificationGateway>,
    settings: EngineSettings,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        environments: Arc<dyn EnvironmentStore>,
        users: Arc<dyn UserStore>,
        votes: Arc<dyn VoteStore>,
        tasks: Arc<dyn TaskStore>,
        mining: Arc<dyn MiningGateway>,
        topics: Arc<dyn TopicGateway>,
        notifier: Arc<dyn NotificationGateway>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            environments,
            users,
            votes,
            tasks,
            mining,
            topics,
            notifier,
            settings,
        }
    }

    pub(crate) fn environments(&self) -> &dyn EnvironmentStore {
        self.environments.as_ref()
    }

    pub(crate) fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    pub(crate) fn votes(&self) -> &dyn VoteStore {
        self.votes.as_ref()
    }

    pub(crate) fn tasks(&self) -> &dyn TaskStore {
        self.tasks.as_ref()
    }

    pub(crate) fn mining(&self) -> &dyn MiningGateway {
        self.mining.as_ref()
    }

    pub(crate) fn topics(&self) -> &dyn TopicGateway {
        self.topics.as_ref()
    }

    pub(crate) fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Read-modify-write with a bounded retry on version conflicts.
    ///
    /// The closure runs against a fresh load on every attempt; domain
    /// errors from the closure abort immediately, only replace conflicts
    /// trigger a reload.
    pub(crate) async fn mutate<T, F>(
        &self,
        id: DbId,
        mut mutate: F,
    ) -> Result<(Environment, T), CoreError>
    where
        F: FnMut(&mut Environment) -> Result<T, CoreError> + Send,
        T: Send,
    {
        let mut last_conflict = None;
        for _ in 0..CAS_ATTEMPTS {
            let mut env = self.environments.load(id).await?;
            let value = mutate(&mut env)?;
            match self.environments.replace(&env).await {
                Ok(replaced) => return Ok((replaced, value)),
                Err(err) if err.is_conflict() => last_conflict = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_conflict
            .unwrap_or_else(|| CoreError::Conflict("concurrent environment update".into())))
    }

    /// Send a lifecycle email to the environment owner. Delivery failures
    /// are logged and swallowed; notifications never fail an operation.
    pub(crate) async fn notify_owner(&self, env: &Environment, subject: &str, body: &str) {
        let recipient = match self.users.find_by_id(env.owner_id).await {
            Ok(Some(user)) => user.email,
            Ok(None) => {
                tracing::warn!(
                    environment_id = env.id,
                    owner_id = env.owner_id,
                    "Owner account not found, skipping notification"
                );
                return;
            }
            Err(err) => {
                tracing::warn!(
                    environment_id = env.id,
                    error = %err,
                    "Owner lookup failed, skipping notification"
                );
                return;
            }
        };
        if let Err(err) = self.notifier.send_email(&recipient, subject, body).await {
            tracing::warn!(
                environment_id = env.id,
                subject,
                error = %err,
                "Notification email failed"
            );
        }
    }
}
