//! Environment creation, callback updates and read access.

use serde_json::Value;

use seco_core::status::EnvironmentStatus;
use seco_core::{CoreError, DbId, Environment, NewEnvironment};

use crate::emails;
use crate::Engine;

impl Engine {
    /// Create an environment and kick off mining.
    ///
    /// The document is persisted in `created` first; the mining request
    /// then moves it to `mining`, or to the terminal `mining_error` if the
    /// gateway rejects it (fail fast, no retry queue). The owner gets a
    /// creation email either way.
    pub async fn create(&self, spec: NewEnvironment) -> Result<Environment, CoreError> {
        spec.validate()?;
        let owner = self
            .users()
            .find_by_id(spec.owner_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "user",
                id: spec.owner_id,
            })?;
        if !owner.is_active() {
            return Err(CoreError::Validation(
                "owner account is not active".into(),
            ));
        }

        let env = self.environments().insert(spec).await?;

        let env = match self.mining().request_mining(&env).await {
            Ok(()) => {
                let (env, _) = self
                    .mutate(env.id, |e| e.set_status(EnvironmentStatus::Mining))
                    .await?;
                env
            }
            Err(err) => {
                tracing::warn!(
                    environment_id = env.id,
                    error = %err,
                    "Mining request failed, degrading environment"
                );
                let (env, _) = self
                    .mutate(env.id, |e| e.set_status(EnvironmentStatus::MiningError))
                    .await?;
                env
            }
        };

        let (subject, body) = emails::created(&owner.name, &env);
        self.notify_owner(&env, &subject, &body).await;
        Ok(env)
    }

    /// External status setter (admin and service callbacks). Every write
    /// goes through the transition table.
    pub async fn set_status(
        &self,
        id: DbId,
        status: EnvironmentStatus,
    ) -> Result<Environment, CoreError> {
        let (env, _) = self.mutate(id, |e| e.set_status(status)).await?;
        Ok(env)
    }

    /// Mining-service callback: store the crawler output and the reported
    /// status as one write, then notify the owner.
    pub async fn set_mining_data(
        &self,
        id: DbId,
        data: Value,
        status: EnvironmentStatus,
    ) -> Result<Environment, CoreError> {
        let (env, _) = self
            .mutate(id, |e| e.set_mining_data(data.clone(), status))
            .await?;
        let (subject, body) = emails::mining_done(&env.name);
        self.notify_owner(&env, &subject, &body).await;
        Ok(env)
    }

    /// Topic-service callback: store the clustering output and the
    /// reported status as one write, then notify the owner.
    pub async fn set_topic_data(
        &self,
        id: DbId,
        data: Value,
        status: EnvironmentStatus,
    ) -> Result<Environment, CoreError> {
        let (env, _) = self
            .mutate(id, |e| e.set_topic_data(data.clone(), status))
            .await?;
        let (subject, body) = emails::topics_done(&env.name);
        self.notify_owner(&env, &subject, &body).await;
        Ok(env)
    }

    /// Ask the topic service to cluster the mined issues.
    ///
    /// Returns `Ok(true)` when the request was accepted and the
    /// environment moved to `topics_requested`; `Ok(false)` when the
    /// gateway refused, in which case the status is left untouched so the
    /// request can be repeated.
    pub async fn request_topics(&self, id: DbId) -> Result<bool, CoreError> {
        let env = self.environments().load(id).await?;
        env.status
            .validate_transition(EnvironmentStatus::TopicsRequested)?;

        if let Err(err) = self.topics().request_topics(env.id).await {
            tracing::warn!(
                environment_id = env.id,
                error = %err,
                "Topic generation request failed, leaving status unchanged"
            );
            return Ok(false);
        }

        self.mutate(id, |e| e.set_status(EnvironmentStatus::TopicsRequested))
            .await?;
        Ok(true)
    }

    pub async fn environment(&self, id: DbId) -> Result<Environment, CoreError> {
        self.environments().load(id).await
    }

    pub async fn environments_for_owner(
        &self,
        owner_id: DbId,
    ) -> Result<Vec<Environment>, CoreError> {
        self.environments().list_by_owner(owner_id).await
    }
}
