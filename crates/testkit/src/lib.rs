//! In-memory doubles for the store and gateway traits.
//!
//! Used by the engine and scheduler test suites. The stores reproduce the
//! contract of the PostgreSQL implementations (version compare-and-set on
//! replace, ballot upserts, at-most-once task claims) without a database,
//! and can be told to fail for specific environments to exercise error
//! isolation paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use seco_core::round::Round;
use seco_core::status::{RoundKind, RoundStatus};
use seco_core::store::{
    EnvironmentStore, PromotionTask, TaskStatus, TaskStore, UserAccount, UserStore, VoteStore,
};
use seco_core::{
    CoreError, DbId, DefinitionBallot, Environment, NewEnvironment, PriorityBallot, Timestamp,
};

// ---------------------------------------------------------------------------
// MemoryEnvironmentStore
// ---------------------------------------------------------------------------

/// In-memory environment store with the same version-CAS contract as the
/// PostgreSQL store.
#[derive(Default)]
pub struct MemoryEnvironmentStore {
    inner: Mutex<HashMap<DbId, Environment>>,
    next_id: AtomicI64,
    /// Environment ids whose loads/replaces fail with a storage error.
    poisoned: Mutex<HashSet<DbId>>,
}

impl MemoryEnvironmentStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            poisoned: Mutex::new(HashSet::new()),
        }
    }

    /// Make every subsequent load/replace of `id` fail with `Storage`.
    pub fn poison(&self, id: DbId) {
        self.poisoned.lock().unwrap().insert(id);
    }

    pub fn heal(&self, id: DbId) {
        self.poisoned.lock().unwrap().remove(&id);
    }

    fn check_poison(&self, id: DbId) -> Result<(), CoreError> {
        if self.poisoned.lock().unwrap().contains(&id) {
            Err(CoreError::Storage(format!(
                "injected failure for environment {id}"
            )))
        } else {
            Ok(())
        }
    }

    /// Snapshot of the stored document, bypassing poisoning (for asserts).
    pub fn snapshot(&self, id: DbId) -> Option<Environment> {
        self.inner.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl EnvironmentStore for MemoryEnvironmentStore {
    async fn insert(&self, new_env: NewEnvironment) -> Result<Environment, CoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let env = Environment {
            id,
            name: new_env.name,
            owner_id: new_env.owner_id,
            mining: new_env.mining,
            mining_data: None,
            topic_data: None,
            definition_round: Round::new(RoundKind::Definition),
            priority_round: None,
            final_rcr: None,
            status: seco_core::EnvironmentStatus::Created,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().unwrap().insert(id, env.clone());
        Ok(env)
    }

    async fn load(&self, id: DbId) -> Result<Environment, CoreError> {
        self.check_poison(id)?;
        self.inner
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "environment",
                id,
            })
    }

    async fn list_by_owner(&self, owner_id: DbId) -> Result<Vec<Environment>, CoreError> {
        let mut envs: Vec<Environment> = self
            .inner
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect();
        envs.sort_by_key(|e| e.id);
        Ok(envs)
    }

    async fn replace(&self, env: &Environment) -> Result<Environment, CoreError> {
        self.check_poison(env.id)?;
        let mut inner = self.inner.lock().unwrap();
        let stored = inner.get_mut(&env.id).ok_or(CoreError::NotFound {
            entity: "environment",
            id: env.id,
        })?;
        if stored.version != env.version {
            return Err(CoreError::Conflict(format!(
                "environment {} version {} does not match stored {}",
                env.id, env.version, stored.version
            )));
        }
        let mut replaced = env.clone();
        replaced.version += 1;
        replaced.updated_at = Utc::now();
        *stored = replaced.clone();
        Ok(replaced)
    }

    async fn list_expired(
        &self,
        kind: RoundKind,
        now: Timestamp,
    ) -> Result<Vec<Environment>, CoreError> {
        let mut expired: Vec<Environment> = self
            .inner
            .lock()
            .unwrap()
            .values()
            .filter(|e| {
                e.round(kind)
                    .map(|r| r.status == RoundStatus::Open && r.is_expired(now))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        expired.sort_by_key(|e| e.id);
        Ok(expired)
    }
}

// ---------------------------------------------------------------------------
// MemoryUserStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<DbId, UserAccount>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, id: DbId, name: &str, email: &str, status: &str) -> Self {
        self.users.lock().unwrap().insert(
            id,
            UserAccount {
                id,
                name: name.into(),
                email: email.into(),
                status: status.into(),
            },
        );
        self
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: DbId) -> Result<Option<UserAccount>, CoreError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }
}

// ---------------------------------------------------------------------------
// MemoryVoteStore
// ---------------------------------------------------------------------------

/// Ballot store keyed by (environment, voter), mirroring the database
/// upsert: a later ballot replaces the earlier one.
#[derive(Default)]
pub struct MemoryVoteStore {
    definition: Mutex<HashMap<(DbId, DbId), DefinitionBallot>>,
    priority: Mutex<HashMap<(DbId, DbId), PriorityBallot>>,
}

impl MemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VoteStore for MemoryVoteStore {
    async fn upsert_definition(
        &self,
        environment_id: DbId,
        ballot: &DefinitionBallot,
    ) -> Result<(), CoreError> {
        self.definition
            .lock()
            .unwrap()
            .insert((environment_id, ballot.voter_id), ballot.clone());
        Ok(())
    }

    async fn upsert_priority(
        &self,
        environment_id: DbId,
        ballot: &PriorityBallot,
    ) -> Result<(), CoreError> {
        self.priority
            .lock()
            .unwrap()
            .insert((environment_id, ballot.voter_id), ballot.clone());
        Ok(())
    }

    async fn definition_ballots(
        &self,
        environment_id: DbId,
    ) -> Result<Vec<DefinitionBallot>, CoreError> {
        let mut ballots: Vec<DefinitionBallot> = self
            .definition
            .lock()
            .unwrap()
            .iter()
            .filter(|((env, _), _)| *env == environment_id)
            .map(|(_, b)| b.clone())
            .collect();
        ballots.sort_by_key(|b| b.voter_id);
        Ok(ballots)
    }

    async fn priority_ballots(
        &self,
        environment_id: DbId,
    ) -> Result<Vec<PriorityBallot>, CoreError> {
        let mut ballots: Vec<PriorityBallot> = self
            .priority
            .lock()
            .unwrap()
            .iter()
            .filter(|((env, _), _)| *env == environment_id)
            .map(|(_, b)| b.clone())
            .collect();
        ballots.sort_by_key(|b| b.voter_id);
        Ok(ballots)
    }

    async fn count_for_round(
        &self,
        environment_id: DbId,
        kind: RoundKind,
    ) -> Result<i64, CoreError> {
        let count = match kind {
            RoundKind::Definition => self
                .definition
                .lock()
                .unwrap()
                .keys()
                .filter(|(env, _)| *env == environment_id)
                .count(),
            RoundKind::Priority => self
                .priority
                .lock()
                .unwrap()
                .keys()
                .filter(|(env, _)| *env == environment_id)
                .count(),
        };
        Ok(count as i64)
    }
}

// ---------------------------------------------------------------------------
// MemoryTaskStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<PromotionTask>>,
    next_id: AtomicI64,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn enqueue(
        &self,
        environment_id: DbId,
        kind: RoundKind,
        requested_by: DbId,
    ) -> Result<PromotionTask, CoreError> {
        let task = PromotionTask {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            environment_id,
            kind,
            status: TaskStatus::Pending,
            requested_by,
            error: None,
            created_at: Utc::now(),
        };
        self.tasks.lock().unwrap().push(task.clone());
        Ok(task)
    }

    async fn claim_pending(&self, limit: i64) -> Result<Vec<PromotionTask>, CoreError> {
        let mut tasks = self.tasks.lock().unwrap();
        let mut claimed = Vec::new();
        for task in tasks.iter_mut() {
            if claimed.len() as i64 >= limit {
                break;
            }
            if task.status == TaskStatus::Pending {
                // Claimed tasks leave the pending state immediately so a
                // concurrent claimant cannot pick them up again; only
                // mark_done/mark_failed move them to a terminal state.
                task.status = TaskStatus::Claimed;
                claimed.push(task.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_done(&self, task_id: DbId) -> Result<(), CoreError> {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
            task.status = TaskStatus::Done;
            task.error = None;
        }
        Ok(())
    }

    async fn mark_failed(&self, task_id: DbId, error: &str) -> Result<(), CoreError> {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
            task.status = TaskStatus::Failed;
            task.error = Some(error.to_string());
        }
        Ok(())
    }

    async fn find_by_id(&self, task_id: DbId) -> Result<Option<PromotionTask>, CoreError> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == task_id)
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// Gateway doubles
// ---------------------------------------------------------------------------

/// A sent email captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Records every email instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentEmail>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl seco_core::gateway::NotificationGateway for RecordingNotifier {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), CoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::Upstream("smtp unavailable".into()));
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Mining gateway double; records requested environment ids and can be
/// switched to fail.
#[derive(Default)]
pub struct StubMiningGateway {
    fail: AtomicBool,
    requested: Mutex<Vec<DbId>>,
}

impl StubMiningGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn requested(&self) -> Vec<DbId> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl seco_core::gateway::MiningGateway for StubMiningGateway {
    async fn request_mining(&self, environment: &Environment) -> Result<(), CoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::Upstream("mining service unavailable".into()));
        }
        self.requested.lock().unwrap().push(environment.id);
        Ok(())
    }
}

/// Topic gateway double.
#[derive(Default)]
pub struct StubTopicGateway {
    fail: AtomicBool,
    requested: Mutex<Vec<DbId>>,
}

impl StubTopicGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn requested(&self) -> Vec<DbId> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl seco_core::gateway::TopicGateway for StubTopicGateway {
    async fn request_topics(&self, environment_id: DbId) -> Result<(), CoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::Upstream("topic service unavailable".into()));
        }
        self.requested.lock().unwrap().push(environment_id);
        Ok(())
    }
}
