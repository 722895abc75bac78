//! End-to-end engine tests over the in-memory testkit doubles.

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};

use seco_core::environment::{MiningFilters, MiningSpec, MiningType};
use seco_core::round::CandidateDraft;
use seco_core::status::{EnvironmentStatus, RoundKind, RoundStatus};
use seco_core::store::TaskStatus;
use seco_core::{CoreError, DbId, NewEnvironment};
use seco_engine::{Engine, EngineSettings, PromotionOutcome};
use seco_testkit::{
    MemoryEnvironmentStore, MemoryTaskStore, MemoryUserStore, MemoryVoteStore,
    RecordingNotifier, StubMiningGateway, StubTopicGateway,
};

struct Harness {
    engine: Engine,
    environments: Arc<MemoryEnvironmentStore>,
    mining: Arc<StubMiningGateway>,
    topics: Arc<StubTopicGateway>,
    notifier: Arc<RecordingNotifier>,
}

fn harness() -> Harness {
    let environments = Arc::new(MemoryEnvironmentStore::new());
    let users = Arc::new(
        MemoryUserStore::new()
            .with_user(1, "Ada", "ada@example.org", "active")
            .with_user(2, "Grace", "grace@example.org", "inactive"),
    );
    let votes = Arc::new(MemoryVoteStore::new());
    let tasks = Arc::new(MemoryTaskStore::new());
    let mining = Arc::new(StubMiningGateway::new());
    let topics = Arc::new(StubTopicGateway::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = Engine::new(
        environments.clone(),
        users.clone(),
        votes,
        tasks,
        mining.clone(),
        topics.clone(),
        notifier.clone(),
        EngineSettings::default(),
    );
    Harness {
        engine,
        environments,
        mining,
        topics,
        notifier,
    }
}

fn spec(owner_id: DbId) -> NewEnvironment {
    NewEnvironment {
        name: "netdata ecosystem".into(),
        owner_id,
        mining: MiningSpec {
            mining_type: MiningType::Repos,
            organization_name: None,
            repos: vec!["netdata/netdata".into()],
            details: "issue mining for RCR elaboration".into(),
            filters: MiningFilters::default(),
        },
    }
}

fn draft(created_by: DbId, title: &str) -> CandidateDraft {
    CandidateDraft {
        title: title.into(),
        body: "observed friction in the ecosystem".into(),
        main_issue: 100,
        related_to_issues: vec![101],
        created_by,
    }
}

/// Walk a fresh environment to open definition voting with three
/// candidates (ids 1, 2, 3).
async fn open_definition_voting(h: &Harness) -> DbId {
    let env = h.engine.create(spec(1)).await.unwrap();
    h.engine
        .set_mining_data(env.id, serde_json::json!({"issues": []}), EnvironmentStatus::MiningDone)
        .await
        .unwrap();
    assert!(h.engine.request_topics(env.id).await.unwrap());
    h.engine
        .set_topic_data(env.id, serde_json::json!({"topics": []}), EnvironmentStatus::TopicsDone)
        .await
        .unwrap();
    for title in ["clarify API deprecations", "document plugin ABI", "stabilize packaging"] {
        h.engine.append_candidate(env.id, draft(1, title)).await.unwrap();
    }
    h.engine
        .open_definition_voting(env.id, Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    env.id
}

#[tokio::test]
async fn create_requests_mining_and_notifies_owner() {
    let h = harness();
    let env = h.engine.create(spec(1)).await.unwrap();

    assert_eq!(env.status, EnvironmentStatus::Mining);
    assert_eq!(h.mining.requested(), vec![env.id]);
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ada@example.org");
    assert_eq!(sent[0].subject, "SECO - RCR: netdata ecosystem created");
}

#[tokio::test]
async fn create_rejects_unknown_owner() {
    let h = harness();
    let err = h.engine.create(spec(99)).await.unwrap_err();
    assert_matches!(err, CoreError::NotFound { entity: "user", id: 99 });
}

#[tokio::test]
async fn create_rejects_inactive_owner() {
    let h = harness();
    let err = h.engine.create(spec(2)).await.unwrap_err();
    assert_matches!(err, CoreError::Validation(_));
}

#[tokio::test]
async fn mining_gateway_failure_degrades_to_mining_error() {
    let h = harness();
    h.mining.set_fail(true);

    let env = h.engine.create(spec(1)).await.unwrap();

    assert_eq!(env.status, EnvironmentStatus::MiningError);
    // The creation email still goes out.
    assert_eq!(h.notifier.sent_count(), 1);
    // mining_error is terminal.
    let err = h
        .engine
        .set_status(env.id, EnvironmentStatus::Mining)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Conflict(_));
}

#[tokio::test]
async fn callback_updates_store_blob_and_status_together() {
    let h = harness();
    let env = h.engine.create(spec(1)).await.unwrap();

    let env = h
        .engine
        .set_mining_data(env.id, serde_json::json!({"issues": [7]}), EnvironmentStatus::MiningDone)
        .await
        .unwrap();
    assert_eq!(env.status, EnvironmentStatus::MiningDone);
    assert_eq!(env.mining_data, Some(serde_json::json!({"issues": [7]})));

    let subjects: Vec<String> = h.notifier.sent().into_iter().map(|e| e.subject).collect();
    assert!(subjects.contains(&"SECO - RCR: netdata ecosystem mining done".to_string()));
}

#[tokio::test]
async fn request_topics_advances_only_on_gateway_success() {
    let h = harness();
    let env = h.engine.create(spec(1)).await.unwrap();
    h.engine
        .set_mining_data(env.id, serde_json::json!({}), EnvironmentStatus::MiningDone)
        .await
        .unwrap();

    h.topics.set_fail(true);
    assert!(!h.engine.request_topics(env.id).await.unwrap());
    let env = h.engine.environment(env.id).await.unwrap();
    assert_eq!(env.status, EnvironmentStatus::MiningDone);

    h.topics.set_fail(false);
    assert!(h.engine.request_topics(env.id).await.unwrap());
    let env = h.engine.environment(env.id).await.unwrap();
    assert_eq!(env.status, EnvironmentStatus::TopicsRequested);
    assert_eq!(h.topics.requested(), vec![env.id]);
}

#[tokio::test]
async fn request_topics_requires_mining_done() {
    let h = harness();
    let env = h.engine.create(spec(1)).await.unwrap();
    let err = h.engine.request_topics(env.id).await.unwrap_err();
    assert_matches!(err, CoreError::Conflict(_));
}

#[tokio::test]
async fn ballots_are_rejected_before_voting_opens() {
    let h = harness();
    let env = h.engine.create(spec(1)).await.unwrap();
    let err = h
        .engine
        .cast_definition_ballot(env.id, 1, vec![1])
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Conflict(_));
}

#[tokio::test]
async fn ballots_with_unknown_candidates_are_rejected() {
    let h = harness();
    let env_id = open_definition_voting(&h).await;
    let err = h
        .engine
        .cast_definition_ballot(env_id, 1, vec![1, 9])
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Validation(_));
}

#[tokio::test]
async fn candidate_mutation_is_rejected_once_voting_is_open() {
    let h = harness();
    let env_id = open_definition_voting(&h).await;
    let err = h
        .engine
        .append_candidate(env_id, draft(1, "late addition"))
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Conflict(_));
}

#[tokio::test]
async fn promote_definition_selects_majority_and_opens_priority() {
    let h = harness();
    let env_id = open_definition_voting(&h).await;

    // Three voters: candidate 1 and 3 get two votes each, candidate 2 one.
    h.engine.cast_definition_ballot(env_id, 1, vec![1, 3]).await.unwrap();
    h.engine.cast_definition_ballot(env_id, 2, vec![1, 2]).await.unwrap();
    h.engine.cast_definition_ballot(env_id, 3, vec![3]).await.unwrap();

    let now = Utc::now();
    let outcome = h.engine.promote_definition(env_id, now).await.unwrap();
    assert_eq!(outcome, PromotionOutcome::Promoted);

    let env = h.engine.environment(env_id).await.unwrap();
    assert_eq!(env.status, EnvironmentStatus::WaitingRcrPriority);
    assert_eq!(env.definition_round.status, RoundStatus::Closed);
    let priority = env.priority_round.unwrap();
    assert_eq!(priority.status, RoundStatus::Open);
    let ids: Vec<DbId> = priority.candidates.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 3]);

    let subjects: Vec<String> = h.notifier.sent().into_iter().map(|e| e.subject).collect();
    assert!(subjects
        .contains(&"SECO - RCR: netdata ecosystem definition rcr voting completed".to_string()));
}

#[tokio::test]
async fn promotion_is_idempotent() {
    let h = harness();
    let env_id = open_definition_voting(&h).await;
    h.engine.cast_definition_ballot(env_id, 1, vec![1]).await.unwrap();
    h.engine.cast_definition_ballot(env_id, 2, vec![1]).await.unwrap();

    let now = Utc::now();
    assert_eq!(
        h.engine.promote_definition(env_id, now).await.unwrap(),
        PromotionOutcome::Promoted
    );
    let before = h.notifier.sent_count();
    let state_before = h.environments.snapshot(env_id).unwrap();

    assert_eq!(
        h.engine.promote_definition(env_id, now).await.unwrap(),
        PromotionOutcome::AlreadyProcessed
    );
    assert_eq!(h.notifier.sent_count(), before);
    assert_eq!(h.environments.snapshot(env_id).unwrap(), state_before);
}

#[tokio::test]
async fn promote_priority_records_final_rcr_and_closes() {
    let h = harness();
    let env_id = open_definition_voting(&h).await;
    h.engine.cast_definition_ballot(env_id, 1, vec![1, 3]).await.unwrap();
    h.engine.cast_definition_ballot(env_id, 2, vec![1, 2]).await.unwrap();
    h.engine.cast_definition_ballot(env_id, 3, vec![3]).await.unwrap();
    h.engine.promote_definition(env_id, Utc::now()).await.unwrap();

    // Borda over {1, 3}: candidate 1 is ranked first by two of three.
    h.engine.cast_priority_ballot(env_id, 1, vec![1, 3]).await.unwrap();
    h.engine.cast_priority_ballot(env_id, 2, vec![3, 1]).await.unwrap();
    h.engine.cast_priority_ballot(env_id, 3, vec![1, 3]).await.unwrap();

    let outcome = h.engine.promote_priority(env_id).await.unwrap();
    assert_eq!(outcome, PromotionOutcome::Promoted);

    let env = h.engine.environment(env_id).await.unwrap();
    assert_eq!(env.status, EnvironmentStatus::Closed);
    assert_eq!(env.final_rcr.unwrap().id, 1);

    // A second run changes nothing.
    assert_eq!(
        h.engine.promote_priority(env_id).await.unwrap(),
        PromotionOutcome::AlreadyProcessed
    );
}

#[tokio::test]
async fn revote_overwrites_the_earlier_ballot() {
    let h = harness();
    let env_id = open_definition_voting(&h).await;

    h.engine.cast_definition_ballot(env_id, 1, vec![2]).await.unwrap();
    h.engine.cast_definition_ballot(env_id, 1, vec![1]).await.unwrap();
    h.engine.cast_definition_ballot(env_id, 2, vec![1]).await.unwrap();

    h.engine.promote_definition(env_id, Utc::now()).await.unwrap();
    let env = h.engine.environment(env_id).await.unwrap();
    let ids: Vec<DbId> = env
        .priority_round
        .unwrap()
        .candidates
        .iter()
        .map(|c| c.id)
        .collect();
    // Voter 1's first ballot for candidate 2 no longer counts.
    assert_eq!(ids, vec![1]);
}

#[tokio::test]
async fn end_voting_returns_a_trackable_task() {
    let h = harness();
    let env_id = open_definition_voting(&h).await;
    h.engine.cast_definition_ballot(env_id, 1, vec![1]).await.unwrap();
    h.engine.cast_definition_ballot(env_id, 2, vec![1]).await.unwrap();

    let task = h
        .engine
        .end_voting(env_id, RoundKind::Definition, 1)
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Pending);

    let claimed = h.engine.claim_promotion_tasks(10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, task.id);
    // A second claim finds nothing.
    assert!(h.engine.claim_promotion_tasks(10).await.unwrap().is_empty());

    let outcome = h
        .engine
        .process_promotion_task(&claimed[0], Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome, PromotionOutcome::Promoted);
    let env = h.engine.environment(env_id).await.unwrap();
    assert_eq!(env.status, EnvironmentStatus::WaitingRcrPriority);
}

#[tokio::test]
async fn claimed_tasks_stay_claimed_until_processed() {
    let h = harness();
    let env_id = open_definition_voting(&h).await;
    h.engine.cast_definition_ballot(env_id, 1, vec![1]).await.unwrap();

    let task = h
        .engine
        .end_voting(env_id, RoundKind::Definition, 1)
        .await
        .unwrap();
    let claimed = h.engine.claim_promotion_tasks(10).await.unwrap();
    assert_eq!(claimed[0].status, TaskStatus::Claimed);

    // Nothing has been promoted yet, so a poll must not report success.
    let env = h.engine.environment(env_id).await.unwrap();
    assert_eq!(env.status, EnvironmentStatus::WaitingRcrVoting);
    let polled = h.engine.promotion_task(task.id).await.unwrap().unwrap();
    assert_eq!(polled.status, TaskStatus::Claimed);

    h.engine
        .process_promotion_task(&claimed[0], Utc::now())
        .await
        .unwrap();
    let polled = h.engine.promotion_task(task.id).await.unwrap().unwrap();
    assert_eq!(polled.status, TaskStatus::Done);
}

#[tokio::test]
async fn failed_tasks_record_the_error() {
    let h = harness();
    let env_id = open_definition_voting(&h).await;
    h.engine.cast_definition_ballot(env_id, 1, vec![1]).await.unwrap();
    let task = h
        .engine
        .end_voting(env_id, RoundKind::Definition, 1)
        .await
        .unwrap();
    let claimed = h.engine.claim_promotion_tasks(10).await.unwrap();

    h.environments.poison(env_id);
    let err = h
        .engine
        .process_promotion_task(&claimed[0], Utc::now())
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Storage(_));

    let polled = h.engine.promotion_task(task.id).await.unwrap().unwrap();
    assert_eq!(polled.status, TaskStatus::Failed);
    assert!(polled.error.is_some());
}

#[tokio::test]
async fn voting_progress_counts_distinct_voters() {
    let h = harness();
    let env_id = open_definition_voting(&h).await;
    h.engine.cast_definition_ballot(env_id, 1, vec![1]).await.unwrap();
    h.engine.cast_definition_ballot(env_id, 2, vec![2]).await.unwrap();
    // Voter 1 revotes; the count does not grow.
    h.engine.cast_definition_ballot(env_id, 1, vec![3]).await.unwrap();

    let progress = h
        .engine
        .voting_progress(env_id, RoundKind::Definition)
        .await
        .unwrap();
    assert_eq!(progress, 2);
    let progress = h
        .engine
        .voting_progress(env_id, RoundKind::Priority)
        .await
        .unwrap();
    assert_eq!(progress, 0);

    let err = h
        .engine
        .voting_progress(404, RoundKind::Definition)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::NotFound { entity: "environment", .. });
}

#[tokio::test]
async fn end_voting_rejects_unknown_environment() {
    let h = harness();
    let err = h
        .engine
        .end_voting(404, RoundKind::Definition, 1)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::NotFound { entity: "environment", .. });
}
