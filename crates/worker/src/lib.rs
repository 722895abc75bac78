//! The round scheduler.
//!
//! [`RoundScheduler`] runs as a background task on a fixed wall-clock
//! cadence: ticks are aligned to minute offsets of the hour (every 15
//! minutes by default) rather than to process start time, so restarts do
//! not drift the sweep schedule. Each tick sweeps expired open rounds of
//! both kinds, drains queued force-end tasks, and promotes each
//! environment independently; one failing environment never stalls the
//! batch.

use std::sync::Arc;

use chrono::Timelike;
use tokio_util::sync::CancellationToken;

use seco_core::status::RoundKind;
use seco_core::Timestamp;
use seco_engine::{Engine, PromotionOutcome};

/// Default minutes between ticks, aligned to the quarter hour.
const DEFAULT_TICK_MINUTES: u32 = 15;

/// Maximum force-end tasks drained per tick.
const TASK_BATCH: i64 = 50;

// ---------------------------------------------------------------------------
// SchedulerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Minutes between ticks; ticks land on multiples of this offset
    /// within the hour.
    pub tick_minutes: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_minutes: DEFAULT_TICK_MINUTES,
        }
    }
}

impl SchedulerConfig {
    /// Load from `SCHEDULER_TICK_MINUTES`, falling back to the default.
    pub fn from_env() -> Self {
        let tick_minutes = std::env::var("SCHEDULER_TICK_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_TICK_MINUTES);
        Self { tick_minutes }
    }
}

/// Time until the next aligned tick. Offsets past the hour boundary snap
/// to the top of the next hour. A zero `tick_minutes` is treated as one
/// minute so the alignment arithmetic never divides by zero.
pub fn delay_until_next_tick(now: Timestamp, tick_minutes: u32) -> std::time::Duration {
    let tick_secs = u64::from(tick_minutes.max(1)) * 60;
    let into_hour = u64::from(now.minute()) * 60 + u64::from(now.second());
    let next = ((into_hour / tick_secs) + 1) * tick_secs;
    let delay = next.min(3600) - into_hour;
    std::time::Duration::from_secs(delay.max(1))
}

// ---------------------------------------------------------------------------
// RoundScheduler
// ---------------------------------------------------------------------------

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub promoted: usize,
    /// Environments another promoter already handled.
    pub skipped: usize,
    pub failed: usize,
    pub tasks_processed: usize,
}

/// Background service that expires voting rounds and drives promotions.
pub struct RoundScheduler {
    engine: Arc<Engine>,
    config: SchedulerConfig,
}

impl RoundScheduler {
    pub fn new(engine: Arc<Engine>, config: SchedulerConfig) -> Self {
        Self { engine, config }
    }

    /// Run the scheduler loop until the token is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let delay = delay_until_next_tick(chrono::Utc::now(), self.config.tick_minutes);
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Round scheduler cancelled");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    let summary = self.tick(chrono::Utc::now()).await;
                    if summary != TickSummary::default() {
                        tracing::info!(
                            promoted = summary.promoted,
                            skipped = summary.skipped,
                            failed = summary.failed,
                            tasks = summary.tasks_processed,
                            "Scheduler tick complete"
                        );
                    }
                }
            }
        }
    }

    /// One sweep: expired definition rounds, then expired priority
    /// rounds, then queued force-end tasks.
    pub async fn tick(&self, now: Timestamp) -> TickSummary {
        let mut summary = TickSummary::default();
        for kind in [RoundKind::Definition, RoundKind::Priority] {
            self.sweep_expired(kind, now, &mut summary).await;
        }
        self.drain_tasks(now, &mut summary).await;
        summary
    }

    async fn sweep_expired(&self, kind: RoundKind, now: Timestamp, summary: &mut TickSummary) {
        let expired = match self.engine.expired_environments(kind, now).await {
            Ok(expired) => expired,
            Err(err) => {
                tracing::error!(kind = kind.as_str(), error = %err, "Expiry sweep failed");
                summary.failed += 1;
                return;
            }
        };
        for env in expired {
            let result = match kind {
                RoundKind::Definition => self.engine.promote_definition(env.id, now).await,
                RoundKind::Priority => self.engine.promote_priority(env.id).await,
            };
            match result {
                Ok(PromotionOutcome::Promoted) => summary.promoted += 1,
                Ok(PromotionOutcome::AlreadyProcessed) => summary.skipped += 1,
                Err(err) => {
                    summary.failed += 1;
                    tracing::error!(
                        environment_id = env.id,
                        kind = kind.as_str(),
                        error = %err,
                        "Round promotion failed"
                    );
                }
            }
        }
    }

    async fn drain_tasks(&self, now: Timestamp, summary: &mut TickSummary) {
        let tasks = match self.engine.claim_promotion_tasks(TASK_BATCH).await {
            Ok(tasks) => tasks,
            Err(err) => {
                tracing::error!(error = %err, "Claiming promotion tasks failed");
                summary.failed += 1;
                return;
            }
        };
        for task in tasks {
            summary.tasks_processed += 1;
            match self.engine.process_promotion_task(&task, now).await {
                Ok(PromotionOutcome::Promoted) => summary.promoted += 1,
                Ok(PromotionOutcome::AlreadyProcessed) => summary.skipped += 1,
                Err(err) => {
                    summary.failed += 1;
                    tracing::error!(
                        task_id = task.id,
                        environment_id = task.environment_id,
                        error = %err,
                        "Promotion task failed"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(minute: u32, second: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 8, 29, 10, minute, second).unwrap()
    }

    #[test]
    fn delay_aligns_to_the_next_quarter_hour() {
        assert_eq!(delay_until_next_tick(at(0, 0), 15).as_secs(), 900);
        assert_eq!(delay_until_next_tick(at(7, 30), 15).as_secs(), 450);
        assert_eq!(delay_until_next_tick(at(14, 59), 15).as_secs(), 1);
        assert_eq!(delay_until_next_tick(at(15, 0), 15).as_secs(), 900);
    }

    #[test]
    fn delay_snaps_to_the_hour_for_non_divisor_offsets() {
        // 25-minute ticks land at :25 and :50, then the top of the hour.
        assert_eq!(delay_until_next_tick(at(50, 0), 25).as_secs(), 600);
    }

    #[test]
    fn delay_is_never_zero() {
        assert!(delay_until_next_tick(at(59, 59), 15).as_secs() >= 1);
    }

    #[test]
    fn zero_tick_minutes_falls_back_to_one_minute() {
        assert_eq!(delay_until_next_tick(at(7, 30), 0).as_secs(), 30);
        assert_eq!(delay_until_next_tick(at(0, 0), 0).as_secs(), 60);
    }
}
