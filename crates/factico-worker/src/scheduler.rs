//! The periodic scheduler.
//!
//! A declared schedule table produces tasks onto the bus. The scheduler
//! is durable and external: last-fire times live in `PostgreSQL`, and a
//! leader lease with a TTL keeps two instances from double-firing.
//! Missed ticks during downtime coalesce into at most one catch-up task
//! per schedule (the due-check fires once no matter how much time
//! elapsed), and the task bus unique key deduplicates against a tick
//! that is still in flight.

use std::time::Duration;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, TimeZone};
use factico_db::{EnqueueOptions, PostgresPool, SchedulerStore, TaskQueue};
use factico_types::TaskKind;
use tracing::{debug, info, warn};

/// The lease name coordinating scheduler leadership.
const LEASE_NAME: &str = "scheduler";

/// Lease TTL; the leader renews every check interval.
const LEASE_TTL: Duration = Duration::from_secs(60);

/// How often the scheduler checks for due work.
const CHECK_INTERVAL: Duration = Duration::from_secs(15);

/// When a schedule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleSpec {
    /// Every fixed interval.
    Every(ChronoDuration),
    /// Daily at a local time.
    DailyAt {
        /// Local hour (0-23).
        hour: u32,
        /// Local minute.
        minute: u32,
    },
    /// Monthly on a day at a local time.
    MonthlyAt {
        /// Day of month (1-28).
        day: u32,
        /// Local hour.
        hour: u32,
        /// Local minute.
        minute: u32,
    },
}

impl ScheduleSpec {
    /// Whether the schedule is due given its last fire time.
    ///
    /// Coalescing is inherent: however long the outage, the answer is a
    /// single boolean, so one catch-up task fires per schedule.
    pub fn due(&self, last_fired: Option<DateTime<Local>>, now: DateTime<Local>) -> bool {
        match *self {
            Self::Every(interval) => last_fired.is_none_or(|last| now - last >= interval),
            Self::DailyAt { hour, minute } => {
                let anchor = most_recent_daily(now, hour, minute);
                last_fired.is_none_or(|last| last < anchor)
            }
            Self::MonthlyAt { day, hour, minute } => {
                let anchor = most_recent_monthly(now, day, hour, minute);
                last_fired.is_none_or(|last| last < anchor)
            }
        }
    }
}

/// The core schedule table (spec: hourly scrapes, 2-hour trend and tier-1
/// cadence, daily tier-2, 5-minute market seeding and stats rollup,
/// monthly credit top-up).
pub const SCHEDULES: [(TaskKind, ScheduleSpec); 8] = [
    (TaskKind::ScrapeSources, ScheduleSpec::Every(ChronoDuration::minutes(60))),
    (TaskKind::DetectTrendingTopics, ScheduleSpec::Every(ChronoDuration::minutes(120))),
    (TaskKind::Tier1MarketUpdate, ScheduleSpec::Every(ChronoDuration::minutes(120))),
    (TaskKind::Tier2MarketAnalysis, ScheduleSpec::DailyAt { hour: 2, minute: 0 }),
    (TaskKind::SeedNewMarkets, ScheduleSpec::Every(ChronoDuration::minutes(5))),
    (TaskKind::ReassessInactiveMarkets, ScheduleSpec::Every(ChronoDuration::minutes(60))),
    (TaskKind::MonthlyCreditTopup, ScheduleSpec::MonthlyAt { day: 1, hour: 0, minute: 0 }),
    (TaskKind::StatsRollup, ScheduleSpec::Every(ChronoDuration::minutes(5))),
];

/// The scheduler loop.
pub struct Scheduler {
    pool: PostgresPool,
    holder_id: String,
}

impl Scheduler {
    /// Create a scheduler identified by `holder_id` (unique per process).
    pub const fn new(pool: PostgresPool, holder_id: String) -> Self {
        Self { pool, holder_id }
    }

    /// Run the scheduler until the process stops.
    ///
    /// Acquires (or renews) the leader lease each tick; only the leader
    /// fires schedules. Losing the lease demotes gracefully.
    pub async fn run(&self) {
        info!(holder = self.holder_id, "scheduler started");
        loop {
            let store = SchedulerStore::new(self.pool.pool());
            match store
                .try_acquire_lease(LEASE_NAME, &self.holder_id, LEASE_TTL)
                .await
            {
                Ok(true) => {
                    if let Err(e) = self.fire_due().await {
                        warn!(error = %e, "scheduler tick failed");
                    }
                }
                Ok(false) => {
                    debug!(holder = self.holder_id, "not the scheduler leader");
                }
                Err(e) => {
                    warn!(error = %e, "lease acquisition failed");
                }
            }
            tokio::time::sleep(CHECK_INTERVAL).await;
        }
    }

    /// Enqueue one task for every due schedule.
    async fn fire_due(&self) -> Result<(), factico_db::DbError> {
        let store = SchedulerStore::new(self.pool.pool());
        let queue = TaskQueue::new(self.pool.pool());
        let now = Local::now();

        for (kind, spec) in SCHEDULES {
            let last = store
                .last_fired(kind.as_str())
                .await?
                .map(|utc| utc.with_timezone(&Local));
            if !spec.due(last, now) {
                continue;
            }

            queue
                .enqueue(
                    kind,
                    &serde_json::json!({}),
                    EnqueueOptions {
                        delay: None,
                        // One in-flight tick per schedule; a catch-up
                        // cannot stack on an unfinished run.
                        unique_key: Some(kind.as_str().to_owned()),
                        priority: 0,
                    },
                )
                .await?;
            store
                .record_fired(kind.as_str(), now.with_timezone(&chrono::Utc))
                .await?;
            info!(schedule = kind.as_str(), "schedule fired");
        }
        Ok(())
    }
}

/// The most recent daily anchor at `hour:minute` at or before `now`.
fn most_recent_daily(now: DateTime<Local>, hour: u32, minute: u32) -> DateTime<Local> {
    let today = candidate(now.year(), now.month(), now.day(), hour, minute, now);
    if today <= now {
        today
    } else {
        candidate_prev_day(now, hour, minute)
    }
}

/// The most recent monthly anchor at `day hour:minute` at or before `now`.
fn most_recent_monthly(now: DateTime<Local>, day: u32, hour: u32, minute: u32) -> DateTime<Local> {
    let this_month = candidate(now.year(), now.month(), day, hour, minute, now);
    if this_month <= now {
        this_month
    } else {
        let (year, month) = if now.month() == 1 {
            (now.year().saturating_sub(1), 12)
        } else {
            (now.year(), now.month().saturating_sub(1))
        };
        candidate(year, month, day, hour, minute, now)
    }
}

/// Build a local datetime, falling back to `now` on invalid combinations.
fn candidate(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    fallback: DateTime<Local>,
) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap_or(fallback)
}

/// The previous day's anchor, DST-safe via date arithmetic.
fn candidate_prev_day(now: DateTime<Local>, hour: u32, minute: u32) -> DateTime<Local> {
    let prev = now.date_naive() - ChronoDuration::days(1);
    Local
        .with_ymd_and_hms(prev.year(), prev.month(), prev.day(), hour, minute, 0)
        .single()
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .unwrap_or_else(Local::now)
    }

    #[test]
    fn interval_schedule_fires_after_period() {
        let spec = ScheduleSpec::Every(ChronoDuration::minutes(60));
        let now = local(2026, 3, 21, 12, 0);
        assert!(spec.due(None, now), "never-fired schedules are due");
        assert!(!spec.due(Some(local(2026, 3, 21, 11, 30)), now));
        assert!(spec.due(Some(local(2026, 3, 21, 11, 0)), now));
    }

    #[test]
    fn downtime_coalesces_to_one_catchup() {
        let spec = ScheduleSpec::Every(ChronoDuration::minutes(60));
        // Last fired 7 hours ago: still a single boolean "due".
        let now = local(2026, 3, 21, 12, 0);
        assert!(spec.due(Some(local(2026, 3, 21, 5, 0)), now));
        // After firing once, the schedule is no longer due.
        assert!(!spec.due(Some(now), now));
    }

    #[test]
    fn daily_schedule_anchors_to_local_time() {
        let spec = ScheduleSpec::DailyAt { hour: 2, minute: 0 };
        let after_anchor = local(2026, 3, 21, 3, 0);
        let fired_yesterday = Some(local(2026, 3, 20, 2, 0));
        assert!(spec.due(fired_yesterday, after_anchor));

        let fired_today = Some(local(2026, 3, 21, 2, 0));
        assert!(!spec.due(fired_today, after_anchor));

        let before_anchor = local(2026, 3, 21, 1, 0);
        assert!(!spec.due(fired_yesterday, before_anchor));
    }

    #[test]
    fn monthly_schedule_fires_on_day_one() {
        let spec = ScheduleSpec::MonthlyAt { day: 1, hour: 0, minute: 0 };
        let mid_month = local(2026, 3, 15, 12, 0);
        assert!(!spec.due(Some(local(2026, 3, 1, 0, 0)), mid_month));
        assert!(spec.due(Some(local(2026, 2, 1, 0, 0)), mid_month));
    }

    #[test]
    fn schedule_table_covers_all_periodic_kinds() {
        let kinds: Vec<TaskKind> = SCHEDULES.iter().map(|(kind, _)| *kind).collect();
        assert!(kinds.contains(&TaskKind::ScrapeSources));
        assert!(kinds.contains(&TaskKind::Tier2MarketAnalysis));
        assert!(kinds.contains(&TaskKind::MonthlyCreditTopup));
        assert!(kinds.contains(&TaskKind::StatsRollup));
        // ProcessSource and WriteEmbedding are pipeline-produced, never
        // scheduled.
        assert!(!kinds.contains(&TaskKind::ProcessSource));
        assert!(!kinds.contains(&TaskKind::WriteEmbedding));
    }
}
