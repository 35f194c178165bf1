use crate::error::{PipelineError, Result};
use crate::pipeline::dag::Dag;
use crate::pipeline::runner::{DagRunReport, DagRunner};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use cron::Schedule;
use std::future::Future;
use std::str::FromStr;
use tracing::{error, info, warn};

/// Cron schedule of a DAG, evaluated in UTC
#[derive(Debug, Clone)]
pub struct DagSchedule {
    expression: String,
    schedule: Schedule,
    start_date: NaiveDate,
    catchup: bool,
}

impl DagSchedule {
    /// Accepts five-field (minute-first) or six/seven-field (second-first) expressions
    pub fn new(expression: &str, start_date: NaiveDate, catchup: bool) -> Result<Self> {
        let fields = expression.split_whitespace().count();
        let normalized = if fields == 5 {
            format!("0 {}", expression.trim())
        } else {
            expression.trim().to_string()
        };

        let schedule = Schedule::from_str(&normalized).map_err(|e| PipelineError::InvalidCron {
            expression: expression.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            expression: expression.to_string(),
            schedule,
            start_date,
            catchup,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn catchup(&self) -> bool {
        self.catchup
    }

    pub fn start(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start_date.and_time(chrono::NaiveTime::MIN))
    }

    /// Cursor that makes a slot exactly at the start date eligible
    fn floor(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let before_start = self.start() - chrono::Duration::seconds(1);
        after.max(before_start)
    }

    /// Next fire time strictly after `after`, never before the start date
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&self.floor(after)).next()
    }

    /// Upcoming fire times after `after`
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&self.floor(after)).take(count).collect()
    }

    /// Slots that have passed since `last_run` (or the start date) up to `now`.
    /// Without catchup only the most recent missed slot is returned.
    pub fn due_runs(
        &self,
        last_run: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Vec<DateTime<Utc>> {
        let from = match last_run {
            Some(last) => self.floor(last),
            None => self.floor(self.start() - chrono::Duration::seconds(1)),
        };

        let missed = self.schedule.after(&from).take_while(|slot| *slot <= now);

        if self.catchup {
            missed.collect()
        } else {
            missed.last().into_iter().collect()
        }
    }
}

/// Runs a DAG on its schedule until shut down
pub struct Scheduler {
    schedule: DagSchedule,
    runner: DagRunner,
}

impl Scheduler {
    pub fn new(schedule: DagSchedule, runner: DagRunner) -> Self {
        Self { schedule, runner }
    }

    /// Run until Ctrl-C
    pub async fn run_forever(&self, dag: &Dag) -> Result<Vec<DagRunReport>> {
        self.run_until(dag, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run missed slots, then sleep until each next slot, until `shutdown` resolves
    pub async fn run_until<F>(&self, dag: &Dag, shutdown: F) -> Result<Vec<DagRunReport>>
    where
        F: Future<Output = ()>,
    {
        dag.validate()?;
        tokio::pin!(shutdown);

        let mut reports = Vec::new();
        let mut last_run = None;

        info!(
            dag_id = dag.dag_id(),
            cron = self.schedule.expression(),
            catchup = self.schedule.catchup(),
            "scheduler started"
        );

        loop {
            let now = Utc::now();
            for slot in self.schedule.due_runs(last_run, now) {
                let report = self.runner.run(dag, slot).await?;
                if !report.is_success() {
                    warn!(dag_id = dag.dag_id(), logical_date = %slot, "scheduled run failed");
                }
                reports.push(report);
                last_run = Some(slot);
            }

            let Some(next) = self.schedule.next_after(now) else {
                info!("schedule has no further fire times");
                return Ok(reports);
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            info!(next_run = %next, wait_secs = wait.as_secs(), "waiting for next slot");

            tokio::select! {
                _ = &mut shutdown => {
                    info!("scheduler shutting down");
                    return Ok(reports);
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}
