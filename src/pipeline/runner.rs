use crate::error::Result;
use crate::pipeline::dag::{Dag, TaskContext, TaskState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DagRunState {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskInstance {
    pub task_id: String,
    pub state: TaskState,
    pub attempts: u32,
    pub output: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DagRunReport {
    pub dag_id: String,
    pub run_id: String,
    pub logical_date: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: DagRunState,
    pub tasks: Vec<TaskInstance>,
}

impl DagRunReport {
    pub fn is_success(&self) -> bool {
        self.state == DagRunState::Success
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskInstance> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "DAG run {} ({}): {:?}\n  Logical date: {}\n  Duration: {:.1}s\n",
            self.run_id,
            self.dag_id,
            self.state,
            self.logical_date.to_rfc3339(),
            (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
        );
        for task in &self.tasks {
            summary.push_str(&format!(
                "  {:<28} {:<16} attempts={}",
                task.task_id,
                format!("{:?}", task.state),
                task.attempts
            ));
            if let Some(output) = &task.output {
                summary.push_str(&format!(" -> {}", output));
            }
            if let Some(err) = &task.error {
                summary.push_str(&format!(" ({})", err));
            }
            summary.push('\n');
        }
        summary
    }
}

/// Runs every task of a DAG once, in dependency order
pub struct DagRunner {
    retry_delay: Option<Duration>,
}

impl DagRunner {
    pub fn new() -> Self {
        Self { retry_delay: None }
    }

    /// Replace the DAG's retry delay, mostly for tests and manual runs
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn run_id(logical_date: DateTime<Utc>, manual: bool) -> String {
        let kind = if manual { "manual" } else { "scheduled" };
        format!("{}__{}", kind, logical_date.to_rfc3339())
    }

    /// Fails only when the DAG itself is invalid; task failures are in the report
    pub async fn run(&self, dag: &Dag, logical_date: DateTime<Utc>) -> Result<DagRunReport> {
        self.run_with_id(dag, logical_date, &Self::run_id(logical_date, false))
            .await
    }

    pub async fn run_with_id(
        &self,
        dag: &Dag,
        logical_date: DateTime<Utc>,
        run_id: &str,
    ) -> Result<DagRunReport> {
        let order: Vec<String> = dag
            .topological_order()?
            .into_iter()
            .map(str::to_string)
            .collect();
        let args = dag.default_args();
        let retry_delay = self.retry_delay.unwrap_or(args.retry_delay);
        let max_attempts = args.retries + 1;

        info!(dag_id = dag.dag_id(), run_id, owner = %args.owner, "starting DAG run");
        let started_at = Utc::now();
        let mut ctx = TaskContext::new(dag.dag_id(), run_id, logical_date);
        let mut states: HashMap<String, TaskState> =
            order.iter().map(|id| (id.clone(), TaskState::Pending)).collect();
        let mut instances = Vec::with_capacity(order.len());

        for task_id in &order {
            let upstream_ok = dag
                .upstream_of(task_id)?
                .iter()
                .all(|up| states.get(*up) == Some(&TaskState::Success));

            if !upstream_ok {
                warn!(task_id, "upstream failed, skipping");
                states.insert(task_id.clone(), TaskState::UpstreamFailed);
                instances.push(TaskInstance {
                    task_id: task_id.clone(),
                    state: TaskState::UpstreamFailed,
                    attempts: 0,
                    output: None,
                    error: None,
                });
                continue;
            }

            let Some(task) = dag.task(task_id) else {
                continue;
            };

            let mut attempts = 0;
            let mut last_error = None;
            let mut output = None;

            while attempts < max_attempts {
                attempts += 1;
                states.insert(task_id.clone(), TaskState::Running);
                info!(task_id, attempt = attempts, max_attempts, "running task");

                match task.run(&ctx).await {
                    Ok(out) => {
                        output = Some(out);
                        break;
                    }
                    Err(e) => {
                        last_error = Some(e.to_string());
                        if attempts < max_attempts {
                            states.insert(task_id.clone(), TaskState::UpRetry);
                            warn!(task_id, attempt = attempts, error = %e, delay = ?retry_delay, "task failed, retrying");
                            tokio::time::sleep(retry_delay).await;
                        } else {
                            error!(task_id, attempts, error = %e, "task failed");
                        }
                    }
                }
            }

            let instance = match output {
                Some(out) => {
                    ctx.record_output(task_id, &out);
                    info!(task_id, output = %out.value, "task succeeded");
                    TaskInstance {
                        task_id: task_id.clone(),
                        state: TaskState::Success,
                        attempts,
                        output: Some(out.value),
                        error: None,
                    }
                }
                None => TaskInstance {
                    task_id: task_id.clone(),
                    state: TaskState::Failed,
                    attempts,
                    output: None,
                    error: last_error,
                },
            };
            states.insert(task_id.clone(), instance.state);
            instances.push(instance);
        }

        let state = if instances.iter().all(|t| t.state == TaskState::Success) {
            DagRunState::Success
        } else {
            DagRunState::Failed
        };

        let report = DagRunReport {
            dag_id: dag.dag_id().to_string(),
            run_id: run_id.to_string(),
            logical_date,
            started_at,
            finished_at: Utc::now(),
            state,
            tasks: instances,
        };
        info!(dag_id = dag.dag_id(), run_id, state = ?report.state, "DAG run finished");
        Ok(report)
    }
}

impl Default for DagRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::pipeline::dag::tests::Noop;
    use crate::pipeline::dag::{DefaultArgs, Task, TaskOutput};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails the first `failures` attempts
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Task for Flaky {
        fn id(&self) -> &str {
            "flaky"
        }

        async fn run(&self, _ctx: &TaskContext) -> Result<TaskOutput> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(PipelineError::MissingData("not yet".to_string()))
            } else {
                Ok(TaskOutput::new("done"))
            }
        }
    }

    /// Echoes its upstream's output
    struct Echo;

    #[async_trait]
    impl Task for Echo {
        fn id(&self) -> &str {
            "echo"
        }

        async fn run(&self, ctx: &TaskContext) -> Result<TaskOutput> {
            let upstream = ctx
                .output_of("flaky")
                .ok_or_else(|| PipelineError::MissingData("no upstream output".to_string()))?;
            Ok(TaskOutput::new(format!("{}!", upstream)))
        }
    }

    fn flaky_dag(failures: u32, retries: u32) -> Dag {
        let args = DefaultArgs {
            retries,
            retry_delay: Duration::from_millis(1),
            ..DefaultArgs::default()
        };
        let mut dag = Dag::new("flaky_dag", args);
        dag.add_task(Arc::new(Flaky {
            failures,
            calls: AtomicU32::new(0),
        }))
        .unwrap();
        dag.add_task(Arc::new(Echo)).unwrap();
        dag.set_downstream("flaky", "echo").unwrap();
        dag
    }

    #[tokio::test]
    async fn test_retry_then_success_passes_output() {
        let report = DagRunner::new()
            .run(&flaky_dag(1, 1), Utc::now())
            .await
            .unwrap();
        assert!(report.is_success());
        assert_eq!(report.task("flaky").unwrap().attempts, 2);
        assert_eq!(report.task("echo").unwrap().output.as_deref(), Some("done!"));
    }

    #[tokio::test]
    async fn test_exhausted_retries_mark_downstream() {
        let report = DagRunner::new()
            .run(&flaky_dag(5, 1), Utc::now())
            .await
            .unwrap();
        assert_eq!(report.state, DagRunState::Failed);
        let flaky = report.task("flaky").unwrap();
        assert_eq!(flaky.state, TaskState::Failed);
        assert_eq!(flaky.attempts, 2);
        assert!(flaky.error.as_deref().unwrap().contains("not yet"));
        assert_eq!(report.task("echo").unwrap().state, TaskState::UpstreamFailed);
        assert!(report.summary().contains("UpstreamFailed"));
    }

    #[tokio::test]
    async fn test_independent_tasks_all_run() {
        let mut dag = Dag::new("plain", DefaultArgs::default());
        dag.add_task(Arc::new(Noop("a"))).unwrap();
        dag.add_task(Arc::new(Noop("b"))).unwrap();
        let report = DagRunner::new().run(&dag, Utc::now()).await.unwrap();
        assert!(report.is_success());
        assert!(report.run_id.starts_with("scheduled__"));
        assert_eq!(report.tasks.len(), 2);
    }
}
