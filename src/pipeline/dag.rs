use crate::error::{PipelineError, Result};
use crate::utils::constants::{DEFAULT_DAG_OWNER, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_SECS};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// A unit of work in a DAG
#[async_trait]
pub trait Task: Send + Sync {
    /// Unique id within the DAG
    fn id(&self) -> &str;

    async fn run(&self, ctx: &TaskContext) -> Result<TaskOutput>;
}

/// Value a task hands to its downstream tasks, usually a file path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub value: String,
}

impl TaskOutput {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Per-run state shared with every task
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub dag_id: String,
    pub run_id: String,
    pub logical_date: DateTime<Utc>,
    outputs: HashMap<String, String>,
}

impl TaskContext {
    pub fn new(dag_id: &str, run_id: &str, logical_date: DateTime<Utc>) -> Self {
        Self {
            dag_id: dag_id.to_string(),
            run_id: run_id.to_string(),
            logical_date,
            outputs: HashMap::new(),
        }
    }

    /// Output recorded by an upstream task in this run
    pub fn output_of(&self, task_id: &str) -> Option<&str> {
        self.outputs.get(task_id).map(String::as_str)
    }

    pub(crate) fn record_output(&mut self, task_id: &str, output: &TaskOutput) {
        self.outputs.insert(task_id.to_string(), output.value.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Success,
    Failed,
    UpRetry,
    UpstreamFailed,
}

/// Defaults applied to every task in a DAG
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultArgs {
    pub owner: String,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for DefaultArgs {
    fn default() -> Self {
        Self {
            owner: DEFAULT_DAG_OWNER.to_string(),
            retries: DEFAULT_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

/// Task graph; edges point from upstream to downstream
pub struct Dag {
    dag_id: String,
    default_args: DefaultArgs,
    tasks: Vec<Arc<dyn Task>>,
    index: HashMap<String, usize>,
    downstream: Vec<Vec<usize>>,
}

impl Dag {
    pub fn new(dag_id: impl Into<String>, default_args: DefaultArgs) -> Self {
        Self {
            dag_id: dag_id.into(),
            default_args,
            tasks: Vec::new(),
            index: HashMap::new(),
            downstream: Vec::new(),
        }
    }

    pub fn dag_id(&self) -> &str {
        &self.dag_id
    }

    pub fn default_args(&self) -> &DefaultArgs {
        &self.default_args
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn add_task(&mut self, task: Arc<dyn Task>) -> Result<()> {
        let id = task.id().to_string();
        if self.index.contains_key(&id) {
            return Err(PipelineError::DuplicateTask(id));
        }
        self.index.insert(id, self.tasks.len());
        self.tasks.push(task);
        self.downstream.push(Vec::new());
        Ok(())
    }

    /// `upstream >> downstream`
    pub fn set_downstream(&mut self, upstream: &str, downstream: &str) -> Result<()> {
        let up = self.position(upstream)?;
        let down = self.position(downstream)?;
        if !self.downstream[up].contains(&down) {
            self.downstream[up].push(down);
        }
        Ok(())
    }

    pub fn task(&self, task_id: &str) -> Option<&Arc<dyn Task>> {
        self.index.get(task_id).map(|&i| &self.tasks[i])
    }

    /// Direct upstream task ids of `task_id`
    pub fn upstream_of(&self, task_id: &str) -> Result<Vec<&str>> {
        let target = self.position(task_id)?;
        Ok(self
            .downstream
            .iter()
            .enumerate()
            .filter(|(_, downs)| downs.contains(&target))
            .map(|(i, _)| self.tasks[i].id())
            .collect())
    }

    /// Kahn's algorithm; among ready tasks the earliest added runs first
    pub fn topological_order(&self) -> Result<Vec<&str>> {
        let mut in_degree = vec![0usize; self.tasks.len()];
        for downs in &self.downstream {
            for &d in downs {
                in_degree[d] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = (0..self.tasks.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.tasks.len());

        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &d in &self.downstream[next] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    ready.insert(d);
                }
            }
        }

        if order.len() != self.tasks.len() {
            let tasks = (0..self.tasks.len())
                .filter(|i| in_degree[*i] > 0)
                .map(|i| self.tasks[i].id().to_string())
                .collect();
            return Err(PipelineError::DagCycle {
                dag_id: self.dag_id.clone(),
                tasks,
            });
        }

        Ok(order.into_iter().map(|i| self.tasks[i].id()).collect())
    }

    pub fn validate(&self) -> Result<()> {
        self.topological_order().map(|_| ())
    }

    fn position(&self, task_id: &str) -> Result<usize> {
        self.index
            .get(task_id)
            .copied()
            .ok_or_else(|| PipelineError::UnknownTask(task_id.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Task that returns a fixed value, for graph tests
    pub(crate) struct Noop(pub &'static str);

    #[async_trait]
    impl Task for Noop {
        fn id(&self) -> &str {
            self.0
        }

        async fn run(&self, _ctx: &TaskContext) -> Result<TaskOutput> {
            Ok(TaskOutput::new(self.0))
        }
    }

    fn dag(ids: &[&'static str]) -> Dag {
        let mut dag = Dag::new("test", DefaultArgs::default());
        for id in ids {
            dag.add_task(Arc::new(Noop(id))).unwrap();
        }
        dag
    }

    #[test]
    fn test_default_args() {
        let args = DefaultArgs::default();
        assert_eq!(args.owner, "lux");
        assert_eq!(args.retries, 1);
        assert_eq!(args.retry_delay, Duration::from_secs(300));
    }

    #[test]
    fn test_topological_order_respects_edges() {
        let mut dag = dag(&["transform", "ingest", "aggregate"]);
        dag.set_downstream("ingest", "transform").unwrap();
        dag.set_downstream("transform", "aggregate").unwrap();
        assert_eq!(
            dag.topological_order().unwrap(),
            vec!["ingest", "transform", "aggregate"]
        );
        assert_eq!(dag.upstream_of("transform").unwrap(), vec!["ingest"]);
    }

    #[test]
    fn test_ties_follow_insertion_order() {
        let mut dag = dag(&["a", "b", "c", "d"]);
        dag.set_downstream("a", "d").unwrap();
        assert_eq!(dag.topological_order().unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_cycle_detected() {
        let mut dag = dag(&["a", "b", "c"]);
        dag.set_downstream("a", "b").unwrap();
        dag.set_downstream("b", "c").unwrap();
        dag.set_downstream("c", "b").unwrap();
        match dag.validate() {
            Err(PipelineError::DagCycle { tasks, .. }) => assert_eq!(tasks, vec!["b", "c"]),
            other => panic!("expected cycle, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unknown_and_duplicate_tasks() {
        let mut dag = dag(&["a"]);
        assert!(matches!(
            dag.set_downstream("a", "missing"),
            Err(PipelineError::UnknownTask(_))
        ));
        assert!(matches!(
            dag.add_task(Arc::new(Noop("a"))),
            Err(PipelineError::DuplicateTask(_))
        ));
    }
}
