pub mod dag;
pub mod runner;
pub mod schedule;
pub mod tasks;

pub use dag::{Dag, DefaultArgs, Task, TaskContext, TaskOutput, TaskState};
pub use runner::{DagRunReport, DagRunState, DagRunner, TaskInstance};
pub use schedule::{DagSchedule, Scheduler};
pub use tasks::{
    build_daily_dag, AggregateCountsTask, IngestTask, TransformTask, AGGREGATE_TASK_ID,
    INGEST_TASK_ID, TRANSFORM_TASK_ID,
};
