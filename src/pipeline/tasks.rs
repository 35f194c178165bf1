use crate::config::{PipelineConfig, TransformConfig};
use crate::error::Result;
use crate::ingest::{DataSource, Ingestor, RawStore};
use crate::pipeline::dag::{Dag, DefaultArgs, Task, TaskContext, TaskOutput};
use crate::processors::CountsJob;
use crate::readers::CsvTableReader;
use crate::utils::filename::processed_snapshot_path;
use crate::writers::CsvWriter;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub const INGEST_TASK_ID: &str = "ingest_csv_to_raw";
pub const TRANSFORM_TASK_ID: &str = "transform_to_curated";
pub const AGGREGATE_TASK_ID: &str = "aggregate_daily_counts";

/// Copy the configured source into the raw directory
pub struct IngestTask {
    ingestor: Ingestor,
    source: DataSource,
}

impl IngestTask {
    pub fn new(ingestor: Ingestor, source: DataSource) -> Self {
        Self { ingestor, source }
    }
}

#[async_trait]
impl Task for IngestTask {
    fn id(&self) -> &str {
        INGEST_TASK_ID
    }

    async fn run(&self, _ctx: &TaskContext) -> Result<TaskOutput> {
        let outcome = self.ingestor.ingest(&self.source, Utc::now()).await?;
        Ok(TaskOutput::new(outcome.path.display().to_string()))
    }
}

/// Latest raw snapshot to a processed CSV stamped with `processed_at`
pub struct TransformTask {
    raw_dir: PathBuf,
    curated_dir: PathBuf,
}

impl TransformTask {
    pub fn new(raw_dir: impl Into<PathBuf>, curated_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            curated_dir: curated_dir.into(),
        }
    }

    fn process(&self) -> Result<PathBuf> {
        let raw_path = RawStore::latest(&self.raw_dir)?;
        info!(path = %raw_path.display(), "processing raw snapshot");

        let table = CsvTableReader::new().read_path(&raw_path)?;
        info!(rows = table.len(), "loaded records for processing");

        let now = Utc::now();
        let processed_at = now.to_rfc3339_opts(SecondsFormat::Micros, false);
        std::fs::create_dir_all(&self.curated_dir)?;
        let output = processed_snapshot_path(&self.curated_dir, now);

        CsvWriter::new().write_table_with_column(&table, "processed_at", &processed_at, &output)?;
        info!(path = %output.display(), rows = table.len(), "processed snapshot saved");
        Ok(output)
    }
}

#[async_trait]
impl Task for TransformTask {
    fn id(&self) -> &str {
        TRANSFORM_TASK_ID
    }

    async fn run(&self, _ctx: &TaskContext) -> Result<TaskOutput> {
        let task = Self::new(&self.raw_dir, &self.curated_dir);
        let output = tokio::task::spawn_blocking(move || task.process()).await??;
        Ok(TaskOutput::new(output.display().to_string()))
    }
}

/// Latest raw snapshot to `daily_counts.parquet`
pub struct AggregateCountsTask {
    raw_dir: PathBuf,
    curated_dir: PathBuf,
    transform: TransformConfig,
}

impl AggregateCountsTask {
    pub fn new(
        raw_dir: impl Into<PathBuf>,
        curated_dir: impl Into<PathBuf>,
        transform: TransformConfig,
    ) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            curated_dir: curated_dir.into(),
            transform,
        }
    }
}

#[async_trait]
impl Task for AggregateCountsTask {
    fn id(&self) -> &str {
        AGGREGATE_TASK_ID
    }

    async fn run(&self, _ctx: &TaskContext) -> Result<TaskOutput> {
        let raw_dir = self.raw_dir.clone();
        let curated_dir = self.curated_dir.clone();
        let transform = self.transform.clone();

        let summary = tokio::task::spawn_blocking(move || {
            let input = RawStore::latest(&raw_dir)?;
            CountsJob::new(&transform)?.run(&input, &curated_dir, None)
        })
        .await??;

        Ok(TaskOutput::new(summary.output.display().to_string()))
    }
}

/// ingest >> transform, plus >> aggregate when daily counts are enabled
pub fn build_daily_dag(config: &PipelineConfig) -> Result<Dag> {
    let schedule = &config.schedule;
    let args = DefaultArgs {
        owner: schedule.owner.clone(),
        retries: schedule.retries,
        retry_delay: schedule.retry_delay(),
    };

    let mut dag = Dag::new(schedule.dag_id.clone(), args);
    dag.add_task(Arc::new(IngestTask::new(
        Ingestor::from_config(&config.paths, &config.ingest),
        DataSource::from_config(&config.ingest),
    )))?;
    dag.add_task(Arc::new(TransformTask::new(
        &config.paths.raw_dir,
        &config.paths.curated_dir,
    )))?;
    dag.set_downstream(INGEST_TASK_ID, TRANSFORM_TASK_ID)?;

    if schedule.aggregate_counts {
        dag.add_task(Arc::new(AggregateCountsTask::new(
            &config.paths.raw_dir,
            &config.paths.curated_dir,
            config.transform.clone(),
        )))?;
        dag.set_downstream(TRANSFORM_TASK_ID, AGGREGATE_TASK_ID)?;
    }

    dag.validate()?;
    Ok(dag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::runner::DagRunner;
    use crate::pipeline::TaskState;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(root: &Path, aggregate: bool) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.paths.raw_dir = root.join("raw");
        config.paths.curated_dir = root.join("curated");
        config.ingest.source_file = root.join("source.csv");
        config.schedule.retry_delay_secs = 0;
        config.schedule.aggregate_counts = aggregate;
        config
    }

    #[test]
    fn test_dag_shape() {
        let dir = TempDir::new().unwrap();
        let dag = build_daily_dag(&config(dir.path(), false)).unwrap();
        assert_eq!(dag.dag_id(), "cph_bike_daily");
        assert_eq!(dag.default_args().owner, "lux");
        assert_eq!(
            dag.topological_order().unwrap(),
            vec![INGEST_TASK_ID, TRANSFORM_TASK_ID]
        );

        let dag = build_daily_dag(&config(dir.path(), true)).unwrap();
        assert_eq!(dag.len(), 3);
        assert_eq!(dag.upstream_of(AGGREGATE_TASK_ID).unwrap(), vec![TRANSFORM_TASK_ID]);
    }

    #[tokio::test]
    async fn test_daily_run_end_to_end() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("source.csv"),
            "timestamp,count,counter_id\n\
             2024-03-01 07:00:00,5,S1\n\
             2024-03-01 08:00:00,7,S1\n",
        )
        .unwrap();

        let cfg = config(dir.path(), true);
        let dag = build_daily_dag(&cfg).unwrap();
        let report = DagRunner::new().run(&dag, Utc::now()).await.unwrap();
        assert!(report.is_success(), "{}", report.summary());

        let processed = PathBuf::from(report.task(TRANSFORM_TASK_ID).unwrap().output.clone().unwrap());
        let content = std::fs::read_to_string(&processed).unwrap();
        assert!(content.starts_with("timestamp,count,counter_id,processed_at\n"));
        assert_eq!(content.lines().count(), 3);
        assert!(cfg.paths.curated_dir.join("daily_counts.parquet").exists());
    }

    #[tokio::test]
    async fn test_missing_source_fails_and_skips_transform() {
        let dir = TempDir::new().unwrap();
        let dag = build_daily_dag(&config(dir.path(), false)).unwrap();
        let report = DagRunner::new()
            .with_retry_delay(Duration::ZERO)
            .run(&dag, Utc::now())
            .await
            .unwrap();

        assert!(!report.is_success());
        let ingest = report.task(INGEST_TASK_ID).unwrap();
        assert_eq!(ingest.state, TaskState::Failed);
        assert_eq!(ingest.attempts, 2);
        assert_eq!(
            report.task(TRANSFORM_TASK_ID).unwrap().state,
            TaskState::UpstreamFailed
        );
    }

    #[tokio::test]
    async fn test_transform_without_raw_files() {
        let dir = TempDir::new().unwrap();
        let task = TransformTask::new(dir.path().join("raw"), dir.path().join("curated"));
        let ctx = TaskContext::new("t", "manual", Utc::now());
        let err = task.run(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("No raw data files"));
    }
}
