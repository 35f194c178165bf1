use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::Validate;

use crate::error::{PipelineError, Result};
use crate::utils::constants::*;

/// Default configuration file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "cph-bikes.toml";

/// Environment prefix: CPH_BIKES__INGEST__SOURCE_URL etc.
pub const ENV_PREFIX: &str = "CPH_BIKES";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    #[validate(nested)]
    pub paths: PathsConfig,
    #[validate(nested)]
    pub ingest: IngestConfig,
    #[validate(nested)]
    pub transform: TransformConfig,
    #[validate(nested)]
    pub schedule: ScheduleConfig,
    #[validate(nested)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_dir: PathBuf,
    pub curated_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from(DEFAULT_RAW_DIR),
            curated_dir: PathBuf::from(DEFAULT_CURATED_DIR),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct IngestConfig {
    pub source_url: Option<String>,
    pub source_file: PathBuf,
    #[validate(range(min = 1, max = 3600))]
    pub timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_url: None,
            source_file: PathBuf::from(DEFAULT_CURATED_DIR).join(PREPARED_DATASET_FILE),
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TransformConfig {
    pub compression: String,
    #[validate(range(min = 1))]
    pub row_group_size: usize,
    #[validate(range(min = 1))]
    pub batch_size: usize,
    #[validate(range(min = 1))]
    pub max_workers: usize,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            compression: COMPRESSION_SNAPPY.to_string(),
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            batch_size: DEFAULT_CHUNK_SIZE,
            max_workers: num_cpus::get(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ScheduleConfig {
    #[validate(length(min = 1))]
    pub dag_id: String,
    pub owner: String,
    pub cron: String,
    pub start_date: NaiveDate,
    pub catchup: bool,
    #[validate(range(max = 10))]
    pub retries: u32,
    pub retry_delay_secs: u64,
    pub aggregate_counts: bool,
}

impl ScheduleConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            dag_id: DEFAULT_DAG_ID.to_string(),
            owner: DEFAULT_DAG_OWNER.to_string(),
            cron: DEFAULT_CRON.to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap_or_default(),
            catchup: false,
            retries: DEFAULT_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            aggregate_counts: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DashboardConfig {
    pub bind: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[validate(range(min = 1))]
    pub scheduler_ui_port: u16,
    #[validate(range(min = 1))]
    pub engine_ui_port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DASHBOARD_PORT,
            scheduler_ui_port: SCHEDULER_UI_PORT,
            engine_ui_port: ENGINE_UI_PORT,
        }
    }
}

impl PipelineConfig {
    /// Layered load: defaults, then the TOML file, then CPH_BIKES__* variables.
    /// Without an explicit path, `cph-bikes.toml` is read when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&PipelineConfig::default())?;

        let file_source = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(PipelineError::SourceNotFound(p.display().to_string()));
                }
                config::File::from(p).required(true)
            }
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let layered = config::Config::builder()
            .add_source(defaults)
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: PipelineConfig = layered.try_deserialize()?;

        // Unprefixed variable still read by existing deployments
        if cfg.ingest.source_url.is_none() {
            if let Ok(url) = std::env::var("SOURCE_URL") {
                if !url.trim().is_empty() {
                    cfg.ingest.source_url = Some(url);
                }
            }
        }

        cfg.check()?;
        Ok(cfg)
    }

    /// Field validation plus the checks validator cannot express
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        crate::writers::ParquetWriter::new().with_compression(&self.transform.compression)?;
        crate::pipeline::DagSchedule::new(
            &self.schedule.cron,
            self.schedule.start_date,
            self.schedule.catchup,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.dashboard.port, 8501);
        assert_eq!(cfg.dashboard.scheduler_ui_port, 8080);
        assert_eq!(cfg.dashboard.engine_ui_port, 8081);
        assert_eq!(cfg.schedule.cron, "10 4 * * *");
        assert_eq!(cfg.schedule.retries, 1);
        assert_eq!(cfg.schedule.retry_delay(), Duration::from_secs(300));
        assert_eq!(cfg.paths.raw_dir, PathBuf::from("data/raw"));
        assert!(cfg.check().is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[paths]\nraw_dir = \"/tmp/raw\"\n\n[schedule]\nretries = 3\ncron = \"0 6 * * *\"\n\n[dashboard]\nport = 9000"
        )
        .unwrap();

        let cfg = PipelineConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.paths.raw_dir, PathBuf::from("/tmp/raw"));
        assert_eq!(cfg.paths.curated_dir, PathBuf::from("data/curated"));
        assert_eq!(cfg.schedule.retries, 3);
        assert_eq!(cfg.schedule.cron, "0 6 * * *");
        assert_eq!(cfg.dashboard.port, 9000);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = PipelineConfig::load(Some(Path::new("/nonexistent/cph-bikes.toml")));
        assert!(matches!(result, Err(PipelineError::SourceNotFound(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.transform.compression = "brotli".to_string();
        assert!(cfg.check().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.schedule.cron = "not a cron".to_string();
        assert!(cfg.check().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.schedule.retries = 50;
        assert!(cfg.check().is_err());
    }
}
