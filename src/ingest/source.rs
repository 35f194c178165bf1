use crate::config::IngestConfig;
use crate::error::{PipelineError, Result};
use std::fmt;
use std::path::PathBuf;

/// Where a raw snapshot comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Url(String),
    File(PathBuf),
}

impl DataSource {
    /// The configured URL when set, otherwise the curated source file
    pub fn from_config(config: &IngestConfig) -> Self {
        match config.source_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => DataSource::Url(url.to_string()),
            _ => DataSource::File(config.source_file.clone()),
        }
    }

    /// The configured URL; a `Config` error when none is set
    pub fn remote(config: &IngestConfig) -> Result<Self> {
        match config.source_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(DataSource::Url(url.to_string())),
            _ => Err(PipelineError::Config(
                "SOURCE_URL missing (set CPH_BIKES__INGEST__SOURCE_URL or SOURCE_URL)".to_string(),
            )),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Url(url) => write!(f, "{}", url),
            DataSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}
