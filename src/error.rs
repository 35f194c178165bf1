use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Parquet write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid cron expression '{expression}': {message}")]
    InvalidCron { expression: String, message: String },

    #[error("Data source not found: {0}")]
    SourceNotFound(String),

    #[error("No raw data files found in {0}")]
    NoRawFiles(String),

    #[error("Could not infer {message} from columns: {columns:?}")]
    ColumnDetection {
        message: String,
        columns: Vec<String>,
    },

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("DAG '{dag_id}' contains a cycle through: {tasks:?}")]
    DagCycle { dag_id: String, tasks: Vec<String> },

    #[error("Task '{0}' is not defined in the DAG")]
    UnknownTask(String),

    #[error("Task '{0}' is already defined in the DAG")]
    DuplicateTask(String),

    #[error("Task '{task_id}' failed after {attempts} attempt(s): {message}")]
    TaskFailed {
        task_id: String,
        attempts: u32,
        message: String,
    },

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl From<axum::extract::rejection::PathRejection> for PipelineError {
    fn from(rejection: axum::extract::rejection::PathRejection) -> Self {
        PipelineError::InvalidParameter {
            name: "path".to_string(),
            reason: rejection.body_text(),
        }
    }
}

impl From<axum::extract::rejection::QueryRejection> for PipelineError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        PipelineError::InvalidParameter {
            name: "query".to_string(),
            reason: rejection.body_text(),
        }
    }
}

impl axum::response::IntoResponse for PipelineError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            PipelineError::MissingData(_) | PipelineError::SourceNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            PipelineError::InvalidParameter { .. } | PipelineError::InvalidFormat(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
