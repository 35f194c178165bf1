use crate::analyzers::{BikeAnalyzer, DatasetLocator, LoadedDataset, QueryCache};
use crate::error::{PipelineError, Result};
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

const DEFAULT_TEMPERATURE_BINS: usize = 8;
const DEFAULT_PRECIPITATION_BINS: usize = 5;
const DEFAULT_TOP_LOCATIONS: usize = 20;

// Extractor rejections become `PipelineError`s so bad input gets the JSON error body
type PathParams<T> = std::result::Result<Path<T>, PathRejection>;
type QueryParams<T> = std::result::Result<Query<T>, QueryRejection>;

struct DashboardData {
    label: String,
    path: PathBuf,
    analyzer: BikeAnalyzer,
}

impl From<LoadedDataset> for DashboardData {
    fn from(loaded: LoadedDataset) -> Self {
        Self {
            label: loaded.label,
            path: loaded.path,
            analyzer: BikeAnalyzer::new(loaded.records),
        }
    }
}

/// Shared application state
pub struct AppState {
    curated_dir: PathBuf,
    data: RwLock<Option<DashboardData>>,
    cache: QueryCache,
}

impl AppState {
    /// Load the preferred dataset; the server still starts when there is none
    pub fn load(curated_dir: impl Into<PathBuf>) -> Self {
        let curated_dir = curated_dir.into();
        let data = match DatasetLocator::load(&curated_dir) {
            Ok(loaded) => Some(DashboardData::from(loaded)),
            Err(e) => {
                warn!(error = %e, "dashboard starting without data");
                None
            }
        };
        Self {
            curated_dir,
            data: RwLock::new(data),
            cache: QueryCache::new(),
        }
    }

    pub fn with_dataset(curated_dir: impl Into<PathBuf>, loaded: LoadedDataset) -> Self {
        Self {
            curated_dir: curated_dir.into(),
            data: RwLock::new(Some(DashboardData::from(loaded))),
            cache: QueryCache::new(),
        }
    }

    async fn query<T, F>(&self, name: &str, params: &str, compute: F) -> Result<Value>
    where
        T: serde::Serialize,
        F: FnOnce(&BikeAnalyzer) -> Result<T>,
    {
        let guard = self.data.read().await;
        let data = guard.as_ref().ok_or_else(|| {
            PipelineError::MissingData("No data yet. Trigger the daily DAG once.".to_string())
        })?;
        self.cache
            .get_or_compute(name, params, || compute(&data.analyzer))
    }

    async fn reload(&self) -> Result<Value> {
        let dir = self.curated_dir.clone();
        let loaded = tokio::task::spawn_blocking(move || DatasetLocator::load(&dir)).await??;
        let summary = json!({
            "dataset": loaded.label,
            "path": loaded.path.display().to_string(),
            "records": loaded.records.len(),
        });

        let mut data = self.data.write().await;
        *data = Some(DashboardData::from(loaded));
        // Cleared before readers can see the new data
        self.cache.invalidate();
        drop(data);

        info!(summary = %summary, "dashboard dataset reloaded");
        Ok(summary)
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/overview", get(overview))
        .route("/months", get(months))
        .route("/months/{year}/{month}", get(month_analysis))
        .route("/monthly", get(monthly))
        .route("/seasons", get(seasons))
        .route("/weather", get(weather))
        .route("/weather/temperature", get(temperature_bins))
        .route("/weather/precipitation", get(precipitation_bins))
        .route("/locations/top", get(top_locations))
        .route("/locations/stats", get(location_stats))
        .route("/locations/compare", get(location_comparison))
        .route("/insights", get(insights))
        .route("/reload", post(reload));

    Router::new().nest("/api", api).with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let data = state.data.read().await;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "cph-bikes-dashboard",
        "dataset": data.as_ref().map(|d| d.label.clone()),
        "path": data.as_ref().map(|d| d.path.display().to_string()),
        "records": data.as_ref().map(|d| d.analyzer.len()).unwrap_or(0),
        "cache": state.cache.stats(),
    }))
}

async fn overview(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let value = state.query("overview", "", |a| Ok(a.overview())).await?;
    Ok(Json(value))
}

async fn months(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let value = state
        .query("months", "", |a| Ok(a.available_months()))
        .await?;
    Ok(Json(value))
}

async fn month_analysis(
    State(state): State<Arc<AppState>>,
    path: PathParams<(i32, u32)>,
) -> Result<impl IntoResponse> {
    let Path((year, month)) = path?;
    let params = format!("{}-{:02}", year, month);
    let value = state
        .query("month_analysis", &params, |a| a.month_analysis(year, month))
        .await?;
    Ok(Json(value))
}

async fn monthly(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let value = state
        .query("monthly", "", |a| Ok(a.monthly_summary()))
        .await?;
    Ok(Json(value))
}

async fn seasons(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let value = state
        .query("seasons", "", |a| Ok(a.seasonal_summary()))
        .await?;
    Ok(Json(value))
}

async fn weather(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let value = state
        .query("weather", "", |a| Ok(a.weather_summary()))
        .await?;
    Ok(Json(value))
}

#[derive(Debug, Deserialize)]
struct BinsParams {
    bins: Option<usize>,
}

async fn temperature_bins(
    State(state): State<Arc<AppState>>,
    query: QueryParams<BinsParams>,
) -> Result<impl IntoResponse> {
    let Query(params) = query?;
    let bins = params.bins.unwrap_or(DEFAULT_TEMPERATURE_BINS);
    let value = state
        .query("temperature_bins", &bins.to_string(), |a| a.temperature_bins(bins))
        .await?;
    Ok(Json(value))
}

async fn precipitation_bins(
    State(state): State<Arc<AppState>>,
    query: QueryParams<BinsParams>,
) -> Result<impl IntoResponse> {
    let Query(params) = query?;
    let bins = params.bins.unwrap_or(DEFAULT_PRECIPITATION_BINS);
    let value = state
        .query("precipitation_bins", &bins.to_string(), |a| a.precipitation_bins(bins))
        .await?;
    Ok(Json(value))
}

#[derive(Debug, Deserialize)]
struct LimitParams {
    limit: Option<usize>,
}

async fn top_locations(
    State(state): State<Arc<AppState>>,
    query: QueryParams<LimitParams>,
) -> Result<impl IntoResponse> {
    let Query(params) = query?;
    let limit = params.limit.unwrap_or(DEFAULT_TOP_LOCATIONS);
    let value = state
        .query("top_locations", &limit.to_string(), |a| Ok(a.top_locations(limit)))
        .await?;
    Ok(Json(value))
}

async fn location_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let value = state
        .query("location_stats", "", |a| Ok(a.location_stats()))
        .await?;
    Ok(Json(value))
}

#[derive(Debug, Deserialize)]
struct CompareParams {
    names: Option<String>,
}

async fn location_comparison(
    State(state): State<Arc<AppState>>,
    query: QueryParams<CompareParams>,
) -> Result<impl IntoResponse> {
    let Query(params) = query?;
    let names: Vec<String> = params
        .names
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();
    let value = state
        .query("location_comparison", &names.join(","), |a| {
            a.location_comparison(&names)
        })
        .await?;
    Ok(Json(value))
}

async fn insights(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let value = state
        .query("insights", "", |a| {
            let insights = a.insights()?;
            Ok(json!({ "lines": insights.lines(), "insights": insights }))
        })
        .await?;
    Ok(Json(value))
}

async fn reload(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    Ok(Json(state.reload().await?))
}

/// Start the dashboard API and serve until Ctrl-C
pub async fn serve(curated_dir: PathBuf, bind: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .map_err(|e| PipelineError::Config(format!("Invalid bind address: {}", e)))?;

    info!(dir = %curated_dir.display(), "loading dashboard data");
    let dir = curated_dir.clone();
    let state = Arc::new(tokio::task::spawn_blocking(move || AppState::load(dir)).await?);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "dashboard API listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("dashboard shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down gracefully");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DailyCount, EnrichedRecord};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn records() -> Vec<EnrichedRecord> {
        let day = |d| NaiveDate::from_ymd_opt(2014, 6, d).unwrap();
        vec![
            EnrichedRecord::from_daily(&DailyCount::new(day(1), "Nørrebrogade", 500), 22.0, 0.0, 4.0),
            EnrichedRecord::from_daily(&DailyCount::new(day(1), "Jagtvej", 300), 22.0, 0.0, 4.0),
            EnrichedRecord::from_daily(&DailyCount::new(day(2), "Jagtvej", 320), 14.0, 7.0, 4.0),
        ]
    }

    fn router() -> Router {
        let loaded = LoadedDataset {
            path: PathBuf::from("test.csv"),
            label: "Test Data".to_string(),
            records: records(),
        };
        build_router(Arc::new(AppState::with_dataset("unused", loaded)))
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_and_overview() {
        let (status, body) = get_json(router(), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dataset"], "Test Data");
        assert_eq!(body["records"], 3);

        let (status, body) = get_json(router(), "/api/overview").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_rides"], 1120);
        assert_eq!(body["unique_locations"], 2);
    }

    #[tokio::test]
    async fn test_month_routes() {
        let (status, body) = get_json(router(), "/api/months/2014/6").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["top_location"], "Jagtvej");
        assert_eq!(body["days"], 2);

        let (status, body) = get_json(router(), "/api/months/2013/6").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("2013-06"));

        let (status, _) = get_json(router(), "/api/months/2014/13").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_parameters_return_json_errors() {
        let (status, body) = get_json(router(), "/api/months/2014/june").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("path"));

        let (status, body) = get_json(router(), "/api/locations/top?limit=many").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("query"));

        let (status, body) = get_json(router(), "/api/weather/temperature?bins=-1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_query_parameters() {
        let (_, body) = get_json(router(), "/api/locations/top?limit=1").await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["counter_key"], "Jagtvej");

        let (_, body) = get_json(router(), "/api/weather/temperature?bins=2").await;
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, _) = get_json(router(), "/api/weather/precipitation?bins=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            get_json(router(), "/api/locations/compare?names=Jagtvej,N%C3%B8rrebrogade").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["points"].as_array().unwrap().len(), 2);

        let (status, _) = get_json(router(), "/api/locations/compare?names=Nowhere").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cache_is_used_and_cleared_on_reload() {
        let dir = TempDir::new().unwrap();
        let loaded = LoadedDataset {
            path: PathBuf::from("test.csv"),
            label: "Test Data".to_string(),
            records: records(),
        };
        let state = Arc::new(AppState::with_dataset(dir.path(), loaded));

        let (_, body) = get_json(build_router(state.clone()), "/api/overview").await;
        assert_eq!(body["total_records"], 3);
        get_json(build_router(state.clone()), "/api/insights").await;
        let (_, body) = get_json(build_router(state.clone()), "/api/insights").await;
        assert_eq!(body["insights"]["busiest_location"], "Jagtvej");
        assert_eq!(state.cache.stats().hits, 1);

        // Nothing to reload from an empty directory
        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/reload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        crate::writers::CsvWriter::new()
            .write_enriched(&records()[..1], &dir.path().join("real_copenhagen_data_with_weather_fixed.csv"))
            .unwrap();
        state.reload().await.unwrap();
        assert_eq!(state.cache.stats().entries, 0);
        let (_, body) = get_json(build_router(state), "/api/overview").await;
        assert_eq!(body["total_records"], 1);
    }

    #[tokio::test]
    async fn test_no_data_is_not_found() {
        let dir = TempDir::new().unwrap();
        let router = build_router(Arc::new(AppState::load(dir.path())));
        let (status, body) = get_json(router, "/api/overview").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("No data yet"));
    }
}
