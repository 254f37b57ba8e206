use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use factsheet_core::aggregate::{AggregatedPeriod, PeriodOptions, ViewMode};
use factsheet_core::bundle::ModelBundle;
use factsheet_core::domain::{Dataset, Recommendation};
use factsheet_core::ingest::{Catalog, Lookup};
use factsheet_core::predict::FeatureRow;
use factsheet_core::summary::{SummaryTable, DEFAULT_RECENT_ROWS};
use factsheet_core::Error;

const DEFAULT_PORT: u16 = 8050;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = factsheet_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    // A configured but unreadable bundle is fatal; no bundle at all only disables predictions.
    let bundle = match settings.model_bundle_path.as_deref() {
        Some(path) => match ModelBundle::load(path) {
            Ok(bundle) => Some(Arc::new(bundle)),
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "model bundle load failed");
                return Err(err);
            }
        },
        None => {
            tracing::warn!("MODEL_BUNDLE_PATH missing; starting API without recommendations");
            None
        }
    };

    let state = AppState {
        catalog: Catalog::new(settings.data_dir.clone()),
        bundle,
    };
    tracing::info!(data_dir = %state.catalog.root().display(), "serving company datasets");

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/companies", get(list_companies))
        .route("/companies/:company/periods", get(get_periods))
        .route("/companies/:company/aggregate", get(get_aggregate))
        .route("/companies/:company/summary", get(get_summary))
        .route("/companies/:company/recommendation", get(get_company_recommendation))
        .route("/recommendation", post(post_recommendation))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    catalog: Catalog,
    bundle: Option<Arc<ModelBundle>>,
}

#[derive(Debug, Deserialize)]
struct PeriodsQuery {
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AggregateQuery {
    mode: Option<String>,
    period: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    rows: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ApiAggregation {
    company: String,
    mode: ViewMode,
    period: String,
    rows: Vec<AggregatedPeriod>,
}

#[derive(Debug, Serialize)]
struct ApiRecommendation {
    company: Option<String>,
    period: Option<String>,
    recommendation: Recommendation,
    bundle_id: Uuid,
    classifier: String,
}

/// A single feature row or a batch; only the first row of a batch is scored.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictBody {
    One(FeatureRow),
    Many(Vec<FeatureRow>),
}

impl PredictBody {
    fn into_rows(self) -> Vec<FeatureRow> {
        match self {
            PredictBody::One(row) => vec![row],
            PredictBody::Many(rows) => rows,
        }
    }
}

async fn list_companies(State(state): State<AppState>) -> Result<Json<Vec<String>>, StatusCode> {
    let companies = state.catalog.companies().map_err(|e| internal(e.into()))?;
    Ok(Json(companies))
}

async fn get_periods(
    State(state): State<AppState>,
    Path(company): Path<String>,
    Query(query): Query<PeriodsQuery>,
) -> Result<Json<PeriodOptions>, StatusCode> {
    let mode = parse_mode(query.mode.as_deref())?;
    let dataset = load_company(&state, &company).await?;
    Ok(Json(factsheet_core::aggregate::period_options(&dataset, mode)))
}

async fn get_aggregate(
    State(state): State<AppState>,
    Path(company): Path<String>,
    Query(query): Query<AggregateQuery>,
) -> Result<Json<ApiAggregation>, StatusCode> {
    let mode = parse_mode(query.mode.as_deref())?;
    let dataset = load_company(&state, &company).await?;

    let period = match query.period {
        Some(p) => p,
        None => factsheet_core::aggregate::period_options(&dataset, mode).default,
    };
    let rows = factsheet_core::aggregate::aggregate_dataset(&dataset, mode, &period);

    Ok(Json(ApiAggregation {
        company,
        mode,
        period,
        rows,
    }))
}

async fn get_summary(
    State(state): State<AppState>,
    Path(company): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryTable>, StatusCode> {
    let dataset = load_company(&state, &company).await?;
    let n = query.rows.unwrap_or(DEFAULT_RECENT_ROWS);
    Ok(Json(factsheet_core::summary::recent_table(&dataset, n)))
}

async fn get_company_recommendation(
    State(state): State<AppState>,
    Path(company): Path<String>,
) -> Result<Json<ApiRecommendation>, StatusCode> {
    let Some(bundle) = state.bundle.clone() else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let dataset = load_company(&state, &company).await?;
    let latest = dataset.latest().ok_or(StatusCode::NOT_FOUND)?;

    let recommendation =
        factsheet_core::predict::predict(&bundle, &FeatureRow::from_dataset_record(&dataset, latest))
            .map_err(prediction_status)?;

    Ok(Json(ApiRecommendation {
        company: Some(company),
        period: Some(latest.period_label()),
        recommendation,
        bundle_id: bundle.metadata.id,
        classifier: bundle.metadata.selected.clone(),
    }))
}

async fn post_recommendation(
    State(state): State<AppState>,
    Json(body): Json<PredictBody>,
) -> Result<Json<ApiRecommendation>, StatusCode> {
    let Some(bundle) = state.bundle.clone() else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let rows = body.into_rows();
    let recommendation = factsheet_core::predict::predict_first(&bundle, &rows).map_err(prediction_status)?;

    Ok(Json(ApiRecommendation {
        company: None,
        period: None,
        recommendation,
        bundle_id: bundle.metadata.id,
        classifier: bundle.metadata.selected.clone(),
    }))
}

fn parse_mode(mode: Option<&str>) -> Result<ViewMode, StatusCode> {
    match mode {
        None => Ok(ViewMode::Ytd),
        Some(m) => m.parse().map_err(|_| StatusCode::BAD_REQUEST),
    }
}

/// Reads the company's dataset from disk for this request only.
async fn load_company(state: &AppState, company: &str) -> Result<Dataset, StatusCode> {
    let path = match state.catalog.lookup(company) {
        Lookup::Found(path) => path,
        Lookup::NotFound => return Err(StatusCode::NOT_FOUND),
        Lookup::InvalidName => return Err(StatusCode::BAD_REQUEST),
    };

    let catalog = state.catalog.clone();
    let loaded = tokio::task::spawn_blocking(move || catalog.load(&path))
        .await
        .map_err(|e| internal(e.into()))?;

    loaded.map_err(|e| {
        let status = dataset_status(&e);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return internal(e.into());
        }
        tracing::warn!(%company, error = %e, "dataset rejected");
        status
    })
}

fn dataset_status(err: &Error) -> StatusCode {
    match err {
        Error::InvalidRecord { .. } | Error::Csv(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn prediction_status(err: Error) -> StatusCode {
    match err {
        Error::MissingFeature(_) => StatusCode::UNPROCESSABLE_ENTITY,
        other => internal(other.into()),
    }
}

fn internal(err: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %err, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &factsheet_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACME: &str = "Year,Month,Revenue,Net Income,EBITDA,Cost\n\
        2023,January,100,10,50,50\n\
        2023,February,200,20,80,120\n\
        2024,January,300,40,90,210\n";

    fn state_with(files: &[(&str, &str)]) -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in files {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        let state = AppState {
            catalog: Catalog::new(dir.path()),
            bundle: None,
        };
        (dir, state)
    }

    #[tokio::test]
    async fn lists_companies() {
        let (_dir, state) = state_with(&[("Beta.csv", ACME), ("Acme.csv", ACME), ("notes.txt", "x")]);
        let Json(companies) = list_companies(State(state)).await.unwrap();
        assert_eq!(companies, vec!["Acme", "Beta"]);
    }

    #[tokio::test]
    async fn aggregates_with_default_period() {
        let (_dir, state) = state_with(&[("Acme.csv", ACME)]);
        let query = AggregateQuery {
            mode: Some("monthly".to_string()),
            period: None,
        };
        let Json(out) = get_aggregate(State(state), Path("Acme".to_string()), Query(query))
            .await
            .unwrap();

        assert_eq!(out.period, "2024");
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].revenue, 300.0);
    }

    #[tokio::test]
    async fn ytd_aggregation_over_http_handler() {
        let (_dir, state) = state_with(&[("Acme.csv", ACME)]);
        let query = AggregateQuery {
            mode: None,
            period: Some("February".to_string()),
        };
        let Json(out) = get_aggregate(State(state), Path("Acme".to_string()), Query(query))
            .await
            .unwrap();

        let first = &out.rows[0];
        assert_eq!((first.label.as_str(), first.revenue, first.ebitda, first.cost), ("2023", 300.0, 130.0, 170.0));
    }

    #[tokio::test]
    async fn unknown_and_invalid_companies() {
        let (_dir, state) = state_with(&[("Acme.csv", ACME)]);
        let query = || SummaryQuery { rows: None };

        let missing = get_summary(State(state.clone()), Path("Nope".to_string()), Query(query())).await;
        assert_eq!(missing.unwrap_err(), StatusCode::NOT_FOUND);

        let invalid = get_summary(State(state), Path("../Acme".to_string()), Query(query())).await;
        assert_eq!(invalid.unwrap_err(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_dataset_is_unprocessable() {
        let (_dir, state) = state_with(&[("Bad.csv", "Year,Month,Revenue\n2023,Smarch,1\n")]);
        let res = get_periods(State(state), Path("Bad".to_string()), Query(PeriodsQuery { mode: None })).await;
        assert_eq!(res.unwrap_err(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn invalid_mode_is_bad_request() {
        let (_dir, state) = state_with(&[("Acme.csv", ACME)]);
        let query = PeriodsQuery {
            mode: Some("weekly".to_string()),
        };
        let res = get_periods(State(state), Path("Acme".to_string()), Query(query)).await;
        assert_eq!(res.unwrap_err(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn recommendations_need_a_bundle() {
        let (_dir, state) = state_with(&[("Acme.csv", ACME)]);
        let res = get_company_recommendation(State(state.clone()), Path("Acme".to_string())).await;
        assert_eq!(res.unwrap_err(), StatusCode::SERVICE_UNAVAILABLE);

        let body = PredictBody::One(FeatureRow::new(1.0, 1.0, 1.0));
        let res = post_recommendation(State(state), Json(body)).await;
        assert_eq!(res.unwrap_err(), StatusCode::SERVICE_UNAVAILABLE);
    }

    fn trained_bundle() -> Arc<ModelBundle> {
        let mut csv = String::from("Year,Month,Revenue,Net Income,EBITDA,Cost\n");
        for i in 0..60 {
            let revenue = 900.0 + (i % 7) as f64 * 25.0;
            let ebitda = revenue * (-0.1 + 0.6 * i as f64 / 60.0);
            let month = factsheet_core::domain::Month::ALL[i % 12];
            csv.push_str(&format!(
                "{},{month},{revenue},{},{ebitda},{}\n",
                2000 + i / 12,
                ebitda * 0.4,
                revenue - ebitda
            ));
        }
        let dataset = factsheet_core::ingest::read_csv("Training", csv.as_bytes()).unwrap();
        let config = factsheet_core::train::TrainingConfig::default();
        Arc::new(factsheet_core::train::train(&dataset, &config).unwrap())
    }

    #[tokio::test]
    async fn company_without_a_feature_column_is_unprocessable() {
        let lean = "Year,Month,Revenue,EBITDA,Cost\n2024,March,1000,350,650\n";
        let (_dir, mut state) = state_with(&[("Lean.csv", lean), ("Acme.csv", ACME)]);
        state.bundle = Some(trained_bundle());

        let res = get_company_recommendation(State(state.clone()), Path("Lean".to_string())).await;
        assert_eq!(res.unwrap_err(), StatusCode::UNPROCESSABLE_ENTITY);

        let Json(ok) = get_company_recommendation(State(state), Path("Acme".to_string()))
            .await
            .unwrap();
        assert_eq!(ok.period.as_deref(), Some("January 2024"));
    }

    #[test]
    fn predict_body_accepts_row_or_batch() {
        let one: PredictBody =
            serde_json::from_value(serde_json::json!({"Revenue": 1000, "Net Income": 150, "EBITDA": 350})).unwrap();
        assert_eq!(one.into_rows(), vec![FeatureRow::new(1000.0, 150.0, 350.0)]);

        let many: PredictBody = serde_json::from_value(serde_json::json!([
            {"revenue": 1.0, "net_income": 2.0, "ebitda": 3.0},
            {"revenue": 4.0}
        ]))
        .unwrap();
        assert_eq!(many.into_rows().len(), 2);
    }

    #[test]
    fn missing_feature_maps_to_422() {
        assert_eq!(
            prediction_status(Error::MissingFeature("EBITDA")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
