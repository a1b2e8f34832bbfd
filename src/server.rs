use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use complymap::{
    generate_report, AccessibilityAuditor, AuditRecord, ComplianceEngine, EngineConfig,
    EngineError, EngineTag, HistoryStore, SqliteHistoryStore, SynthesisContext,
};

type ApiError = (StatusCode, Json<Value>);
type ApiResult = Result<Json<Value>, ApiError>;

#[derive(Clone)]
struct AppState {
    engine: Arc<ComplianceEngine<SqliteHistoryStore>>,
    store: SqliteHistoryStore,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AuditRequest {
    #[serde(default)]
    url: String,
    /// Raw markup to audit in place of fetching `url`.
    #[serde(default)]
    html: String,
    /// Label recorded for an inline `html` audit.
    #[serde(default)]
    target: String,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(default = "default_page")]
    page: u64,
    #[serde(default = "default_per_page")]
    per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    10
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = EngineConfig::from_env();
    let store = SqliteHistoryStore::connect(&config.database_url).await?;
    let engine = Arc::new(ComplianceEngine::new(config, store.clone())?);
    let state = AppState {
        engine,
        store,
        http: reqwest::Client::new(),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/audits", post(create_audit))
        .route("/reports/run", post(run_report))
        .route("/reports/preview", post(preview_report))
        .route("/reports/latest", get(latest_report))
        .route("/history", get(list_history))
        .route("/history/:id", get(get_history))
        .with_state(state);

    let bind = std::env::var("COMPLYMAP_BIND").unwrap_or_else(|_| "0.0.0.0:8620".to_string());
    let addr: SocketAddr = bind.parse()?;
    info!("Starting ComplyMap API server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "engine": "complymap",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn create_audit(
    State(state): State<AppState>,
    Json(request): Json<AuditRequest>,
) -> ApiResult {
    let url = request.url.trim();
    let auditor = AccessibilityAuditor::new(state.http.clone());
    let outcome = if !request.html.trim().is_empty() {
        let target = if request.target.trim().is_empty() {
            "inline-document"
        } else {
            request.target.trim()
        };
        auditor.audit_html(target, &request.html)
    } else if url.is_empty() {
        return Err(client_error(
            StatusCode::BAD_REQUEST,
            "either url or html is required",
        ));
    } else {
        auditor.audit_url(url).await.map_err(|err| {
            error!(url = %url, error = %err, "accessibility audit failed");
            client_error(StatusCode::BAD_GATEWAY, &format!("audit failed: {err}"))
        })?
    };

    let payload = serde_json::to_value(&outcome).map_err(|err| {
        error!(error = %err, "failed to encode audit outcome");
        client_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode audit")
    })?;
    let record = AuditRecord::new(
        EngineTag::Accessibility,
        outcome.target.clone(),
        outcome.summary_line(),
        payload,
    );
    let record_id = match state.store.save(&record).await {
        Ok(id) => Some(id),
        Err(err) => {
            warn!(error = %err, "audit ran but was not persisted");
            None
        }
    };

    Ok(Json(json!({
        "ok": true,
        "data": {
            "record_id": record_id,
            "outcome": outcome,
        }
    })))
}

async fn run_report(State(state): State<AppState>) -> ApiResult {
    match state.engine.run_full_report().await {
        Ok(bundle) => Ok(Json(json!({"ok": true, "data": bundle}))),
        Err(err) => {
            error!(error = %err, "report run failed");
            Err(engine_error_response(&err))
        }
    }
}

async fn preview_report(
    State(state): State<AppState>,
    Json(snapshot): Json<Value>,
) -> ApiResult {
    let context = SynthesisContext::from_config(state.engine.config());
    match generate_report(&snapshot, None, None, &context) {
        Ok(report) => Ok(Json(json!({"ok": true, "data": report}))),
        Err(err) => Err(client_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            &err.to_string(),
        )),
    }
}

async fn latest_report(State(state): State<AppState>) -> ApiResult {
    let cached = state.engine.cached_bundle().await;
    if cached.report.is_some() {
        return Ok(Json(json!({"ok": true, "data": cached})));
    }

    // Nothing cached in this process yet; fall back to persisted history.
    match state.store.latest(EngineTag::Soc2).await {
        Ok(Some(record)) => Ok(Json(json!({
            "ok": true,
            "data": {
                "record_id": record.id,
                "generated_at": record.created_at,
                "report": record.payload,
            }
        }))),
        Ok(None) => Err(client_error(StatusCode::NOT_FOUND, "no reports yet")),
        Err(err) => {
            error!(error = %err, "failed to load latest report");
            Err(client_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "history unavailable",
            ))
        }
    }
}

async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult {
    match state.store.list(query.page, query.per_page).await {
        Ok(page) => Ok(Json(json!({"ok": true, "data": page}))),
        Err(err) => {
            error!(error = %err, "failed to list history");
            Err(client_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "history unavailable",
            ))
        }
    }
}

async fn get_history(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    match state.store.get(&id).await {
        Ok(Some(record)) => Ok(Json(json!({"ok": true, "data": record}))),
        Ok(None) => Err(client_error(StatusCode::NOT_FOUND, "record not found")),
        Err(err) => {
            error!(error = %err, record_id = %id, "failed to load record");
            Err(client_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "history unavailable",
            ))
        }
    }
}

fn client_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({"ok": false, "error": message})))
}

fn engine_error_response(err: &EngineError) -> ApiError {
    let status = match err {
        EngineError::MissingCredential => StatusCode::PRECONDITION_FAILED,
        EngineError::EdgeUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::SnapshotNotObject | EngineError::MalformedSnapshot(_) => {
            StatusCode::BAD_GATEWAY
        }
        EngineError::Transport(_)
        | EngineError::AuthRejected(_)
        | EngineError::NotFound(_)
        | EngineError::UpstreamServer(_)
        | EngineError::UnexpectedStatus(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({"ok": false, "error": err.to_string()})))
}
