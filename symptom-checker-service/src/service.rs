use axum::{
    Router,
    extract::{Path, Query, Request, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    middleware::{Next, from_fn},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;
use wizard_flow::{
    AnalysisError, AnalysisRequest, AnalysisRequester, AnalysisResponse, InMemoryWizardStorage,
    Report, WizardConfig, WizardController, WizardError, WizardSession, WizardStorage,
    WizardUpdate, render_report,
};

use crate::{
    analyzer::LlmAnalyzer,
    config::ServiceConfig,
    models::{
        AddSymptomRequest, CatalogResponse, CreateWizardQuery, ReportQuery, SessionResponse,
        SymptomDetailRequest, TransitionResponse,
    },
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

pub const ANALYSIS_FAILED: &str = "Failed to analyze symptoms";

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn conflict_error(message: &str) -> ApiError {
    (StatusCode::CONFLICT, Json(json!({ "error": message })))
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn wizard_error(e: WizardError) -> ApiError {
    match e {
        WizardError::SubmissionInProgress => {
            conflict_error("An analysis request is already in progress")
        }
        WizardError::InvalidAnswer { field, reason } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Invalid answer",
                "field": field,
                "details": reason
            })),
        ),
        WizardError::SessionNotFound(id) => not_found_error("Session not found", &id),
        WizardError::Analysis(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": ANALYSIS_FAILED,
                "details": e.to_string()
            })),
        ),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn WizardStorage>,
    pub analyzer: Arc<dyn AnalysisRequester>,
    pub wizard_config: WizardConfig,
}

impl AppState {
    pub fn new(analyzer: Arc<dyn AnalysisRequester>, wizard_config: WizardConfig) -> Self {
        Self {
            storage: Arc::new(InMemoryWizardStorage::new()),
            analyzer,
            wizard_config,
        }
    }
}

/// Upper bound between two session sweeps
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Must be called from within a tokio runtime; starts the session sweeper
pub fn create_app(config: &ServiceConfig) -> Router {
    let analyzer = Arc::new(LlmAnalyzer::new(config));
    let wizard_config = WizardConfig {
        variant: config.variant,
        analysis_timeout: config.analysis_timeout,
    };
    let app_state = AppState::new(analyzer, wizard_config);
    spawn_session_sweeper(app_state.storage.clone(), config.session_ttl);
    build_router(app_state)
}

/// Periodically drop sessions created more than `ttl` ago
pub fn spawn_session_sweeper(storage: Arc<dyn WizardStorage>, ttl: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ttl.min(SWEEP_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let cutoff = chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|max_age| Utc::now().checked_sub_signed(max_age));
            let Some(cutoff) = cutoff else {
                continue;
            };
            match storage.evict_created_before(cutoff).await {
                Ok(0) => debug!("No expired wizard sessions"),
                Ok(evicted) => info!(evicted, "Expired wizard sessions evicted"),
                Err(e) => error!(error = %e, "Session sweep failed"),
            }
        }
    })
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/catalog", get(get_catalog))
        .route("/api/results", post(analyze_symptoms))
        .route("/wizard", post(create_wizard))
        .route(
            "/wizard/{session_id}",
            get(get_wizard).patch(update_wizard).delete(delete_wizard),
        )
        .route("/wizard/{session_id}/symptoms", post(add_symptom))
        .route(
            "/wizard/{session_id}/symptoms/{symptom}",
            axum::routing::delete(remove_symptom),
        )
        .route("/wizard/{session_id}/symptom-details", put(set_symptom_detail))
        .route("/wizard/{session_id}/advance", post(advance_wizard))
        .route("/wizard/{session_id}/back", post(back_wizard))
        .route("/wizard/{session_id}/restart", post(restart_wizard))
        .route("/wizard/{session_id}/report", get(get_report))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Tag every request with a correlation ID and run it inside a span carrying it
async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Symptom Checker Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Multi-step symptom assessment with AI-generated care recommendations",
        "endpoints": {
            "GET /catalog": "Symptoms, specialists, care types and detail forms",
            "POST /api/results": "Analyze collected answers",
            "POST /wizard": "Start a wizard session",
            "GET /wizard/{session_id}": "Current wizard state",
            "PATCH /wizard/{session_id}": "Merge answers",
            "POST /wizard/{session_id}/symptoms": "Add a symptom",
            "DELETE /wizard/{session_id}/symptoms/{symptom}": "Remove a symptom",
            "PUT /wizard/{session_id}/symptom-details": "Answer a symptom detail question",
            "POST /wizard/{session_id}/advance": "Next step (submits on the care step)",
            "POST /wizard/{session_id}/back": "Previous step",
            "POST /wizard/{session_id}/restart": "Start over",
            "GET /wizard/{session_id}/report": "Rendered results (?format=markdown)",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn get_catalog() -> Json<CatalogResponse> {
    Json(CatalogResponse::build())
}

fn analysis_failure(status: StatusCode, message: &str) -> Response {
    (status, Json(AnalysisResponse::failure(message))).into_response()
}

async fn analyze_symptoms(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected analysis request body");
            return analysis_failure(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    info!(
        symptoms = request.symptoms.len(),
        care_type = ?request.care_type,
        "Analyzing symptoms"
    );

    let timeout = state.wizard_config.analysis_timeout;
    let outcome = tokio::time::timeout(timeout, state.analyzer.request(request))
        .await
        .unwrap_or(Err(AnalysisError::Timeout(timeout)));

    match outcome {
        Ok(analysis) => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, "no-store, must-revalidate")],
            Json(AnalysisResponse::success(analysis)),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Symptom analysis error");
            analysis_failure(StatusCode::INTERNAL_SERVER_ERROR, ANALYSIS_FAILED)
        }
    }
}

async fn load_session(state: &AppState, session_id: &str) -> Result<WizardSession, ApiError> {
    match state.storage.get(session_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(wizard_error(WizardError::SessionNotFound(session_id.to_string()))),
        Err(e) => {
            error!("Failed to load session {}: {}", session_id, e);
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}

fn session_response(session: &WizardSession) -> SessionResponse {
    SessionResponse {
        session_id: session.id.clone(),
        view: session.controller.view(),
    }
}

async fn create_wizard(
    State(state): State<AppState>,
    Query(query): Query<CreateWizardQuery>,
) -> ApiResult<SessionResponse> {
    let mut config = state.wizard_config.clone();
    if let Some(variant) = query.variant {
        config.variant = variant;
    }

    let session_id = Uuid::new_v4().to_string();
    let controller = WizardController::new(config, state.analyzer.clone());
    let session = WizardSession::new(session_id.clone(), controller);

    state.storage.save(session.clone()).await.map_err(|e| {
        error!("Failed to create session: {}", e);
        internal_error("Failed to create wizard session", &e.to_string())
    })?;

    info!(
        session_id = %session_id,
        variant = %session.controller.variant(),
        "Wizard session created"
    );
    Ok(Json(session_response(&session)))
}

async fn get_wizard(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let session = load_session(&state, &session_id).await?;
    Ok(Json(session_response(&session)))
}

async fn update_wizard(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(update): Json<WizardUpdate>,
) -> ApiResult<SessionResponse> {
    let session = load_session(&state, &session_id).await?;
    session.controller.update(update).map_err(wizard_error)?;
    Ok(Json(session_response(&session)))
}

async fn delete_wizard(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.storage.delete(&session_id).await {
        Ok(true) => {
            info!(session_id = %session_id, "Wizard session discarded");
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err(wizard_error(WizardError::SessionNotFound(session_id))),
        Err(e) => Err(internal_error("Failed to delete session", &e.to_string())),
    }
}

async fn add_symptom(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<AddSymptomRequest>,
) -> ApiResult<SessionResponse> {
    if request.symptom.trim().is_empty() {
        return Err(bad_request_error("Symptom is required"));
    }
    let session = load_session(&state, &session_id).await?;
    session
        .controller
        .add_symptom(&request.symptom)
        .map_err(wizard_error)?;
    Ok(Json(session_response(&session)))
}

async fn remove_symptom(
    State(state): State<AppState>,
    Path((session_id, symptom)): Path<(String, String)>,
) -> ApiResult<SessionResponse> {
    let session = load_session(&state, &session_id).await?;
    session
        .controller
        .remove_symptom(&symptom)
        .map_err(wizard_error)?;
    Ok(Json(session_response(&session)))
}

async fn set_symptom_detail(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SymptomDetailRequest>,
) -> ApiResult<SessionResponse> {
    let session = load_session(&state, &session_id).await?;
    session
        .controller
        .set_symptom_detail(&request.symptom, &request.key, request.value)
        .map_err(wizard_error)?;
    Ok(Json(session_response(&session)))
}

async fn advance_wizard(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<TransitionResponse> {
    let session = load_session(&state, &session_id).await?;
    let transition = session.controller.advance().await.map_err(|e| {
        warn!(session_id = %session_id, error = %e, "Advance failed");
        wizard_error(e)
    })?;

    info!(session_id = %session_id, transition = ?transition, "Advance handled");
    Ok(Json(TransitionResponse {
        session_id,
        transition,
        view: session.controller.view(),
    }))
}

async fn back_wizard(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<TransitionResponse> {
    let session = load_session(&state, &session_id).await?;
    let transition = session.controller.back().map_err(wizard_error)?;
    Ok(Json(TransitionResponse {
        session_id,
        transition,
        view: session.controller.view(),
    }))
}

async fn restart_wizard(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let session = load_session(&state, &session_id).await?;
    session.controller.restart();
    Ok(Json(session_response(&session)))
}

async fn get_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let session = load_session(&state, &session_id).await?;
    let results = session
        .controller
        .state()
        .results
        .ok_or_else(|| not_found_error("No results yet for this session", &session_id))?;

    let report: Report = render_report(&results);
    if query.format.as_deref() == Some("markdown") {
        return Ok((
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            report.markdown,
        )
            .into_response());
    }
    Ok(Json(report).into_response())
}
