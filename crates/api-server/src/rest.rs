//! REST API handlers for bandit updates, selection, introspection and
//! operational endpoints.

use crate::payload::{SelectionRequest, UpdatePayload};
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use bandit_core::config::AppConfig;
use bandit_core::{BanditError, BatchFailure, ParameterSnapshot, Selection};
use bandit_rl_engine::{BanditEngine, CampaignBandits};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub campaigns: Arc<CampaignBandits>,
    pub config: Arc<AppConfig>,
    pub node_id: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, campaigns: Arc<CampaignBandits>) -> Self {
        Self {
            campaigns,
            node_id: config.node_id.clone(),
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    fn default_campaign(&self) -> String {
        self.config.bandit.default_campaign.clone()
    }
}

/// Failure returned by the bandit endpoints.
#[derive(Debug)]
pub enum ApiError {
    /// Body could not be parsed or breaks a structural limit.
    Payload(String),
    /// Engine rejected the request. `processed` is set for batch updates.
    Bandit {
        error: BanditError,
        processed: Option<usize>,
    },
}

impl From<BanditError> for ApiError {
    fn from(error: BanditError) -> Self {
        ApiError::Bandit {
            error,
            processed: None,
        }
    }
}

impl From<BatchFailure> for ApiError {
    fn from(failure: BatchFailure) -> Self {
        ApiError::Bandit {
            error: failure.error,
            processed: Some(failure.processed),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ApiError::Payload(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "invalid_payload".to_string(),
                    message,
                    processed: None,
                },
            ),
            ApiError::Bandit { error, processed } => {
                let status = match error {
                    BanditError::InvalidItemKey(_) | BanditError::InvalidObservation { .. } => {
                        StatusCode::BAD_REQUEST
                    }
                    BanditError::NoItemsRegistered => StatusCode::NOT_FOUND,
                };
                (
                    status,
                    ErrorResponse {
                        error: error.kind().to_string(),
                        message: error.to_string(),
                        processed,
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

// ─── Observations ───────────────────────────────────────────────────────

/// POST /update_bandit — observations for the default campaign.
pub async fn submit_default_observations(
    State(state): State<AppState>,
    payload: Result<Json<UpdatePayload>, JsonRejection>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let campaign_id = state.default_campaign();
    apply_observations(&state, &campaign_id, payload)
}

/// POST /v1/campaigns/:campaign_id/observations
pub async fn submit_observations(
    State(state): State<AppState>,
    Path(campaign_id): Path<String>,
    payload: Result<Json<UpdatePayload>, JsonRejection>,
) -> Result<Json<UpdateResponse>, ApiError> {
    apply_observations(&state, &campaign_id, payload)
}

fn apply_observations(
    state: &AppState,
    campaign_id: &str,
    payload: Result<Json<UpdatePayload>, JsonRejection>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        metrics::counter!("api.validation_errors").increment(1);
        ApiError::Payload(rejection.body_text())
    })?;

    let entries = payload
        .into_entries(
            state.config.api.max_batch_size,
            state.config.api.max_item_id_len,
        )
        .map_err(|msg| {
            warn!(campaign_id, error = %msg, "Observation payload rejected");
            metrics::counter!("api.validation_errors").increment(1);
            ApiError::Payload(msg)
        })?;

    // Convert up to the first malformed entry; everything before it is applied.
    let mut observations = Vec::with_capacity(entries.len());
    let mut conversion_error = None;
    for entry in &entries {
        match entry.to_observation() {
            Ok(observation) => observations.push(observation),
            Err(e) => {
                conversion_error = Some(e);
                break;
            }
        }
    }

    let outcome = state
        .campaigns
        .submit_batch(campaign_id, &observations)
        .and_then(|processed| match conversion_error {
            Some(error) => Err(BatchFailure { processed, error }),
            None => Ok(processed),
        });

    match outcome {
        Ok(processed) => {
            metrics::counter!("bandit.observations.applied").increment(processed as u64);
            info!(campaign_id, processed, "Observations applied");
            Ok(Json(UpdateResponse {
                processed,
                message: format!("{processed} records appended"),
            }))
        }
        Err(failure) => {
            metrics::counter!("bandit.observations.applied").increment(failure.processed as u64);
            metrics::counter!("bandit.observations.rejected").increment(1);
            warn!(
                campaign_id,
                processed = failure.processed,
                error = %failure.error,
                "Observation batch stopped at invalid entry"
            );
            Err(failure.into())
        }
    }
}

// ─── Selection ──────────────────────────────────────────────────────────

/// GET|POST /pull_lever — Thompson sampling over the default campaign.
pub async fn request_default_selection(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SelectionResponse>, ApiError> {
    let campaign_id = state.default_campaign();
    select(&state, &campaign_id, &body)
}

/// GET|POST /v1/campaigns/:campaign_id/selection
pub async fn request_best_selection(
    State(state): State<AppState>,
    Path(campaign_id): Path<String>,
    body: Bytes,
) -> Result<Json<SelectionResponse>, ApiError> {
    select(&state, &campaign_id, &body)
}

fn select(
    state: &AppState,
    campaign_id: &str,
    body: &[u8],
) -> Result<Json<SelectionResponse>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        SelectionRequest::default()
    } else {
        serde_json::from_slice::<SelectionRequest>(body).map_err(|e| {
            metrics::counter!("api.validation_errors").increment(1);
            ApiError::Payload(format!("invalid selection request: {e}"))
        })?
    };

    let engine = state.campaigns.get(campaign_id);
    let selection = match (&request.items, engine) {
        (Some(items), Some(engine)) => engine.select_best_among(items.as_slice()),
        // Unknown campaign: candidates are drawn from the prior without creating it.
        (Some(items), None) => BanditEngine::new().select_best_among(items.as_slice()),
        (None, Some(engine)) => engine.select_best(),
        (None, None) => Err(BanditError::NoItemsRegistered),
    }
    .map_err(|e| {
        debug!(campaign_id, error = %e, "Selection failed");
        ApiError::from(e)
    })?;

    metrics::counter!("bandit.selections").increment(1);
    metrics::histogram!("bandit.selection.items").record(selection.probabilities.len() as f64);
    debug!(
        campaign_id,
        selected = %selection.selected_item_id,
        candidates = selection.probabilities.len(),
        "Lever pulled"
    );

    Ok(Json(SelectionResponse {
        item: selection.selected_item_id.clone(),
        selection,
    }))
}

// ─── Introspection & reset ──────────────────────────────────────────────

/// GET /dump_beta_matrix_parameters
pub async fn dump_default_parameters(State(state): State<AppState>) -> Json<ParametersResponse> {
    let campaign_id = state.default_campaign();
    Json(dump(&state, &campaign_id))
}

/// GET /v1/campaigns/:campaign_id/parameters
pub async fn dump_parameters(
    State(state): State<AppState>,
    Path(campaign_id): Path<String>,
) -> Json<ParametersResponse> {
    Json(dump(&state, &campaign_id))
}

fn dump(state: &AppState, campaign_id: &str) -> ParametersResponse {
    ParametersResponse {
        beta_matrix_parameters: state
            .campaigns
            .get(campaign_id)
            .map(|engine| engine.dump_parameters())
            .unwrap_or_default(),
    }
}

/// POST /reset
pub async fn reset_default(State(state): State<AppState>) -> Json<ResetResponse> {
    let campaign_id = state.default_campaign();
    Json(reset(&state, &campaign_id))
}

/// POST /v1/campaigns/:campaign_id/reset
pub async fn reset_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<String>,
) -> Json<ResetResponse> {
    Json(reset(&state, &campaign_id))
}

fn reset(state: &AppState, campaign_id: &str) -> ResetResponse {
    let cleared = state
        .campaigns
        .get(campaign_id)
        .map(|engine| engine.reset())
        .unwrap_or(0);
    info!(campaign_id, cleared, "Bandit state reset");
    ResetResponse {
        message: "bandit state reset".to_string(),
        cleared,
    }
}

/// GET /v1/campaigns
pub async fn list_campaigns(State(state): State<AppState>) -> Json<CampaignsResponse> {
    Json(CampaignsResponse {
        campaigns: state.campaigns.campaign_ids(),
    })
}

// ─── Operational ────────────────────────────────────────────────────────

/// GET /health — Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        campaigns: state.campaigns.len(),
    })
}

/// GET /ready — Readiness probe.
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /live — Liveness probe.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<usize>,
}

#[derive(Serialize)]
pub struct UpdateResponse {
    pub processed: usize,
    pub message: String,
}

#[derive(Serialize)]
pub struct SelectionResponse {
    /// Same as `selected_item_id`; kept for clients of `/pull_lever`.
    pub item: String,
    #[serde(flatten)]
    pub selection: Selection,
}

#[derive(Serialize)]
pub struct ParametersResponse {
    pub beta_matrix_parameters: Vec<ParameterSnapshot>,
}

#[derive(Serialize)]
pub struct ResetResponse {
    pub message: String,
    pub cleared: usize,
}

#[derive(Serialize)]
pub struct CampaignsResponse {
    pub campaigns: Vec<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
    pub campaigns: usize,
}
