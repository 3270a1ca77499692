//! API server — HTTP routes for the bandit engines plus the metrics exporter.

use crate::rest::{self, AppState};
use axum::routing::{get, post};
use axum::Router;
use bandit_core::config::AppConfig;
use bandit_rl_engine::CampaignBandits;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the REST router over shared bandit state.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Unversioned routes on the default campaign
        .route("/update_bandit", post(rest::submit_default_observations))
        .route(
            "/pull_lever",
            get(rest::request_default_selection).post(rest::request_default_selection),
        )
        .route(
            "/dump_beta_matrix_parameters",
            get(rest::dump_default_parameters).post(rest::dump_default_parameters),
        )
        .route("/reset", post(rest::reset_default))
        // Per-campaign routes
        .route("/v1/campaigns", get(rest::list_campaigns))
        .route(
            "/v1/campaigns/:campaign_id/observations",
            post(rest::submit_observations),
        )
        .route(
            "/v1/campaigns/:campaign_id/selection",
            get(rest::request_best_selection).post(rest::request_best_selection),
        )
        .route(
            "/v1/campaigns/:campaign_id/parameters",
            get(rest::dump_parameters),
        )
        .route("/v1/campaigns/:campaign_id/reset", post(rest::reset_campaign))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Main API server owning the campaign engines.
pub struct ApiServer {
    config: AppConfig,
    campaigns: Arc<CampaignBandits>,
}

impl ApiServer {
    pub fn new(config: AppConfig, campaigns: Arc<CampaignBandits>) -> Self {
        Self { config, campaigns }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let state = AppState::new(self.config.clone(), self.campaigns.clone());
        let app = router(state);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.metrics.port);
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
