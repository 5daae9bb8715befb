//! API server: HTTP REST endpoints plus the Prometheus exporter.

use crate::rest::{self, AppState};
use crate::{dashboard_rest, mining_rest, transactions_rest};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use basket_core::config::AppConfig;
use basket_core::TransactionStore;
use std::net::SocketAddr;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct ApiServer {
    config: AppConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: AppConfig, store: TransactionStore) -> Self {
        let state = AppState::new(&config, store);
        Self { config, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = router(self.state.clone(), self.config.api.max_body_bytes);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics exporter on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        if !self.config.metrics.enabled {
            info!("Metrics exporter disabled");
            return Ok(());
        }

        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        // Mining
        .route("/v1/itemsets", get(mining_rest::handle_itemsets))
        .route("/v1/rules", get(mining_rest::handle_rules))
        .route("/v1/recommendations", post(mining_rest::handle_recommendations))
        // Reporting
        .route("/v1/dashboard", get(dashboard_rest::handle_dashboard))
        .route("/v1/dashboard/intraday", get(dashboard_rest::handle_intraday))
        // Data
        .route("/v1/transactions", put(transactions_rest::handle_replace_transactions))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        // Middleware
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
