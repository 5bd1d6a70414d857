//! Application startup and lifecycle management.

use crate::config::{GatewayConfig, ProviderKind};
use crate::handlers;
use crate::services::providers::gemini::{GeminiConfig, GeminiModel};
use crate::services::providers::mock::{MockModel, MockReply};
use crate::services::providers::GenerativeModel;
use crate::services::{Generator, UploadReceiver};
use axum::extract::{DefaultBodyLimit, Request};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Room for the prompt field and multipart framing on top of the file cap.
const FORM_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub generator: Generator,
    pub uploads: UploadReceiver,
}

/// Build the model selected by configuration.
pub fn build_model(config: &GatewayConfig) -> Result<Arc<dyn GenerativeModel>, AppError> {
    match config.model.provider {
        ProviderKind::Gemini => {
            let model = GeminiModel::new(GeminiConfig {
                api_key: config.model.api_key.clone(),
                api_base: config.model.api_base.clone(),
                text_model: config.model.text_model.clone(),
                vision_model: config.model.vision_model.clone(),
            })
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

            tracing::info!(
                text_model = %config.model.text_model,
                vision_model = %config.model.vision_model,
                "Initialized Gemini model"
            );
            Ok(Arc::new(model))
        }
        ProviderKind::Mock => {
            tracing::warn!("Using mock model; responses echo the prompt");
            Ok(Arc::new(MockModel::new(MockReply::Echo)))
        }
    }
}

pub fn router(state: AppState) -> Router {
    let media_limit = DefaultBodyLimit::max(
        usize::try_from(state.uploads.max_bytes().saturating_add(FORM_OVERHEAD_BYTES))
            .unwrap_or(usize::MAX),
    );

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/generate-text", post(handlers::generate_text))
        .route(
            "/generate-from-image",
            post(handlers::generate_from_image).layer(media_limit.clone()),
        )
        .route(
            "/generate-from-document",
            post(handlers::generate_from_document).layer(media_limit.clone()),
        )
        .route(
            "/generate-from-audio",
            post(handlers::generate_from_audio).layer(media_limit),
        )
        .layer(middleware::from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request| {
                let request_id = req
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                tracing::info_span!(
                    "http_request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the model selected by configuration.
    pub async fn build(config: GatewayConfig) -> Result<Self, AppError> {
        let model = build_model(&config)?;
        Self::build_with_model(config, model).await
    }

    /// Build the application around an already constructed model.
    pub async fn build_with_model(
        config: GatewayConfig,
        model: Arc<dyn GenerativeModel>,
    ) -> Result<Self, AppError> {
        let uploads = UploadReceiver::new(&config.uploads.dir, config.uploads.max_bytes);
        uploads.ensure_dir().await.map_err(|e| {
            tracing::error!(
                "Failed to create upload directory {}: {}",
                config.uploads.dir,
                e
            );
            e
        })?;

        let state = AppState {
            generator: Generator::new(model, config.request_timeout()),
            uploads,
            config: config.clone(),
        };

        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("GenAI gateway listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
