use genai_gateway::config::GatewayConfig;
use genai_gateway::services::init_metrics;
use genai_gateway::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize metrics recorder (must be before any metrics are recorded)
    if let Err(e) = init_metrics() {
        eprintln!("Metrics disabled: {}", e);
    }

    // Span export is opt-in
    let otlp_endpoint = std::env::var("OTLP_ENDPOINT").ok();
    init_tracing("genai-gateway", "info", otlp_endpoint.as_deref());

    let config = GatewayConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    app.run_until_stopped().await
}
