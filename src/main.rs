// Main entry point - Dependency injection and session startup
use std::sync::Arc;

use sensor_dashboard::application::dashboard_store::DashboardStore;
use sensor_dashboard::application::session::DashboardSession;
use sensor_dashboard::domain::classifier::Classifier;
use sensor_dashboard::infrastructure::config::{BuildMode, load_dashboard_config};
use sensor_dashboard::infrastructure::mqtt_transport::MqttTransport;
use sensor_dashboard::presentation::console_view::run_console_view;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let mode = BuildMode::detect();
    let config = load_dashboard_config(mode)?;
    tracing::info!(%mode, policy = ?config.classification.policy, "Configuration loaded");

    // Derived state (application layer)
    let registry = config.registry()?;
    let settings = config.session_settings(&registry);
    let store = DashboardStore::new(
        registry,
        Classifier::new(config.classification.policy),
        config.session.history_window,
        config.session.log_capacity,
    );

    // Transport (infrastructure layer)
    let (transport, events) = MqttTransport::connect(&config.mqtt_settings());

    let (session, handle) = DashboardSession::new(Arc::new(transport), events, store, settings);

    // Renderer (presentation layer)
    let view = tokio::spawn(run_console_view(handle.snapshots()));
    let session = tokio::spawn(session.run());

    tokio::signal::ctrl_c().await?;
    handle.shutdown().await;

    let diagnostics = session.await?;
    view.await?;
    tracing::info!(?diagnostics, "Dashboard stopped");

    Ok(())
}
