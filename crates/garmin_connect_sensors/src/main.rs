use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use garmin_connect_client::GarminClient;
use garmin_connect_client::config::Config;
use garmin_connect_client::http_client::ReqwestGarminClient;
use garmin_connect_sensors::SensorHub;
use garmin_connect_sensors::middleware::LoggingMiddleware;
use garmin_connect_sensors::options::IntegrationOptions;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Log filter from `GARMIN_CONNECT_LOG_LEVEL`, falling back to `RUST_LOG`, default `info`.
    let log_env = std::env::var("GARMIN_CONNECT_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(format!("{log_env},hyper=warn,reqwest=warn"))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,hyper=warn,reqwest=warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!(%log_env, "garmin_connect_sensors: log filter");

    let metrics = PrometheusBuilder::new().install_recorder()?;

    let config = Config::from_env().context("reading Garmin Connect credentials")?;
    let options = IntegrationOptions::from_env().context("reading integration options")?;

    let client = ReqwestGarminClient::from_config(&config).context("building Garmin Connect client")?;
    let client: Arc<dyn GarminClient> = Arc::new(LoggingMiddleware::new(client));
    let hub = SensorHub::new(client, &options, config.timeout, config.mfa_code.clone())?;
    let tasks = hub.start();

    let app = garmin_connect_sensors::http::router(
        hub.app_state(metrics),
        config.timeout + Duration::from_secs(5),
    );

    let addr: SocketAddr = std::env::var("GARMIN_CONNECT_LISTEN_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8787)));
    info!(%addr, "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!("failed to listen for ctrl+c: {e}");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
        })
        .await
        .context("HTTP server")?;

    hub.shutdown();
    for task in tasks {
        task.abort();
    }
    Ok(())
}
