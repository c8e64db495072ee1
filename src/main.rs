//! Focus Timer - A drift-corrected countdown timer served over HTTP
//!
//! This is the main entry point for the focus-timer application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use focus_timer::{
    api::create_router,
    config::Config,
    state::{AppState, LogSessionSink, SessionTracker},
    tasks::FocusTimer,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("focus_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting focus-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, duration={}s, driver={:?}, poll={}ms",
        config.host, config.port, config.duration, config.driver, config.poll_interval_ms
    );

    let timer = FocusTimer::builder(config.duration)
        .preference(config.driver)
        .capabilities(config.capabilities())
        .options(config.timer_options())
        .build();
    let tracker = Arc::new(SessionTracker::new(config.profile(), Arc::new(LogSessionSink)));

    // Create application state
    let state = Arc::new(AppState::new(timer, tracker, config.port, config.host.clone()));

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /timer/duration - Set duration ({{\"seconds\": n}})");
    info!("  POST /timer/start    - Start the countdown");
    info!("  POST /timer/pause    - Pause the countdown");
    info!("  POST /timer/resume   - Resume a paused countdown");
    info!("  POST /timer/stop     - Stop, keeping the remaining time");
    info!("  POST /timer/reset    - Back to the full duration");
    info!("  POST /timer/refresh  - Resynchronize with the background worker");
    info!("  GET  /timer          - Current snapshot and status");
    info!("  GET  /health         - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    state.shutdown();
    info!("Server shutdown complete");
    Ok(())
}
