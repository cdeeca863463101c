use drawing_lock_relay::{config::Config, routes::create_router, state::{self, AppState}};
use std::panic;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Configuration is read first so LOG_LEVEL can shape the default filter
    let loaded = Config::load();
    let log_level = loaded
        .as_ref()
        .map(|config| config.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("drawing_lock_relay={},tower_http=debug,axum::rejection=trace,info", log_level).into()
        }))
        .init();

    info!("Starting server...");

    let config = match loaded {
        Ok(config) => {
            info!("✅ Configuration loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            warn!("Using default configuration");
            Config::default()
        }
    };

    if !config.is_development() && config.cors_origin_list().is_empty() {
        warn!("No CORS origins configured - browser clients on other origins will be refused");
    }

    let state = AppState::new(config.clone());
    state::spawn_maintenance(state.clone());
    info!(
        "Locks expire after {}s, swept every {}s",
        config.lock_timeout_secs,
        config.lock_sweep_interval().as_secs()
    );

    let app_routes = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("🚀 Server running on http://{}", config.server_address());
    info!("📡 Lock events available at ws://{}{}", config.server_address(), config.ws_route());
    info!("📚 OpenAPI document at http://{}/api-docs/openapi.json", config.server_address());

    axum::serve(listener, app_routes)
        .await
        .expect("Server failed to start");
}
