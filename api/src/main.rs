use api::auth::middleware::log_request;
use api::routes::routes;
use axum::{Router, middleware::from_fn};
use recognition::encoder::HttpFaceEncoder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing_appender::rolling;
use util::clock::SystemClock;
use util::{config, state::AppState};

#[tokio::main]
async fn main() {
    // Load configuration and initialize logging
    let _log_guard = init_logging(&config::log_file());

    // Set up dependencies
    let db = db::connect().await;
    let encoder = HttpFaceEncoder::new(
        config::face_encoder_url(),
        Duration::from_secs(config::face_encoder_timeout_seconds()),
    );
    let app_state = AppState::new(db, Arc::new(SystemClock), Arc::new(encoder));

    // Configure middleware
    let cors = CorsLayer::very_permissive();

    // Build app router
    let app = Router::new()
        .nest("/api", routes(app_state))
        .layer(from_fn(log_request))
        .layer(cors);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config::host(), config::port())
        .parse()
        .expect("Invalid address");

    println!(
        "Starting {} on http://{}:{}",
        config::project_name(),
        config::host(),
        config::port()
    );

    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service(),
    )
    .await
    .expect("Server crashed");
}

fn init_logging(log_file: &str) -> tracing_appender::non_blocking::WorkerGuard {
    use std::fs;
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    fs::create_dir_all("logs").ok();

    let file_appender = rolling::daily("logs", log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(true)
        .with_thread_ids(true);

    let env_filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(config::log_level()));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if config::log_to_stdout() {
        registry.with(stdout_layer).init();
    } else {
        registry.init();
    }

    guard
}
