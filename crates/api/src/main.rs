use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courtside_api::config::ServerConfig;
use courtside_api::finalizer::ReservationFinalizer;
use courtside_api::{broadcast, routes, state, ws};
use courtside_db::repositories::BookingRepo;
use courtside_events::EventBus;
use courtside_registry::{expiry, LockManager};

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courtside_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = courtside_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    courtside_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    courtside_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Lock engine ---
    let lock_manager = Arc::new(LockManager::new(Arc::clone(&event_bus)));

    // Seed BOOKED tombstones so a restart cannot re-open sold slots.
    let today = chrono::Utc::now().date_naive();
    let upcoming = BookingRepo::list_from_date(&pool, today)
        .await
        .expect("Failed to load upcoming bookings");
    let seeded = lock_manager
        .hydrate_booked(upcoming.iter().map(|b| (b.slot_key(), b.id)).collect())
        .await;
    tracing::info!(seeded, "Registry hydrated with existing bookings");

    // --- WebSocket sessions ---
    let sessions = Arc::new(ws::SessionManager::new());

    // --- Disconnect reconciler ---
    let reconciler = Arc::new(ws::DisconnectReconciler::new(
        Arc::clone(&lock_manager),
        config.hold.disconnect_grace_secs,
    ));
    let reconciler_cancel = tokio_util::sync::CancellationToken::new();
    let reconciler_handle = tokio::spawn(
        Arc::clone(&reconciler).run(reconciler_cancel.clone()),
    );

    // --- Heartbeat ---
    let heartbeat_handle =
        ws::start_heartbeat(Arc::clone(&sessions), Arc::clone(&reconciler), &config.hold);

    // --- Expiry sweep ---
    let expiry_cancel = tokio_util::sync::CancellationToken::new();
    let expiry_handle = tokio::spawn(expiry::run(
        Arc::clone(&lock_manager),
        Duration::from_secs(config.hold.sweep_interval_secs),
        expiry_cancel.clone(),
    ));

    // --- Broadcast router ---
    let broadcast_router = broadcast::BroadcastRouter::new(Arc::clone(&sessions));
    let broadcast_handle = tokio::spawn(broadcast_router.run(event_bus.subscribe()));

    tracing::info!("Background services started (reconciler, heartbeat, expiry sweep, broadcast)");

    // --- Finalizer ---
    let finalizer = Arc::new(ReservationFinalizer::new(
        pool.clone(),
        Arc::clone(&lock_manager),
    ));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        sessions: Arc::clone(&sessions),
        lock_manager: Arc::clone(&lock_manager),
        reconciler: Arc::clone(&reconciler),
        finalizer,
        event_bus: Arc::clone(&event_bus),
    };

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health::router())
        // API v1 routes.
        .nest("/api/v1", routes::api_routes())
        // -- Middleware stack (applied bottom-up) --
        // Panic recovery: catch panics and return 500 JSON.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // CORS.
        .layer(cors)
        // Shared state.
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop the expiry sweep and reconciler first; no further holds can
    // be granted once the listener is closed.
    expiry_cancel.cancel();
    reconciler_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), expiry_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), reconciler_handle).await;
    tracing::info!("Lock engine background tasks stopped");

    // Drop our event bus handle; the broadcast channel closes once the
    // remaining clones (lock engine, app state) are gone, and the wait
    // below is bounded either way.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), broadcast_handle).await;
    tracing::info!("Broadcast router shut down");

    let ws_count = sessions.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket sessions");
    sessions.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Build the CORS middleware layer from server configuration.
///
/// Panics at startup if any configured origin is invalid, which is the
/// desired behaviour -- we want misconfiguration to fail fast.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
