//! SchoolBridge API Gateway
//!
//! The main entry point for all client requests.
//! Handles:
//! - Local (cookie) sessions
//! - Remote portal sessions through the session registry
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics)

mod extract;
mod handlers;
mod middleware;

use axum::{
    extract::Request,
    middleware::{from_fn, Next},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use schoolbridge_common::{
    config::{AppConfig, StoreBackend},
    db::{DbPool, MemoryStore, Repository},
    errors::{AppError, Result},
    metrics, LocalSession, LocalSessionManager, SchoolDirectory, UserStore,
};
use schoolbridge_sessions::{HttpPortalFactory, Orchestrator, PortalFactory, PortalOperation, SessionRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub schools: SchoolDirectory,
    pub store: Arc<dyn UserStore>,
    pub registry: Arc<SessionRegistry>,
    pub orchestrator: Orchestrator,
    pub local_sessions: Arc<LocalSessionManager>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn UserStore>, factory: Arc<dyn PortalFactory>) -> Self {
        let registry = Arc::new(SessionRegistry::new(factory));
        Self {
            schools: config.school_directory(),
            local_sessions: Arc::new(LocalSessionManager::from_config(&config.auth)),
            orchestrator: Orchestrator::new(Arc::clone(&registry)),
            registry,
            store,
            config: Arc::new(config),
        }
    }

    /// Run `op` on the remote session behind a local session, logging in
    /// again with the stored credentials when needed
    pub async fn fetch<O: PortalOperation>(&self, session: &LocalSession, op: O) -> Result<O::Output> {
        let store = &self.store;
        let resolve = || store.user_auth_data(&session.username, session.school_id);

        self.orchestrator
            .fetch(&session.session_id, resolve, &op)
            .await
            .map_err(AppError::from)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config);

    info!(
        service = %config.observability.service_name,
        "Starting SchoolBridge API Gateway v{}",
        schoolbridge_common::VERSION
    );

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .install()?;
        info!("Metrics exporter listening on {}", addr);
    }
    metrics::register_metrics();

    let store = build_store(&config).await?;
    let factory = Arc::new(HttpPortalFactory::from_config(&config.portal));

    let idle_timeout = config.session_idle_timeout();
    let shutdown_timeout = config.shutdown_timeout();
    let sweep_interval = Duration::from_secs(config.sessions.sweep_interval_secs);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    // Create app state
    let state = AppState::new(config, store, factory);
    info!(schools = state.schools.len(), "School directory loaded");

    let registry = Arc::clone(&state.registry);
    let sweeper = (!sweep_interval.is_zero())
        .then(|| registry.spawn_idle_sweeper(idle_timeout, sweep_interval));

    // Build the router
    let app = create_router(state);

    // Start the server
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    // Log every remote session out so portals do not keep them alive
    match tokio::time::timeout(shutdown_timeout, registry.close_all()).await {
        Ok(closed) => info!(closed, "Remote sessions closed"),
        Err(_) => tracing::warn!("Timed out closing remote sessions"),
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Open the configured user/school store
async fn build_store(config: &AppConfig) -> Result<Arc<dyn UserStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new(config.school_directory())))
        }
        StoreBackend::Postgres => {
            let pool = DbPool::new(&config.database).await?;
            let repo = Repository::new(pool, config.school_directory());
            repo.ensure_schema().await?;
            let synced = repo.sync_schools().await?;
            info!(schools = synced, "School permissions synchronized");
            Ok(Arc::new(repo))
        }
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        // Account endpoints
        .route("/get_school_list", get(handlers::schools::get_school_list))
        .route("/check_permission", post(handlers::auth::check_permission))
        .route("/sign_in", post(handlers::auth::sign_in))
        .route("/log_out", get(handlers::auth::log_out))

        // Diary endpoints
        .route("/get_children_map", get(handlers::diary::get_children_map))
        .route("/get_schedule", post(handlers::diary::get_schedule))
        .route("/get_tasks_and_marks", post(handlers::diary::get_tasks_and_marks))
        .route("/get_lesson_description", post(handlers::diary::get_lesson_description))
        .route("/mark_as_done", post(handlers::diary::mark_as_done))
        .route("/unmark_as_done", post(handlers::diary::unmark_as_done))

        // Report endpoints
        .route("/get_report_student_total_marks", post(handlers::reports::total_marks))
        .route("/get_report_student_average_mark", post(handlers::reports::average_mark))
        .route("/get_report_student_average_mark_dyn", post(handlers::reports::average_mark_dyn))
        .route("/get_report_student_grades_lesson_list", post(handlers::reports::grades_lesson_list))
        .route("/get_report_student_total", post(handlers::reports::student_total))
        .route("/get_report_parent_info_letter", post(handlers::reports::parent_info_letter))

        // Mail and announcements
        .route("/get_mail", post(handlers::mail::get_mail))
        .route("/delete_mail", post(handlers::mail::delete_mail))
        .route("/get_posts", get(handlers::mail::get_posts));

    let api_routes = if state.config.rate_limit.enabled {
        let limit = state.config.rate_limit.requests_per_second;
        let limiter = middleware::rate_limit::create_rate_limiter(limit, state.config.rate_limit.burst);
        api_routes.layer(from_fn(move |request: Request, next: Next| {
            middleware::rate_limit::rate_limit_middleware(request, next, Arc::clone(&limiter), limit)
        }))
    } else {
        api_routes
    };

    // Compose the app
    Router::new()
        // Health endpoints (not rate limited)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .merge(api_routes)
        .layer(from_fn(middleware::metrics::track_requests))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
