//! Reviewer Backend
//!
//! Assigns reviewers to review requests, swaps them on demand and drains
//! deactivated members through a durable task queue. SQLite is the only
//! state.

mod api;
mod assignment;
mod config;
mod db;
mod errors;
mod models;
mod queue;
mod roster;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use assignment::{picker_from_seed, AssignmentEngine, ReviewerPicker};
use config::{Config, LogFormat};
use db::Repository;
use queue::{DeactivationQueue, TaskWorker};
use roster::{MemberService, TeamService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub teams: Arc<TeamService>,
    pub members: Arc<MemberService>,
    pub engine: Arc<AssignmentEngine>,
    pub queue: Arc<DeactivationQueue>,
}

impl AppState {
    pub fn new(repo: Repository, picker: Arc<dyn ReviewerPicker>) -> Self {
        Self {
            teams: Arc::new(TeamService::new(repo.clone())),
            members: Arc::new(MemberService::new(repo.clone())),
            engine: Arc::new(AssignmentEngine::new(repo.clone(), picker)),
            queue: Arc::new(DeactivationQueue::new(repo.clone())),
            repo: Arc::new(repo),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Starting Reviewer Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    if let Some(seed) = config.rng_seed {
        tracing::info!("Reviewer selection seeded with {}", seed);
    }

    // Initialize database
    let pool = db::init_database(&config.db_path, config.db_max_connections).await?;
    let repo = Repository::new(pool);

    let state = AppState::new(repo.clone(), picker_from_seed(config.rng_seed));

    // Start the task worker
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = TaskWorker::new(
        repo,
        (*state.engine).clone(),
        config.poll_interval,
        config.task_lease,
    );
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    // Build router
    let app = create_router(state, config.request_timeout);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, waiting for task worker");
    shutdown_tx.send(true).ok();
    if let Err(e) = worker_handle.await {
        tracing::error!("Task worker ended abnormally: {}", e);
    }

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Teams
        .route("/team/add", post(api::add_team))
        .route("/team/get", get(api::get_team))
        .route("/team/list", get(api::list_teams))
        // Users
        .route("/users/setIsActive", post(api::set_is_active))
        .route("/users/getReview", get(api::get_user_reviews))
        .route("/users/getAuthored", get(api::get_user_authored))
        .route("/users/batchDeactivate", post(api::batch_deactivate))
        .route("/users/{user_id}", get(api::get_user).delete(api::delete_user))
        // Review requests
        .route("/pullRequest/create", post(api::create_review_request))
        .route("/pullRequest/merge", post(api::merge_review_request))
        .route("/pullRequest/reassign", post(api::reassign_reviewer))
        .route("/pullRequest/rename", post(api::rename_review_request))
        // Tasks and stats
        .route("/tasks/{task_id}", get(api::get_task))
        .route("/stats/global", get(api::global_stats))
        .route("/stats/team", get(api::team_stats));

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(request_timeout_layer(request_timeout))
                .layer(cors),
        )
        .with_state(state)
}

/// Requests running longer than `timeout` are answered with 408.
fn request_timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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
