//! Truth or Dare Backend
//!
//! REST backend for the party game: tag and task catalog, game sessions, and
//! the task selection engine that decides which prompt each player gets.

mod api;
mod config;
mod db;
mod engine;
mod errors;
mod models;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use engine::{RandomSource, ThreadRandom, TurnResolver};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub resolver: TurnResolver,
    pub random: Arc<dyn RandomSource>,
}

impl AppState {
    pub fn new(repo: Repository, random: Arc<dyn RandomSource>, config: &Config) -> Self {
        Self {
            repo: Arc::new(repo),
            resolver: TurnResolver::new(random.clone(), config.someone_fallback.clone()),
            random,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Truth or Dare Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Repository::new(pool);

    let tags = repo.list_tags().await?;
    let tasks = repo.list_tasks(None).await?;
    tracing::info!("Catalog loaded: {} tags, {} tasks", tags.len(), tasks.len());

    let state = AppState::new(repo, Arc::new(ThreadRandom::new()), &config);

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        // Tag catalog
        .route("/tags", get(api::list_tags).post(api::create_tag))
        .route(
            "/tags/{id}",
            get(api::get_tag).put(api::update_tag).delete(api::delete_tag),
        )
        // Task catalog
        .route("/tasks", get(api::list_tasks).post(api::create_task))
        .route(
            "/tasks/{id}",
            get(api::get_task)
                .put(api::update_task)
                .delete(api::delete_task),
        )
        // Games
        .route("/games", post(api::create_game))
        .route("/games/code/{code}", get(api::get_game_by_code))
        .route("/games/{id}", get(api::get_game))
        .route("/games/{id}/tags", put(api::update_game_tags))
        .route("/games/{id}/start", post(api::start_game))
        .route("/games/{id}/end", post(api::end_game))
        .route("/games/{id}/history", get(api::get_history))
        // Players
        .route(
            "/games/{id}/players",
            get(api::list_players).post(api::join_game),
        )
        .route(
            "/games/{id}/players/{player_id}",
            delete(api::remove_player),
        )
        // Turns
        .route("/games/{id}/turn", post(api::draw_turn))
        .route("/games/{id}/turn/complete", post(api::complete_turn));

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
