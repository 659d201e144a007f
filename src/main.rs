//! Challenge Hub Backend
//!
//! Tracks a list of projects, enriches them with catalog metadata and shares
//! the whole state as a self-contained link. State is cached in SQLite.

mod api;
mod auth;
mod catalog;
mod config;
mod db;
mod errors;
mod hub;
mod models;
mod persistence;
mod snapshot;
mod store;
mod telemetry;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use catalog::{CatalogTransport, GithubCatalog, RemoteMetadataClient, RetryPolicy};
use config::Config;
use db::{MemorySlotStore, SlotStore, SqliteSlotStore};
use hub::{ChallengeWindow, Hub, HubSettings};
use persistence::PersistenceAdapter;
use telemetry::Telemetry;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let (config, config_warnings) = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Challenge Hub Backend");
    for warning in &config_warnings {
        tracing::warn!("{}", warning);
    }
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Catalog: {}", config.catalog_url);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.admin_psk.is_none() {
        tracing::warn!("No admin PSK configured (HUB_ADMIN_PSK). Admin routes are open!");
    }
    if config.catalog_token.is_none() {
        tracing::info!("No catalog token configured, requests will be anonymous");
    }

    // Initialize the local store
    let slots: Arc<dyn SlotStore> = if config.db_path.as_os_str() == db::MEMORY_DB_PATH {
        tracing::warn!("Using an in-memory store, state will not survive a restart");
        Arc::new(MemorySlotStore::new())
    } else {
        let pool = db::init_database(&config.db_path).await?;
        Arc::new(SqliteSlotStore::new(pool))
    };

    let transport: Arc<dyn CatalogTransport> = Arc::new(GithubCatalog::new(
        &config.catalog_url,
        config.catalog_token.clone(),
    )?);

    let hub = Arc::new(build_hub(&config, transport, slots));

    // Inbound link handling runs exactly once, before serving
    let (outcome, stripped) = hub.start(config.inbound_link.as_deref()).await;
    tracing::info!(?outcome, "Startup complete");
    if let Some(stripped) = stripped {
        tracing::info!("Inbound link consumed, continue at {}", stripped);
    }

    if hub.needs_initial_fetch().await {
        let hub = hub.clone();
        tokio::spawn(async move {
            tracing::info!("Fetching metadata for restored entries");
            hub.refresh_all(false).await;
        });
    }

    let state = AppState {
        hub,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Wire the hub from configuration and its two outside dependencies.
pub fn build_hub(
    config: &Config,
    transport: Arc<dyn CatalogTransport>,
    slots: Arc<dyn SlotStore>,
) -> Hub {
    let telemetry = Telemetry::from_config(config.telemetry_enabled);

    let window = match config.challenge_start {
        Some(start) => ChallengeWindow::new(start, config.challenge_days),
        None => ChallengeWindow::starting_this_week(Utc::now().date_naive(), config.challenge_days),
    };

    let stale_after = chrono::Duration::from_std(config.stale_after).unwrap_or_else(|e| {
        tracing::warn!("Stale interval out of range ({}), using 5 minutes", e);
        chrono::Duration::minutes(5)
    });

    Hub::new(
        PersistenceAdapter::new(slots, telemetry.clone()),
        RemoteMetadataClient::new(
            transport,
            RetryPolicy {
                attempts: config.fetch_attempts,
                base_delay: config.retry_base,
            },
        )
        .with_activity_since(window.starts_at()),
        telemetry,
        HubSettings {
            stale_after,
            public_url: config.public_url.clone(),
            window,
        },
    )
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.admin_psk.clone();

    // Mutating routes
    let admin_routes = Router::new()
        .route("/entries", post(api::add_entry))
        .route("/entries/{id}", put(api::update_entry))
        .route("/entries/{id}", delete(api::delete_entry))
        .route("/refresh", post(api::refresh))
        .route("/metadata/{owner}/{name}/refresh", post(api::refresh_metadata))
        .route("/import", get(api::import))
        .route("/snapshot", post(api::import_snapshot))
        .route("/credential/validate", post(api::validate_credential))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    let public_routes = Router::new()
        .route("/hub", get(api::get_hub))
        .route("/entries", get(api::list_entries))
        .route("/entries/{id}", get(api::get_entry))
        .route("/metadata/{owner}/{name}", get(api::get_metadata))
        .route("/share", post(api::share))
        .route("/credential", get(api::get_credential))
        .route("/window", get(api::get_window));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", admin_routes.merge(public_routes))
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
