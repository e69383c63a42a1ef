//! Directory Sync Service
//!
//! Keeps a local durable cache of the directory (groups, categories, pages,
//! posts, reports) in front of the remote entity store, plus the promotion
//! tracker and the moderation counters.

mod api;
mod config;
mod counters;
mod errors;
mod maintenance;
mod models;
mod moderation;
mod promotions;
mod remote;
mod store;
mod sync;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LocalBackend};
use counters::CounterLedger;
use models::{Category, Entity, Group, Page, Post, Report};
use moderation::GroupModeration;
use promotions::PromotionTracker;
use remote::{HttpRemote, OfflineRemote, RemoteConfig, RemoteError, RemoteStore};
use store::{LocalStore, MemoryStore, SqliteStore};
use sync::{ReportService, SyncService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub moderation: Arc<GroupModeration>,
    pub categories: Arc<SyncService<Category>>,
    pub pages: Arc<SyncService<Page>>,
    pub posts: Arc<SyncService<Post>>,
    pub reports: Arc<ReportService>,
    pub promotions: Arc<PromotionTracker>,
    pub counters: Arc<CounterLedger>,
    pub local: Arc<dyn LocalStore>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting directory sync service");
    tracing::info!("Bind address: {}", config.bind_addr);

    let local: Arc<dyn LocalStore> = match config.local_backend {
        LocalBackend::Sqlite => {
            tracing::info!("Local store: {:?}", config.db_path);
            Arc::new(SqliteStore::open(&config.db_path, config.local_quota_bytes).await?)
        }
        LocalBackend::Memory => {
            tracing::warn!("Local store is in memory; cached data is lost on restart");
            Arc::new(MemoryStore::with_quota(config.local_quota_bytes))
        }
    };

    match &config.remote_url {
        Some(url) => tracing::info!("Remote store: {}", url),
        None => tracing::warn!("No remote store configured (DIRSYNC_REMOTE_URL). Serving cache only!"),
    }

    let state = build_state(config.clone(), local)?;
    state.counters.initialize_if_absent().await?;

    // Warm the mirrors; failures fall back to whatever is cached.
    let (groups, categories) = tokio::join!(
        state.moderation.list_groups(),
        state.categories.list()
    );
    if let Ok(groups) = groups {
        tracing::info!("Loaded {} groups ({:?})", groups.data.len(), groups.source);
    }
    if let Ok(categories) = categories {
        tracing::info!(
            "Loaded {} categories ({:?})",
            categories.data.len(),
            categories.source
        );
    }
    if let Err(e) = state.reports.sync_local_reports().await {
        tracing::warn!("Report sync failed at startup: {}", e);
    }

    if !config.sweep_interval.is_zero() {
        promotions::spawn_expiry_sweeper(state.promotions.clone(), config.sweep_interval);
    }

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn remote_for<T: Entity>(
    config: Option<&RemoteConfig>,
) -> Result<Arc<dyn RemoteStore<T>>, RemoteError> {
    let remote: Arc<dyn RemoteStore<T>> = match config {
        Some(config) => Arc::new(HttpRemote::<T>::new(config)?),
        None => Arc::new(OfflineRemote),
    };
    Ok(remote)
}

/// Wire every service onto one local store.
pub fn build_state(config: Config, local: Arc<dyn LocalStore>) -> Result<AppState, RemoteError> {
    let remote = config.remote();
    let remote = remote.as_ref();

    let groups = Arc::new(SyncService::new(remote_for::<Group>(remote)?, local.clone()));
    let counters = Arc::new(CounterLedger::new(local.clone()));
    let moderation = Arc::new(GroupModeration::new(groups, counters.clone()));

    let report_remote = match remote {
        Some(remote) if config.reports_remote => Some(remote_for::<Report>(Some(remote))?),
        _ => None,
    };

    Ok(AppState {
        moderation,
        categories: Arc::new(SyncService::new(remote_for::<Category>(remote)?, local.clone())),
        pages: Arc::new(SyncService::new(remote_for::<Page>(remote)?, local.clone())),
        posts: Arc::new(SyncService::new(remote_for::<Post>(remote)?, local.clone())),
        reports: Arc::new(ReportService::new(report_remote, local.clone())),
        promotions: Arc::new(PromotionTracker::new(local.clone())),
        counters,
        local,
        config: Arc::new(config),
    })
}

/// Routes for one generic entity type.
fn entity_routes<T: api::EntityRoutes>() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(api::list_entities::<T>).post(api::create_entity::<T>),
        )
        .route(
            "/{id}",
            put(api::update_entity::<T>).delete(api::delete_entity::<T>),
        )
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
        // Groups
        .route("/groups", get(api::list_groups).post(api::create_group))
        .route(
            "/groups/{id}",
            put(api::update_group).delete(api::delete_group),
        )
        .route("/groups/{id}/approve", post(api::approve_group))
        .route("/groups/{id}/reject", post(api::reject_group))
        .route("/groups/{id}/promoted", get(api::get_promoted_status))
        .route("/public-groups", get(api::list_public_groups))
        // Users
        .route(
            "/users/{user_id}/groups",
            get(api::list_user_drafts).post(api::submit_group),
        )
        .route("/users/{user_id}/promotions", get(api::list_user_promotions))
        .route(
            "/users/{user_id}/promotion-stats",
            get(api::get_user_promotion_stats),
        )
        // Categories, pages, posts
        .nest("/categories", entity_routes::<Category>())
        .nest("/pages", entity_routes::<Page>())
        .nest("/posts", entity_routes::<Post>())
        // Reports
        .route("/reports", get(api::list_reports).post(api::create_report))
        .route("/reports/open", get(api::list_open_reports))
        .route("/reports/sync", post(api::sync_reports))
        .route("/reports/{id}", axum::routing::delete(api::delete_report))
        .route("/reports/{id}/status", put(api::update_report_status))
        // Promotions
        .route(
            "/promotions",
            get(api::list_promoted_groups).post(api::promote_group),
        )
        .route("/promotions/sweep", post(api::sweep_promotions))
        // Counters and maintenance
        .route("/counters", get(api::get_counters))
        .route("/counters/reconcile", post(api::reconcile_counters))
        .route("/maintenance/clear-cache", post(api::clear_cache))
        .route("/status", get(api::get_status));

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
