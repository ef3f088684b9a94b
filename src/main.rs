// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::builder_session::{spawn_session, SessionDeps};
use crate::application::local_store::LocalStore;
use crate::infrastructure::chart_surface::ChartSurface;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::http_backend::HttpBackend;
use crate::infrastructure::local_store::{JsonFileStore, MemoryStore};
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    add_widget, canvas_events, close_canvas, configure_widget, create_dashboard, delete_dashboard,
    delete_widget, get_canvas, get_open_dashboard, health_check, list_dashboards, list_queries,
    live_charts, open_dashboard, pointer, set_text, update_settings, widget_action,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dashboard_builder=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = load_app_config()?;

    // Create adapters (infrastructure layer)
    let backend = Arc::new(HttpBackend::new(&config.backend.base_url, config.backend_timeout())?);
    let store: Arc<dyn LocalStore> = match config.store_path() {
        Some(path) => {
            tracing::info!("Offline fallback store at {}", path);
            Arc::new(JsonFileStore::new(path))
        }
        None => Arc::new(MemoryStore::new()),
    };
    let charts = Arc::new(ChartSurface::new());

    // Start the builder session (application layer)
    let builder = spawn_session(SessionDeps {
        repository: backend.clone(),
        directory: backend,
        store,
        charts: charts.clone(),
        settings: config.session_settings(),
    });

    let state = Arc::new(AppState {
        builder: builder.clone(),
        charts,
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/api/dashboards", get(list_dashboards).post(create_dashboard))
        .route("/api/dashboards/:id", delete(delete_dashboard))
        .route("/api/dashboards/:id/open", post(open_dashboard))
        .route("/api/queries", get(list_queries))
        .route("/api/canvas", get(get_canvas).delete(close_canvas))
        .route("/api/canvas/dashboard", get(get_open_dashboard))
        .route("/api/canvas/events", get(canvas_events))
        .route("/api/canvas/widgets", post(add_widget))
        .route("/api/canvas/widgets/:id", delete(delete_widget))
        .route("/api/canvas/widgets/:id/config", put(configure_widget))
        .route("/api/canvas/widgets/:id/text", put(set_text))
        .route("/api/canvas/widgets/:id/:action", post(widget_action))
        .route("/api/canvas/pointer", post(pointer))
        .route("/api/canvas/settings", put(update_settings))
        .route("/api/canvas/charts", get(live_charts))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.server.bind_addr.parse()?;
    tracing::info!("Starting dashboard-builder on {} (backend {})", addr, config.backend.base_url);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    builder.shutdown();
    Ok(())
}
