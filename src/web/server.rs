//! HTTP server for the task board.
//!
//! This module provides the axum router serving the pages, the toggle
//! endpoint and, when enabled, the uploaded images.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{any, get},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;
use super::media::MediaStore;
use crate::db::Database;

/// Largest accepted request body; bounds image uploads.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Server state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Reference to the task database.
    db: Arc<Database>,
    /// Uploaded image storage.
    media: Arc<MediaStore>,
}

impl AppState {
    pub fn new(db: Arc<Database>, media: MediaStore) -> Self {
        Self {
            db,
            media: Arc::new(media),
        }
    }

    /// Get the database reference.
    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Page routes
        .route("/", get(handlers::task_list))
        .route("/statistics/", get(handlers::statistics))
        .route(
            "/create/",
            get(handlers::create_form).post(handlers::create_submit),
        )
        .route(
            "/update/{task_id}/",
            get(handlers::update_form).post(handlers::update_submit),
        )
        .route(
            "/delete/{task_id}/",
            get(handlers::delete_confirm).post(handlers::delete_submit),
        )
        // Any method reaches the handler so it can answer non-POST with JSON.
        .route("/toggle/{task_id}/", any(handlers::toggle_task))
        .route("/api/health", get(handlers::health))
        .fallback(handlers::not_found);

    if let Some(media_service) = state.media().service() {
        info!(
            prefix = state.media().url_prefix(),
            dir = %state.media().root().display(),
            "Serving uploaded images"
        );
        router = router.nest_service(state.media().url_prefix(), media_service);
    }

    router
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle for a running server.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            tracing::error!("Server task failed: {}", e);
        }
    }
}

/// Bind `addr` and serve in a background task.
///
/// # Arguments
/// * `state` - Shared handler state
/// * `addr` - `host:port` to bind; port 0 picks a free port
pub async fn start_server(state: AppState, addr: &str) -> anyhow::Result<ServerHandle> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Task board listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Task board shutting down");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(ServerHandle {
        addr: bound_addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}
