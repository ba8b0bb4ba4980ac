//! API module
//!
//! This module provides the HTTP API for the front-end dashboard: service
//! lifecycle requests, deferred tasks, the metrics snapshot and a websocket
//! carrying registry and refresher events.

mod error;
mod metrics;
mod services;
mod tasks;

pub use error::ApiError;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use log::{info, warn};
use monitor_core::config::MonitorConfig;
use monitor_core::effect::EffectExecutor;
use monitor_core::events::EventBus;
use monitor_core::metrics::MetricsCache;
use monitor_core::services::ServiceRegistry;
use monitor_core::tasks::TaskRegistry;
use monitor_core::worker::WorkerPool;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

// App State to share with routes
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<ServiceRegistry>,
    pub tasks: Arc<TaskRegistry>,
    pub metrics: Arc<MetricsCache>,
    pub pool: Arc<WorkerPool>,
    pub bus: EventBus,
}

impl AppState {
    /// Wires both registries onto one worker pool and one event bus.
    pub fn new(
        config: &MonitorConfig,
        executor: Arc<dyn EffectExecutor>,
        event_capacity: usize,
    ) -> Self {
        let bus = EventBus::new(event_capacity);
        let pool = Arc::new(WorkerPool::new(executor, &config.workers));
        Self {
            services: ServiceRegistry::new(pool.clone(), bus.clone()),
            tasks: TaskRegistry::new(pool.clone(), bus.clone()),
            metrics: Arc::new(MetricsCache::new()),
            pool,
            bus,
        }
    }
}

/// Builds the API. `static_dir` is served under `/static`, and its
/// `index.html` is the dashboard page at `/`.
pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .route("/health", get(health_check))
        .route("/api/events", get(ws_handler))
        .route("/api/metrics", get(metrics::get_metrics))
        .route(
            "/api/services",
            get(services::list_services).post(services::service_action),
        )
        .route("/api/services/:name", get(services::get_service))
        .route(
            "/api/tasks",
            get(tasks::list_tasks)
                .post(tasks::submit_task)
                .delete(tasks::delete_task_by_query),
        )
        .route(
            "/api/tasks/:id",
            get(tasks::get_task).delete(tasks::delete_task),
        )
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

// WebSocket Handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut rx = state.bus.subscribe();
    info!("API: Event subscriber connected");

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("API: Event subscriber lagging, {} events dropped", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                warn!("API: Could not encode event {:?}: {}", event, e);
                continue;
            }
        };
        if socket.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
    info!("API: Event subscriber disconnected");
}
