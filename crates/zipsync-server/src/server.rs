use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use zipsync_storage::{DynStore, StorageError};

use crate::{
    config::{AppConfig, StorageBackend},
    entity::EntityRegistry,
    handlers, middleware as app_middleware,
};

/// State shared by every request: read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<EntityRegistry>,
    pub store: DynStore,
}

pub struct ZipsyncServer {
    addr: SocketAddr,
    app: Router,
    store: DynStore,
}

pub fn build_app(cfg: &AppConfig, state: AppState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        // Health endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        // Reconciliation endpoints, one pair per configured entity
        .route("/{entity}/download", post(handlers::download))
        .route("/{entity}/upload", post(handlers::upload))
        .with_state(state)
        // Each layer wraps the ones above it
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        // Outside the trace layer so the span sees the id
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(TimeoutLayer::new(cfg.request_timeout()))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

/// Opens the store selected by `cfg.storage.backend`.
///
/// # Errors
///
/// Returns the backend's error if it cannot be reached or prepared.
pub async fn create_store(
    cfg: &AppConfig,
    registry: &EntityRegistry,
) -> Result<DynStore, StorageError> {
    match cfg.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on exit");
            Ok(zipsync_db_memory::create_store())
        }
        StorageBackend::Postgres => {
            let pg = cfg.storage.postgres.to_backend_config();
            tracing::info!(
                url = %zipsync_db_postgres::mask_password(&pg.url),
                "Connecting to PostgreSQL"
            );
            let store: DynStore =
                zipsync_db_postgres::create_store(pg, registry.collections()).await?;
            Ok(store)
        }
    }
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    store: Option<DynStore>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            store: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Uses an already opened store instead of the configured backend.
    pub fn with_store(mut self, store: DynStore) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn build(self) -> anyhow::Result<ZipsyncServer> {
        let registry = self.config.registry().map_err(anyhow::Error::msg)?;
        let store = match self.store {
            Some(store) => store,
            None => create_store(&self.config, &registry).await?,
        };
        tracing::info!(
            backend = store.backend_name(),
            entities = registry.len(),
            "Store ready"
        );

        let state = AppState {
            registry: Arc::new(registry),
            store: store.clone(),
        };
        let app = build_app(&self.config, state);

        Ok(ZipsyncServer {
            addr: self.addr,
            app,
            store,
        })
    }
}

impl ZipsyncServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        self.store.close().await;
        tracing::info!("store closed");
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
