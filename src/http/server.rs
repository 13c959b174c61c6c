//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID, CORS, access guard)
//! - Bind server to listener
//! - Observability (metrics, correlation IDs)

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, Request},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{AccessConfig, AppConfig, CollectionConfig};
use crate::http::handlers;
use crate::http::request::{propagate_request_id_layer, request_span, set_request_id_layer};
use crate::http::response::ApiError;
use crate::http::websocket;
use crate::notifications::NotificationHub;
use crate::observability::metrics;
use crate::query::QueryResolver;
use crate::security::{access_guard_middleware, AccessGuard, AuditLog, GuardState};
use crate::store::{MemoryStore, StoreResult};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub resolver: Arc<QueryResolver>,
    pub collections: Arc<BTreeMap<String, CollectionConfig>>,
    pub hub: NotificationHub,
}

impl AppState {
    /// Settings of an exposed collection; anything else is a 404.
    pub fn collection_config(&self, name: &str) -> Result<&CollectionConfig, ApiError> {
        self.collections
            .get(name)
            .ok_or_else(|| ApiError::NotFound(format!("Unknown collection: {name}")))
    }
}

/// HTTP server for the API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server with a fresh store, loading the seed file if configured.
    pub fn new(config: AppConfig) -> StoreResult<Self> {
        let store = MemoryStore::with_collections(config.collections.keys().cloned());
        if let Some(seed) = &config.store.seed_path {
            store.load_seed(std::path::Path::new(seed))?;
        }
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Create a server over an existing store.
    pub fn with_store(config: AppConfig, store: Arc<MemoryStore>) -> Self {
        for name in config.collections.keys() {
            store.register(name.clone());
        }

        let state = AppState {
            store,
            resolver: Arc::new(QueryResolver::new(&config.pagination)),
            collections: Arc::new(config.collections.clone()),
            hub: NotificationHub::new(config.notifications.channel_capacity),
        };
        let guard = GuardState {
            guard: Arc::new(AccessGuard::new(&config.access)),
            audit: Arc::new(AuditLog::new(&config.access.audit_log_path)),
        };

        let router = Self::build_router(&config, state.clone(), guard);
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers are listed innermost first: the request id is assigned before
    /// anything else runs, and metrics see the final status.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState, guard: GuardState) -> Router {
        let guarded = Router::new()
            .route(
                "/api/{collection}",
                get(handlers::list_records).post(handlers::create_record),
            )
            .route(
                "/api/{collection}/{id}",
                get(handlers::get_record)
                    .put(handlers::update_record)
                    .delete(handlers::delete_record),
            )
            .route("/ws/notifications", get(websocket::notifications_ws))
            .route_layer(middleware::from_fn_with_state(guard, access_guard_middleware));

        Router::new()
            .route("/health", get(handlers::health))
            .merge(guarded)
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.listener.max_body_size))
            .layer(middleware::from_fn(track_metrics))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(cors_layer(&config.access))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(request_span::<Body>))
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            collections = self.state.collections.len(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

}

/// CORS for the frontend and API domains, both schemes.
fn cors_layer(access: &AccessConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = [&access.frontend_domain, &access.api_domain]
        .into_iter()
        .map(|domain| domain.trim())
        .filter(|domain| !domain.is_empty())
        .flat_map(|domain| [format!("https://{domain}"), format!("http://{domain}")])
        .filter_map(|origin| HeaderValue::from_str(&origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
