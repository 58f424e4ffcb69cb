//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the forward, download and relay endpoints
//! - Mount one forwarding route per configured fixed route
//! - Wire up middleware (request ID, tracing, body limit)
//! - Serve on a listener until the shutdown signal fires

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Path, RawQuery, State},
    http::{HeaderMap, Method, Request},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use bytes::Bytes;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{RelayConfig, RouteConfig};
use crate::forward::{Downloader, Forwarder};
use crate::http::request::{build_spec, query_pairs, request_id, route_target, split_query, X_REQUEST_ID};
use crate::http::websocket::relay_handler;
use crate::relay::SessionRegistry;
use crate::upstream::tls::ensure_crypto_provider;
use crate::upstream::UpstreamClient;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub forwarder: Arc<Forwarder>,
    pub downloader: Arc<Downloader>,
    pub registry: SessionRegistry,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: Arc<RelayConfig>,
    registry: SessionRegistry,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> Result<Self, ServerError> {
        ensure_crypto_provider();
        let client = UpstreamClient::new()?;
        let config = Arc::new(config);
        let registry = SessionRegistry::new();

        let state = AppState {
            forwarder: Arc::new(Forwarder::new(client.clone(), &config)),
            downloader: Arc::new(Downloader::new(client, &config)),
            registry: registry.clone(),
            config: Arc::clone(&config),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            registry,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let endpoints = &config.endpoints;
        let mut router = Router::new()
            .route(&endpoints.forward_path, any(forward_handler))
            .route(&endpoints.download_path, any(download_handler))
            .route(&endpoints.websocket_path, get(relay_handler));

        for route in &config.routes {
            router = mount_route(router, route);
        }

        router
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            request_id = %request_id(req.headers()),
                            method = %req.method(),
                            path = %req.uri().path(),
                        )
                    }))
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    /// Run the server, accepting connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.config.routes.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!(open_sessions = self.registry.len(), "HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Registry of live relay sessions.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

fn mount_route(router: Router<AppState>, route: &RouteConfig) -> Router<AppState> {
    tracing::debug!(name = %route.name, prefix = %route.path_prefix, target = %route.target, "Mounting fixed route");

    let base = route.target.clone();
    let exact = {
        let base = base.clone();
        move |State(state): State<AppState>,
              method: Method,
              headers: HeaderMap,
              RawQuery(query): RawQuery,
              body: Bytes| {
            let base = base.clone();
            async move { forward_route(state, &base, "", method, headers, query, body).await }
        }
    };
    let nested = move |State(state): State<AppState>,
                       Path(rest): Path<String>,
                       method: Method,
                       headers: HeaderMap,
                       RawQuery(query): RawQuery,
                       body: Bytes| {
        let base = base.clone();
        async move { forward_route(state, &base, &rest, method, headers, query, body).await }
    };

    router
        .route(&route.path_prefix, any(exact))
        .route(&format!("{}/{{*rest}}", route.path_prefix), any(nested))
}

async fn forward_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let (target, query) = split_query(query.as_deref(), &state.config.endpoints.target_param);
    let spec = build_spec(
        method,
        target.unwrap_or_default(),
        &headers,
        state.forwarder.policy(),
        query,
        body,
    );
    match state.forwarder.forward(spec).await {
        Ok(result) => result.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn download_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let (target, query) = split_query(query.as_deref(), &state.config.endpoints.target_param);
    let spec = build_spec(
        method,
        target.unwrap_or_default(),
        &headers,
        state.downloader.policy(),
        query,
        body,
    );
    match state.downloader.download(spec).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn forward_route(
    state: AppState,
    base: &str,
    rest: &str,
    method: Method,
    headers: HeaderMap,
    query: Option<String>,
    body: Bytes,
) -> Response {
    let spec = build_spec(
        method,
        route_target(base, rest),
        &headers,
        state.forwarder.policy(),
        query_pairs(query.as_deref()),
        body,
    );
    match state.forwarder.forward(spec).await {
        Ok(result) => result.into_response(),
        Err(e) => e.into_response(),
    }
}
