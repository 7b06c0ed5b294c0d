use axum::{
    routing::{get, post},
    Router,
};
use ssechain_core::origin::{OriginSource, Pacing, CHAT, SEARCH};
use ssechain_core::{Endpoint, EventSource, HttpSource, RelayConfig};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::apis;
use crate::session::{SessionManager, SessionManagerConfig};

pub const ORIGIN_SEARCH_PATH: &str = "/query/stream";
pub const ORIGIN_CHAT_PATH: &str = "/property_chat/stream";
pub const RELAY_SEARCH_PATH: &str = "/search/stream";
pub const RELAY_CHAT_PATH: &str = "/chat/stream";

/// Source that talks to an origin service
pub fn origin_client(base_url: &str) -> HttpSource {
    HttpSource::new(base_url)
        .route(SEARCH, Endpoint::post(ORIGIN_SEARCH_PATH))
        .route(CHAT, Endpoint::post(ORIGIN_CHAT_PATH))
}

/// Source that talks to a relay service
pub fn relay_client(base_url: &str) -> HttpSource {
    HttpSource::new(base_url)
        .route(SEARCH, Endpoint::get(RELAY_SEARCH_PATH))
        .route(CHAT, Endpoint::post(RELAY_CHAT_PATH))
}

/// Configuration for the origin server
#[derive(Clone, Debug)]
pub struct OriginConfig {
    /// Server bind address (e.g., "0.0.0.0:8001")
    pub address: String,
    pub pacing: Pacing,
    pub session_manager: SessionManagerConfig,
}

impl OriginConfig {
    pub fn new(address: String) -> Self {
        Self {
            address,
            pacing: Pacing::default(),
            session_manager: SessionManagerConfig::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Set the maximum number of concurrent sessions
    pub fn with_max_sessions(mut self, max_sessions: Option<usize>) -> Self {
        self.session_manager.max_sessions = max_sessions;
        self
    }
}

/// Configuration for the relay server
#[derive(Clone, Debug)]
pub struct RelayServerConfig {
    /// Server bind address (e.g., "0.0.0.0:8000")
    pub address: String,
    /// Base URL of the origin service
    pub upstream_url: String,
    pub relay: RelayConfig,
    pub session_manager: SessionManagerConfig,
}

impl RelayServerConfig {
    pub fn new(address: String, upstream_url: String) -> Self {
        Self {
            address,
            upstream_url,
            relay: RelayConfig::default(),
            session_manager: SessionManagerConfig::default(),
        }
    }

    pub fn with_relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }

    /// Set the maximum number of concurrent sessions
    pub fn with_max_sessions(mut self, max_sessions: Option<usize>) -> Self {
        self.session_manager.max_sessions = max_sessions;
        self
    }
}

/// Origin server state
#[derive(Clone)]
pub struct OriginState {
    pub source: Arc<dyn EventSource>,
    pub sessions: Arc<SessionManager>,
}

impl OriginState {
    pub fn new(config: &OriginConfig) -> Self {
        Self {
            source: Arc::new(OriginSource::new(config.pacing.clone())),
            sessions: Arc::new(SessionManager::new(config.session_manager.clone())),
        }
    }
}

/// Relay server state
#[derive(Clone)]
pub struct RelayState {
    pub upstream: Arc<dyn EventSource>,
    pub upstream_url: String,
    pub relay: RelayConfig,
    pub sessions: Arc<SessionManager>,
}

impl RelayState {
    pub fn new(config: &RelayServerConfig) -> Self {
        Self {
            upstream: Arc::new(origin_client(&config.upstream_url)),
            upstream_url: config.upstream_url.clone(),
            relay: config.relay.clone(),
            sessions: Arc::new(SessionManager::new(config.session_manager.clone())),
        }
    }
}

pub fn origin_router(state: OriginState) -> Router {
    Router::new()
        .route(ORIGIN_SEARCH_PATH, post(apis::origin::handle_search_stream))
        .route(ORIGIN_CHAT_PATH, post(apis::origin::handle_chat_stream))
        .route("/health", get(apis::origin::handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn relay_router(state: RelayState) -> Router {
    Router::new()
        .route(RELAY_SEARCH_PATH, get(apis::relay::handle_search_stream))
        .route(RELAY_CHAT_PATH, post(apis::relay::handle_chat_stream))
        .route("/health", get(apis::relay::handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn print_limits(session_manager: &SessionManagerConfig) {
    if let Some(max) = session_manager.max_sessions {
        println!("  Max sessions: \x1b[1m{}\x1b[0m", max);
    } else {
        println!("  Max sessions: \x1b[1munlimited\x1b[0m");
    }
}

/// Start the origin service
pub async fn start_origin_server(config: OriginConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = origin_router(OriginState::new(&config));
    let listener = tokio::net::TcpListener::bind(&config.address).await?;

    println!("Origin service starting on \x1b[1mhttp://{}\x1b[0m", config.address);
    print_limits(&config.session_manager);
    println!("\nAvailable endpoints:");
    println!("  \x1b[1mPOST {}\x1b[0m          - Search progress stream", ORIGIN_SEARCH_PATH);
    println!("  \x1b[1mPOST {}\x1b[0m  - Chat token stream", ORIGIN_CHAT_PATH);
    println!("  \x1b[1mGET  /health\x1b[0m");
    println!("\nPress Ctrl+C to stop\n");

    info!("Origin service listening on {}", config.address);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Start the relay service
pub async fn start_relay_server(config: RelayServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = relay_router(RelayState::new(&config));
    let listener = tokio::net::TcpListener::bind(&config.address).await?;

    println!("Relay service starting on \x1b[1mhttp://{}\x1b[0m", config.address);
    println!("  Upstream: \x1b[1m{}\x1b[0m", config.upstream_url);
    println!("  Idle timeout: \x1b[1m{:?}\x1b[0m", config.relay.idle_timeout);
    print_limits(&config.session_manager);
    println!("\nAvailable endpoints:");
    println!("  \x1b[1mGET  {}?query=\x1b[0m - Relayed search stream", RELAY_SEARCH_PATH);
    println!("  \x1b[1mPOST {}\x1b[0m           - Relayed chat stream", RELAY_CHAT_PATH);
    println!("  \x1b[1mGET  /health\x1b[0m");
    println!("\nPress Ctrl+C to stop\n");

    info!("Relay service listening on {}, upstream {}", config.address, config.upstream_url);

    axum::serve(listener, app).await?;
    Ok(())
}
