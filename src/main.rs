mod api;
mod config;
mod db;
mod error;
mod frontend;
mod models;
mod services;

use crate::api::AppState;
use crate::config::Config;
use crate::services::{
    AuthService, Cache, DuplicateScanner, ExtensionTokenService, LastfmClient, ReleaseTracker,
    SpotifyClient,
};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sushe_online=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Connect to database
    let db = db::connect_pool(&config.database_url, 50).await?;
    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("Database migrations completed");

    // Connect to Redis (the app degrades gracefully without it)
    let cache = Cache::connect(&config.redis_url).await;

    // Initialize services
    let auth_service = Arc::new(AuthService::new(db.clone(), &config));
    let extension_tokens = Arc::new(ExtensionTokenService::new(
        db.clone(),
        config.extension_token_ttl_days,
    ));
    let lastfm = Arc::new(LastfmClient::new(config.lastfm_api_key.clone(), cache.clone()));
    let spotify = Arc::new(SpotifyClient::new(
        config.spotify_client_id.clone(),
        config.spotify_client_secret.clone(),
        cache,
    ));
    let scanner = Arc::new(DuplicateScanner::new(db.clone()));
    let release_tracker = Arc::new(ReleaseTracker::new(db.clone(), spotify.clone()));

    let state = Arc::new(AppState {
        db,
        auth_service,
        extension_tokens,
        lastfm,
        spotify,
        scanner,
        release_tracker: release_tracker.clone(),
    });

    // Keep the new-release feed fresh in the background
    release_tracker.spawn_periodic(config.new_releases_refresh_hours);

    let app = build_router(state, &config.cors_origins);

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let origins: Vec<String> = cors_origins.to_vec();

    Router::new()
        // API routes
        .nest(
            "/api",
            Router::new()
                .nest("/auth", api::auth_routes())
                .nest("/extension", api::extension_routes())
                .merge(api::list_routes())
                .merge(api::pick_routes())
                .merge(api::search_routes())
                .merge(api::release_routes()),
        )
        .nest("/admin/api", api::admin_routes())
        .merge(api::health_routes())
        // Frontend SPA - catch-all route (must be last)
        .fallback(get(frontend::serve_frontend))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(
                    move |origin: &HeaderValue, _| {
                        origin
                            .to_str()
                            .map(|o| origin_allowed(o, &origins))
                            .unwrap_or(false)
                    },
                ))
                .allow_private_network(true)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        )
        .with_state(state)
}

/// The extension and LAN clients get CORS access without configuration:
/// browser-extension origins, localhost and RFC1918 hosts are always
/// allowed, on top of the configured allow-list.
fn origin_allowed(origin: &str, allowed: &[String]) -> bool {
    let origin = origin.trim_end_matches('/');

    if allowed.iter().any(|a| a == origin) {
        return true;
    }

    if origin.starts_with("chrome-extension://") || origin.starts_with("moz-extension://") {
        return true;
    }

    let Some(host) = origin_host(origin) else {
        return false;
    };

    if host == "localhost" {
        return true;
    }

    match host.parse::<Ipv4Addr>() {
        Ok(ip) => is_private_ipv4(ip),
        Err(_) => false,
    }
}

fn origin_host(origin: &str) -> Option<&str> {
    let rest = origin.split_once("://")?.1;
    let rest = rest.split('/').next()?;
    Some(rest.rsplit_once(':').map(|(host, _)| host).unwrap_or(rest))
}

fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_origins_are_allowed() {
        let allowed = vec!["https://sushe.example.com".to_string()];
        assert!(origin_allowed("https://sushe.example.com", &allowed));
        assert!(origin_allowed("https://sushe.example.com/", &allowed));
        assert!(!origin_allowed("https://evil.example.com", &allowed));
    }

    #[test]
    fn extension_origins_are_always_allowed() {
        assert!(origin_allowed(
            "chrome-extension://abcdefghijklmnopabcdefghijklmnop",
            &[]
        ));
        assert!(origin_allowed("moz-extension://some-uuid", &[]));
    }

    #[test]
    fn localhost_and_private_networks_are_allowed() {
        assert!(origin_allowed("http://localhost:3000", &[]));
        assert!(origin_allowed("http://127.0.0.1:8000", &[]));
        assert!(origin_allowed("http://192.168.1.20", &[]));
        assert!(origin_allowed("http://10.0.0.5:8080", &[]));
        assert!(origin_allowed("http://172.20.1.2", &[]));
    }

    #[test]
    fn public_origins_are_rejected() {
        assert!(!origin_allowed("http://8.8.8.8", &[]));
        assert!(!origin_allowed("https://example.com", &[]));
        assert!(!origin_allowed("not-an-origin", &[]));
        assert!(!origin_allowed("http://172.32.0.1", &[]));
    }
}
