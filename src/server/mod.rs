//! Read-only JSON API over the post repository

use anyhow::Result;
use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::content::{MarkdownRenderer, PostMeta, PostRepository, RenderedPost};
use crate::ratelimit::{Decision, RateLimiter};
use crate::Site;

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// How often closed rate-limit windows are dropped
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    repository: Arc<PostRepository>,
    renderer: Arc<MarkdownRenderer>,
    limiter: Option<RateLimiter>,
}

impl AppState {
    pub fn new(
        repository: PostRepository,
        renderer: MarkdownRenderer,
        limiter: Option<RateLimiter>,
    ) -> Self {
        Self {
            repository: Arc::new(repository),
            renderer: Arc::new(renderer),
            limiter,
        }
    }

    /// Build state from a site's configuration
    pub fn from_site(site: &Site) -> Result<Self> {
        Ok(Self::new(
            site.repository()?,
            site.renderer(),
            RateLimiter::from_config(&site.config.rate_limit),
        ))
    }
}

/// API errors rendered as `{ "error": ... }`
#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        tracing::error!("Repository task failed: {}", e);
        ApiError::Internal("internal error".to_string())
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/:slug", get(get_post))
        .route("/slugs", get(list_slugs))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the API server and run until Ctrl+C
pub async fn start(site: &Site, ip: &str, port: u16) -> Result<()> {
    let state = AppState::from_site(site)?;

    if let Some(limiter) = state.limiter.clone() {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PURGE_INTERVAL);
            loop {
                interval.tick().await;
                limiter.purge_expired(Utc::now());
            }
        });
    }

    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Serving posts from {:?}", site.content_dir);
    println!("API running at http://{}:{}/api/posts", ip, port);
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<PostMeta>>, ApiError> {
    let repository = state.repository.clone();
    let posts = tokio::task::spawn_blocking(move || repository.get_all_posts()).await?;
    Ok(Json(posts))
}

async fn list_slugs(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let repository = state.repository.clone();
    let slugs = tokio::task::spawn_blocking(move || repository.get_all_post_slugs()).await?;
    Ok(Json(slugs))
}

async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<RenderedPost>, ApiError> {
    let repository = state.repository.clone();
    let renderer = state.renderer.clone();
    let lookup = slug.clone();

    let post = tokio::task::spawn_blocking(move || {
        repository
            .get_post_by_slug(&lookup)
            .map(|post| renderer.render_post(post))
    })
    .await?;

    post.map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("post {:?} not found", slug)))
}

/// Rate-limit middleware for `/api` routes
async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(limiter) = &state.limiter else {
        return next.run(req).await;
    };

    let key = client_key(req.headers());
    match limiter.check(&key, Utc::now()) {
        Decision::Allowed {
            limit, remaining, ..
        } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
            response
        }
        Decision::Limited {
            limit, retry_after, ..
        } => {
            tracing::warn!("Rate limit exceeded for {}", key);
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "too many requests, try again later" })),
            )
                .into_response();
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(0u32));
            response
        }
    }
}

/// Identify the client: first `X-Forwarded-For` hop, then `X-Real-IP`
fn client_key(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get(X_REAL_IP)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or("anonymous")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::RepositoryOptions;
    use axum::body::Body;
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const POST: &str = r#"---
title: Hello API
description: Served over HTTP
pubDate: 2024-02-20
heroImage: https://cdn.example.com/hello.png
category: News
tags: rust, http
---

Hello from the **API**. This body has well over fifty characters in it.
"#;

    fn app(limiter: Option<RateLimiter>) -> (TempDir, Router) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("hello.md"), POST).unwrap();
        fs::write(dir.path().join("broken.md"), "nothing to see").unwrap();

        let repository = PostRepository::new(dir.path(), RepositoryOptions::default());
        let state = AppState::new(repository, MarkdownRenderer::new(), limiter);
        (dir, router(state))
    }

    async fn get_json(app: &Router, uri: &str, ip: &str) -> (StatusCode, HeaderMap, serde_json::Value) {
        let request = axum::http::Request::builder()
            .uri(uri)
            .header(X_FORWARDED_FOR, ip)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap();
        (status, headers, json)
    }

    #[tokio::test]
    async fn test_list_posts() {
        let (_dir, app) = app(None);

        let (status, _, json) = get_json(&app, "/api/posts", "10.0.0.1").await;
        assert_eq!(status, StatusCode::OK);
        let posts = json.as_array().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["slug"], "hello-api");
        assert_eq!(posts[0]["pubDate"], "2024-02-20T00:00:00.000Z");
        assert_eq!(posts[0]["tags"], json!(["rust", "http"]));
        assert!(posts[0].get("content").is_none());
    }

    #[tokio::test]
    async fn test_list_slugs() {
        let (_dir, app) = app(None);

        let (status, _, json) = get_json(&app, "/api/slugs", "10.0.0.1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!(["broken", "hello"]));
    }

    #[tokio::test]
    async fn test_get_post_renders_html() {
        let (_dir, app) = app(None);

        let (status, _, json) = get_json(&app, "/api/posts/hello", "10.0.0.1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["title"], "Hello API");
        assert!(json["content"].as_str().unwrap().starts_with("Hello from"));
        assert!(json["html"]
            .as_str()
            .unwrap()
            .contains("<strong>API</strong>"));
    }

    #[tokio::test]
    async fn test_listed_slug_is_fetchable() {
        let (_dir, app) = app(None);

        let (_, _, posts) = get_json(&app, "/api/posts", "10.0.0.1").await;
        let slug = posts[0]["slug"].as_str().unwrap().to_string();
        assert_eq!(slug, "hello-api");

        let (status, _, json) = get_json(&app, &format!("/api/posts/{}", slug), "10.0.0.1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["slug"], "hello-api");
        assert_eq!(json["source"], "hello.md");
    }

    #[tokio::test]
    async fn test_missing_post_is_404() {
        let (_dir, app) = app(None);

        for uri in ["/api/posts/does-not-exist", "/api/posts/broken"] {
            let (status, _, json) = get_json(&app, uri, "10.0.0.1").await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert!(json["error"].as_str().unwrap().contains("not found"));
        }
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let limiter = RateLimiter::in_memory(2, chrono::Duration::seconds(60));
        let (_dir, app) = app(Some(limiter));

        let (status, headers, _) = get_json(&app, "/api/slugs", "10.0.0.1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[&X_RATELIMIT_REMAINING], "1");

        let (status, _, _) = get_json(&app, "/api/slugs", "10.0.0.1, 172.16.0.1").await;
        assert_eq!(status, StatusCode::OK);

        let (status, headers, json) = get_json(&app, "/api/posts", "10.0.0.1").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(headers.contains_key(header::RETRY_AFTER));
        assert!(json["error"].is_string());

        // Other clients and the health check are unaffected
        let (status, _, _) = get_json(&app, "/api/slugs", "10.0.0.2").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, json) = get_json(&app, "/health", "10.0.0.1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[test]
    fn test_client_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers), "anonymous");

        headers.insert(X_REAL_IP, HeaderValue::from_static("192.168.1.9"));
        assert_eq!(client_key(&headers), "192.168.1.9");

        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
        assert_eq!(client_key(&headers), "203.0.113.7");
    }
}
