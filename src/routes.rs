use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::aggregator::{generate_or_fallback, NewsSource};
use crate::article::Article;
use crate::cache::CacheStore;
use crate::clock::Clock;
use crate::rss::RssRelay;
use crate::scheduler::RefreshScheduler;

const MAX_PAGE_SIZE: usize = 100;

pub struct AppState {
    pub cache: Arc<CacheStore>,
    pub source: Arc<dyn NewsSource>,
    pub scheduler: Arc<RefreshScheduler>,
    pub relay: RssRelay,
    pub clock: Arc<dyn Clock>,
    pub page_size: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/english-news", get(english_news))
        .route("/api/rss-proxy", get(rss_proxy))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Served straight from a valid cache
    Instant,
    /// The cache was corrupt and has been regenerated
    Recovered,
    /// There was no cache and one has been generated
    Initial,
}

#[derive(Deserialize)]
pub struct NewsQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsPage {
    pub articles: Vec<Article>,
    pub total: usize,
    pub page: usize,
    pub has_more: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub cache_status: CacheStatus,
    pub updated_at: String,
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Failed to load news",
                "message": self.0.to_string(),
            })),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

/// Items `[(page - 1) * limit, page * limit)` of `articles`, clipped to its
/// length, and whether anything follows.
pub fn paginate(articles: &[Article], page: usize, limit: usize) -> (Vec<Article>, bool) {
    let start = page.saturating_sub(1).saturating_mul(limit);
    let end = start.saturating_add(limit);
    let len = articles.len();
    (articles[start.min(len)..end.min(len)].to_vec(), end < len)
}

// Route handlers
pub async fn english_news(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewsQuery>,
) -> Result<Json<NewsPage>, AppError> {
    state.scheduler.start();

    let (articles, cache_status) = resolve_articles(&state).await?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(state.page_size).min(MAX_PAGE_SIZE);
    let (slice, has_more) = paginate(&articles, page, limit);

    Ok(Json(NewsPage {
        articles: slice,
        total: articles.len(),
        page,
        has_more,
        kind: "english_with_cache".to_string(),
        cache_status,
        updated_at: state.clock.now().to_rfc3339(),
    }))
}

/// Serve the cache when usable; otherwise generate synchronously. Staleness
/// alone never blocks the request.
async fn resolve_articles(state: &Arc<AppState>) -> anyhow::Result<(Vec<Article>, CacheStatus)> {
    if !state.cache.exists().await {
        info!("No cache found, generating initial news");
        let articles = regenerate(state).await?;
        return Ok((articles, CacheStatus::Initial));
    }

    match state.cache.load().await {
        Some(articles) => {
            info!("Serving {} cached articles", articles.len());
            Ok((articles, CacheStatus::Instant))
        }
        None => {
            info!("Cache corrupted, generating fresh news");
            let articles = regenerate(state).await?;
            Ok((articles, CacheStatus::Recovered))
        }
    }
}

/// Generation runs on its own task so a dropped request still saves its batch.
async fn regenerate(state: &Arc<AppState>) -> anyhow::Result<Vec<Article>> {
    let state = Arc::clone(state);
    let articles = tokio::spawn(async move {
        let articles = generate_or_fallback(state.source.as_ref(), state.clock.as_ref()).await;
        state.cache.save(&articles).await;
        articles
    })
    .await?;
    Ok(articles)
}

pub async fn rss_proxy(State(state): State<Arc<AppState>>) -> Response {
    match state.relay.fetch().await {
        Ok(xml) => (
            [
                (header::CONTENT_TYPE, "application/xml"),
                (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            ],
            xml,
        )
            .into_response(),
        Err(e) => {
            error!("RSS proxy error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch RSS feed" })),
            )
                .into_response()
        }
    }
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
