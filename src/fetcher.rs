use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info};

use crate::article::{Article, Category, Importance};
use crate::config::{GNewsConfig, NewsApiConfig};
use crate::error::ProviderError;
use crate::retry::{RetryPolicy, Retryable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    NewsApi,
    GNews,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::NewsApi => "NewsAPI",
            ProviderKind::GNews => "GNews",
        }
    }
}

/// One configured upstream news API.
#[derive(Clone)]
pub struct Provider {
    pub kind: ProviderKind,
    base_url: String,
    api_key: String,
    page_size: u32,
    language: String,
}

impl Provider {
    pub fn newsapi(config: &NewsApiConfig, api_key: String) -> Self {
        Self {
            kind: ProviderKind::NewsApi,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            page_size: config.page_size,
            language: config.language.clone(),
        }
    }

    pub fn gnews(config: &GNewsConfig, api_key: String) -> Self {
        Self {
            kind: ProviderKind::GNews,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            page_size: config.page_size,
            language: config.language.clone(),
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsApiArticle {
    #[serde(default)]
    pub source: NewsApiSource,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsApiSource {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GNewsResponse {
    #[serde(default)]
    articles: Vec<GNewsArticle>,
    errors: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GNewsArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub published_at: Option<String>,
    #[serde(default)]
    pub source: GNewsSource,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GNewsSource {
    pub name: Option<String>,
}

/// An item as returned by one of the upstream APIs.
#[derive(Debug, Clone)]
pub enum ProviderArticle {
    NewsApi(NewsApiArticle),
    GNews(GNewsArticle),
}

impl ProviderArticle {
    /// Map into the common article shape. Rank, category and importance are
    /// placeholders until the aggregator assigns them.
    pub fn normalize(self, id: i64) -> Option<Article> {
        let (title, summary, content, source, published_at, url, url_to_image) = match self {
            ProviderArticle::NewsApi(a) => {
                if a.title.as_deref() == Some("[Removed]") {
                    return None;
                }
                (
                    a.title,
                    a.description,
                    a.content,
                    a.source.name.unwrap_or_else(|| ProviderKind::NewsApi.name().to_string()),
                    a.published_at,
                    a.url,
                    a.url_to_image,
                )
            }
            ProviderArticle::GNews(a) => (
                a.title,
                a.description,
                a.content,
                a.source.name.unwrap_or_else(|| ProviderKind::GNews.name().to_string()),
                a.published_at,
                a.url,
                a.image,
            ),
        };

        let title = non_blank(title)?;
        let published_at = match published_at.as_deref().map(parse_timestamp) {
            Some(Some(ts)) => ts,
            _ => {
                debug!("Skipping '{}': missing or invalid publishedAt", title);
                return None;
            }
        };
        let summary = non_blank(summary).unwrap_or_default();
        let full_content = non_blank(content).unwrap_or_else(|| summary.clone());

        Some(Article {
            id,
            rank: 0,
            title,
            summary,
            full_content,
            importance: Importance::Low,
            source,
            category: Category::Top,
            published_at,
            url: non_blank(url),
            url_to_image: non_blank(url_to_image),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// HTTP client shared by all providers.
pub struct Fetcher {
    client: Client,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(retry: RetryPolicy) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Newsdesk/1.0 (News Aggregator)")
            .build()?;

        Ok(Self { client, retry })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn fetch(
        &self,
        provider: &Provider,
        query: &str,
    ) -> Result<Vec<ProviderArticle>, ProviderError> {
        info!("Fetching {} results for '{}'", provider.kind.name(), query);
        self.retry
            .run(|| self.fetch_once(provider, query))
            .await
    }

    async fn fetch_once(
        &self,
        provider: &Provider,
        query: &str,
    ) -> Result<Vec<ProviderArticle>, ProviderError> {
        let page_size = provider.page_size.to_string();
        match provider.kind {
            ProviderKind::NewsApi => {
                let response = self
                    .client
                    .get(format!("{}/v2/everything", provider.base_url))
                    .header("X-Api-Key", &provider.api_key)
                    .query(&[
                        ("q", query),
                        ("language", provider.language.as_str()),
                        ("sortBy", "publishedAt"),
                        ("pageSize", page_size.as_str()),
                    ])
                    .send()
                    .await?;
                let body = Self::read_body(response).await?;
                Self::parse_newsapi(&body)
            }
            ProviderKind::GNews => {
                let response = self
                    .client
                    .get(format!("{}/api/v4/search", provider.base_url))
                    .query(&[
                        ("q", query),
                        ("lang", provider.language.as_str()),
                        ("max", page_size.as_str()),
                        ("apikey", provider.api_key.as_str()),
                    ])
                    .send()
                    .await?;
                let body = Self::read_body(response).await?;
                Self::parse_gnews(&body)
            }
        }
    }

    /// Returns the body of a successful response. Error responses become
    /// `Status` when worth retrying and otherwise keep the body for the
    /// provider-specific parser to turn into an `Api` error.
    async fn read_body(response: Response) -> Result<Vec<u8>, ProviderError> {
        let status = response.status();
        let bytes = response.bytes().await?;
        if status.is_success() {
            return Ok(bytes.to_vec());
        }

        let err = ProviderError::Status(status);
        if err.is_retryable() || serde_json::from_slice::<serde_json::Value>(&bytes).is_err() {
            return Err(err);
        }
        Ok(bytes.to_vec())
    }

    pub fn parse_newsapi(body: &[u8]) -> Result<Vec<ProviderArticle>, ProviderError> {
        let parsed: NewsApiResponse = serde_json::from_slice(body)?;
        if parsed.status != "ok" {
            return Err(ProviderError::Api {
                code: parsed.code.unwrap_or_else(|| "unknown".to_string()),
                message: parsed.message.unwrap_or_else(|| "Unknown error".to_string()),
            });
        }
        Ok(parsed
            .articles
            .into_iter()
            .map(ProviderArticle::NewsApi)
            .collect())
    }

    pub fn parse_gnews(body: &[u8]) -> Result<Vec<ProviderArticle>, ProviderError> {
        let parsed: GNewsResponse = serde_json::from_slice(body)?;
        if let Some(errors) = parsed.errors {
            let message = match errors {
                serde_json::Value::Array(items) => items
                    .iter()
                    .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
                    .collect::<Vec<_>>()
                    .join("; "),
                other => other.to_string(),
            };
            return Err(ProviderError::Api {
                code: "gnews".to_string(),
                message,
            });
        }
        Ok(parsed
            .articles
            .into_iter()
            .map(ProviderArticle::GNews)
            .collect())
    }
}
