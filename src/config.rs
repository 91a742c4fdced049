use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Background refresh interval in minutes
    pub refresh_interval: u64,
    /// Default number of articles per page
    pub page_size: usize,
    pub bind: String,
    pub cache: CacheConfig,
    pub aggregator: AggregatorConfig,
    pub providers: ProvidersConfig,
    pub translation: TranslationConfig,
    pub retry: RetryConfig,
    pub rss: RssConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            page_size: 30,
            bind: "0.0.0.0:5000".to_string(),
            cache: CacheConfig::default(),
            aggregator: AggregatorConfig::default(),
            providers: ProvidersConfig::default(),
            translation: TranslationConfig::default(),
            retry: RetryConfig::default(),
            rss: RssConfig::default(),
        }
    }
}

fn default_refresh_interval() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub path: PathBuf,
    /// Maximum cache age in minutes before it counts as stale
    pub max_age: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("news-cache.json"),
            max_age: 15,
        }
    }
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age * 60)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AggregatorConfig {
    pub queries: Vec<String>,
    pub max_articles: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            queries: vec![
                "Ukraine Russia".to_string(),
                "Trump foreign policy".to_string(),
                "peace talks".to_string(),
                "humanitarian crisis".to_string(),
            ],
            max_articles: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    pub newsapi: NewsApiConfig,
    pub gnews: GNewsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NewsApiConfig {
    pub base_url: String,
    pub page_size: u32,
    pub language: String,
}

impl Default for NewsApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://newsapi.org".to_string(),
            page_size: 20,
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GNewsConfig {
    pub base_url: String,
    pub page_size: u32,
    pub language: String,
}

impl Default for GNewsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gnews.io".to_string(),
            page_size: 10,
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TranslationConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub target_language: String,
    pub batch_size: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            target_language: "Russian".to_string(),
            batch_size: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RssConfig {
    pub url: String,
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            url: "https://meduza.io/rss/news".to_string(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval * 60)
    }
}

/// API keys for the upstream providers. Read from the environment only.
#[derive(Clone, Default)]
pub struct Credentials {
    pub newsapi: Option<String>,
    pub gnews: Option<String>,
    pub openai: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            newsapi: non_empty_env("NEWSAPI_KEY"),
            gnews: non_empty_env("GNEWS_API_KEY"),
            openai: non_empty_env("OPENAI_API_KEY"),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("newsapi", &mask(&self.newsapi))
            .field("gnews", &mask(&self.gnews))
            .field("openai", &mask(&self.openai))
            .finish()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
