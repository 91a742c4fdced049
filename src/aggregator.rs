use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::article::{self, Article, Recency, SourceTier};
use crate::clock::Clock;
use crate::config::{Config, Credentials};
use crate::error::{AggregateError, ProviderError};
use crate::fetcher::{Fetcher, Provider};
use crate::retry::RetryPolicy;
use crate::translate::Translator;

/// Something that can produce a fresh batch of articles.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn generate(&self) -> Result<Vec<Article>, AggregateError>;
}

pub struct Aggregator {
    fetcher: Fetcher,
    providers: Vec<Provider>,
    queries: Vec<String>,
    max_articles: usize,
    translator: Option<Translator>,
    clock: Arc<dyn Clock>,
}

impl Aggregator {
    pub fn new(
        config: &Config,
        credentials: &Credentials,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ProviderError> {
        let fetcher = Fetcher::new(RetryPolicy::from(&config.retry))?;

        let mut providers = Vec::new();
        match &credentials.newsapi {
            Some(key) => providers.push(Provider::newsapi(&config.providers.newsapi, key.clone())),
            None => warn!("NEWSAPI_KEY not set, NewsAPI disabled"),
        }
        match &credentials.gnews {
            Some(key) => providers.push(Provider::gnews(&config.providers.gnews, key.clone())),
            None => warn!("GNEWS_API_KEY not set, GNews disabled"),
        }

        let translator = match (config.translation.enabled, &credentials.openai) {
            (true, Some(key)) => Some(Translator::new(
                fetcher.client().clone(),
                &config.translation,
                key.clone(),
            )),
            (true, None) => {
                warn!("Translation enabled but OPENAI_API_KEY not set, serving untranslated");
                None
            }
            (false, _) => None,
        };

        Ok(Self {
            fetcher,
            providers,
            queries: config.aggregator.queries.clone(),
            max_articles: config.aggregator.max_articles,
            translator,
            clock,
        })
    }

    async fn collect(&self) -> Result<Vec<Article>, AggregateError> {
        if self.providers.is_empty() {
            return Err(AggregateError::NoCredentials);
        }

        let base_id = self.clock.now().timestamp_millis();
        let mut collected = Vec::new();
        let mut failures = 0;

        for provider in &self.providers {
            for query in &self.queries {
                match self.fetcher.fetch(provider, query).await {
                    Ok(items) => {
                        for item in items {
                            let id = base_id + collected.len() as i64;
                            if let Some(article) = item.normalize(id) {
                                collected.push(article);
                            }
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(
                            "{} request for '{}' failed: {}",
                            provider.kind.name(),
                            query,
                            e
                        );
                    }
                }
            }
        }

        info!(
            "Collected {} articles ({} failed requests)",
            collected.len(),
            failures
        );
        if collected.is_empty() {
            return Err(AggregateError::NoArticles);
        }
        Ok(collected)
    }
}

/// Run `source`, substituting the single fallback article on total failure.
pub async fn generate_or_fallback(source: &dyn NewsSource, clock: &dyn Clock) -> Vec<Article> {
    match source.generate().await {
        Ok(articles) => articles,
        Err(e) => {
            warn!("Aggregation failed, serving fallback article: {}", e);
            article::fallback_batch(clock.now())
        }
    }
}

/// Dedup, order, truncate, rank, classify and score a raw batch.
pub fn process(
    articles: Vec<Article>,
    max_articles: usize,
    now: chrono::DateTime<chrono::Utc>,
) -> Vec<Article> {
    let mut articles = article::dedup_by_title(articles);
    // Stable, so equal timestamps keep encounter order
    articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    articles.truncate(max_articles);

    for (index, item) in articles.iter_mut().enumerate() {
        item.rank = index + 1;
        item.category = article::classify(&item.title, &item.summary);
        item.importance = article::score_importance(
            SourceTier::of(&item.source),
            Recency::of(item.published_at, now),
            item.rank,
        );
    }
    articles
}

#[async_trait]
impl NewsSource for Aggregator {
    async fn generate(&self) -> Result<Vec<Article>, AggregateError> {
        info!("Generating fresh news batch");
        let collected = self.collect().await?;
        let articles = process(collected, self.max_articles, self.clock.now());

        let articles = match &self.translator {
            Some(translator) => translator.translate(articles).await,
            None => articles,
        };

        info!("Generated {} articles", articles.len());
        Ok(articles)
    }
}
