use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsdesk::aggregator::{Aggregator, NewsSource};
use newsdesk::cache::CacheStore;
use newsdesk::clock::{Clock, SystemClock};
use newsdesk::config::{Config, Credentials};
use newsdesk::routes::{self, AppState};
use newsdesk::rss::RssRelay;
use newsdesk::scheduler::RefreshScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsdesk=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("NEWSDESK_CONFIG").unwrap_or_else(|_| "newsdesk.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path)?
    } else {
        warn!("{} not found, using default configuration", config_path);
        Config::default()
    };
    let credentials = Credentials::from_env();
    info!("Loaded configuration: {:?}", credentials);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = Arc::new(CacheStore::new(config.cache.path.clone(), clock.clone()));

    let aggregator = Aggregator::new(&config, &credentials, clock.clone())?;
    let source: Arc<dyn NewsSource> = Arc::new(aggregator);

    let scheduler = Arc::new(RefreshScheduler::new(
        source.clone(),
        cache.clone(),
        config.refresh_interval(),
        config.cache.max_age(),
    ));
    scheduler.start();

    // Warm the cache without holding up the listener
    let warmup = scheduler.clone();
    tokio::spawn(async move {
        info!("Starting initial refresh");
        let outcome = warmup.refresh_if_stale().await;
        info!("Initial refresh finished: {:?}", outcome);
    });

    let state = Arc::new(AppState {
        cache,
        source,
        scheduler,
        relay: RssRelay::new(reqwest::Client::new(), config.rss.url.clone()),
        clock,
        page_size: config.page_size,
    });

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("Server starting on http://{}", config.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
