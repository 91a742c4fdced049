//! Single-slot file cache holding the latest article batch.
//!
//! A record is only valid with a non-empty `articles` list. Anything else
//! found on disk is deleted the first time it is read. Writes go to a sibling
//! temp file that is renamed over the cache, so readers never see a partial
//! record.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::article::Article;
use crate::clock::Clock;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub articles: Vec<Article>,
    /// Epoch milliseconds of the write
    pub timestamp: i64,
    pub generated_at: String,
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Deserialize)]
struct CacheStamp {
    timestamp: i64,
}

pub struct CacheStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        match tokio::fs::try_exists(&self.path).await {
            Ok(exists) => exists,
            Err(e) => {
                error!("Failed to check cache file {}: {}", self.path.display(), e);
                false
            }
        }
    }

    /// True when the cache is missing, unreadable, or at least `max_age` old.
    pub async fn is_stale(&self, max_age: Duration) -> bool {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(_) => return true,
        };
        let stamp: CacheStamp = match serde_json::from_slice(&content) {
            Ok(stamp) => stamp,
            Err(e) => {
                warn!("Cache file is unreadable, treating as stale: {}", e);
                return true;
            }
        };

        let age_ms = self.clock.now().timestamp_millis() - stamp.timestamp;
        age_ms >= max_age.as_millis() as i64
    }

    /// Load the cached batch. A corrupt or empty record is deleted and
    /// `None` is returned.
    pub async fn load(&self) -> Option<Vec<Article>> {
        let result = match tokio::fs::read(&self.path).await {
            Ok(content) => serde_json::from_slice::<CacheRecord>(&content)
                .map_err(|e| e.to_string())
                .and_then(|record| {
                    if record.articles.is_empty() {
                        Err("cache holds no articles".to_string())
                    } else {
                        Ok(record.articles)
                    }
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(articles) => {
                info!("Loaded {} cached articles", articles.len());
                Some(articles)
            }
            Err(reason) => {
                warn!("Invalid cache file {}: {}", self.path.display(), reason);
                self.discard().await;
                None
            }
        }
    }

    /// Replace the cache with a new record. Failures are logged only.
    pub async fn save(&self, articles: &[Article]) {
        let now = self.clock.now();
        let record = CacheRecord {
            articles: articles.to_vec(),
            timestamp: now.timestamp_millis(),
            generated_at: now.to_rfc3339(),
        };

        let json = match serde_json::to_vec_pretty(&record) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize cache record: {}", e);
                return;
            }
        };

        let temp = self.temp_path();
        if let Err(e) = tokio::fs::write(&temp, json).await {
            error!("Failed to write cache file {}: {}", temp.display(), e);
            let _ = tokio::fs::remove_file(&temp).await;
            return;
        }

        match tokio::fs::rename(&temp, &self.path).await {
            Ok(()) => info!("Saved {} articles to cache", articles.len()),
            Err(e) => {
                error!("Failed to replace cache file {}: {}", self.path.display(), e);
                let _ = tokio::fs::remove_file(&temp).await;
            }
        }
    }

    /// Unique per write so concurrent saves never share a temp file.
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cache".to_string());
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        self.path
            .with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), seq))
    }

    async fn discard(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => info!("Deleted corrupt cache file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => error!("Failed to delete corrupt cache file: {}", e),
        }
    }
}
