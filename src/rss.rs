use axum::body::Bytes;
use reqwest::Client;
use tracing::info;

use crate::error::ProviderError;

/// Fetches a remote RSS document and hands back the body untouched.
pub struct RssRelay {
    client: Client,
    url: String,
}

impl RssRelay {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub async fn fetch(&self) -> Result<Bytes, ProviderError> {
        info!("Fetching RSS feed: {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .header(
                reqwest::header::USER_AGENT,
                "Mozilla/5.0 (compatible; NewsAggregator/1.0)",
            )
            .header(
                reqwest::header::ACCEPT,
                "application/rss+xml, application/xml, text/xml",
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status));
        }

        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Feed</title>
<item><title>Первая новость</title><link>https://example.com/1</link></item>
</channel></rss>"#;

    #[tokio::test]
    async fn test_relays_body_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss/news"))
            .and(header("Accept", "application/rss+xml, application/xml, text/xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .expect(1)
            .mount(&server)
            .await;

        let relay = RssRelay::new(Client::new(), format!("{}/rss/news", server.uri()));

        assert_eq!(relay.fetch().await.unwrap(), FEED.as_bytes());
    }

    #[tokio::test]
    async fn test_non_utf8_body_is_untouched() {
        // windows-1251 "Новости"
        let body: Vec<u8> = b"<rss><title>\xCD\xEE\xE2\xEE\xF1\xF2\xE8</title></rss>".to_vec();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let relay = RssRelay::new(Client::new(), format!("{}/rss/news", server.uri()));

        assert_eq!(relay.fetch().await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_upstream_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let relay = RssRelay::new(Client::new(), format!("{}/rss/news", server.uri()));

        assert!(matches!(
            relay.fetch().await,
            Err(ProviderError::Status(s)) if s.as_u16() == 404
        ));
    }
}
