//! Optional rewrite of article text through a hosted chat-completion model.
//!
//! Articles are sent in fixed-size batches. A batch whose response cannot be
//! used keeps its original text; the other batches are unaffected.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::article::Article;
use crate::config::TranslationConfig;
use crate::error::TranslateError;

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceText<'a> {
    index: usize,
    title: &'a str,
    summary: &'a str,
    full_content: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslatedBatch {
    articles: Vec<TranslatedText>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedText {
    pub index: usize,
    pub title: String,
    pub summary: String,
    pub full_content: String,
}

pub struct Translator {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    target_language: String,
    batch_size: usize,
}

impl Translator {
    pub fn new(client: Client, config: &TranslationConfig, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            target_language: config.target_language.clone(),
            batch_size: config.batch_size.max(1),
        }
    }

    pub async fn translate(&self, articles: Vec<Article>) -> Vec<Article> {
        let total_batches = articles.len().div_ceil(self.batch_size);
        let mut translated = Vec::with_capacity(articles.len());
        let mut failed = 0;

        for (n, batch) in articles.chunks(self.batch_size).enumerate() {
            match self.translate_batch(batch).await {
                Ok(texts) => translated.extend(splice(batch, texts)),
                Err(e) => {
                    failed += 1;
                    warn!(
                        "Translation batch {}/{} failed, keeping originals: {}",
                        n + 1,
                        total_batches,
                        e
                    );
                    translated.extend_from_slice(batch);
                }
            }
        }

        info!(
            "Translated {} of {} batches into {}",
            total_batches - failed,
            total_batches,
            self.target_language
        );
        translated
    }

    async fn translate_batch(&self, batch: &[Article]) -> Result<Vec<TranslatedText>, TranslateError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: format!(
                        "You are a professional news editor. Translate news articles into {} \
                         accurately and naturally, keeping names, numbers and facts unchanged.",
                        self.target_language
                    ),
                },
                ChatMessage {
                    role: "user",
                    content: self.prompt(batch)?,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TranslateError::Status(response.status()));
        }

        let response: ChatResponse = response.json().await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(TranslateError::EmptyCompletion)?;

        parse_batch(&content, batch.len())
    }

    fn prompt(&self, batch: &[Article]) -> Result<String, TranslateError> {
        let sources: Vec<SourceText> = batch
            .iter()
            .enumerate()
            .map(|(index, article)| SourceText {
                index,
                title: &article.title,
                summary: &article.summary,
                full_content: &article.full_content,
            })
            .collect();

        Ok(format!(
            "Translate the title, summary and fullContent of each article below into {}.\n\
             Return ONLY JSON of the form \
             {{\"articles\": [{{\"index\": 0, \"title\": \"...\", \"summary\": \"...\", \"fullContent\": \"...\"}}]}} \
             with exactly one entry per input index.\n\n{}",
            self.target_language,
            serde_json::to_string_pretty(&sources)?
        ))
    }
}

/// Parse a model response for a batch of `expected` articles. Every index
/// must appear exactly once.
pub fn parse_batch(content: &str, expected: usize) -> Result<Vec<TranslatedText>, TranslateError> {
    let parsed: TranslatedBatch = serde_json::from_str(content)?;
    let mut texts = parsed.articles;

    texts.sort_by_key(|t| t.index);
    let complete = texts.len() == expected && texts.iter().enumerate().all(|(i, t)| t.index == i);
    if !complete {
        return Err(TranslateError::CountMismatch {
            expected,
            actual: texts.len(),
        });
    }
    Ok(texts)
}

fn splice(batch: &[Article], texts: Vec<TranslatedText>) -> Vec<Article> {
    batch
        .iter()
        .zip(texts)
        .map(|(article, text)| Article {
            title: text.title,
            summary: text.summary,
            full_content: text.full_content,
            ..article.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::{Category, Importance};
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn article(n: usize) -> Article {
        Article {
            id: n as i64,
            rank: n,
            title: format!("Title {}", n),
            summary: format!("Summary {}", n),
            full_content: format!("Content {}", n),
            importance: Importance::Moderate,
            source: "Reuters".to_string(),
            category: Category::Top,
            published_at: Utc::now(),
            url: Some(format!("https://example.com/{}", n)),
            url_to_image: None,
        }
    }

    fn translator(base_url: &str, batch_size: usize) -> Translator {
        let config = TranslationConfig {
            enabled: true,
            base_url: base_url.to_string(),
            batch_size,
            ..TranslationConfig::default()
        };
        Translator::new(Client::new(), &config, "sk-test".to_string())
    }

    fn completion(content: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": content.to_string() } }]
        }))
    }

    mod parse_batch_tests {
        use super::*;

        #[test]
        fn test_parse_out_of_order_indices() {
            let content = json!({
                "articles": [
                    { "index": 1, "title": "B", "summary": "b", "fullContent": "bb" },
                    { "index": 0, "title": "A", "summary": "a", "fullContent": "aa" }
                ]
            })
            .to_string();

            let texts = parse_batch(&content, 2).unwrap();
            assert_eq!(texts[0].title, "A");
            assert_eq!(texts[1].title, "B");
        }

        #[test]
        fn test_missing_entry_is_rejected() {
            let content = json!({
                "articles": [{ "index": 0, "title": "A", "summary": "a", "fullContent": "aa" }]
            })
            .to_string();

            assert!(matches!(
                parse_batch(&content, 2),
                Err(TranslateError::CountMismatch {
                    expected: 2,
                    actual: 1
                })
            ));
        }

        #[test]
        fn test_duplicate_index_is_rejected() {
            let content = json!({
                "articles": [
                    { "index": 0, "title": "A", "summary": "a", "fullContent": "aa" },
                    { "index": 0, "title": "A2", "summary": "a", "fullContent": "aa" }
                ]
            })
            .to_string();

            assert!(parse_batch(&content, 2).is_err());
        }

        #[test]
        fn test_non_json_is_rejected() {
            assert!(matches!(
                parse_batch("Sure! Here is the translation", 1),
                Err(TranslateError::Malformed(_))
            ));
        }
    }

    mod translate_tests {
        use super::*;

        #[tokio::test]
        async fn test_translates_all_batches() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .and(header("Authorization", "Bearer sk-test"))
                .respond_with(completion(json!({
                    "articles": [
                        { "index": 0, "title": "Заголовок", "summary": "Резюме", "fullContent": "Текст" }
                    ]
                })))
                .expect(2)
                .mount(&server)
                .await;

            let result = translator(&server.uri(), 1)
                .translate(vec![article(1), article(2)])
                .await;

            assert_eq!(result.len(), 2);
            assert!(result.iter().all(|a| a.title == "Заголовок"));
            assert_eq!(result[0].id, 1);
            assert_eq!(result[1].url.as_deref(), Some("https://example.com/2"));
        }

        #[tokio::test]
        async fn test_failed_batch_keeps_originals() {
            let server = MockServer::start().await;
            // The batch containing "Title 3" gets a server error
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .and(body_string_contains("Title 3"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .respond_with(completion(json!({
                    "articles": [
                        { "index": 0, "title": "T0", "summary": "S0", "fullContent": "C0" },
                        { "index": 1, "title": "T1", "summary": "S1", "fullContent": "C1" }
                    ]
                })))
                .mount(&server)
                .await;

            let articles = vec![article(1), article(2), article(3), article(4)];
            let result = translator(&server.uri(), 2).translate(articles).await;

            assert_eq!(result.len(), 4);
            assert_eq!(result[0].title, "T0");
            assert_eq!(result[1].title, "T1");
            assert_eq!(result[2].title, "Title 3");
            assert_eq!(result[3].title, "Title 4");
        }

        #[tokio::test]
        async fn test_empty_completion_keeps_originals() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
                .mount(&server)
                .await;

            let original = article(1);
            let result = translator(&server.uri(), 5)
                .translate(vec![original.clone()])
                .await;
            assert_eq!(result, vec![original]);
        }
    }
}
