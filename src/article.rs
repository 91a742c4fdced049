//! The article model shared by the aggregator, the cache and the HTTP layer,
//! plus the keyword classifier and the importance table.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub rank: usize,
    pub title: String,
    pub summary: String,
    pub full_content: String,
    pub importance: Importance,
    pub source: String,
    pub category: Category,
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_to_image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Top")]
    Top,
    #[serde(rename = "Ukraine-Russia")]
    UkraineRussia,
    #[serde(rename = "Trump Politics")]
    TrumpPolitics,
    #[serde(rename = "Peace Efforts")]
    PeaceEfforts,
    #[serde(rename = "Anti-war Movement")]
    AntiWarMovement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Importance {
    Low,
    Moderate,
    High,
    Breaking,
}

/// Ordered keyword rules. The first rule with any matching stem wins, so
/// conflict stems are checked before peace and diplomacy stems.
const CATEGORY_RULES: &[(Category, &[&str])] = &[
    (
        Category::UkraineRussia,
        &[
            "украин", "росси", "путин", "киев", "москв", "война", "конфликт", "санкции",
            "ukraine", "russia", "putin", "kiev", "kyiv", "moscow", "war",
        ],
    ),
    (
        Category::TrumpPolitics,
        &[
            "трамп", "дональд", "выборы", "кампания", "республиканск", "внешн",
            "trump", "donald", "election", "campaign", "republican",
        ],
    ),
    (
        Category::PeaceEfforts,
        &[
            "мир", "перемирие", "гуманитарн", "беженц", "помощь", "гражданск", "дипломат",
            "переговор", "peace", "ceasefire", "humanitarian", "refugee", "civilian",
            "diplomat", "negotiat",
        ],
    ),
    (
        Category::AntiWarMovement,
        &[
            "протест", "антивоенн", "активизм", "движение", "демонстрац", "марш мира",
            "protest", "anti-war", "activism", "movement", "demonstration",
        ],
    ),
];

pub fn classify(title: &str, summary: &str) -> Category {
    let content = format!("{} {}", title, summary).to_lowercase();

    CATEGORY_RULES
        .iter()
        .find(|(_, stems)| stems.iter().any(|stem| content.contains(stem)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Top)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceTier {
    Other,
    Established,
    HighlyCredible,
}

const HIGHLY_CREDIBLE_SOURCES: &[&str] = &[
    "reuters",
    "associated press",
    "ap news",
    "bbc",
    "npr",
    "bloomberg",
    "financial times",
    "the guardian",
    "al jazeera",
];

const ESTABLISHED_SOURCES: &[&str] = &[
    "cnn",
    "abc news",
    "the washington post",
    "the new york times",
    "the wall street journal",
    "politico",
    "newsweek",
    "foreign policy",
    "u.s. news",
    "fox news",
];

impl SourceTier {
    pub fn of(source: &str) -> Self {
        let source = source.to_lowercase();
        if HIGHLY_CREDIBLE_SOURCES.iter().any(|s| source.contains(s)) {
            SourceTier::HighlyCredible
        } else if ESTABLISHED_SOURCES.iter().any(|s| source.contains(s)) {
            SourceTier::Established
        } else {
            SourceTier::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recency {
    Fresh,
    Recent,
    Older,
}

impl Recency {
    pub fn of(published_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let age = now - published_at;
        if age <= Duration::hours(6) {
            Recency::Fresh
        } else if age <= Duration::hours(24) {
            Recency::Recent
        } else {
            Recency::Older
        }
    }
}

pub fn score_importance(tier: SourceTier, recency: Recency, rank: usize) -> Importance {
    use Recency::*;
    use SourceTier::*;

    match (tier, recency) {
        (HighlyCredible, Fresh) if rank <= 3 => Importance::Breaking,
        (HighlyCredible | Established, Fresh | Recent) if rank <= 10 => Importance::High,
        (_, Fresh | Recent) if rank <= 20 => Importance::Moderate,
        (HighlyCredible, _) => Importance::Moderate,
        _ => Importance::Low,
    }
}

/// Keeps the first article for each exact title, in encounter order.
pub fn dedup_by_title(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|article| seen.insert(article.title.clone()))
        .collect()
}

/// The single article served when no upstream produced anything.
pub fn fallback_batch(now: DateTime<Utc>) -> Vec<Article> {
    vec![Article {
        id: now.timestamp_millis(),
        rank: 1,
        title: "Connectivity issue: live news is temporarily unavailable".to_string(),
        summary: "We could not reach our news providers. Fresh headlines will appear as soon as the connection is restored.".to_string(),
        full_content: "The news service is currently unable to retrieve articles from its upstream providers. \
            This is usually a temporary connectivity issue. The feed refreshes automatically in the background, \
            so please check back in a few minutes."
            .to_string(),
        importance: Importance::Breaking,
        source: "News System".to_string(),
        category: Category::Top,
        published_at: now,
        url: None,
        url_to_image: None,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(title: &str, source: &str) -> Article {
        Article {
            id: 1,
            rank: 1,
            title: title.to_string(),
            summary: String::new(),
            full_content: String::new(),
            importance: Importance::Low,
            source: source.to_string(),
            category: Category::Top,
            published_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            url: None,
            url_to_image: None,
        }
    }

    mod classify_tests {
        use super::*;

        #[test]
        fn test_conflict_keywords() {
            assert_eq!(
                classify("Putin addresses the nation", ""),
                Category::UkraineRussia
            );
            assert_eq!(classify("Обстрел Киева", ""), Category::UkraineRussia);
        }

        #[test]
        fn test_conflict_checked_before_peace() {
            assert_eq!(
                classify("Ceasefire talks between Ukraine and Russia", ""),
                Category::UkraineRussia
            );
        }

        #[test]
        fn test_trump_before_peace() {
            assert_eq!(
                classify("Trump envoy discusses peace plan", ""),
                Category::TrumpPolitics
            );
        }

        #[test]
        fn test_peace_matches_summary() {
            assert_eq!(
                classify("Talks resume", "Diplomats gathered in Geneva for a ceasefire"),
                Category::PeaceEfforts
            );
        }

        #[test]
        fn test_anti_war_movement() {
            assert_eq!(
                classify("Thousands join protest in Berlin", ""),
                Category::AntiWarMovement
            );
        }

        #[test]
        fn test_default_category() {
            assert_eq!(classify("Stock markets close higher", ""), Category::Top);
        }

        #[test]
        fn test_case_insensitive() {
            assert_eq!(classify("UKRAINE", ""), Category::UkraineRussia);
        }

        #[test]
        fn test_substring_matching_is_kept_as_is() {
            // "award" contains "war"
            assert_eq!(classify("Film wins award", ""), Category::UkraineRussia);
        }

        #[test]
        fn test_classification_is_deterministic() {
            let first = classify("Refugees cross the border", "Humanitarian aid arrives");
            for _ in 0..10 {
                assert_eq!(
                    classify("Refugees cross the border", "Humanitarian aid arrives"),
                    first
                );
            }
        }
    }

    mod importance_tests {
        use super::*;

        #[test]
        fn test_source_tiers() {
            assert_eq!(SourceTier::of("Reuters"), SourceTier::HighlyCredible);
            assert_eq!(SourceTier::of("BBC News"), SourceTier::HighlyCredible);
            assert_eq!(SourceTier::of("CNN"), SourceTier::Established);
            assert_eq!(SourceTier::of("Some Blog"), SourceTier::Other);
        }

        #[test]
        fn test_recency_buckets() {
            let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
            assert_eq!(Recency::of(now - Duration::hours(1), now), Recency::Fresh);
            assert_eq!(Recency::of(now - Duration::hours(6), now), Recency::Fresh);
            assert_eq!(Recency::of(now - Duration::hours(7), now), Recency::Recent);
            assert_eq!(Recency::of(now - Duration::hours(30), now), Recency::Older);
        }

        #[test]
        fn test_breaking_requires_top_three_credible_fresh() {
            assert_eq!(
                score_importance(SourceTier::HighlyCredible, Recency::Fresh, 1),
                Importance::Breaking
            );
            assert_eq!(
                score_importance(SourceTier::HighlyCredible, Recency::Fresh, 4),
                Importance::High
            );
            assert_eq!(
                score_importance(SourceTier::Established, Recency::Fresh, 1),
                Importance::High
            );
        }

        #[test]
        fn test_thresholds_loosen_for_lower_ranks() {
            assert_eq!(
                score_importance(SourceTier::Other, Recency::Fresh, 1),
                Importance::Moderate
            );
            assert_eq!(
                score_importance(SourceTier::Established, Recency::Recent, 15),
                Importance::Moderate
            );
            assert_eq!(
                score_importance(SourceTier::HighlyCredible, Recency::Older, 25),
                Importance::Moderate
            );
            assert_eq!(
                score_importance(SourceTier::Other, Recency::Recent, 25),
                Importance::Low
            );
            assert_eq!(
                score_importance(SourceTier::Established, Recency::Older, 1),
                Importance::Low
            );
        }
    }

    mod dedup_tests {
        use super::*;

        #[test]
        fn test_keeps_first_occurrence() {
            let articles = vec![
                article("Same headline", "Reuters"),
                article("Other headline", "CNN"),
                article("Same headline", "BBC News"),
            ];

            let deduped = dedup_by_title(articles);

            assert_eq!(deduped.len(), 2);
            assert_eq!(deduped[0].title, "Same headline");
            assert_eq!(deduped[0].source, "Reuters");
            assert_eq!(deduped[1].title, "Other headline");
        }

        #[test]
        fn test_near_duplicates_are_not_merged() {
            let articles = vec![
                article("Same headline", "Reuters"),
                article("Same headline.", "CNN"),
            ];

            assert_eq!(dedup_by_title(articles).len(), 2);
        }
    }

    mod serde_tests {
        use super::*;

        #[test]
        fn test_article_uses_camel_case_fields() {
            let mut a = article("Title", "Reuters");
            a.url_to_image = Some("https://img.example.com/a.jpg".to_string());
            a.category = Category::UkraineRussia;
            a.importance = Importance::Breaking;

            let json = serde_json::to_value(&a).unwrap();

            assert_eq!(json["fullContent"], "");
            assert_eq!(json["urlToImage"], "https://img.example.com/a.jpg");
            assert_eq!(json["category"], "Ukraine-Russia");
            assert_eq!(json["importance"], "Breaking");
            assert!(json.get("url").is_none());
            assert!(json["publishedAt"].as_str().unwrap().starts_with("2024-03-01T12:00:00"));
        }

        #[test]
        fn test_fallback_batch_has_one_breaking_article() {
            let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
            let batch = fallback_batch(now);

            assert_eq!(batch.len(), 1);
            assert_eq!(batch[0].importance, Importance::Breaking);
            assert_eq!(batch[0].rank, 1);
            assert!(batch[0].title.contains("Connectivity issue"));
        }
    }
}
