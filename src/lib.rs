//! Newsdesk - a cached news aggregation service
//!
//! This crate pulls articles from NewsAPI and GNews, normalizes, classifies
//! and optionally translates them, and serves the batch from a single file
//! cache that a background scheduler keeps fresh.

pub mod aggregator;
pub mod article;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod retry;
pub mod routes;
pub mod rss;
pub mod scheduler;
pub mod translate;
