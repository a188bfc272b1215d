// Scraped articles
// The scraper hands over a JSON array of {title, url, content}; every field may be missing


use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A scraped news article, exactly as the scraper wrote it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl Article {
    #[inline]
    pub fn new(title: &str, url: &str, content: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            url: Some(url.to_string()),
            content: Some(content.to_string()),
        }
    }
}

/// Load the scraper's article dump
#[inline]
pub fn load_articles(path: &Path) -> Result<Vec<Article>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read articles file: {}", path.display()))?;

    let articles: Vec<Article> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse articles file: {}", path.display()))?;

    debug!("Loaded {} articles from {}", articles.len(), path.display());
    Ok(articles)
}
