
use std::collections::VecDeque;
use std::sync::LazyLock;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::articles::Article;
use crate::store::{Chunk, NO_TITLE, NO_URL};

static WHITESPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Split points tried in order: paragraph, line, sentence, word, character
pub const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Configuration for content chunking, measured in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Characters repeated between consecutive chunks of one article
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Result of chunking a batch of articles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkingOutcome {
    pub chunks: Vec<Chunk>,
    /// Titles of articles that produced no chunks
    pub skipped: Vec<String>,
}

/// Collapse whitespace runs to single spaces and trim the ends
#[inline]
pub fn clean_text(text: &str) -> String {
    WHITESPACE_RUNS.replace_all(text, " ").trim().to_string()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Recursive splitter that prefers the coarsest separator that keeps pieces under the limit
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    #[inline]
    pub fn new(config: &ChunkingConfig) -> Self {
        let chunk_size = config.chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: config.chunk_overlap.min(chunk_size - 1),
        }
    }

    #[inline]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|separator| separator.is_empty() || text.contains(separator))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or_default();

        // Separators stay attached to the piece they end so nothing is lost on re-join
        let pieces: Vec<&str> = if separator.is_empty() {
            text.split("").filter(|piece| !piece.is_empty()).collect()
        } else {
            text.split_inclusive(separator).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge_pieces(&fitting));
                fitting.clear();
            }

            if finer.is_empty() {
                chunks.push(piece.trim().to_string());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge_pieces(&fitting));
        }

        chunks.retain(|chunk| !chunk.is_empty());
        chunks
    }

    /// Greedily pack pieces into chunks, carrying a tail of at most `chunk_overlap` forward
    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut window_len = 0;

        for &piece in pieces {
            let piece_len = char_len(piece);

            if window_len + piece_len > self.chunk_size && !window.is_empty() {
                push_joined(&mut merged, &window);

                while window_len > self.chunk_overlap
                    || (window_len > 0 && window_len + piece_len > self.chunk_size)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    window_len -= char_len(front);
                }
            }

            window.push_back(piece);
            window_len += piece_len;
        }

        push_joined(&mut merged, &window);
        merged
    }
}

fn push_joined(merged: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        merged.push(trimmed.to_string());
    }
}

/// Chunk articles into retrieval passages, skipping articles without content
#[inline]
pub fn chunk_articles(articles: &[Article], config: &ChunkingConfig) -> ChunkingOutcome {
    let splitter = TextSplitter::new(config);
    let mut outcome = ChunkingOutcome::default();

    for article in articles {
        let title = article
            .title
            .as_deref()
            .map(clean_text)
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| NO_TITLE.to_string());
        let url = article
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(NO_URL);
        let content = article.content.as_deref().map(clean_text).unwrap_or_default();

        if content.is_empty() {
            warn!("Skipping article '{}' ({}): no content", title, url);
            outcome.skipped.push(title);
            continue;
        }

        let pieces = splitter.split_text(&content);
        debug!("Article '{}' split into {} chunks", title, pieces.len());

        outcome
            .chunks
            .extend(pieces.iter().map(|piece| Chunk::new(&title, url, piece)));
    }

    info!(
        "Chunked {} articles into {} chunks ({} skipped)",
        articles.len(),
        outcome.chunks.len(),
        outcome.skipped.len()
    );

    outcome
}
