//! Helper functions for the anime aggregator
//!
//! This module provides utility functions used throughout the application:
//! - Composite slug composition and parsing
//! - Title slugification and normalization for cross-source matching
//! - Source identification
//! - Episode number extraction and ordering
//!
//! # Examples
//!
//! ```
//! use rust_anime_scraper::helpers::{compose_slug, split_slug, normalize_title};
//!
//! let slug = compose_slug("52991", "sousou-no-frieren");
//! assert_eq!(slug, "52991__sousou-no-frieren");
//! assert_eq!(split_slug(&slug), Some(("52991", "sousou-no-frieren")));
//!
//! assert_eq!(normalize_title("Sousou no Frieren!"), "sousou no frieren");
//! ```

use crate::models::Source;
use regex::Regex;

/// Compose the aggregator's composite identity: `{qualifier}__{humanSlug}`.
pub fn compose_slug(qualifier: &str, human_slug: &str) -> String {
    format!("{}__{}", qualifier, human_slug)
}

/// Split a composite slug at the first `__` into (qualifier, human slug).
pub fn split_slug(slug: &str) -> Option<(&str, &str)> {
    let mut parts = slug.splitn(2, "__");
    match (parts.next(), parts.next()) {
        (Some(q), Some(rest)) if !q.is_empty() && !rest.is_empty() => Some((q, rest)),
        _ => None,
    }
}

/// Build a URL-safe slug from a display title.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();
    let hyphenated = kept.split_whitespace().collect::<Vec<_>>().join("-");
    let collapse = Regex::new(r"-+").unwrap();
    collapse
        .replace_all(&hyphenated, "-")
        .trim_matches('-')
        .to_string()
}

/// Normalize a title for cross-source deduplication.
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a source name or id string into a Source enum
pub fn parse_source(s: &str) -> Option<Source> {
    let k = s.to_lowercase();
    if let Ok(n) = k.parse::<i32>() {
        return match n {
            1 => Some(Source::MyAnimeList),
            2 => Some(Source::IndoAnime),
            3 => Some(Source::Kuronime),
            4 => Some(Source::Gogoanime),
            5 => Some(Source::NineAnime),
            _ => None,
        };
    }
    match k.as_str() {
        "myanimelist" | "mal" | "jikan" => Some(Source::MyAnimeList),
        "indoanime" => Some(Source::IndoAnime),
        "kuronime" => Some(Source::Kuronime),
        "gogoanime" | "anitaku" => Some(Source::Gogoanime),
        "9anime" | "nineanime" => Some(Source::NineAnime),
        _ => None,
    }
}

/// Pull an episode number out of free text ("Episode 12", "Eps 3", "Ep. 07").
pub fn extract_episode_number(text: &str) -> Option<String> {
    let re = Regex::new(r"(?i)ep(?:isode|s)?\.?\s*(\d+)").unwrap();
    re.captures(text)
        .map(|caps| caps[1].trim_start_matches('0').to_string())
        .map(|n| if n.is_empty() { "0".to_string() } else { n })
}

/// Numeric sort key for string-typed episode numbers; non-numeric labels
/// sort after every numeric one, keeping their relative order.
pub fn episode_sort_key(number: &str) -> f64 {
    number.trim().parse::<f64>().unwrap_or(f64::MAX)
}
