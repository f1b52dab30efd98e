//! Cross-source aggregation.
//!
//! Dispatches composite slugs to the owning source, fans search out across
//! sources, and merges stream candidates with the speculative fallback
//! providers appended last.

use crate::config::SourcesConfig;
use crate::helpers::{normalize_title, parse_source, split_slug};
use crate::http_client::FetchClient;
use crate::models::{Anime, RecentAnime, RecentPage, Source, Stream, StreamKind};
use crate::sources::indoanime::IndoAnime;
use crate::sources::jikan::JikanClient;
use reqwest::Url;
use std::collections::HashSet;
use std::sync::Arc;

/// Prefixed onto resolved fan-site providers; marks the native-language
/// source the player should prefer.
const LOCALE_MARKER: &str = "\u{1F1EE}\u{1F1E9}";

pub struct Aggregator {
    jikan: JikanClient,
    indoanime: IndoAnime,
    sources: SourcesConfig,
}

impl Aggregator {
    pub fn new(fetch: Arc<FetchClient>, sources: SourcesConfig) -> Self {
        Self {
            jikan: JikanClient::new(fetch.clone(), sources.jikan_base.clone()),
            indoanime: IndoAnime::new(fetch, sources.indoanime_base.clone()),
            sources,
        }
    }

    /// Current-season listing. Single-source: the metadata API owns
    /// pagination.
    pub async fn recent(&self, page: u32) -> RecentPage {
        self.jikan.recent(page).await
    }

    /// Today's airing schedule, with the fan site's latest releases as a
    /// stand-in when the API has nothing.
    pub async fn schedule(&self) -> Vec<RecentAnime> {
        let scheduled = self.jikan.schedule().await;
        if !scheduled.is_empty() {
            return scheduled;
        }
        self.indoanime.schedule().await
    }

    /// Fan-out search: metadata API results first, fan-site results
    /// appended when their normalized title is new.
    pub async fn search(&self, query: &str) -> Vec<RecentAnime> {
        let (primary, secondary) =
            tokio::join!(self.jikan.search(query), self.indoanime.search(query));
        merge_search_results(primary, secondary)
    }

    pub async fn detail(&self, slug: &str) -> Option<Anime> {
        let (qualifier, _) = split_slug(slug)?;
        // A numeric qualifier is a MyAnimeList id.
        if qualifier.parse::<u64>().is_ok() {
            return self.jikan.detail(slug).await;
        }
        match parse_source(qualifier) {
            Some(Source::IndoAnime) => self.indoanime.detail(slug).await,
            _ => {
                log::warn!("[aggregator] unknown slug qualifier: {}", qualifier);
                None
            }
        }
    }

    /// Streams for one episode: resolved fan-site mirrors first (tagged
    /// with the locale marker), then the fixed-pattern fallbacks. The
    /// fallbacks are speculative and never probed for liveness.
    pub async fn stream_links(&self, anime_slug: &str, episode: &str) -> Vec<Stream> {
        let title_slug = split_slug(anime_slug)
            .map(|(_, rest)| rest)
            .unwrap_or(anime_slug);
        let episode_slug = format!("{}-episode-{}", title_slug, episode);

        let mut streams: Vec<Stream> = self
            .indoanime
            .streams(&episode_slug)
            .await
            .into_iter()
            .map(|s| Stream {
                provider: format!("{} {}", LOCALE_MARKER, s.provider),
                ..s
            })
            .collect();

        streams.extend(fallback_streams(&self.sources, title_slug, episode));
        dedup_by_url(streams)
    }
}

fn merge_search_results(
    primary: Vec<RecentAnime>,
    secondary: Vec<RecentAnime>,
) -> Vec<RecentAnime> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(primary.len() + secondary.len());
    for item in primary.into_iter().chain(secondary) {
        if seen.insert(normalize_title(&item.title)) {
            merged.push(item);
        }
    }
    merged
}

/// Fixed-pattern player options for the secondary hosts. These URLs are
/// constructed, not resolved; the player treats them as last-resort tabs.
fn fallback_streams(sources: &SourcesConfig, title_slug: &str, episode: &str) -> Vec<Stream> {
    let mut fallbacks = vec![
        Stream {
            provider: Source::Kuronime.display_name().to_string(),
            quality: "720p".to_string(),
            url: format!(
                "{}/nonton-{}-episode-{}/",
                sources.kuronime_base, title_slug, episode
            ),
            kind: StreamKind::Embed,
        },
        Stream {
            provider: Source::Gogoanime.display_name().to_string(),
            quality: "1080p".to_string(),
            url: format!("{}/{}-episode-{}", sources.gogoanime_base, title_slug, episode),
            kind: StreamKind::Embed,
        },
    ];

    let readable_title = title_slug.replace('-', " ");
    if let Ok(url) = Url::parse_with_params(
        &format!("{}/search", sources.nineanime_base),
        &[("keyword", readable_title.as_str())],
    ) {
        fallbacks.push(Stream {
            provider: Source::NineAnime.display_name().to_string(),
            quality: "1080p".to_string(),
            url: url.to_string(),
            kind: StreamKind::Embed,
        });
    }
    fallbacks
}

fn dedup_by_url(streams: Vec<Stream>) -> Vec<Stream> {
    let mut seen: HashSet<String> = HashSet::new();
    streams
        .into_iter()
        .filter(|s| seen.insert(s.url.clone()))
        .collect()
}
