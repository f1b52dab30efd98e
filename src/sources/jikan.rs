//! Jikan (MyAnimeList) REST API adapter.
//!
//! Authoritative for metadata, never for streams. The API does not
//! enumerate episodes, so detail responses carry a synthesized sequential
//! episode list.

use crate::helpers::{compose_slug, slugify};
use crate::http_client::FetchClient;
use crate::models::{AiringStatus, Anime, Episode, RecentAnime, RecentPage, Source};
use chrono::{Datelike, Utc};
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;

const SOURCE_NAME: &str = Source::MyAnimeList.display_name();

/// Known episode counts are capped here when synthesizing the list.
const MAX_SYNTH_EPISODES: u32 = 500;
/// Episode list length when the API does not know the count (ongoing shows).
const UNKNOWN_SYNTH_EPISODES: u32 = 50;

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    data: Vec<AnimeData>,
    #[serde(default)]
    pagination: Pagination,
}

#[derive(Deserialize, Default)]
struct Pagination {
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Deserialize)]
struct DetailResponse {
    data: Option<AnimeData>,
}

#[derive(Deserialize)]
struct AnimeData {
    mal_id: Option<u64>,
    title: Option<String>,
    title_english: Option<String>,
    images: Option<Images>,
    episodes: Option<u32>,
    status: Option<String>,
    score: Option<f64>,
    synopsis: Option<String>,
    #[serde(default)]
    genres: Vec<Genre>,
    #[serde(rename = "type")]
    anime_type: Option<String>,
    broadcast: Option<Broadcast>,
}

#[derive(Deserialize)]
struct Images {
    jpg: Option<ImageSet>,
}

#[derive(Deserialize)]
struct ImageSet {
    image_url: Option<String>,
    large_image_url: Option<String>,
}

#[derive(Deserialize)]
struct Genre {
    name: Option<String>,
}

#[derive(Deserialize)]
struct Broadcast {
    string: Option<String>,
}

impl AnimeData {
    fn display_title(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.title_english.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    fn poster(&self) -> String {
        self.images
            .as_ref()
            .and_then(|i| i.jpg.as_ref())
            .and_then(|jpg| jpg.large_image_url.clone().or_else(|| jpg.image_url.clone()))
            .unwrap_or_default()
    }

    fn composite_slug(&self) -> String {
        let id = self.mal_id.unwrap_or(0);
        compose_slug(&id.to_string(), &slugify(&self.display_title()))
    }
}

pub struct JikanClient {
    fetch: Arc<FetchClient>,
    base: String,
}

impl JikanClient {
    pub fn new(fetch: Arc<FetchClient>, base: String) -> Self {
        Self { fetch, base }
    }

    /// Current-season anime, paginated. A page past the end comes back as
    /// an empty page with `has_next_page: false`, not an error.
    pub async fn recent(&self, page: u32) -> RecentPage {
        let url = format!(
            "{}/seasons/now?sfw=true&limit=24&page={}",
            self.base,
            page.max(1)
        );
        let Some(body) = self.fetch.fetch_json(&url).await else {
            return RecentPage::empty();
        };
        let page = parse_recent_page(&body);
        log::info!("[Jikan] recent: {} results", page.results.len());
        page
    }

    /// Anime airing on the current weekday.
    pub async fn schedule(&self) -> Vec<RecentAnime> {
        let url = format!(
            "{}/schedules/{}?sfw=true&limit=12",
            self.base,
            current_weekday()
        );
        let Some(body) = self.fetch.fetch_json(&url).await else {
            return Vec::new();
        };
        parse_schedule(&body)
    }

    pub async fn search(&self, query: &str) -> Vec<RecentAnime> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let Ok(url) = Url::parse_with_params(
            &format!("{}/anime", self.base),
            &[("q", query), ("sfw", "true"), ("limit", "20")],
        ) else {
            return Vec::new();
        };
        let Some(body) = self.fetch.fetch_json(url.as_str()).await else {
            return Vec::new();
        };
        parse_search_results(&body)
    }

    /// Full detail by composite slug (`{mal_id}__{title-slug}`).
    pub async fn detail(&self, slug: &str) -> Option<Anime> {
        let mal_id: u64 = crate::helpers::split_slug(slug)?.0.parse().ok()?;
        let url = format!("{}/anime/{}/full", self.base, mal_id);
        let body = self.fetch.fetch_json(&url).await?;
        parse_detail(&body, slug)
    }
}

fn current_weekday() -> &'static str {
    match Utc::now().weekday() {
        chrono::Weekday::Mon => "monday",
        chrono::Weekday::Tue => "tuesday",
        chrono::Weekday::Wed => "wednesday",
        chrono::Weekday::Thu => "thursday",
        chrono::Weekday::Fri => "friday",
        chrono::Weekday::Sat => "saturday",
        chrono::Weekday::Sun => "sunday",
    }
}

fn parse_recent_page(body: &str) -> RecentPage {
    let Ok(response) = serde_json::from_str::<ListResponse>(body) else {
        log::warn!("[Jikan] malformed list response");
        return RecentPage::empty();
    };
    let results = response
        .data
        .into_iter()
        .map(|anime| {
            let episode = match anime.episodes {
                Some(n) if n > 0 => format!("{} eps", n),
                _ => anime.status.clone().unwrap_or_default(),
            };
            to_recent(anime, episode)
        })
        .collect();
    RecentPage {
        results,
        has_next_page: response.pagination.has_next_page,
    }
}

fn parse_schedule(body: &str) -> Vec<RecentAnime> {
    let Ok(response) = serde_json::from_str::<ListResponse>(body) else {
        log::warn!("[Jikan] malformed schedule response");
        return Vec::new();
    };
    response
        .data
        .into_iter()
        .map(|anime| {
            let episode = anime
                .broadcast
                .as_ref()
                .and_then(|b| b.string.clone())
                .unwrap_or_else(|| "Airing Today".to_string());
            to_recent(anime, episode)
        })
        .collect()
}

fn parse_search_results(body: &str) -> Vec<RecentAnime> {
    let Ok(response) = serde_json::from_str::<ListResponse>(body) else {
        log::warn!("[Jikan] malformed search response");
        return Vec::new();
    };
    response
        .data
        .into_iter()
        .map(|anime| {
            let episode = match anime.episodes {
                Some(n) if n > 0 => format!("{} eps", n),
                _ => String::new(),
            };
            to_recent(anime, episode)
        })
        .collect()
}

fn to_recent(anime: AnimeData, episode: String) -> RecentAnime {
    RecentAnime {
        title: anime.display_title(),
        slug: anime.composite_slug(),
        poster: anime.poster(),
        episode,
        anime_type: anime.anime_type.clone().unwrap_or_else(|| "TV".to_string()),
        source: SOURCE_NAME.to_string(),
    }
}

fn parse_detail(body: &str, slug: &str) -> Option<Anime> {
    let response = serde_json::from_str::<DetailResponse>(body).ok()?;
    let anime = response.data?;
    let mal_id = anime.mal_id.unwrap_or(0);

    Some(Anime {
        id: slug.to_string(),
        slug: slug.to_string(),
        title: anime.display_title(),
        poster: anime.poster(),
        anime_type: anime.anime_type.clone().unwrap_or_else(|| "TV".to_string()),
        status: AiringStatus::from_upstream(anime.status.as_deref().unwrap_or("")),
        score: anime.score.map(|s| s.to_string()),
        synopsis: anime
            .synopsis
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "No synopsis available.".to_string()),
        genres: anime.genres.iter().filter_map(|g| g.name.clone()).collect(),
        episodes: synthesize_episodes(anime.episodes),
        source: SOURCE_NAME.to_string(),
        source_url: Some(format!("https://myanimelist.net/anime/{}", mal_id)),
    })
}

/// The metadata API does not enumerate episodes; stand in a sequential
/// list so the watch surface has something to address.
fn synthesize_episodes(count: Option<u32>) -> Vec<Episode> {
    let total = match count {
        Some(n) if n > 0 => n.min(MAX_SYNTH_EPISODES),
        _ => UNKNOWN_SYNTH_EPISODES,
    };
    (1..=total)
        .map(|i| Episode {
            id: i.to_string(),
            slug: i.to_string(),
            number: i.to_string(),
            title: Some(format!("Episode {}", i)),
            thumbnail: None,
            released_at: None,
        })
        .collect()
}
