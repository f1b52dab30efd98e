//! IndoAnime adapter, a WordPress-based anime fanshare site.
//!
//! Listings are card grids, details are theme-templated pages, and every
//! selector goes through a candidate cascade because the theme markup has
//! drifted over the years.

use crate::extract::{attr_of, child_attr, child_first, child_text, doc_all, doc_first, doc_text, text_of};
use crate::helpers::{compose_slug, episode_sort_key, extract_episode_number, split_slug};
use crate::http_client::FetchClient;
use crate::models::{AiringStatus, Anime, Episode, RecentAnime, RecentPage, Source, Stream};
use crate::resolver::{self, PageFetcher};
use regex::Regex;
use reqwest::Url;
use scraper::Html;
use std::sync::Arc;

const SOURCE_NAME: &str = Source::IndoAnime.display_name();
const QUALIFIER: &str = Source::IndoAnime.qualifier();

const CARD_CANDIDATES: &[&str] = &["div.bsx", "div.bs", "article.bs", ".listupd .bsx"];
const TITLE_CANDIDATES: &[&str] = &[".tt", ".title", "h2"];
const EPISODE_LABEL_CANDIDATES: &[&str] = &[".epx", ".ep", ".episode"];
const TYPE_CANDIDATES: &[&str] = &[".typez", ".type"];
const NEXT_PAGE_CANDIDATES: &[&str] = &[".hpage .r", ".pagination .next", "a.next"];

const DETAIL_TITLE_CANDIDATES: &[&str] = &[".entry-title", "h1.entry-title", "h1"];
const DETAIL_POSTER_CANDIDATES: &[&str] = &[".thumb img", ".thumbook img", ".spe img"];
const DETAIL_SYNOPSIS_CANDIDATES: &[&str] =
    &[".entry-content p", ".synp p", ".sinopsis p", ".entry-content"];
const DETAIL_GENRE_CANDIDATES: &[&str] = &[".genxed a", ".genre-info a"];
const DETAIL_SCORE_CANDIDATES: &[&str] = &[".rating strong", ".num", ".score"];
const EPISODE_LIST_CANDIDATES: &[&str] =
    &[".eplister ul li", ".episodelist ul li", ".bixbox.bxcl ul li"];
const EPISODE_NUM_CANDIDATES: &[&str] = &[".epl-num", ".eps"];
const EPISODE_TITLE_CANDIDATES: &[&str] = &[".epl-title", ".eptitle"];
const EPISODE_DATE_CANDIDATES: &[&str] = &[".epl-date", ".date"];

pub struct IndoAnime {
    fetch: Arc<FetchClient>,
    base: String,
}

impl PageFetcher for IndoAnime {
    async fn fetch_page(&self, url: &str) -> Option<String> {
        self.fetch.fetch_html(url).await
    }
}

impl IndoAnime {
    pub fn new(fetch: Arc<FetchClient>, base: String) -> Self {
        Self { fetch, base }
    }

    pub async fn recent(&self, page: u32) -> RecentPage {
        let url = if page <= 1 {
            self.base.clone()
        } else {
            format!("{}/page/{}/", self.base, page)
        };
        let Some(html) = self.fetch.fetch_html(&url).await else {
            return RecentPage::empty();
        };
        let parsed = parse_recent_page(&html);
        log::info!("[IndoAnime] recent: {} cards (page {})", parsed.results.len(), page);
        parsed
    }

    pub async fn search(&self, query: &str) -> Vec<RecentAnime> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let Ok(url) = Url::parse_with_params(&format!("{}/", self.base), &[("s", query)]) else {
            return Vec::new();
        };
        let Some(html) = self.fetch.fetch_html(url.as_str()).await else {
            return Vec::new();
        };
        let results = parse_search_results(&html);
        log::info!("[IndoAnime] search \"{}\": {} results", query, results.len());
        results
    }

    pub async fn detail(&self, slug: &str) -> Option<Anime> {
        let native_slug = native_slug_of(slug);
        let url = format!("{}/anime/{}/", self.base, native_slug);
        let html = self.fetch.fetch_html(&url).await?;
        let anime = parse_detail(&html, native_slug, &url);
        log::info!(
            "[IndoAnime] detail \"{}\": {} episodes",
            anime.title,
            anime.episodes.len()
        );
        Some(anime)
    }

    /// Latest releases stand in for a broadcast schedule.
    pub async fn schedule(&self) -> Vec<RecentAnime> {
        let mut results = self.recent(1).await.results;
        results.truncate(12);
        results
    }

    pub async fn streams(&self, episode_slug: &str) -> Vec<Stream> {
        resolver::resolve_streams(self, &self.base, episode_slug).await
    }
}

/// Accept both composite (`indoanime__{slug}`) and native slugs.
fn native_slug_of(slug: &str) -> &str {
    match split_slug(slug) {
        Some((qualifier, rest)) if qualifier == QUALIFIER => rest,
        _ => slug,
    }
}

fn slug_from_url(url: &str) -> String {
    let re = Regex::new(r"/anime/([^/]+)/?").unwrap();
    if let Some(caps) = re.captures(url) {
        return caps[1].to_string();
    }
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_string()
}

fn episode_slug_from_url(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_string()
}

fn parse_card(el: scraper::ElementRef) -> Option<RecentAnime> {
    let link = child_first(el, &["a"])?;
    let href = attr_of(link, &["href"])?;

    let title = child_text(el, TITLE_CANDIDATES)
        .or_else(|| child_first(el, &["img"]).and_then(|img| attr_of(img, &["alt", "title"])))?;
    let poster = child_attr(el, &["img"], &["src", "data-src"]).unwrap_or_default();
    let episode = child_text(el, EPISODE_LABEL_CANDIDATES).unwrap_or_default();
    let anime_type = child_text(el, TYPE_CANDIDATES).unwrap_or_else(|| "TV".to_string());

    Some(RecentAnime {
        title,
        slug: compose_slug(QUALIFIER, &slug_from_url(&href)),
        poster,
        episode: if episode.is_empty() {
            "Unknown".to_string()
        } else {
            episode
        },
        anime_type,
        source: SOURCE_NAME.to_string(),
    })
}

fn parse_recent_page(html: &str) -> RecentPage {
    let doc = Html::parse_document(html);
    let results = doc_all(&doc, CARD_CANDIDATES)
        .into_iter()
        .filter_map(parse_card)
        .collect();
    let has_next_page = doc_first(&doc, NEXT_PAGE_CANDIDATES).is_some();
    RecentPage {
        results,
        has_next_page,
    }
}

fn parse_search_results(html: &str) -> Vec<RecentAnime> {
    let doc = Html::parse_document(html);
    doc_all(&doc, CARD_CANDIDATES)
        .into_iter()
        .filter_map(|el| {
            // Search pages mix episode posts into the grid; only series
            // pages live under /anime/.
            let link = child_first(el, &["a"])?;
            let href = attr_of(link, &["href"])?;
            if !href.contains("/anime/") {
                return None;
            }
            let mut card = parse_card(el)?;
            card.episode = String::new();
            Some(card)
        })
        .collect()
}

fn parse_detail(html: &str, native_slug: &str, url: &str) -> Anime {
    let doc = Html::parse_document(html);

    let title =
        doc_text(&doc, DETAIL_TITLE_CANDIDATES).unwrap_or_else(|| native_slug.to_string());
    let poster = doc_first(&doc, DETAIL_POSTER_CANDIDATES)
        .and_then(|img| attr_of(img, &["src", "data-src"]))
        .unwrap_or_default();
    let synopsis = doc_text(&doc, DETAIL_SYNOPSIS_CANDIDATES)
        .unwrap_or_else(|| "No synopsis available.".to_string());

    let genres: Vec<String> = doc_all(&doc, DETAIL_GENRE_CANDIDATES)
        .into_iter()
        .map(text_of)
        .filter(|g| !g.is_empty())
        .collect();

    let status = spe_field(&doc, "Status")
        .map(|s| AiringStatus::from_upstream(&s))
        .unwrap_or(AiringStatus::Unknown);
    let anime_type = spe_field(&doc, "Type")
        .map(|s| s.replace("Type", "").replace(':', "").trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "TV".to_string());
    let score = doc_text(&doc, DETAIL_SCORE_CANDIDATES);

    let mut episodes: Vec<Episode> = doc_all(&doc, EPISODE_LIST_CANDIDATES)
        .into_iter()
        .filter_map(parse_episode_row)
        .collect();
    // DOM order is whatever the theme renders; the contract is numeric.
    episodes.sort_by(|a, b| {
        episode_sort_key(&a.number)
            .partial_cmp(&episode_sort_key(&b.number))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let slug = compose_slug(QUALIFIER, native_slug);
    Anime {
        id: slug.clone(),
        slug,
        title,
        poster,
        anime_type,
        status,
        score,
        synopsis,
        genres,
        episodes,
        source: SOURCE_NAME.to_string(),
        source_url: Some(url.to_string()),
    }
}

/// The `.spe` info box is a list of `<span>Label: value</span>` rows.
fn spe_field(doc: &Html, label: &str) -> Option<String> {
    doc_all(doc, &[".spe span", ".info-content span"])
        .into_iter()
        .map(text_of)
        .find(|text| text.contains(label))
}

fn parse_episode_row(el: scraper::ElementRef) -> Option<Episode> {
    let link = child_first(el, &["a"])?;
    let href = attr_of(link, &["href"])?;
    let link_text = text_of(link);

    let number = child_text(el, EPISODE_NUM_CANDIDATES)
        .or_else(|| extract_episode_number(&link_text))?;
    let title = child_text(el, EPISODE_TITLE_CANDIDATES)
        .or_else(|| {
            if link_text.is_empty() {
                None
            } else {
                Some(link_text)
            }
        })
        .unwrap_or_else(|| format!("Episode {}", number));

    Some(Episode {
        id: number.clone(),
        slug: episode_slug_from_url(&href),
        number,
        title: Some(title),
        thumbnail: child_attr(el, &["img"], &["src", "data-src"]),
        released_at: child_text(el, EPISODE_DATE_CANDIDATES),
    })
}
