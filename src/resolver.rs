//! Episode stream resolution for the fan site.
//!
//! Upstream obfuscates its mirror list (base64-encoded iframe fragments
//! behind a `<select class="mirror">` control) and episode URLs follow
//! several naming conventions, so resolution is a cascade: probe an
//! ordered list of candidate URLs, fall back to search recovery, then run
//! three extraction methods in priority order. Each step degrades instead
//! of failing.

use crate::models::{Stream, StreamKind};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::future::Future;

/// Base64 of a leading `<`; mirror options encode whole iframe tags.
const IFRAME_B64_PREFIX: &str = "PG";
/// Anything shorter is a placeholder option, not an encoded fragment.
const MIN_MIRROR_VALUE_LEN: usize = 50;

const DEFAULT_QUALITY: &str = "720p";

/// Page retrieval seam; lets tests drive the resolver with canned pages.
pub trait PageFetcher {
    fn fetch_page(&self, url: &str) -> impl Future<Output = Option<String>>;
}

/// Parsed episode identity: `{title-slug}-episode-{N}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRef {
    pub title_slug: String,
    pub number: String,
}

impl EpisodeRef {
    pub fn parse(episode_slug: &str) -> Self {
        let re = Regex::new(r"(?i)^(.+?)-episode-(\d+)$").unwrap();
        match re.captures(episode_slug) {
            Some(caps) => Self {
                title_slug: caps[1].to_string(),
                number: caps[2].to_string(),
            },
            None => Self {
                title_slug: episode_slug.to_string(),
                number: "1".to_string(),
            },
        }
    }
}

/// A bare trailing number on a title slug is one convention's season
/// marker ("title-2"); the fan site writes the same season as "title-s2".
pub fn season_variant(title_slug: &str) -> Option<String> {
    let re = Regex::new(r"^(.+?)-(\d+)$").unwrap();
    re.captures(title_slug)
        .map(|caps| format!("{}-s{}", &caps[1], &caps[2]))
}

/// Ordered candidate page URLs for one episode; first accepted page wins.
pub fn candidate_urls(base: &str, episode_slug: &str, ep: &EpisodeRef) -> Vec<String> {
    let mut urls = vec![
        format!("{}/{}/", base, episode_slug),
        format!("{}/{}-episode-{}/", base, ep.title_slug, ep.number),
        format!("{}/{}-episode-0{}/", base, ep.title_slug, ep.number),
        format!("{}/{}-sub-indo-episode-{}/", base, ep.title_slug, ep.number),
    ];
    if let Some(variant) = season_variant(&ep.title_slug) {
        urls.push(format!("{}/{}-episode-{}/", base, variant, ep.number));
        urls.push(format!("{}/{}-episode-0{}/", base, variant, ep.number));
    }
    let mut seen = HashSet::new();
    urls.retain(|u| seen.insert(u.clone()));
    urls
}

/// Heuristic acceptance: the page must carry the mirror-selector widget.
pub fn page_accepted(html: &str) -> bool {
    html.contains("select") && html.contains("mirror")
}

enum ResolveState {
    Probe,
    Recover,
    /// `page_url` is the accepted episode page when known; it backs the
    /// page-as-embed fallback.
    Extract {
        page_url: Option<String>,
        html: String,
    },
    Empty,
}

/// Resolve all playable streams for one episode slug.
pub async fn resolve_streams<F: PageFetcher>(
    fetch: &F,
    base: &str,
    episode_slug: &str,
) -> Vec<Stream> {
    let ep = EpisodeRef::parse(episode_slug);
    let mut state = ResolveState::Probe;

    loop {
        state = match state {
            ResolveState::Probe => {
                let mut next = ResolveState::Recover;
                for url in candidate_urls(base, episode_slug, &ep) {
                    log::debug!("[resolver] trying {}", url);
                    if let Some(html) = fetch.fetch_page(&url).await {
                        if page_accepted(&html) {
                            log::info!("[resolver] accepted {}", url);
                            next = ResolveState::Extract {
                                page_url: Some(url),
                                html,
                            };
                            break;
                        }
                    }
                }
                next
            }
            ResolveState::Recover => match search_recovery(fetch, base, &ep).await {
                Some((page_url, html)) => ResolveState::Extract { page_url, html },
                None => ResolveState::Empty,
            },
            ResolveState::Extract { page_url, html } => {
                return extract_streams(&html, page_url.as_deref());
            }
            ResolveState::Empty => {
                log::info!("[resolver] no page found for {}", episode_slug);
                return Vec::new();
            }
        };
    }
}

/// All direct URL conventions failed; search the site for the anime page
/// and walk its episode links instead.
async fn search_recovery<F: PageFetcher>(
    fetch: &F,
    base: &str,
    ep: &EpisodeRef,
) -> Option<(Option<String>, String)> {
    let query = ep.title_slug.replace('-', " ");
    let search_url = match reqwest::Url::parse_with_params(&format!("{}/", base), &[("s", query.as_str())])
    {
        Ok(url) => url.to_string(),
        Err(_) => return None,
    };
    log::info!("[resolver] search recovery: {}", query);

    let search_html = fetch.fetch_page(&search_url).await?;
    let anime_link = first_anime_link(&search_html)?;
    let anime_slug = anime_slug_of(&anime_link).unwrap_or_else(|| ep.title_slug.clone());

    let detail_html = fetch.fetch_page(&anime_link).await?;
    match find_episode_link(&detail_html, &ep.number) {
        Some(link) => {
            let html = fetch.fetch_page(&link).await?;
            Some((Some(link), html))
        }
        None => {
            // Last resort: construct the URL by pattern and accept it
            // speculatively when it at least carries the mirror widget.
            let constructed = format!("{}/{}-episode-{}/", base, anime_slug, ep.number);
            log::debug!("[resolver] constructed {}", constructed);
            let html = fetch.fetch_page(&constructed).await?;
            if html.contains("mirror") {
                Some((Some(constructed), html))
            } else {
                Some((None, html))
            }
        }
    }
}

fn first_anime_link(search_html: &str) -> Option<String> {
    let doc = Html::parse_document(search_html);
    let sel = Selector::parse("a[href]").unwrap();
    doc.select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| href.contains("/anime/"))
        .map(|href| href.to_string())
}

fn anime_slug_of(anime_url: &str) -> Option<String> {
    let re = Regex::new(r"/anime/([^/]+)").unwrap();
    re.captures(anime_url).map(|caps| caps[1].to_string())
}

/// Episode link on a detail page, by pattern priority: exact number,
/// zero-padded, bare numeric suffix.
fn find_episode_link(detail_html: &str, number: &str) -> Option<String> {
    let doc = Html::parse_document(detail_html);
    let sel = Selector::parse("a[href]").unwrap();
    let hrefs: Vec<String> = doc
        .select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .map(|h| h.to_string())
        .collect();

    let patterns = [
        format!("episode-{}", number),
        format!("episode-0{}", number),
        format!("-{}", number),
    ];
    for pattern in &patterns {
        if let Some(href) = hrefs.iter().find(|h| h.contains(pattern.as_str())) {
            return Some(href.clone());
        }
    }
    None
}

/// Extraction cascade over an accepted episode page. Methods run in
/// priority order and the first that yields anything wins; one seen-URL
/// set spans all of them.
pub fn extract_streams(html: &str, page_url: Option<&str>) -> Vec<Stream> {
    let doc = Html::parse_document(html);
    let mut streams: Vec<Stream> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    // Primary: decode the obfuscated mirror options.
    let option_sel = Selector::parse("select.mirror option").unwrap();
    for option in doc.select(&option_sel) {
        let value = option.value().attr("value").unwrap_or("");
        if value.len() <= MIN_MIRROR_VALUE_LEN || !value.starts_with(IFRAME_B64_PREFIX) {
            continue;
        }
        let Some(decoded) = decode_mirror_value(value) else {
            continue;
        };
        if !decoded.contains("<iframe") {
            continue;
        }
        let Some(src) = iframe_src(&decoded) else {
            continue;
        };
        if !is_video_url(&src) || !seen.insert(src.clone()) {
            continue;
        }
        let label = option.text().collect::<String>().trim().to_string();
        streams.push(Stream {
            provider: if label.is_empty() {
                "Server".to_string()
            } else {
                label.clone()
            },
            quality: quality_label(&label),
            url: src.clone(),
            kind: StreamKind::classify(&src),
        });
    }

    // Secondary: an iframe already present on the page.
    if streams.is_empty() {
        let iframe_sel = Selector::parse("iframe").unwrap();
        if let Some(src) = doc
            .select(&iframe_sel)
            .next()
            .and_then(|el| el.value().attr("src"))
        {
            let src = src.to_string();
            if is_video_url(&src) && seen.insert(src.clone()) {
                streams.push(Stream {
                    provider: "IndoAnime Player".to_string(),
                    quality: DEFAULT_QUALITY.to_string(),
                    url: src.clone(),
                    kind: StreamKind::classify(&src),
                });
            }
        }
    }

    // Tertiary: degrade to embedding the episode page itself.
    if streams.is_empty() {
        if let Some(url) = page_url {
            streams.push(Stream {
                provider: "IndoAnime (Page)".to_string(),
                quality: DEFAULT_QUALITY.to_string(),
                url: url.to_string(),
                kind: StreamKind::Embed,
            });
        }
    }

    streams
}

fn decode_mirror_value(value: &str) -> Option<String> {
    let bytes = STANDARD.decode(value).ok()?;
    String::from_utf8(bytes).ok()
}

fn iframe_src(fragment: &str) -> Option<String> {
    let doc = Html::parse_fragment(fragment);
    let sel = Selector::parse("iframe").unwrap();
    doc.select(&sel)
        .next()
        .and_then(|el| el.value().attr("src"))
        .map(|s| s.to_string())
}

/// Mirror options sometimes smuggle in image assets or tracking pixels.
pub fn is_video_url(url: &str) -> bool {
    let image_ext = Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp|svg|ico)(\?|$)").unwrap();
    if image_ext.is_match(url) {
        return false;
    }
    if url.contains("/wp-content/uploads/") {
        return false;
    }
    if url.contains("s.w.org") || url.contains("emoji") {
        return false;
    }
    true
}

/// Quality from a mirror label: explicit `Np` wins, then bare resolution
/// substrings, then the default.
pub fn quality_label(name: &str) -> String {
    let re = Regex::new(r"(?i)(\d{3,4})p").unwrap();
    if let Some(caps) = re.captures(name) {
        return format!("{}p", &caps[1]);
    }
    for res in ["1080", "720", "480", "360"] {
        if name.contains(res) {
            return format!("{}p", res);
        }
    }
    DEFAULT_QUALITY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    fn encode_iframe(src: &str) -> String {
        STANDARD.encode(format!(
            "<iframe src=\"{}\" frameborder=\"0\" allowfullscreen></iframe>",
            src
        ))
    }

    #[test]
    fn test_parse_episode_slug() {
        let ep = EpisodeRef::parse("foo-bar-episode-3");
        assert_eq!(ep.title_slug, "foo-bar");
        assert_eq!(ep.number, "3");

        let bare = EpisodeRef::parse("foo-bar");
        assert_eq!(bare.title_slug, "foo-bar");
        assert_eq!(bare.number, "1");
    }

    #[test]
    fn test_season_variant() {
        assert_eq!(
            season_variant("tondemo-skill-de-isekai-hourou-meshi-2"),
            Some("tondemo-skill-de-isekai-hourou-meshi-s2".to_string())
        );
        assert_eq!(season_variant("one-piece"), None);
    }

    #[test]
    fn test_candidate_url_order() {
        let ep = EpisodeRef::parse("foo-bar-episode-3");
        let urls = candidate_urls("https://site.test", "foo-bar-episode-3", &ep);
        assert_eq!(
            urls,
            vec![
                "https://site.test/foo-bar-episode-3/",
                "https://site.test/foo-bar-episode-03/",
                "https://site.test/foo-bar-sub-indo-episode-3/",
            ]
        );
    }

    #[test]
    fn test_candidate_urls_include_season_variants() {
        let ep = EpisodeRef::parse("tondemo-skill-de-isekai-hourou-meshi-2-episode-5");
        let urls = candidate_urls(
            "https://site.test",
            "tondemo-skill-de-isekai-hourou-meshi-2-episode-5",
            &ep,
        );
        assert!(urls.contains(
            &"https://site.test/tondemo-skill-de-isekai-hourou-meshi-s2-episode-5/".to_string()
        ));
        assert!(urls.contains(
            &"https://site.test/tondemo-skill-de-isekai-hourou-meshi-s2-episode-05/".to_string()
        ));
        // Variants come after every plain-title candidate.
        let first_variant = urls.iter().position(|u| u.contains("-s2-")).unwrap();
        let last_plain = urls
            .iter()
            .rposition(|u| !u.contains("-s2-"))
            .unwrap();
        assert!(first_variant > last_plain);
    }

    #[test]
    fn test_extract_streams_from_mirror_options() {
        let html = format!(
            r#"<select class="mirror">
                <option value="">Pilih Server</option>
                <option value="{}">Mega 720p</option>
                <option value="{}">Premium 1080p</option>
            </select>"#,
            encode_iframe("https://mega.example/embed/abc"),
            encode_iframe("https://premium.example/v/def.m3u8"),
        );
        let streams = extract_streams(&html, Some("https://site.test/ep-1/"));
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].provider, "Mega 720p");
        assert_eq!(streams[0].quality, "720p");
        assert_eq!(streams[0].url, "https://mega.example/embed/abc");
        assert_eq!(streams[0].kind, StreamKind::Embed);
        assert_eq!(streams[1].quality, "1080p");
        assert_eq!(streams[1].kind, StreamKind::Hls);
    }

    #[test]
    fn test_invalid_mirror_options_are_skipped() {
        let html = format!(
            r#"<select class="mirror">
                <option value="PG!!!this-is-not-valid-base64-but-has-the-right-prefix-and-length!!!">Bad</option>
                <option value="{}">No Iframe</option>
                <option value="{}">Good 480p</option>
            </select>"#,
            // Valid base64, decodes to markup without an iframe.
            STANDARD.encode("<div>maintenance notice, there is no player here today</div>"),
            encode_iframe("https://ok.example/embed/1"),
        );
        let streams = extract_streams(&html, None);
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].url, "https://ok.example/embed/1");
        assert_eq!(streams[0].quality, "480p");
    }

    #[test]
    fn test_image_urls_rejected_and_deduped() {
        let html = format!(
            r#"<select class="mirror">
                <option value="{}">Pixel</option>
                <option value="{}">Srv A</option>
                <option value="{}">Srv A again</option>
            </select>"#,
            encode_iframe("https://site.test/wp-content/uploads/2024/01/poster.jpg"),
            encode_iframe("https://v.example/embed/same"),
            encode_iframe("https://v.example/embed/same"),
        );
        let streams = extract_streams(&html, None);
        assert_eq!(streams.len(), 1);
        let urls: HashSet<&str> = streams.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls.len(), streams.len());
    }

    #[test]
    fn test_secondary_method_takes_page_iframe() {
        let html = r#"<div class="player">
            <iframe src="https://direct.example/embed/xyz"></iframe>
        </div>"#;
        let streams = extract_streams(html, None);
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].provider, "IndoAnime Player");
        assert_eq!(streams[0].url, "https://direct.example/embed/xyz");
    }

    #[test]
    fn test_tertiary_method_wraps_page_url() {
        let html = "<html><body>select your mirror below</body></html>";
        let streams = extract_streams(html, Some("https://site.test/foo-episode-2/"));
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].url, "https://site.test/foo-episode-2/");
        assert_eq!(streams[0].kind, StreamKind::Embed);

        // Without a known page URL there is nothing to wrap.
        assert!(extract_streams(html, None).is_empty());
    }

    #[test]
    fn test_quality_label() {
        assert_eq!(quality_label("Server 720p"), "720p");
        assert_eq!(quality_label("HD-1080"), "1080p");
        assert_eq!(quality_label("Mirror"), "720p");
        assert_eq!(quality_label("360P low"), "360p");
    }

    #[test]
    fn test_is_video_url() {
        assert!(is_video_url("https://v.example/embed/1"));
        assert!(!is_video_url("https://v.example/banner.png"));
        assert!(!is_video_url("https://v.example/banner.PNG?v=2"));
        assert!(!is_video_url("https://site.test/wp-content/uploads/x.mp4"));
        assert!(!is_video_url("https://s.w.org/images/core/emoji/1.svg"));
    }
}
