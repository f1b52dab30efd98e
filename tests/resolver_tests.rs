//! Resolution flows driven end to end against canned pages.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rust_anime_scraper::models::StreamKind;
use rust_anime_scraper::resolver::{resolve_streams, PageFetcher};
use std::collections::HashMap;
use std::sync::Mutex;

const BASE: &str = "https://indoanime.test";

struct MockSite {
    pages: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl MockSite {
    fn new(pages: Vec<(&str, String)>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|(url, html)| (url.to_string(), html))
                .collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl PageFetcher for MockSite {
    async fn fetch_page(&self, url: &str) -> Option<String> {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned()
    }
}

fn mirror_page(servers: &[(&str, &str)]) -> String {
    let options: String = servers
        .iter()
        .map(|(label, src)| {
            format!(
                "<option value=\"{}\">{}</option>",
                STANDARD.encode(format!("<iframe src=\"{}\"></iframe>", src)),
                label
            )
        })
        .collect();
    format!(
        "<html><body><select class=\"mirror\">\
         <option value=\"\">Pilih Server</option>{}\
         </select></body></html>",
        options
    )
}

#[tokio::test]
async fn first_accepted_candidate_short_circuits() {
    let site = MockSite::new(vec![(
        "https://indoanime.test/foo-bar-episode-3/",
        mirror_page(&[("Mega 720p", "https://mega.test/embed/a")]),
    )]);

    let streams = resolve_streams(&site, BASE, "foo-bar-episode-3").await;
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].url, "https://mega.test/embed/a");
    assert_eq!(streams[0].quality, "720p");

    // Success on the first candidate; nothing else is probed.
    assert_eq!(
        site.requested(),
        vec!["https://indoanime.test/foo-bar-episode-3/"]
    );
}

#[tokio::test]
async fn candidates_probed_in_order_before_search() {
    let site = MockSite::new(vec![]);

    let streams = resolve_streams(&site, BASE, "foo-bar-episode-3").await;
    assert!(streams.is_empty());

    let requested = site.requested();
    assert_eq!(
        &requested[..3],
        &[
            "https://indoanime.test/foo-bar-episode-3/",
            "https://indoanime.test/foo-bar-episode-03/",
            "https://indoanime.test/foo-bar-sub-indo-episode-3/",
        ]
    );
    // All conventions exhausted, then the search endpoint.
    assert_eq!(requested[3], "https://indoanime.test/?s=foo+bar");
}

#[tokio::test]
async fn season_variant_candidate_resolves() {
    let slug = "tondemo-skill-de-isekai-hourou-meshi-2-episode-1";
    let variant_url = "https://indoanime.test/tondemo-skill-de-isekai-hourou-meshi-s2-episode-1/";
    let site = MockSite::new(vec![(
        variant_url,
        mirror_page(&[("Server 1080p", "https://v.test/embed/s2e1")]),
    )]);

    let streams = resolve_streams(&site, BASE, slug).await;
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].quality, "1080p");
    assert!(site.requested().contains(&variant_url.to_string()));
}

#[tokio::test]
async fn search_recovery_walks_detail_page_links() {
    let search_page = r#"<div class="bsx">
        <a href="https://indoanime.test/anime/foo-bar-sub-indo/">Foo Bar</a>
    </div>"#;
    let detail_page = r#"<div class="eplister"><ul>
        <li><a href="https://indoanime.test/foo-bar-sub-indo-ep-episode-3/">Episode 3</a></li>
    </ul></div>"#;

    let site = MockSite::new(vec![
        ("https://indoanime.test/?s=foo+bar", search_page.to_string()),
        (
            "https://indoanime.test/anime/foo-bar-sub-indo/",
            detail_page.to_string(),
        ),
        (
            "https://indoanime.test/foo-bar-sub-indo-ep-episode-3/",
            mirror_page(&[("Mega 480p", "https://mega.test/embed/r")]),
        ),
    ]);

    let streams = resolve_streams(&site, BASE, "foo-bar-episode-3").await;
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].url, "https://mega.test/embed/r");
    assert_eq!(streams[0].quality, "480p");

    let requested = site.requested();
    assert!(requested.contains(&"https://indoanime.test/anime/foo-bar-sub-indo/".to_string()));
    assert_eq!(
        requested.last().unwrap(),
        "https://indoanime.test/foo-bar-sub-indo-ep-episode-3/"
    );
}

#[tokio::test]
async fn search_recovery_constructs_url_when_no_episode_link() {
    let search_page =
        r#"<a href="https://indoanime.test/anime/foo-bar-sub-indo/">Foo Bar</a>"#;
    // Detail page with no episode links at all.
    let detail_page = r#"<div class="entry-content"><p>Synopsis only.</p></div>"#;

    let site = MockSite::new(vec![
        ("https://indoanime.test/?s=foo+bar", search_page.to_string()),
        (
            "https://indoanime.test/anime/foo-bar-sub-indo/",
            detail_page.to_string(),
        ),
        (
            "https://indoanime.test/foo-bar-sub-indo-episode-3/",
            mirror_page(&[("Srv 720p", "https://v.test/embed/c")]),
        ),
    ]);

    let streams = resolve_streams(&site, BASE, "foo-bar-episode-3").await;
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].url, "https://v.test/embed/c");
}

#[tokio::test]
async fn accepted_page_without_usable_mirrors_degrades_to_page_embed() {
    // Carries the selector markers but every option is junk.
    let page = r#"<html><body>
        <select class="mirror">
            <option value="">Pilih Server</option>
            <option value="short">Stub</option>
        </select>
    </body></html>"#;
    let url = "https://indoanime.test/foo-bar-episode-3/";
    let site = MockSite::new(vec![(url, page.to_string())]);

    let streams = resolve_streams(&site, BASE, "foo-bar-episode-3").await;
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].url, url);
    assert_eq!(streams[0].kind, StreamKind::Embed);
    assert_eq!(streams[0].provider, "IndoAnime (Page)");
}

#[tokio::test]
async fn duplicate_mirrors_collapse_to_one_stream() {
    let site = MockSite::new(vec![(
        "https://indoanime.test/foo-bar-episode-3/",
        mirror_page(&[
            ("Srv A 720p", "https://v.test/embed/same"),
            ("Srv B 1080p", "https://v.test/embed/same"),
            ("Srv C 480p", "https://v.test/embed/other"),
        ]),
    )]);

    let streams = resolve_streams(&site, BASE, "foo-bar-episode-3").await;
    assert_eq!(streams.len(), 2);
    let mut urls: Vec<&str> = streams.iter().map(|s| s.url.as_str()).collect();
    urls.dedup();
    assert_eq!(urls.len(), 2);
}

#[tokio::test]
async fn nothing_found_anywhere_is_empty_not_error() {
    let site = MockSite::new(vec![]);
    let streams = resolve_streams(&site, BASE, "completely-unknown-episode-9").await;
    assert!(streams.is_empty());
}
