use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    MyAnimeList = 1,
    IndoAnime = 2,
    Kuronime = 3,
    Gogoanime = 4,
    NineAnime = 5,
}

impl Source {
    pub const fn display_name(&self) -> &'static str {
        match self {
            Source::MyAnimeList => "MyAnimeList",
            Source::IndoAnime => "IndoAnime",
            Source::Kuronime => "Kuronime",
            Source::Gogoanime => "Gogoanime",
            Source::NineAnime => "9Anime",
        }
    }

    /// Qualifier used in composite slugs for sources that own a namespace.
    /// MyAnimeList entries use the numeric MAL id as the qualifier instead.
    pub const fn qualifier(&self) -> &'static str {
        match self {
            Source::MyAnimeList => "mal",
            Source::IndoAnime => "indoanime",
            Source::Kuronime => "kuronime",
            Source::Gogoanime => "gogoanime",
            Source::NineAnime => "9anime",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecentAnime {
    pub title: String,
    pub slug: String,
    pub poster: String,
    /// Free-text label: "12 eps", a broadcast string, or an episode marker.
    pub episode: String,
    #[serde(rename = "type")]
    pub anime_type: String,
    pub source: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecentPage {
    pub results: Vec<RecentAnime>,
    pub has_next_page: bool,
}

impl RecentPage {
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            has_next_page: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum AiringStatus {
    Ongoing,
    Completed,
    Unknown,
}

impl AiringStatus {
    /// Lenient mapping from upstream status strings ("Currently Airing",
    /// "Finished Airing", "Ongoing", "Completed", ...).
    pub fn from_upstream(s: &str) -> Self {
        let k = s.to_lowercase();
        if k.contains("finished") || k.contains("completed") {
            AiringStatus::Completed
        } else if k.contains("ongoing") || k.contains("airing") {
            AiringStatus::Ongoing
        } else {
            AiringStatus::Unknown
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Anime {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub poster: String,
    #[serde(rename = "type")]
    pub anime_type: String,
    pub status: AiringStatus,
    pub score: Option<String>,
    pub synopsis: String,
    pub genres: Vec<String>,
    pub episodes: Vec<Episode>,
    pub source: String,
    pub source_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    pub slug: String,
    /// String-typed to tolerate non-numeric labels; used for sort and display.
    pub number: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub released_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Hls,
    Embed,
    Direct,
}

impl StreamKind {
    /// Classify a stream URL by its payload extension.
    pub fn classify(url: &str) -> Self {
        let lower = url.to_lowercase();
        let path = lower.split(['?', '#']).next().unwrap_or(&lower);
        if path.ends_with(".m3u8") {
            StreamKind::Hls
        } else if path.ends_with(".mp4") || path.ends_with(".webm") {
            StreamKind::Direct
        } else {
            StreamKind::Embed
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    pub provider: String,
    pub quality: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: StreamKind,
}
