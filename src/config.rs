use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    /// Jikan (MyAnimeList) REST API base.
    #[serde(default = "default_jikan_base")]
    pub jikan_base: String,

    /// WordPress-based anime fanshare site.
    #[serde(default = "default_indoanime_base")]
    pub indoanime_base: String,

    /// Fallback embed hosts, addressed by fixed URL patterns only.
    #[serde(default = "default_kuronime_base")]
    pub kuronime_base: String,

    #[serde(default = "default_gogoanime_base")]
    pub gogoanime_base: String,

    #[serde(default = "default_nineanime_base")]
    pub nineanime_base: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Timeout for HTML page fetches in seconds (fan sites are slow).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Timeout for JSON API fetches in seconds.
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,

    /// Maximum number of retry attempts for retryable failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial retry delay in milliseconds.
    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_ms: u64,

    /// Maximum retry delay in milliseconds.
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,

    /// Concurrent in-flight requests allowed per upstream host.
    #[serde(default = "default_per_host_concurrency")]
    pub per_host_concurrency: usize,

    /// Browser-like user agent sent on every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Enable cookie support.
    #[serde(default = "default_true")]
    pub enable_cookies: bool,

    /// Enable gzip/brotli compression.
    #[serde(default = "default_true")]
    pub enable_compression: bool,
}

fn default_true() -> bool {
    true
}
fn default_timeout() -> u64 {
    30
}
fn default_api_timeout() -> u64 {
    10
}
fn default_max_retries() -> usize {
    2
}
fn default_initial_retry_delay() -> u64 {
    500
}
fn default_max_retry_delay() -> u64 {
    4000
}
fn default_per_host_concurrency() -> usize {
    4
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}
fn default_jikan_base() -> String {
    "https://api.jikan.moe/v4".to_string()
}
fn default_indoanime_base() -> String {
    "https://indoanime.net".to_string()
}
fn default_kuronime_base() -> String {
    "https://kuronime.moe".to_string()
}
fn default_gogoanime_base() -> String {
    "https://anitaku.pe".to_string()
}
fn default_nineanime_base() -> String {
    "https://9animetv.to".to_string()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            jikan_base: default_jikan_base(),
            indoanime_base: default_indoanime_base(),
            kuronime_base: default_kuronime_base(),
            gogoanime_base: default_gogoanime_base(),
            nineanime_base: default_nineanime_base(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            api_timeout_secs: 10,
            max_retries: 2,
            initial_retry_delay_ms: 500,
            max_retry_delay_ms: 4000,
            per_host_concurrency: 4,
            user_agent: default_user_agent(),
            enable_cookies: true,
            enable_compression: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: SourcesConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let path = Path::new("config.toml");
        if path.exists() {
            if let Ok(content) = fs::read_to_string(path) {
                match toml::from_str::<Config>(&content) {
                    Ok(cfg) => return cfg,
                    Err(e) => log::warn!("Ignoring malformed config.toml: {}", e),
                }
            }
        }
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_fields_absent() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.http.timeout_secs, 30);
        assert_eq!(cfg.http.api_timeout_secs, 10);
        assert_eq!(cfg.http.per_host_concurrency, 4);
        assert_eq!(cfg.sources.jikan_base, "https://api.jikan.moe/v4");
        assert!(cfg.http.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_partial_override() {
        let cfg: Config = toml::from_str(
            r#"
            [http]
            timeout_secs = 5

            [sources]
            indoanime_base = "http://127.0.0.1:9000"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.http.timeout_secs, 5);
        assert_eq!(cfg.http.max_retries, 2);
        assert_eq!(cfg.sources.indoanime_base, "http://127.0.0.1:9000");
        assert_eq!(cfg.sources.jikan_base, "https://api.jikan.moe/v4");
    }
}
