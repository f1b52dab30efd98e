// Library interface for rust_anime_scraper
// This allows tests and external crates to use the scraper components

pub mod aggregator;
pub mod config;
pub mod extract;
pub mod helpers;
pub mod http_client;
pub mod metrics;
pub mod models;
pub mod resolver;
pub mod sources;
