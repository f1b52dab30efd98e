use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use rust_anime_scraper::aggregator::Aggregator;
use rust_anime_scraper::config::Config;
use rust_anime_scraper::http_client::FetchClient;
use rust_anime_scraper::metrics::MetricsTracker;
use serde::Deserialize;
use std::sync::Arc;

struct AppState {
    aggregator: Aggregator,
    metrics: MetricsTracker,
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<u32>,
}

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
}

#[get("/recent")]
async fn recent(data: web::Data<AppState>, query: web::Query<PageQuery>) -> impl Responder {
    let page = query.page.unwrap_or(1);
    HttpResponse::Ok().json(data.aggregator.recent(page).await)
}

#[get("/schedule")]
async fn schedule(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.aggregator.schedule().await)
}

#[get("/search")]
async fn search(data: web::Data<AppState>, query: web::Query<SearchQuery>) -> impl Responder {
    HttpResponse::Ok().json(data.aggregator.search(&query.q).await)
}

#[get("/anime/{slug}")]
async fn anime_detail(data: web::Data<AppState>, slug: web::Path<String>) -> impl Responder {
    match data.aggregator.detail(&slug).await {
        Some(anime) => HttpResponse::Ok().json(anime),
        None => HttpResponse::NotFound().json(serde_json::json!({"error": "Anime not found"})),
    }
}

#[get("/streams/{anime_slug}/{episode}")]
async fn streams(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (anime_slug, episode) = path.into_inner();
    HttpResponse::Ok().json(data.aggregator.stream_links(&anime_slug, &episode).await)
}

#[get("/metrics")]
async fn metrics(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.metrics.snapshot())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    log4rs::init_file("log4rs.yml", Default::default()).unwrap();

    let cfg = Config::load();
    let tracker = MetricsTracker::new();
    let fetch = Arc::new(
        FetchClient::new(cfg.http.clone(), tracker.clone()).expect("Failed to create HTTP client"),
    );

    log::info!("HTTP client initialized:");
    log::info!("  Max retries: {}", cfg.http.max_retries);
    log::info!("  HTML timeout: {}s", cfg.http.timeout_secs);
    log::info!("  Per-host concurrency: {}", cfg.http.per_host_concurrency);

    let data = web::Data::new(AppState {
        aggregator: Aggregator::new(fetch, cfg.sources.clone()),
        metrics: tracker,
    });

    // Try to bind to an available port starting at 8080
    let mut last_err: Option<std::io::Error> = None;
    for port in 8080..=8090 {
        let data_clone = data.clone();
        let addr = format!("127.0.0.1:{}", port);
        match HttpServer::new(move || {
            App::new()
                .app_data(data_clone.clone())
                .service(recent)
                .service(schedule)
                .service(search)
                .service(anime_detail)
                .service(streams)
                .service(metrics)
        })
        .bind(&addr)
        {
            Ok(server) => {
                log::info!("Listening on http://{}", addr);
                return server.run().await;
            }
            Err(e) => {
                log::warn!("Could not bind {}: {}", addr, e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::AddrInUse, "no port available")
    }))
}
