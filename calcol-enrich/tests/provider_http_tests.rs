//! Provider adapter tests against a local mock upstream
//!
//! Each adapter is pointed at an axum server on 127.0.0.1 through its
//! configured base URL, so request shape, auth headers and response
//! normalisation are exercised over real HTTP.

mod helpers;

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use calcol_enrich::config::{
    AiProviderKind, EnrichConfig, HttpSettings, MuseumConfig, ProviderConfig,
};
use calcol_enrich::providers::anthropic::AnthropicClient;
use calcol_enrich::providers::bing::BingSearch;
use calcol_enrich::providers::brave::BraveSearch;
use calcol_enrich::providers::google::GoogleSearch;
use calcol_enrich::providers::museum::MuseumScraper;
use calcol_enrich::providers::openai::OpenAiClient;
use calcol_enrich::providers::{
    build_http_client, guarded, GenerativeProvider, MuseumSearch, ProviderError, Providers,
    SearchProvider, StructuredProvider,
};
use calcol_enrich::quota::{QuotaGuard, QuotaKey};
use calcol_enrich::{EnrichStatus, Orchestrator};
use helpers::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Mock Upstream
// ============================================================================

type Params = Query<HashMap<String, String>>;

fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> &'a str {
    params.get(name).map(String::as_str).unwrap_or("")
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

async fn google(Query(params): Params) -> Response {
    if param(&params, "key") != "g-key" || param(&params, "cx") != "engine-1" {
        return StatusCode::FORBIDDEN.into_response();
    }
    if param(&params, "searchType") == "image" {
        return Json(json!({
            "items": [{
                "title": "HP-35 calculator",
                "link": "https://img.example/hp35.jpg",
                "image": {
                    "thumbnailLink": "https://img.example/hp35_t.jpg",
                    "contextLink": "https://museum.example/hp35",
                    "width": 640,
                    "height": 480
                }
            }]
        }))
        .into_response();
    }
    Json(json!({
        "items": [
            {
                "title": "HP-35 calculator",
                "link": "https://museum.example/hp35",
                "snippet": "The HP-35 scientific calculator from 1972"
            },
            { "title": "Result without a link" }
        ]
    }))
    .into_response()
}

async fn bing_web(headers: HeaderMap, Query(params): Params) -> Response {
    if header(&headers, "ocp-apim-subscription-key") != "b-key" {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "webPages": {
            "value": [{
                "name": "HP 35 calculator restoration",
                "url": "https://blog.example/hp-35",
                "snippet": format!("count={}", param(&params, "count"))
            }]
        }
    }))
    .into_response()
}

async fn bing_images(headers: HeaderMap) -> Response {
    if header(&headers, "ocp-apim-subscription-key") != "b-key" {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "value": [
            {
                "contentUrl": "https://img.example/bing-hp35.jpg",
                "thumbnailUrl": "https://img.example/bing-hp35_t.jpg",
                "name": "HP 35 calculator",
                "hostPageUrl": "https://blog.example/hp-35",
                "width": 800
            },
            { "name": "no content url" }
        ]
    }))
    .into_response()
}

async fn brave_web(headers: HeaderMap, Query(params): Params) -> Response {
    if header(&headers, "x-subscription-token") != "v-key" {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if params.contains_key("count") {
        return Json(json!({
            "web": {
                "results": [{
                    "title": "HP-35 calculator page",
                    "url": "https://brave.example/hp35",
                    "description": "An HP 35 calculator overview"
                }]
            }
        }))
        .into_response();
    }
    // Structured prompt: no count, answer carries a keyword table
    Json(json!({
        "web": {
            "results": [
                { "url": "https://brave.example/empty", "description": "  " },
                { "url": "https://brave.example/other", "description": "Nothing tabular here." },
                {
                    "url": "https://brave.example/table",
                    "description": "| Keywords | Labels |\n|---|---|\n| Model | HP-35 |\n| Year | 1972 |"
                }
            ]
        }
    }))
    .into_response()
}

async fn brave_images() -> Json<Value> {
    Json(json!({
        "results": [
            {
                "url": "https://img.example/brave-a.jpg",
                "thumbnail": { "src": "https://img.example/brave-a_t.jpg" },
                "title": "HP 35 calculator",
                "source": "brave.example"
            },
            {
                "url": "https://img.example/brave-b.jpg",
                "thumbnail": "https://img.example/brave-b_t.jpg",
                "title": "HP 35 calculator back"
            }
        ]
    }))
}

async fn openai(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if header(&headers, "authorization") != "Bearer o-key" {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if body["messages"][0]["role"] != "system" || body["messages"][1]["role"] != "user" {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!({
        "choices": [{
            "message": {
                "content": "The HP-35 was introduced in 1972. Details at https://hp.example/35 and more."
            }
        }]
    }))
    .into_response()
}

async fn openai_empty() -> Json<Value> {
    Json(json!({ "choices": [] }))
}

async fn anthropic(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if header(&headers, "x-api-key") != "a-key"
        || header(&headers, "anthropic-version") != "2023-06-01"
    {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if !body["system"].as_str().map_or(false, |s| !s.is_empty()) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!({ "content": [{ "type": "text", "text": "Introduced in 1972." }] })).into_response()
}

async fn museum_search(Query(params): Params) -> String {
    format!(
        "<html><body><p>Collection entry: {} pocket calculator, introduced 1972.</p></body></html>",
        param(&params, "s")
    )
}

async fn museum_plain() -> &'static str {
    "<html><body>Welcome to the museum</body></html>"
}

async fn rate_limited() -> StatusCode {
    StatusCode::TOO_MANY_REQUESTS
}

fn mock_router() -> Router {
    Router::new()
        .route("/google", get(google))
        .route("/bing/search", get(bing_web))
        .route("/bing/images/search", get(bing_images))
        .route("/brave/web/search", get(brave_web))
        .route("/brave/images/search", get(brave_images))
        .route("/openai", post(openai))
        .route("/openai-empty", post(openai_empty))
        .route("/anthropic", post(anthropic))
        .route("/museum/search", get(museum_search))
        .route("/museum/plain", get(museum_plain))
        .route("/limited/search", get(rate_limited))
}

async fn spawn_upstream() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, mock_router()).await.unwrap();
    });
    addr
}

// ============================================================================
// Configuration Helpers
// ============================================================================

fn settings() -> HttpSettings {
    HttpSettings {
        timeout: Duration::from_secs(5),
        ..HttpSettings::default()
    }
}

fn client() -> reqwest::Client {
    build_http_client(Duration::from_secs(5)).unwrap()
}

fn provider(base_url: String, key: QuotaKey, api_key: &str) -> ProviderConfig {
    ProviderConfig::disabled(&base_url, key).with_api_key(api_key)
}

fn google_config(addr: SocketAddr) -> ProviderConfig {
    let mut config = provider(format!("http://{}/google", addr), QuotaKey::Google, "g-key");
    config.secondary_key = Some("engine-1".to_string());
    config
}

fn museum_config(addr: SocketAddr) -> MuseumConfig {
    MuseumConfig {
        enabled: true,
        sites: vec![
            format!("http://{}/museum/search?s=", addr),
            format!("http://{}/museum/plain", addr),
            format!("http://{}/museum/missing", addr),
        ],
        timeout: Duration::from_secs(5),
    }
}

// ============================================================================
// Search Providers
// ============================================================================

#[tokio::test]
async fn test_google_web_and_image() {
    let addr = spawn_upstream().await;
    let google = GoogleSearch::new(client(), &google_config(addr), &settings()).unwrap();

    let web = google.query_web("HP 35 calculator", 5).await.unwrap();
    assert_eq!(web.len(), 1, "items without a link are dropped");
    assert_eq!(web[0].url, "https://museum.example/hp35");
    assert_eq!(web[0].snippet, "The HP-35 scientific calculator from 1972");

    let images = google.query_image("HP 35 calculator image", 10).await.unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].provider_tag, "Google");
    assert_eq!(images[0].thumbnail_url, "https://img.example/hp35_t.jpg");
    assert_eq!(images[0].source_url, "https://museum.example/hp35");
    assert_eq!(images[0].width, Some(640));
}

#[tokio::test]
async fn test_google_requires_engine_id() {
    let mut config = provider("http://127.0.0.1:1/google".to_string(), QuotaKey::Google, "g-key");
    config.secondary_key = None;
    assert!(GoogleSearch::new(client(), &config, &settings()).is_none());
}

#[tokio::test]
async fn test_bing_web_and_image() {
    let addr = spawn_upstream().await;
    let config = provider(format!("http://{}/bing/", addr), QuotaKey::Bing, "b-key");
    let bing = BingSearch::new(client(), &config, &settings()).unwrap();

    let web = bing.query_web("HP 35", 5).await.unwrap();
    assert_eq!(web.len(), 1);
    assert_eq!(web[0].title, "HP 35 calculator restoration");
    assert_eq!(web[0].snippet, "count=5");

    let images = bing.query_image("HP 35", 10).await.unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].image_url, "https://img.example/bing-hp35.jpg");
    assert_eq!(images[0].provider_tag, "Bing");
    assert_eq!(images[0].width, Some(800));
    assert_eq!(images[0].height, None);
}

#[tokio::test]
async fn test_bing_wrong_key_is_status_error() {
    let addr = spawn_upstream().await;
    let config = provider(format!("http://{}/bing", addr), QuotaKey::Bing, "wrong");
    let bing = BingSearch::new(client(), &config, &settings()).unwrap();

    let err = bing.query_web("HP 35", 5).await.unwrap_err();
    assert!(matches!(err, ProviderError::Status { status: 401, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_brave_search_and_structured() {
    let addr = spawn_upstream().await;
    let config = provider(format!("http://{}/brave", addr), QuotaKey::Brave, "v-key");
    let brave = BraveSearch::new(client(), &config, &settings()).unwrap();

    let web = brave.query_web("HP 35", 5).await.unwrap();
    assert_eq!(web[0].url, "https://brave.example/hp35");
    assert_eq!(web[0].snippet, "An HP 35 calculator overview");

    let images = brave.query_image("HP 35", 10).await.unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].thumbnail_url, "https://img.example/brave-a_t.jpg");
    assert_eq!(images[1].thumbnail_url, "https://img.example/brave-b_t.jpg");
    assert!(images.iter().all(|i| i.provider_tag == "Brave"));

    let structured = brave.query_structured("HP", "35").await.unwrap().unwrap();
    assert_eq!(structured.source_url.as_deref(), Some("https://brave.example/table"));
    assert_eq!(structured.structured_table.get("Model").map(String::as_str), Some("HP-35"));
    assert_eq!(structured.structured_table.get("Year").map(String::as_str), Some("1972"));
    assert_eq!(structured.manufacturer, "HP");
}

// ============================================================================
// Generative Providers
// ============================================================================

#[tokio::test]
async fn test_openai_extracts_urls() {
    let addr = spawn_upstream().await;
    let config = provider(format!("http://{}/openai", addr), QuotaKey::Ai, "o-key");
    let openai = OpenAiClient::new(client(), &config, &settings()).unwrap();

    let result = openai.query_generative("Tell me about the HP-35").await.unwrap().unwrap();
    assert!(result.content.starts_with("The HP-35 was introduced in 1972."));
    assert_eq!(result.extracted_urls, vec!["https://hp.example/35"]);
}

#[tokio::test]
async fn test_openai_without_choices_is_empty() {
    let addr = spawn_upstream().await;
    let config = provider(format!("http://{}/openai-empty", addr), QuotaKey::Ai, "o-key");
    let openai = OpenAiClient::new(client(), &config, &settings()).unwrap();

    assert!(openai.query_generative("prompt").await.unwrap().is_none());
}

#[tokio::test]
async fn test_anthropic_sends_system_prompt() {
    let addr = spawn_upstream().await;
    let config = provider(format!("http://{}/anthropic", addr), QuotaKey::Ai, "a-key");
    let anthropic = AnthropicClient::new(client(), &config, &settings()).unwrap();

    let result = anthropic.query_generative("Tell me").await.unwrap().unwrap();
    assert_eq!(result.content, "Introduced in 1972.");
    assert!(result.extracted_urls.is_empty());
    assert_eq!(anthropic.quota_key(), QuotaKey::Ai);
}

// ============================================================================
// Museum Scraper
// ============================================================================

#[tokio::test]
async fn test_museum_reports_only_matching_sites() {
    let addr = spawn_upstream().await;
    let scraper = MuseumScraper::new(client(), &museum_config(addr), 1 << 20);

    let results = scraper.search("HP 35").await;

    assert_eq!(results.len(), 1);
    let hit = &results[0];
    assert!(hit.found);
    assert_eq!(hit.site_url, format!("http://{}/", addr));
    assert_eq!(hit.search_url, format!("http://{}/museum/search?s=HP+35", addr));
    let snippet = hit.snippet.as_deref().unwrap();
    assert!(snippet.contains("HP 35 pocket calculator"));
}

#[tokio::test]
async fn test_museum_blank_query_skips_fetching() {
    let addr = spawn_upstream().await;
    let scraper = MuseumScraper::new(client(), &museum_config(addr), 1 << 20);

    assert!(scraper.search("   ").await.is_empty());
}

// ============================================================================
// Call Contract
// ============================================================================

#[tokio::test]
async fn test_rate_limited_upstream_is_transient_and_not_counted() {
    let addr = spawn_upstream().await;
    let config = provider(format!("http://{}/limited", addr), QuotaKey::Bing, "b-key");
    let bing = BingSearch::new(client(), &config, &settings()).unwrap();
    let quota = QuotaGuard::default();

    let err = bing.query_web("HP 35", 5).await.unwrap_err();
    assert!(err.is_transient());

    let result = guarded(&quota, QuotaKey::Bing, "bing", "web", bing.query_web("HP 35", 5)).await;
    assert!(result.is_none());
    assert_eq!(quota.used(QuotaKey::Bing), 0);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let addr = spawn_upstream().await;
    let small = HttpSettings {
        timeout: Duration::from_secs(5),
        max_body_bytes: 64,
    };
    let google = GoogleSearch::new(client(), &google_config(addr), &small).unwrap();

    let err = google.query_web("HP 35", 5).await.unwrap_err();
    assert!(matches!(err, ProviderError::BodyTooLarge(64)));
}

// ============================================================================
// End to End
// ============================================================================

#[tokio::test]
async fn test_enrichment_over_http_providers() {
    let addr = spawn_upstream().await;
    let config = EnrichConfig {
        http: settings(),
        google: google_config(addr),
        bing: provider(format!("http://{}/bing", addr), QuotaKey::Bing, "b-key"),
        brave: provider(format!("http://{}/brave", addr), QuotaKey::Brave, "v-key"),
        ai: provider(format!("http://{}/anthropic", addr), QuotaKey::Ai, "a-key"),
        ai_provider: AiProviderKind::Anthropic,
        museum: museum_config(addr),
        ..EnrichConfig::default()
    };
    let providers = Providers::from_config(&config).unwrap();
    assert_eq!(providers.search.len(), 3);

    let storage = Arc::new(create_test_storage().await);
    let id = seed_entry(&storage, "HP", "35", Some(1972), &[]).await;
    let orchestrator = Orchestrator::new(storage.clone(), providers, generous_quota());

    let outcome = orchestrator.enrich(id).await.unwrap();

    assert_eq!(outcome.status, EnrichStatus::Partial);
    assert_eq!(
        outcome.record.added_link_urls,
        vec![
            "https://museum.example/hp35",
            "https://blog.example/hp-35",
            "https://brave.example/hp35",
        ]
    );
    let tags: Vec<&str> = outcome
        .record
        .image_results
        .iter()
        .map(|i| i.provider_tag.as_str())
        .collect();
    assert_eq!(tags, vec!["Google", "Bing", "Brave", "Brave"]);
    assert_eq!(outcome.record.museum_results.len(), 1);
    assert_eq!(
        outcome.record.ai_prose.as_ref().map(|p| p.content.as_str()),
        Some("Introduced in 1972.")
    );
    assert!(outcome.description.starts_with("Structured Information:\nModel: HP-35"));
    assert!(outcome.record.extracted_facts.contains(&"Introduced 1972".to_string()));
    assert_eq!(storage.get_links(id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_museum_trait_object_from_config() {
    let addr = spawn_upstream().await;
    let config = EnrichConfig {
        museum: museum_config(addr),
        ..EnrichConfig::default()
    };
    let providers = Providers::from_config(&config).unwrap();
    let museum: Arc<dyn MuseumSearch> = providers.museum.unwrap();

    assert_eq!(museum.search("hp 35").await.len(), 1);
}
