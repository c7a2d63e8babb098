use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Json, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use reqwest::Client;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::{Result, AppError};
use crate::api::models::{Endpoint, LinkTitle, ParseRequest, ParseResponse};
use crate::api::response::{self, ApiResponse};
use crate::job::FetchResult;
use crate::parser::{parse_emoticons, parse_links, parse_mentions};
use crate::pipeline::LinkPipeline;
use crate::scraper::MAX_BODY_BYTES;
use crate::AppState;

const ENDPOINTS: &[(&str, &str)] = &[
    ("/", "GET"),
    ("/api/v1/parse", "POST"),
    ("/bulktest", "GET"),
    ("/selftest", "GET"),
    ("/debug/vars", "GET"),
];

const BULKTEST_URLS: &[&str] = &[
    "https://www.bbc.com",
    "http://www.cnn.com",
    "https://www.google.com",
    "https://www.youtube.com",
    "https://www.msn.com",
    "https://www.facebook.com",
    "https://www.yahoo.com",
    "https://www.amazon.com",
    "https://www.baidu.com",
    "http://www.wikipedia.com",
    "https://www.twitter.com",
    "https://www.live.com",
    "https://www.linkedin.com",
    "https://www.bing.com",
    "https://www.yandex.ru",
    "https://www.instagram.com",
    "https://www.ebay.com",
    "https://www.pinterest.com",
    "https://www.reddit.com",
    "https://www.netflix.com",
];

const SELFTEST_TITLE: &str = "Selftest";
const SELFTEST_PAGE: &str = "<html><title>Selftest</title></html>\n";

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(default_handler))
        .route("/api/v1/parse", post(parse_handler))
        .route("/bulktest", get(bulktest_handler))
        .route("/selftest", get(selftest_handler))
        .route("/debug/vars", get(vars_handler))
        .fallback(default_handler)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

/// Answers unknown requests with the list of registered endpoints.
async fn default_handler() -> impl IntoResponse {
    let endpoints: Vec<Endpoint> = ENDPOINTS
        .iter()
        .map(|(path, method)| Endpoint {
            path: path.to_string(),
            method: method.to_string(),
        })
        .collect();

    response::with_status(
        StatusCode::NOT_IMPLEMENTED,
        endpoints,
        Some("Unknown endpoint, see the list of available ones".to_string()),
    )
}

async fn parse_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ParseRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = payload.map_err(|rejection| AppError::ParseError(rejection.body_text()))?;

    let start_time = std::time::Instant::now();
    let parsed = process_message(&state.pipeline, &req.message).await;
    info!(
        links = parsed.links.len(),
        elapsed = ?start_time.elapsed(),
        "message parsed"
    );

    Ok(response::success(parsed))
}

/// Extracts mentions, emoticons and links from `message` and resolves the link titles.
pub async fn process_message(pipeline: &LinkPipeline, message: &str) -> ParseResponse {
    let mentions = parse_mentions(message);
    let emoticons = parse_emoticons(message);
    let links = parse_links(message);

    let links = pipeline
        .fetch_all(links)
        .await
        .into_iter()
        .map(|result| LinkTitle {
            url: result.url,
            title: result.title,
        })
        .collect();

    ParseResponse {
        mentions,
        emoticons,
        links,
    }
}

async fn bulktest_handler(State(state): State<AppState>) -> impl IntoResponse {
    let results = state.pipeline.fetch_all(BULKTEST_URLS.iter().copied()).await;
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format_report(&results),
    )
}

/// One line per result: url, title, queue-to-finish and start-to-finish times.
pub fn format_report(results: &[FetchResult]) -> String {
    results
        .iter()
        .map(|r| {
            format!(
                "{} | {} | Wait time: {}ms | Fetch time: {}ms\n",
                r.url,
                r.title,
                r.wait_time().num_milliseconds(),
                r.fetch_time().num_milliseconds()
            )
        })
        .collect()
}

async fn vars_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.admission.snapshot())
}

async fn selftest_handler(State(state): State<AppState>) -> impl IntoResponse {
    match run_selftest(&state).await {
        Ok(true) => "SelfTest - PASS".to_string(),
        Ok(false) => "SelfTest - FAIL".to_string(),
        Err(err) => {
            warn!(error = %err, "selftest could not run");
            err.to_string()
        }
    }
}

// Serves a fixture page, then sends a message linking to it through our own parse endpoint.
async fn run_selftest(state: &AppState) -> Result<bool> {
    let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)).await?;
    let fixture_url = format!("http://{}", listener.local_addr()?);
    let fixture = Router::new().fallback(|| async { Html(SELFTEST_PAGE) });
    let server = tokio::spawn(async move { axum::serve(listener, fixture).await });

    let request = ParseRequest {
        message: format!("hey @here {} is (Cool)", fixture_url),
    };
    let endpoint = format!("http://{}/api/v1/parse", reachable(state.config.server_addr));

    let outcome = post_message(state.pipeline.worker().client(), &endpoint, &request).await;
    server.abort();

    let Some(output) = outcome?.data else {
        return Ok(false);
    };

    Ok(output.emoticons.first().map(String::as_str) == Some("Cool")
        && output.mentions.first().map(String::as_str) == Some("here")
        && output
            .links
            .first()
            .is_some_and(|link| link.url == fixture_url && link.title == SELFTEST_TITLE))
}

async fn post_message(
    client: &Client,
    endpoint: &str,
    request: &ParseRequest,
) -> reqwest::Result<ApiResponse<ParseResponse>> {
    client
        .post(endpoint)
        .json(request)
        .send()
        .await?
        .json::<ApiResponse<ParseResponse>>()
        .await
}

// A wildcard bind address is not something a client can connect to.
fn reachable(addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
    } else {
        addr
    }
}
