pub mod color;
pub mod session;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream};
use galen_core::{DocId, GalenError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use session::{ExplorerSession, Frame, Selection, SessionEvent};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const PAGE: &str = include_str!("../assets/index.html");

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Serialize)]
pub struct SearchResult {
    pub doc_id: DocId,
    pub score: f32,
    pub title: String,
    pub snippet: Option<String>,
}

#[derive(Serialize)]
pub struct PointOut {
    pub doc_id: DocId,
    pub x: f32,
    pub y: f32,
    pub title: String,
}

#[derive(Serialize)]
pub struct Controls {
    pub query: String,
    pub coloring: String,
    pub options: Vec<String>,
}

#[derive(Deserialize)]
pub struct QueryBody {
    pub q: String,
}

#[derive(Deserialize)]
pub struct ColoringBody {
    pub coloring: String,
}

#[derive(Deserialize)]
pub struct ClickBody {
    pub x: f32,
    pub y: f32,
}

#[derive(Serialize)]
pub struct DocOut {
    pub doc_id: DocId,
    pub paper_id: String,
    pub title: String,
    pub text: String,
}

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<ExplorerSession>>,
}

/// Open the session for `paper_dir` and build the router around it.
pub fn build_app(paper_dir: impl Into<PathBuf>, scores: Option<PathBuf>) -> Result<Router> {
    let paper_dir = paper_dir.into();
    let mut session = ExplorerSession::open(&paper_dir)?;
    if let Some(path) = scores {
        session.load_scores(&path)?;
    }
    Ok(build_router(session))
}

pub fn build_router(session: ExplorerSession) -> Router {
    let app_state = AppState { session: Arc::new(Mutex::new(session)) };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/", get(|| async { Html(PAGE) }))
        .route("/health", get(|| async { "ok" }))
        .route("/points", get(points_handler))
        .route("/controls", get(controls_handler))
        .route("/frame", get(frame_handler))
        .route("/query", post(query_handler))
        .route("/coloring", post(coloring_handler))
        .route("/click", post(click_handler))
        .route("/selection", get(selection_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/search", get(search_handler))
        .route("/events", get(events_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Map an error to a status code: bad input is 400, unknown documents 404.
fn error_response(err: anyhow::Error) -> (StatusCode, String) {
    let status = match err.downcast_ref::<GalenError>() {
        Some(GalenError::UnknownColumn(_)) => StatusCode::BAD_REQUEST,
        Some(GalenError::NoSuchDocument(_)) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %format!("{err:#}"), "request failed");
    }
    (status, format!("{err:#}"))
}

pub async fn points_handler(State(state): State<AppState>) -> Json<Vec<PointOut>> {
    let session = state.session.lock();
    let points = session
        .table()
        .rows()
        .iter()
        .map(|r| PointOut { doc_id: r.doc_id, x: r.x, y: r.y, title: r.title.clone() })
        .collect();
    Json(points)
}

pub async fn controls_handler(State(state): State<AppState>) -> Json<Controls> {
    let session = state.session.lock();
    Json(Controls {
        query: session.query().to_string(),
        coloring: session.coloring().to_string(),
        options: session.coloring_options(),
    })
}

pub async fn frame_handler(State(state): State<AppState>) -> Json<Frame> {
    Json(state.session.lock().frame().as_ref().clone())
}

pub async fn query_handler(State(state): State<AppState>, Json(body): Json<QueryBody>) -> ApiResult<Frame> {
    let frame = state.session.lock().set_query(body.q).map_err(error_response)?;
    Ok(Json(frame.as_ref().clone()))
}

pub async fn coloring_handler(State(state): State<AppState>, Json(body): Json<ColoringBody>) -> ApiResult<Frame> {
    let frame = state.session.lock().set_coloring(body.coloring).map_err(error_response)?;
    Ok(Json(frame.as_ref().clone()))
}

pub async fn click_handler(State(state): State<AppState>, Json(body): Json<ClickBody>) -> ApiResult<Selection> {
    match state.session.lock().click(body.x, body.y).map_err(error_response)? {
        Some(selection) => Ok(Json(selection.as_ref().clone())),
        None => Err((StatusCode::NOT_FOUND, "no points to select".into())),
    }
}

pub async fn selection_handler(State(state): State<AppState>) -> Json<Option<Selection>> {
    Json(state.session.lock().selection().map(|s| s.as_ref().clone()))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> ApiResult<DocOut> {
    let doc = state.session.lock().document(doc_id).map_err(error_response)?;
    Ok(Json(DocOut { doc_id: doc.id, paper_id: doc.paper_id, title: doc.title, text: doc.text }))
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> ApiResult<SearchResponse> {
    let start = std::time::Instant::now();
    let k = params.k.clamp(1, galen_core::search::MAX_MATCHES);
    // documents are read after the session is released
    let (hits, papers) = {
        let session = state.session.lock();
        (session.search(&params.q, k).map_err(error_response)?, session.papers())
    };
    let raw_terms: Vec<String> = params.q.split_whitespace().map(|s| s.to_string()).collect();
    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        let snippet = papers.get(hit.doc_id).ok().and_then(|d| snippet(&d.text, &raw_terms));
        results.push(SearchResult { doc_id: hit.doc_id, score: hit.score, title: hit.title, snippet });
    }
    Ok(Json(SearchResponse { query: params.q, took_s: start.elapsed().as_secs_f64(), total_hits: results.len(), results }))
}

pub async fn events_handler(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.session.lock().subscribe();
    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((Ok(to_sse(&event)), rx)),
                Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "event subscriber lagged"),
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse(event: &SessionEvent) -> Event {
    let encoded = match event {
        SessionEvent::Frame(frame) => Event::default().event("frame").json_data(frame.as_ref()),
        SessionEvent::Selection(selection) => Event::default().event("selection").json_data(selection.as_ref()),
    };
    encoded.unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

/// Window of text around the first query term, with terms wrapped in `<em>`.
fn snippet(text: &str, raw_terms: &[String]) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let lower = text.to_lowercase();
    let first_idx = raw_terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .find_map(|t| lower.find(&t.to_lowercase()));
    let window: String = match first_idx {
        Some(idx) if lower.len() == text.len() => {
            let start = floor_char_boundary(text, idx.saturating_sub(100));
            let end = floor_char_boundary(text, (idx + 200).min(text.len()));
            text[start..end].to_string()
        }
        _ => text.chars().take(200).collect(),
    };
    Some(highlight_terms(&window, raw_terms))
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut s = snippet.to_string();
    for t in terms {
        if t.trim().is_empty() {
            continue;
        }
        if let Ok(pat) = regex::RegexBuilder::new(&regex::escape(t)).case_insensitive(true).build() {
            s = pat.replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string();
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_centers_on_first_term() {
        let text = format!("{}spike protein{}", "a ".repeat(200), " b".repeat(200));
        let s = snippet(&text, &["Spike".to_string()]).unwrap();
        assert!(s.contains("<em>spike</em> protein"));
        assert!(s.len() < text.len());
    }

    #[test]
    fn snippet_without_match_takes_the_start() {
        let s = snippet("plain text here", &["absent".to_string()]).unwrap();
        assert_eq!(s, "plain text here");
        assert!(snippet("", &[]).is_none());
    }
}
