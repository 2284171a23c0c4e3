/// api.rs — All Axum route handlers.
use axum::{
    extract::{Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{convert::Infallible, path::PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::warn;

use crate::{
    error::{SessionError, ZipperError},
    session::DocumentInfo,
    state::AppState,
};

// ── Error helper ───────────────────────────────────────────────────────────────

fn err(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": msg.into() }))).into_response()
}

fn session_err(e: SessionError) -> Response {
    let status = match &e {
        SessionError::File(ZipperError::ReadFailure { .. })  => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::File(ZipperError::WriteFailure { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
        SessionError::Busy(_)                                => StatusCode::CONFLICT,
        SessionError::NothingLoaded                          => StatusCode::BAD_REQUEST,
    };
    err(status, e.to_string())
}

// ── Router ─────────────────────────────────────────────────────────────────────

pub fn router(state: AppState, static_dir: PathBuf) -> Router {
    Router::new()
        .route("/api/health",   get(health))
        .route("/api/session",  get(get_session))
        .route("/api/files",    get(list_files))
        .route("/api/open",     post(open_file))
        .route("/api/document", get(get_document))
        .route("/api/archive",  post(archive_file))
        .route("/api/events",   get(events))
        .fallback_service(ServeDir::new(static_dir).append_index_html_on_directories(true))
        .layer(middleware::from_fn_with_state(state.clone(), require_local_host))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ── Host check ─────────────────────────────────────────────────────────────────

/// Host names the server answers to: the configured host plus loopback aliases,
/// always on the configured port.
pub fn allowed_hosts(host: &str, port: u16) -> Vec<String> {
    let mut hosts: Vec<String> = [host, "localhost", "127.0.0.1", "[::1]"]
        .iter()
        .map(|h| format!("{}:{port}", h.to_ascii_lowercase()))
        .collect();
    hosts.sort();
    hosts.dedup();
    hosts
}

/// Rejects requests whose Host is not local, which defeats DNS rebinding.
async fn require_local_host(State(st): State<AppState>, req: Request, next: Next) -> Response {
    let host = req.headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|a| a.to_string()));

    let allowed = allowed_hosts(&st.cfg.host, st.cfg.port);
    match host {
        Some(h) if allowed.contains(&h.to_ascii_lowercase()) => next.run(req).await,
        other => {
            warn!("🚫 rejected request for host {other:?}");
            err(StatusCode::FORBIDDEN, "host not allowed")
        }
    }
}

// ── Health ─────────────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

// ── Session ────────────────────────────────────────────────────────────────────

pub async fn get_session(State(st): State<AppState>) -> impl IntoResponse {
    Json(st.session.snapshot())
}

#[derive(Deserialize)]
pub struct OpenBody { path: String }

pub async fn open_file(State(st): State<AppState>, Json(body): Json<OpenBody>) -> Response {
    let raw = body.path.trim();
    if raw.is_empty() { return err(StatusCode::BAD_REQUEST, "path must not be empty"); }
    let path = PathBuf::from(raw);
    let path = if path.is_relative() { st.cfg.start_dir.join(path) } else { path };

    match st.session.open(path).await {
        Ok(doc) => Json(json!({ "success": true, "document": DocumentInfo::from(doc.as_ref()) })).into_response(),
        Err(e)  => session_err(e),
    }
}

pub async fn get_document(State(st): State<AppState>) -> Response {
    match st.session.document() {
        None      => err(StatusCode::NOT_FOUND, SessionError::NothingLoaded.to_string()),
        Some(doc) => Json(json!({
            "path":       doc.path,
            "line_count": doc.line_count,
            "text":       doc.text,
        })).into_response(),
    }
}

pub async fn archive_file(State(st): State<AppState>) -> Response {
    match st.session.archive().await {
        Ok(summary) => {
            let report = summary.report();
            Json(json!({ "success": true, "summary": summary, "report": report })).into_response()
        }
        Err(e) => session_err(e),
    }
}

// ── Progress stream ────────────────────────────────────────────────────────────

pub async fn events(State(st): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = st.session.subscribe();
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(ev) => match Event::default().json_data(&ev) {
                    Ok(event) => yield Ok::<Event, Infallible>(event),
                    Err(e)    => warn!("⚠️  cannot encode event: {e}"),
                },
                Err(RecvError::Lagged(n)) => warn!("⚠️  event stream lagged, {n} events dropped"),
                Err(RecvError::Closed)    => break,
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ── File chooser ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct FilesQuery { dir: Option<String> }

#[derive(Serialize)]
struct DirEntryInfo {
    name:   String,
    path:   PathBuf,
    is_dir: bool,
    size:   u64,
}

pub async fn list_files(State(st): State<AppState>, Query(q): Query<FilesQuery>) -> Response {
    let dir = match q.dir.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => PathBuf::from(d),
        _                        => st.cfg.start_dir.clone(),
    };

    let mut read = match tokio::fs::read_dir(&dir).await {
        Ok(r)  => r,
        Err(e) => return session_err(ZipperError::read(&dir, e).into()),
    };
    let mut entries = Vec::new();
    loop {
        match read.next_entry().await {
            Ok(Some(entry)) => {
                // entries that vanish or cannot be stat'ed are skipped
                let Ok(meta) = entry.metadata().await else { continue };
                entries.push(DirEntryInfo {
                    name:   entry.file_name().to_string_lossy().into_owned(),
                    path:   entry.path(),
                    is_dir: meta.is_dir(),
                    size:   if meta.is_dir() { 0 } else { meta.len() },
                });
            }
            Ok(None) => break,
            Err(e)   => return session_err(ZipperError::read(&dir, e).into()),
        }
    }
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

    Json(json!({
        "dir":     dir,
        "parent":  dir.parent(),
        "entries": entries,
    })).into_response()
}
