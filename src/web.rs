//! Gallery page and read-only REST API.
//!
//! This layer only ever reads: piece snapshots come from the store, artist
//! display data from the registry. No write endpoints — the only writer is
//! the curator task. Viewing a piece pokes the orb to FINISHED for that
//! piece's artist, best-effort and off the request path.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, Json};
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::artist::Registry;
use crate::curator::Stage;
use crate::orb::{OrbClient, Phase};
use crate::store::{Piece, PieceStore};

/// Shared read-only state for all handlers.
pub struct AppState {
    pub store: Arc<PieceStore>,
    pub registry: Arc<Registry>,
    pub orb: OrbClient,
    pub stage: Arc<Mutex<Stage>>,
    pub images_dir: PathBuf,
}

/// Build the axum router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(gallery_page))
        .route("/api/v1/health", get(api_health))
        .route("/api/v1/status", get(api_status))
        .route("/api/v1/pieces", get(api_pieces))
        .route("/api/v1/pieces/latest", get(api_latest_piece))
        .route("/api/v1/pieces/{index}", get(api_piece))
        .nest_service("/images", ServeDir::new(state.images_dir.clone()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── JSON read API ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    pieces: usize,
}

async fn api_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        pieces: state.store.count(),
    })
}

#[derive(Serialize)]
struct StatusResponse {
    stage: String,
    pieces: usize,
    artists: usize,
}

async fn api_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let stage = *state.stage.lock().await;
    Json(StatusResponse {
        stage: stage.to_string(),
        pieces: state.store.count(),
        artists: state.registry.len(),
    })
}

#[derive(Serialize)]
struct PiecesResponse {
    count: usize,
    ids: Vec<u64>,
}

async fn api_pieces(State(state): State<Arc<AppState>>) -> Json<PiecesResponse> {
    let pieces = state.store.snapshot();
    Json(PiecesResponse {
        count: pieces.len(),
        ids: pieces.iter().map(|p| p.id).collect(),
    })
}

async fn api_latest_piece(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Piece>, StatusCode> {
    state.store.latest().map(Json).map_err(|_| StatusCode::NOT_FOUND)
}

async fn api_piece(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<Piece>, StatusCode> {
    state.store.get(index).map(Json).map_err(|_| StatusCode::NOT_FOUND)
}

// ── Gallery page ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PageQuery {
    index: Option<usize>,
}

async fn gallery_page(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageQuery>,
) -> Html<String> {
    let total = state.store.count();
    if total == 0 {
        return Html(
            "<html><body><h1>The gallery is booting up.</h1>\
             <p>No pieces yet. Come back in half an hour.</p></body></html>"
                .to_string(),
        );
    }

    let index = params.index.unwrap_or(total - 1).min(total - 1);
    let piece = match state.store.get(index) {
        Ok(p) => p,
        Err(_) => return Html("<html><body><h1>Gone.</h1></body></html>".to_string()),
    };

    // Old pieces may reference an artist that was since removed from the
    // registry; show them under the default artist's banner.
    let artist = state
        .registry
        .get(&piece.artist_id)
        .unwrap_or_else(|| state.registry.default_artist());

    // Tell the orb which artist is on display. FINISHED: viewing, not
    // generating. Spawned so a slow orb never delays the page.
    let orb = state.orb.clone();
    let artist_id = artist.id.clone();
    tokio::spawn(async move {
        orb.notify(&artist_id, Phase::Finished).await;
    });

    let accent = artist
        .palette
        .values()
        .next()
        .cloned()
        .unwrap_or_else(|| "#888888".to_string());

    let prev = if index > 0 {
        format!("<a href=\"/?index={}\">&larr; older</a>", index - 1)
    } else {
        String::new()
    };
    let next = if index + 1 < total {
        format!("<a href=\"/?index={}\">newer &rarr;</a>", index + 1)
    } else {
        String::new()
    };

    let commentary_html = escape(&piece.commentary).replace("\n\n", "</p><p>");

    Html(format!(
        "<!doctype html><html><head><meta charset=\"utf-8\">\
         <title>{title} — {artist_name}</title>\
         <style>body{{font-family:serif;max-width:640px;margin:2em auto;}}\
         h1{{border-bottom:3px solid {accent};}}\
         img{{width:100%;image-rendering:pixelated;}}</style></head><body>\
         <h1>{title}</h1>\
         <p><em>{artist_name}</em> &middot; {created} &middot; {n} of {total}</p>\
         <img src=\"/images/{image}\" alt=\"{title}\">\
         <p>{commentary}</p>\
         <nav>{prev} {next}</nav>\
         </body></html>",
        title = escape(&piece.title),
        artist_name = escape(&artist.name),
        accent = escape(&accent),
        created = piece.created_at.format("%Y-%m-%d %H:%M UTC"),
        n = index + 1,
        total = total,
        image = escape(&piece.image_filename),
        commentary = commentary_html,
        prev = prev,
        next = next,
    ))
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
