use crate::db::DbAlbum;
use crate::library::SharedLibraryManager;
use crate::negotiate::{negotiate, parse_wanted_formats, stored_format, Verdict};
use crate::transcode::AudioTranscoder;
use axum::{
    body::Body,
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

/// Server state shared by all request handlers
#[derive(Clone)]
pub struct AppState {
    pub library: SharedLibraryManager,
    pub transcoder: Arc<dyn AudioTranscoder>,
    /// Root directory the catalog's filenames are relative to
    pub media_root: PathBuf,
    /// Shared secret for the single trusted user
    pub auth_token: String,
}

/// Create the API router
///
/// Catalog and delivery routes sit behind the auth middleware; the static
/// media tree is served as-is.
pub fn create_router(state: AppState) -> Router {
    let media_root = state.media_root.clone();
    let api = Router::new()
        .route("/song/:track_id/:wanted_formats", get(get_track))
        .route("/albumart/:album_id", get(get_album_art))
        .route("/album/:album_id", get(list_album))
        .route("/search", get(search))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(api)
        .nest_service("/media", ServeDir::new(media_root))
        .layer(CorsLayer::permissive())
}

/// Query parameters for `/search`
#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

/// Get a track.
///
/// If `wanted_formats` (a comma-separated list) includes the file's stored
/// format, a redirect is sent so the static file can be served as such.
/// Otherwise, if `wanted_formats` includes ogg and the stored format is
/// convertible, it is transcoded on the fly.
async fn get_track(
    Path((track_id, wanted_formats)): Path<(i64, String)>,
    State(state): State<AppState>,
) -> Response {
    let wanted = parse_wanted_formats(&wanted_formats);

    let track = match state.library.get().get_track(track_id).await {
        Ok(Some(track)) => track,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!(track_id, error = %e, "track lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let actual_format = match stored_format(&track.filename) {
        Ok(format) => format,
        Err(e) => {
            // Corrupt catalog row. The client sees the same 404 as for an
            // unknown track; nothing about the catalog's state leaks out.
            warn!(track_id, error = %e, "cannot derive stored format");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    match negotiate(&actual_format, &wanted) {
        Verdict::Passthrough => {
            // No need to transcode. Just redirect to the static file.
            media_redirect(&track.filename)
        }
        Verdict::TranscodeToOgg => {
            // track.filename came out of the catalog and is not
            // client-supplied, so the joined path can be trusted.
            let input = state.media_root.join(&track.filename);
            match state.transcoder.start(&input).await {
                Ok(stream) => {
                    info!(track_id, from = %actual_format, "transcoding to ogg");
                    (
                        [(header::CONTENT_TYPE, "audio/ogg")],
                        Body::from_stream(stream),
                    )
                        .into_response()
                }
                Err(e) => {
                    // Startup failures happen before any body bytes, so a
                    // clean error status is still possible here.
                    error!(track_id, error = %e, "transcode startup failed");
                    StatusCode::SERVICE_UNAVAILABLE.into_response()
                }
            }
        }
        Verdict::Unsupported => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Redirect to an album's cover art, or 404 if it has none
async fn get_album_art(
    Path(album_id): Path<i64>,
    State(state): State<AppState>,
) -> Response {
    match state.library.get().get_album(album_id).await {
        Ok(Some(album)) => match album.cover_art {
            Some(cover) => media_redirect(&cover),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!(album_id, error = %e, "album lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Given an album ID, list its tracks
async fn list_album(Path(album_id): Path<i64>, State(state): State<AppState>) -> Response {
    let library = state.library.get();

    let album = match library.get_album(album_id).await {
        Ok(album) => album,
        Err(e) => {
            error!(album_id, error = %e, "album lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let tracks = match library.get_tracks_for_album(album_id).await {
        Ok(tracks) => tracks,
        Err(e) => {
            error!(album_id, error = %e, "track listing failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let objects: Vec<serde_json::Value> = tracks
        .iter()
        .map(|t| t.payload(album.as_ref()))
        .collect();

    Json(serde_json::json!({ "objects": objects })).into_response()
}

/// Perform a general search encompassing artist, track, albums
async fn search(Query(params): Query<SearchParams>, State(state): State<AppState>) -> Response {
    let library = state.library.get();

    let (albums, tracks) = match library.search(&params.q).await {
        Ok(results) => results,
        Err(e) => {
            error!(query = %params.q, error = %e, "search failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut objects: Vec<serde_json::Value> = albums.iter().map(DbAlbum::payload).collect();
    for track in &tracks {
        let album = match track.album_id {
            Some(album_id) => match library.get_album(album_id).await {
                Ok(album) => album,
                Err(e) => {
                    error!(track_id = track.id, error = %e, "album lookup failed");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            },
            None => None,
        };
        objects.push(track.payload(album.as_ref()));
    }

    Json(serde_json::json!({ "objects": objects })).into_response()
}

/// Require the shared-secret token on every API route.
///
/// Clients that cannot set headers (audio elements) may pass `?token=`.
async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if authorized(&state.auth_token, &request) {
        next.run(request).await
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

fn authorized(expected: &str, request: &Request) -> bool {
    if let Some(value) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return token == expected;
            }
        }
    }
    request
        .uri()
        .query()
        .map(|query| {
            query
                .split('&')
                .any(|pair| pair.strip_prefix("token=").is_some_and(|t| t == expected))
        })
        .unwrap_or(false)
}

/// 302 to the static path for a catalog filename, percent-encoding each
/// path segment
fn media_redirect(filename: &str) -> Response {
    let encoded: Vec<String> = filename
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    let location = format!("/media/{}", encoded.join("/"));
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
