// SPDX-License-Identifier: GPL-3.0-or-later
pub mod handlers;
pub mod state;

use axum::{routing::get, Json, Router};
use handlers::lookup::{
    album_enrichment, album_tracks, artist_albums, search_artists, AlbumResponse, ArtistResponse,
    ErrorResponse, TrackResponse, __path_album_enrichment, __path_album_tracks,
    __path_artist_albums, __path_search_artists,
};
use serde::Serialize;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use state::AppState;

#[derive(Serialize, utoipa::ToSchema)]
struct HealthResponse {
    status: &'static str,
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        search_artists,
        artist_albums,
        album_tracks,
        album_enrichment,
    ),
    components(
        schemas(
            HealthResponse,
            ArtistResponse,
            AlbumResponse,
            TrackResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "lookup", description = "Artist, album and track lookups")
    ),
    info(
        title = "Disco API",
        version = "0.1.0",
        description = "Discography lookups backed by Spotify or MusicBrainz",
    )
)]
struct ApiDoc;

pub fn router(state: AppState) -> Router {
    info!(target: "api", "building router");

    let api = Router::new()
        .route("/search-artists", get(search_artists))
        .route("/artist-albums", get(artist_albums))
        .route("/album-tracks", get(album_tracks))
        .route("/album-enrichment", get(album_enrichment));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}
