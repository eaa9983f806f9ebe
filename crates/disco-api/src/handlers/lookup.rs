// SPDX-License-Identifier: GPL-3.0-or-later
use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use disco_upstream::{sort_albums_by_year_desc, Album, Artist, Track, UpstreamError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::{IntoParams, ToSchema};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Artist name to search for.
    pub q: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IdQuery {
    /// Upstream identifier of the artist or album.
    pub id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArtistResponse {
    pub id: String,
    pub name: String,
    pub genres: Vec<String>,
    pub popularity: Option<u32>,
    pub image_url: Option<String>,
    pub follower_count: Option<u64>,
}

impl From<Artist> for ArtistResponse {
    fn from(artist: Artist) -> Self {
        Self {
            id: artist.id,
            name: artist.name,
            genres: artist.genres,
            popularity: artist.popularity,
            image_url: artist.image_url,
            follower_count: artist.follower_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlbumResponse {
    pub id: String,
    pub title: String,
    /// One of `album`, `single`, `compilation`, `ep`, `other`.
    pub kind: String,
    pub release_year: Option<String>,
    pub track_count: Option<u32>,
    pub cover_art_url: Option<String>,
    pub artist_names: Vec<String>,
    pub external_links: BTreeMap<String, String>,
    pub label: Option<String>,
}

impl From<Album> for AlbumResponse {
    fn from(album: Album) -> Self {
        Self {
            id: album.id,
            title: album.title,
            kind: album.kind.as_str().to_string(),
            release_year: album.release_year,
            track_count: album.track_count,
            cover_art_url: album.cover_art_url,
            artist_names: album.artist_names,
            external_links: album.external_links,
            label: album.label,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackResponse {
    pub id: String,
    pub title: String,
    pub position: u32,
    pub duration_ms: Option<u64>,
    pub artist_names: Vec<String>,
}

impl From<Track> for TrackResponse {
    fn from(track: Track) -> Self {
        Self {
            id: track.id,
            title: track.title,
            position: track.position,
            duration_ms: track.duration_ms,
            artist_names: track.artist_names,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler failure, rendered as `{"error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Upstream(UpstreamError),
}

impl From<UpstreamError> for ApiError {
    fn from(error: UpstreamError) -> Self {
        Self::Upstream(error)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(UpstreamError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            Self::Upstream(UpstreamError::Configuration(_) | UpstreamError::InvalidUrl(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Upstream(
                UpstreamError::UpstreamAuth(_)
                | UpstreamError::Api { .. }
                | UpstreamError::RequestFailed(_)
                | UpstreamError::Decode(_),
            ) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::NotFound(message) => message,
            Self::Upstream(error) => error.to_string(),
        };
        if status.is_server_error() {
            warn!(target: "api", %status, error = %message, "request failed");
        }
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            ApiError::Upstream(UpstreamError::InvalidArgument(format!(
                "missing query parameter `{name}`"
            )))
        })
}

// ============================================================================
// Handlers
// ============================================================================

/// Search artists by name
#[utoipa::path(
    get,
    path = "/api/search-artists",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching artists", body = Vec<ArtistResponse>),
        (status = 400, description = "Missing query", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse)
    ),
    tag = "lookup"
)]
pub async fn search_artists(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ArtistResponse>>, ApiError> {
    let q = required(query.q, "q")?;
    debug!(target: "api", %q, "searching artists");

    let artists = state.client.search_artists(&q).await?;
    Ok(Json(artists.into_iter().map(ArtistResponse::from).collect()))
}

/// List an artist's albums, newest first
///
/// Cover art that is not known yet is looked up after the response is sent
/// and shows up on later requests.
#[utoipa::path(
    get,
    path = "/api/artist-albums",
    params(IdQuery),
    responses(
        (status = 200, description = "Albums sorted by release year, descending", body = Vec<AlbumResponse>),
        (status = 400, description = "Missing id", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse)
    ),
    tag = "lookup"
)]
pub async fn artist_albums(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Vec<AlbumResponse>>, ApiError> {
    let id = required(query.id, "id")?;
    debug!(target: "api", %id, "listing albums");

    // A background enrichment task outlives the request and fills the session cache.
    let mut albums = state.client.list_albums(&id).await?.albums;
    sort_albums_by_year_desc(&mut albums);

    Ok(Json(albums.into_iter().map(AlbumResponse::from).collect()))
}

/// List an album's tracks in order
#[utoipa::path(
    get,
    path = "/api/album-tracks",
    params(IdQuery),
    responses(
        (status = 200, description = "Tracks by position", body = Vec<TrackResponse>),
        (status = 400, description = "Missing id", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse)
    ),
    tag = "lookup"
)]
pub async fn album_tracks(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Vec<TrackResponse>>, ApiError> {
    let id = required(query.id, "id")?;
    debug!(target: "api", %id, "listing tracks");

    let tracks = state.client.list_tracks(&id).await?;
    Ok(Json(tracks.into_iter().map(TrackResponse::from).collect()))
}

/// Label, cover art and links for one album
#[utoipa::path(
    get,
    path = "/api/album-enrichment",
    params(IdQuery),
    responses(
        (status = 200, description = "Album details", body = AlbumResponse),
        (status = 400, description = "Missing id", body = ErrorResponse),
        (status = 404, description = "No details available", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse)
    ),
    tag = "lookup"
)]
pub async fn album_enrichment(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<AlbumResponse>, ApiError> {
    let id = required(query.id, "id")?;
    debug!(target: "api", %id, "fetching album details");

    match state.client.get_album_enrichment(&id).await? {
        Some(album) => Ok(Json(album.into())),
        None => Err(ApiError::NotFound(format!("no details for album {id}"))),
    }
}
