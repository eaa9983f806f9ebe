// SPDX-License-Identifier: GPL-3.0-or-later

use crate::enrich::{
    join_url, CoverArtArchive, CoverArtEnricher, CoverArtSource, EnrichmentHandle,
    EnrichmentMode, SpotifyAlbumArt,
};
use crate::error::{Result, UpstreamError};
use crate::models::{Album, Artist, Track};
use crate::normalize::{normalize_albums, normalize_artists, normalize_tracks, validate_album};
use crate::schema::{decode_record, decode_records, musicbrainz, spotify, UpstreamSchema};
use crate::session::{ApiSession, Auth};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
const MUSICBRAINZ_API_BASE: &str = "https://musicbrainz.org/ws/2";
const COVER_ART_ARCHIVE_BASE: &str = "https://coverartarchive.org";

const SEARCH_PAGE_SIZE: u32 = 10;
const SPOTIFY_ALBUM_PAGE_SIZE: u32 = 50;
const SPOTIFY_TRACK_PAGE_SIZE: u32 = 50;
const MUSICBRAINZ_ALBUM_PAGE_SIZE: u32 = 100;

/// Albums of an artist, plus the background cover-art task when one was started.
#[derive(Debug)]
pub struct AlbumListing {
    pub albums: Vec<Album>,
    pub enrichment: Option<EnrichmentHandle>,
}

impl AlbumListing {
    /// Wait for background enrichment, if any, and apply what it found.
    pub async fn into_enriched(self) -> Vec<Album> {
        let mut albums = self.albums;
        if let Some(handle) = self.enrichment {
            handle.wait().await.apply(&mut albums);
        }
        albums
    }
}

/// Typed access to one upstream: search, albums, tracks and album details.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    session: ApiSession,
    schema: UpstreamSchema,
    api_base_url: String,
    cover_art_base_url: String,
    enrichment: EnrichmentMode,
}

impl UpstreamClient {
    pub fn builder(schema: UpstreamSchema) -> UpstreamClientBuilder {
        UpstreamClientBuilder::new(schema)
    }

    pub fn schema(&self) -> UpstreamSchema {
        self.schema
    }

    pub fn session(&self) -> &ApiSession {
        &self.session
    }

    pub fn enrichment_mode(&self) -> EnrichmentMode {
        self.enrichment
    }

    /// Search artists by name.
    ///
    /// # Example
    /// ```no_run
    /// # use disco_upstream::{UpstreamClient, UpstreamSchema};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = UpstreamClient::builder(UpstreamSchema::MusicBrainz).build()?;
    /// let artists = client.search_artists("Radiohead").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self))]
    pub async fn search_artists(&self, query: &str) -> Result<Vec<Artist>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(UpstreamError::InvalidArgument(
                "search query must not be empty".to_string(),
            ));
        }

        let artists = match self.schema {
            UpstreamSchema::Spotify => {
                let mut url = self.api_url(&["search"])?;
                url.query_pairs_mut()
                    .append_pair("q", query)
                    .append_pair("type", "artist")
                    .append_pair("limit", &SEARCH_PAGE_SIZE.to_string());

                let response: spotify::ArtistSearchResponse = self.fetch(url).await?;
                normalize_artists(
                    response
                        .artists
                        .records()
                        .into_iter()
                        .map(|record| record.ok().and_then(spotify::SpotifyArtist::into_artist)),
                )
            }
            UpstreamSchema::MusicBrainz => {
                let mut url = self.api_url(&["artist"])?;
                url.query_pairs_mut()
                    .append_pair("query", query)
                    .append_pair("fmt", "json")
                    .append_pair("limit", &SEARCH_PAGE_SIZE.to_string());

                let response: musicbrainz::ArtistSearchResponse = self.fetch(url).await?;
                normalize_artists(
                    decode_records(response.artists)
                        .into_iter()
                        .map(|record| record.ok().and_then(musicbrainz::MbArtist::into_artist)),
                )
            }
        };

        debug!(target: "upstream", count = artists.len(), "artist search complete");
        Ok(artists)
    }

    /// List an artist's albums, dropping records without a usable release year.
    ///
    /// Cover art is attached according to the client's [`EnrichmentMode`].
    #[instrument(skip(self))]
    pub async fn list_albums(&self, artist_id: &str) -> Result<AlbumListing> {
        let artist_id = required_id(artist_id, "artist id")?;

        let mut albums = match self.schema {
            UpstreamSchema::Spotify => {
                let mut url = self.api_url(&["artists", artist_id, "albums"])?;
                url.query_pairs_mut()
                    .append_pair("include_groups", "album,single")
                    .append_pair("limit", &SPOTIFY_ALBUM_PAGE_SIZE.to_string());

                let page: spotify::Page = self.fetch(url).await?;
                normalize_albums(
                    page.records()
                        .into_iter()
                        .map(|record| record.map(spotify::SpotifyAlbum::into_draft)),
                )
            }
            UpstreamSchema::MusicBrainz => {
                let mut url = self.api_url(&["release-group"])?;
                url.query_pairs_mut()
                    .append_pair("artist", artist_id)
                    .append_pair("fmt", "json")
                    .append_pair("limit", &MUSICBRAINZ_ALBUM_PAGE_SIZE.to_string());

                let response: musicbrainz::ReleaseGroupBrowseResponse = self.fetch(url).await?;
                normalize_albums(
                    decode_records(response.release_groups)
                        .into_iter()
                        .map(|record| record.map(musicbrainz::ReleaseGroup::into_draft)),
                )
            }
        };

        let enricher = self.cover_art_enricher();
        enricher.apply_cached(&mut albums);

        let enrichment = match self.enrichment {
            EnrichmentMode::Eager { limit } => {
                enricher.enrich(&mut albums, limit).await;
                None
            }
            EnrichmentMode::Background => {
                let missing: Vec<String> = albums
                    .iter()
                    .filter(|album| album.cover_art_url.is_none())
                    .map(|album| album.id.clone())
                    .collect();
                (!missing.is_empty()).then(|| enricher.spawn(missing))
            }
        };

        info!(
            target: "upstream",
            count = albums.len(),
            background_enrichment = enrichment.is_some(),
            "albums listed"
        );
        Ok(AlbumListing { albums, enrichment })
    }

    /// List an album's tracks ordered by position.
    ///
    /// An album the upstream cannot resolve to any release yields no tracks rather than an error.
    #[instrument(skip(self))]
    pub async fn list_tracks(&self, album_id: &str) -> Result<Vec<Track>> {
        let album_id = required_id(album_id, "album id")?;

        let drafts = match self.schema {
            UpstreamSchema::Spotify => {
                let mut url = self.api_url(&["albums", album_id, "tracks"])?;
                url.query_pairs_mut()
                    .append_pair("limit", &SPOTIFY_TRACK_PAGE_SIZE.to_string());

                let page: Option<spotify::Page> = self.fetch_optional(url).await?;
                page.map(|page| {
                    page.records()
                        .into_iter()
                        .filter_map(std::result::Result::ok)
                        .map(spotify::SpotifyTrack::into_draft)
                        .collect()
                })
                .unwrap_or_default()
            }
            UpstreamSchema::MusicBrainz => {
                let mut url = self.api_url(&["release"])?;
                url.query_pairs_mut()
                    .append_pair("release-group", album_id)
                    .append_pair("fmt", "json")
                    .append_pair("inc", "recordings artist-credits")
                    .append_pair("limit", "1");

                let response: Option<musicbrainz::ReleaseBrowseResponse> =
                    self.fetch_optional(url).await?;
                response
                    .and_then(|response| response.releases.into_iter().next())
                    .and_then(|release| decode_record::<musicbrainz::Release>(release).ok())
                    .map(musicbrainz::Release::into_track_drafts)
                    .unwrap_or_default()
            }
        };

        let tracks = normalize_tracks(drafts);
        debug!(target: "upstream", count = tracks.len(), "tracks listed");
        Ok(tracks)
    }

    /// Secondary album details: label, cover art and platform links.
    ///
    /// Returns `Ok(None)` when the upstream knows nothing usable about the album.
    #[instrument(skip(self))]
    pub async fn get_album_enrichment(&self, album_id: &str) -> Result<Option<Album>> {
        let album_id = required_id(album_id, "album id")?;

        let draft = match self.schema {
            UpstreamSchema::Spotify => {
                let url = self.api_url(&["albums", album_id])?;
                let album: Option<Value> = self.fetch_optional(url).await?;
                album
                    .and_then(|album| decode_record::<spotify::SpotifyAlbum>(album).ok())
                    .map(spotify::SpotifyAlbum::into_draft)
            }
            UpstreamSchema::MusicBrainz => {
                let mut url = self.api_url(&["release-group", album_id])?;
                url.query_pairs_mut()
                    .append_pair("fmt", "json")
                    .append_pair("inc", "artist-credits url-rels");

                let group: Option<Value> = self.fetch_optional(url).await?;
                match group.and_then(|group| decode_record::<musicbrainz::ReleaseGroup>(group).ok()) {
                    Some(group) => {
                        let mut draft = group.into_draft();
                        draft.label = self.musicbrainz_label(album_id).await;
                        Some(draft)
                    }
                    None => None,
                }
            }
        };

        let Some(draft) = draft else {
            debug!(target: "upstream", "no enrichment data");
            return Ok(None);
        };

        let mut album = match validate_album(draft) {
            Ok(album) => album,
            Err(reason) => {
                debug!(target: "upstream", %reason, "enrichment record rejected");
                return Ok(None);
            }
        };

        if album.cover_art_url.is_none() {
            album.cover_art_url = self.cover_art_enricher().lookup(&album.id).await;
        }

        Ok(Some(album))
    }

    /// Label of the first release in the group; failures only lose the label.
    async fn musicbrainz_label(&self, release_group_id: &str) -> Option<String> {
        let mut url = self.api_url(&["release"]).ok()?;
        url.query_pairs_mut()
            .append_pair("release-group", release_group_id)
            .append_pair("fmt", "json")
            .append_pair("inc", "labels")
            .append_pair("limit", "1");

        match self.fetch::<musicbrainz::ReleaseBrowseResponse>(url).await {
            Ok(response) => response
                .releases
                .into_iter()
                .next()
                .and_then(|release| decode_record::<musicbrainz::Release>(release).ok())
                .and_then(|release| release.label()),
            Err(error) => {
                debug!(target: "upstream", error = %error, "label lookup failed");
                None
            }
        }
    }

    fn cover_art_enricher(&self) -> CoverArtEnricher {
        let source: Arc<dyn CoverArtSource> = match self.schema {
            UpstreamSchema::Spotify => Arc::new(SpotifyAlbumArt::new(
                self.session.clone(),
                self.api_base_url.clone(),
            )),
            UpstreamSchema::MusicBrainz => Arc::new(CoverArtArchive::new(
                self.session.clone(),
                self.cover_art_base_url.clone(),
            )),
        };
        CoverArtEnricher::new(source, self.session.cover_art_cache().clone())
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        join_url(&self.api_base_url, segments)
    }

    fn auth(&self) -> Auth {
        if self.schema.requires_bearer_auth() {
            Auth::Bearer
        } else {
            Auth::Anonymous
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.session.get_json(url, self.auth()).await
    }

    /// Like [`Self::fetch`], with 404 mapped to `None`.
    async fn fetch_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        match self.fetch(url).await {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }
}

fn required_id<'a>(id: &'a str, what: &str) -> Result<&'a str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(UpstreamError::InvalidArgument(format!(
            "{what} must not be empty"
        )));
    }
    Ok(id)
}

/// Builder for configuring an upstream client.
#[derive(Debug)]
pub struct UpstreamClientBuilder {
    schema: UpstreamSchema,
    session: Option<ApiSession>,
    api_base_url: String,
    cover_art_base_url: String,
    enrichment: EnrichmentMode,
}

impl UpstreamClientBuilder {
    fn new(schema: UpstreamSchema) -> Self {
        let api_base_url = match schema {
            UpstreamSchema::Spotify => SPOTIFY_API_BASE,
            UpstreamSchema::MusicBrainz => MUSICBRAINZ_API_BASE,
        };
        Self {
            schema,
            session: None,
            api_base_url: api_base_url.to_string(),
            cover_art_base_url: COVER_ART_ARCHIVE_BASE.to_string(),
            enrichment: EnrichmentMode::default(),
        }
    }

    /// Share an existing session (credential slot, rate limiter, caches).
    pub fn session(mut self, session: ApiSession) -> Self {
        self.session = Some(session);
        self
    }

    /// Set a custom base URL (useful for testing with mock servers).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set a custom Cover Art Archive base URL (useful for testing).
    pub fn cover_art_base_url(mut self, url: impl Into<String>) -> Self {
        self.cover_art_base_url = url.into();
        self
    }

    pub fn enrichment(mut self, mode: EnrichmentMode) -> Self {
        self.enrichment = mode;
        self
    }

    /// Build the client; without an explicit session a default one is created.
    pub fn build(self) -> Result<UpstreamClient> {
        let session = match self.session {
            Some(session) => session,
            None => ApiSession::builder().build()?,
        };

        Ok(UpstreamClient {
            session,
            schema: self.schema,
            api_base_url: self.api_base_url,
            cover_art_base_url: self.cover_art_base_url,
            enrichment: self.enrichment,
        })
    }
}
