// SPDX-License-Identifier: GPL-3.0-or-later

//! Best-effort cover art for album listings.

use crate::error::{Result, UpstreamError};
use crate::models::Album;
use crate::schema::musicbrainz::CoverArtResponse;
use crate::schema::spotify::SpotifyAlbum;
use crate::session::{ApiSession, Auth};
use async_trait::async_trait;
use moka::sync::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use url::Url;

/// When cover art is fetched relative to returning an album listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnrichmentMode {
    /// Fill in the first `limit` albums before the listing is returned.
    Eager { limit: usize },
    /// Return the listing at once and fetch art for every album in a background task.
    #[default]
    Background,
}

/// Something that can find the front cover of an album.
#[async_trait]
pub trait CoverArtSource: Send + Sync {
    /// `Ok(None)` when the source has no artwork for the album.
    async fn front_cover(&self, album_id: &str) -> Result<Option<String>>;
}

/// Cover Art Archive lookup by release-group id.
#[derive(Debug, Clone)]
pub struct CoverArtArchive {
    session: ApiSession,
    base_url: String,
}

impl CoverArtArchive {
    pub fn new(session: ApiSession, base_url: impl Into<String>) -> Self {
        Self {
            session,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CoverArtSource for CoverArtArchive {
    async fn front_cover(&self, album_id: &str) -> Result<Option<String>> {
        let url = join_url(&self.base_url, &["release-group", album_id])?;
        match self
            .session
            .get_json::<CoverArtResponse>(url, Auth::Anonymous)
            .await
        {
            Ok(response) => Ok(response.front_image_url()),
            // The archive answers 404 for release groups without artwork.
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// Spotify album lookup, first listed image.
#[derive(Debug, Clone)]
pub struct SpotifyAlbumArt {
    session: ApiSession,
    api_base_url: String,
}

impl SpotifyAlbumArt {
    pub fn new(session: ApiSession, api_base_url: impl Into<String>) -> Self {
        Self {
            session,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CoverArtSource for SpotifyAlbumArt {
    async fn front_cover(&self, album_id: &str) -> Result<Option<String>> {
        let url = join_url(&self.api_base_url, &["albums", album_id])?;
        match self.session.get_json::<SpotifyAlbum>(url, Auth::Bearer).await {
            Ok(album) => Ok(album.images.into_iter().find_map(|image| image.url)),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }
}

pub(crate) fn join_url(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| UpstreamError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Cover-art URLs found by one enrichment pass, keyed by album id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverArtMap(HashMap<String, String>);

impl CoverArtMap {
    pub fn get(&self, album_id: &str) -> Option<&str> {
        self.0.get(album_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Set `cover_art_url` on every album this map has a URL for.
    pub fn apply(&self, albums: &mut [Album]) {
        for album in albums.iter_mut() {
            if let Some(url) = self.0.get(&album.id) {
                album.cover_art_url = Some(url.clone());
            }
        }
    }
}

/// Handle to a background enrichment task.
///
/// Dropping the handle leaves the task running; its results still land in
/// the session's cover-art cache. The task never touches the caller's albums,
/// so aborting it cannot leave them half-updated.
#[derive(Debug)]
pub struct EnrichmentHandle {
    task: JoinHandle<CoverArtMap>,
}

impl EnrichmentHandle {
    /// Wait for the task; an aborted or panicked task yields an empty map.
    pub async fn wait(self) -> CoverArtMap {
        match self.task.await {
            Ok(found) => found,
            Err(error) => {
                debug!(target: "enrichment", error = %error, "enrichment task did not complete");
                CoverArtMap::default()
            }
        }
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Attaches cover art to albums. Lookup failures only cost the artwork.
#[derive(Clone)]
pub struct CoverArtEnricher {
    source: Arc<dyn CoverArtSource>,
    cache: Cache<String, String>,
}

impl CoverArtEnricher {
    pub fn new(source: Arc<dyn CoverArtSource>, cache: Cache<String, String>) -> Self {
        Self { source, cache }
    }

    /// Cached URL, else a lookup. Errors are logged and swallowed.
    #[instrument(skip(self))]
    pub async fn lookup(&self, album_id: &str) -> Option<String> {
        if let Some(cached) = self.cache.get(album_id) {
            return Some(cached);
        }

        match self.source.front_cover(album_id).await {
            Ok(Some(url)) => {
                self.cache.insert(album_id.to_string(), url.clone());
                Some(url)
            }
            Ok(None) => {
                debug!(target: "enrichment", "no cover art available");
                None
            }
            Err(error) => {
                warn!(target: "enrichment", error = %error, "cover art lookup failed");
                None
            }
        }
    }

    /// Fill cached art into every album, without any lookups.
    pub fn apply_cached(&self, albums: &mut [Album]) {
        for album in albums.iter_mut().filter(|album| album.cover_art_url.is_none()) {
            album.cover_art_url = self.cache.get(&album.id);
        }
    }

    /// Enrich albums in place, in order, stopping after `limit` lookups.
    pub async fn enrich(&self, albums: &mut [Album], limit: usize) {
        for album in albums
            .iter_mut()
            .filter(|album| album.cover_art_url.is_none())
            .take(limit)
        {
            album.cover_art_url = self.lookup(&album.id).await;
        }
    }

    /// Look up art for `album_ids` on a background task.
    pub fn spawn(&self, album_ids: Vec<String>) -> EnrichmentHandle {
        let enricher = self.clone();
        let task = tokio::spawn(async move {
            let mut found = HashMap::new();
            for album_id in album_ids {
                if let Some(url) = enricher.lookup(&album_id).await {
                    found.insert(album_id, url);
                }
            }
            debug!(target: "enrichment", found = found.len(), "background enrichment finished");
            CoverArtMap(found)
        });
        EnrichmentHandle { task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlbumKind;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `art-<id>` for every id except those starting with `missing` or `broken`.
    struct FakeSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CoverArtSource for FakeSource {
        async fn front_cover(&self, album_id: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if album_id.starts_with("missing") {
                return Ok(None);
            }
            if album_id.starts_with("broken") {
                return Err(UpstreamError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(Some(format!("art-{album_id}")))
        }
    }

    fn enricher() -> (CoverArtEnricher, Arc<FakeSource>) {
        let source = Arc::new(FakeSource {
            calls: AtomicUsize::new(0),
        });
        (
            CoverArtEnricher::new(source.clone(), Cache::new(100)),
            source,
        )
    }

    fn album(id: &str) -> Album {
        Album {
            id: id.to_string(),
            title: id.to_string(),
            kind: AlbumKind::Album,
            release_year: Some("2020".to_string()),
            track_count: None,
            cover_art_url: None,
            artist_names: Vec::new(),
            external_links: BTreeMap::new(),
            label: None,
        }
    }

    #[tokio::test]
    async fn test_enrich_respects_limit_and_swallows_errors() {
        let (enricher, _) = enricher();
        let mut albums = vec![album("a"), album("broken-b"), album("missing-c"), album("d")];

        enricher.enrich(&mut albums, 3).await;

        assert_eq!(albums[0].cover_art_url.as_deref(), Some("art-a"));
        assert_eq!(albums[1].cover_art_url, None);
        assert_eq!(albums[2].cover_art_url, None);
        assert_eq!(albums[3].cover_art_url, None, "beyond the limit");
    }

    #[tokio::test]
    async fn test_lookup_is_cached() {
        let (enricher, source) = enricher();

        assert_eq!(enricher.lookup("a").await.as_deref(), Some("art-a"));
        assert_eq!(enricher.lookup("a").await.as_deref(), Some("art-a"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_background_task_fills_map_and_cache() {
        let (enricher, _) = enricher();
        let mut albums = vec![album("a"), album("missing-b"), album("c")];

        let handle = enricher.spawn(albums.iter().map(|a| a.id.clone()).collect());
        assert!(albums.iter().all(|a| a.cover_art_url.is_none()));

        let found = handle.wait().await;
        assert_eq!(found.len(), 2);
        found.apply(&mut albums);

        assert_eq!(albums[0].cover_art_url.as_deref(), Some("art-a"));
        assert_eq!(albums[1].cover_art_url, None);
        assert_eq!(albums[2].cover_art_url.as_deref(), Some("art-c"));

        let mut later = vec![album("c")];
        enricher.apply_cached(&mut later);
        assert_eq!(later[0].cover_art_url.as_deref(), Some("art-c"));
    }

    #[tokio::test]
    async fn test_aborted_task_yields_empty_map() {
        let (enricher, _) = enricher();

        let handle = enricher.spawn(vec!["a".to_string()]);
        handle.abort();
        let found = handle.wait().await;

        // Abort can race with completion on a fast task; either way nothing is half-written.
        assert!(found.is_empty() || found.get("a") == Some("art-a"));
    }

    #[test]
    fn test_join_url_appends_segments() {
        let url = join_url("https://coverartarchive.org/", &["release-group", "abc"]).unwrap();
        assert_eq!(url.as_str(), "https://coverartarchive.org/release-group/abc");

        let url = join_url("http://127.0.0.1:9000/v1", &["albums", "x y"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/v1/albums/x%20y");
    }
}
