// SPDX-License-Identifier: GPL-3.0-or-later

//! Spotify Web API payloads. Every field is optional; unknown fields are ignored.

use crate::models::{AlbumKind, Artist};
use crate::normalize::{AlbumDraft, SkipReason, TrackDraft};
use crate::schema::{decode_records, null_as_default};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Image {
    pub url: Option<String>,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Followers {
    pub total: Option<u64>,
}

/// Paging object; only the first page is ever read.
///
/// Items stay raw so each record is decoded on its own.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Page {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<Value>,
    pub total: Option<u32>,
}

impl Page {
    pub fn records<T: DeserializeOwned>(self) -> Vec<Result<T, SkipReason>> {
        decode_records(self.items)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ArtistSearchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub artists: Page,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SpotifyArtist {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<String>,
    pub popularity: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<Image>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub followers: Followers,
}

/// Simplified artist embedded in albums and tracks.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ArtistRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SpotifyAlbum {
    pub id: Option<String>,
    pub name: Option<String>,
    pub album_type: Option<String>,
    pub release_date: Option<String>,
    pub total_tracks: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<Image>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artists: Vec<ArtistRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub external_urls: ExternalUrls,
    /// Only present on the full album object.
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SpotifyTrack {
    pub id: Option<String>,
    pub name: Option<String>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub duration_ms: Option<u64>,
    /// Legacy millisecond duration some payloads still carry.
    pub length: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artists: Vec<ArtistRef>,
}

fn first_image(images: &[Image]) -> Option<String> {
    images.iter().find_map(|image| image.url.clone())
}

fn names(artists: &[ArtistRef]) -> Vec<String> {
    artists.iter().filter_map(|artist| artist.name.clone()).collect()
}

impl SpotifyArtist {
    /// `None` when the record has no id.
    pub fn into_artist(self) -> Option<Artist> {
        let id = self.id.filter(|id| !id.is_empty())?;
        Some(Artist {
            id,
            name: self.name.unwrap_or_default(),
            genres: self.genres,
            popularity: self.popularity,
            image_url: first_image(&self.images),
            follower_count: self.followers.total,
        })
    }
}

impl SpotifyAlbum {
    pub fn into_draft(self) -> AlbumDraft {
        let mut links = Vec::new();
        if let Some(url) = self.external_urls.spotify {
            links.push(("spotify".to_string(), url));
        }

        AlbumDraft {
            id: self.id,
            title: self.name,
            kind: self
                .album_type
                .as_deref()
                .map(AlbumKind::from_upstream)
                .unwrap_or(AlbumKind::Other),
            release_date: self.release_date,
            track_count: self.total_tracks,
            cover_art_url: first_image(&self.images),
            artist_names: names(&self.artists),
            links,
            label: self.label,
        }
    }
}

impl SpotifyTrack {
    pub fn into_draft(self) -> TrackDraft {
        TrackDraft {
            id: self.id,
            title: self.name,
            ordinal: self.track_number,
            disc: self.disc_number.unwrap_or(1),
            duration_ms: self.duration_ms,
            fallback_duration_ms: self.length,
            artist_names: names(&self.artists),
        }
    }
}
