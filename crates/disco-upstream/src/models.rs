// SPDX-License-Identifier: GPL-3.0-or-later

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Bearer credential issued by the identity endpoint.
///
/// A credential is never modified after it is issued; renewal swaps in a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    /// Already reduced by the safety margin, so the token is still good at this instant.
    pub expires_at: Instant,
}

impl Credential {
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Artist as returned by a search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: String,
    pub name: String,
    /// At most [`crate::normalize::MAX_GENRES`] entries.
    #[serde(default)]
    pub genres: Vec<String>,
    pub popularity: Option<u32>,
    pub image_url: Option<String>,
    pub follower_count: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlbumKind {
    Album,
    Single,
    Compilation,
    Ep,
    #[default]
    Other,
}

impl AlbumKind {
    /// Map an upstream type label onto the internal vocabulary.
    pub fn from_upstream(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "album" => Self::Album,
            "single" => Self::Single,
            "compilation" => Self::Compilation,
            "ep" => Self::Ep,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Album => "album",
            Self::Single => "single",
            Self::Compilation => "compilation",
            Self::Ep => "ep",
            Self::Other => "other",
        }
    }
}

/// Album (release group) belonging to an artist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub title: String,
    pub kind: AlbumKind,
    /// Four digit year taken from the release date.
    pub release_year: Option<String>,
    pub track_count: Option<u32>,
    /// Filled in by the cover-art enricher after construction.
    pub cover_art_url: Option<String>,
    #[serde(default)]
    pub artist_names: Vec<String>,
    /// Platform name to URL.
    #[serde(default)]
    pub external_links: BTreeMap<String, String>,
    /// Only known after an enrichment lookup.
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub position: u32,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub artist_names: Vec<String>,
}

/// Sort newest first. Equal years keep their upstream order.
pub fn sort_albums_by_year_desc(albums: &mut [Album]) {
    albums.sort_by(|a, b| year_key(b).cmp(&year_key(a)));
}

fn year_key(album: &Album) -> i64 {
    album
        .release_year
        .as_deref()
        .and_then(|year| year.trim().parse::<i64>().ok())
        .unwrap_or(i64::MIN)
}
