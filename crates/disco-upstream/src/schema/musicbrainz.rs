// SPDX-License-Identifier: GPL-3.0-or-later

//! MusicBrainz web service and Cover Art Archive payloads.

use crate::models::{AlbumKind, Artist};
use crate::normalize::{AlbumDraft, TrackDraft};
use crate::schema::{decode_record, decode_records, null_as_default};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ArtistSearchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub artists: Vec<Value>,
}

/// Tag or genre with its vote count.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Tag {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MbArtist {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub artist_type: Option<String>,
    pub disambiguation: Option<String>,
    pub country: Option<String>,
    /// Search score (only present in search results).
    pub score: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<Tag>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<Tag>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ArtistRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ArtistCredit {
    /// Name as credited on the release.
    pub name: Option<String>,
    pub artist: Option<ArtistRef>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UrlTarget {
    pub resource: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Relation {
    #[serde(rename = "type")]
    pub relation_type: Option<String>,
    pub url: Option<UrlTarget>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReleaseGroupBrowseResponse {
    #[serde(rename = "release-groups", default, deserialize_with = "null_as_default")]
    pub release_groups: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReleaseGroup {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "primary-type")]
    pub primary_type: Option<String>,
    #[serde(rename = "secondary-types", default, deserialize_with = "null_as_default")]
    pub secondary_types: Vec<String>,
    /// YYYY, YYYY-MM or YYYY-MM-DD, sometimes empty.
    #[serde(rename = "first-release-date")]
    pub first_release_date: Option<String>,
    #[serde(rename = "artist-credit", default, deserialize_with = "null_as_default")]
    pub artist_credit: Vec<ArtistCredit>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub relations: Vec<Relation>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReleaseBrowseResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub releases: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Release {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media: Vec<Value>,
    #[serde(rename = "label-info", default, deserialize_with = "null_as_default")]
    pub label_info: Vec<LabelInfo>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LabelInfo {
    pub label: Option<LabelRef>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LabelRef {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Medium {
    pub position: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tracks: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Recording {
    pub id: Option<String>,
    pub title: Option<String>,
    pub length: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MbTrack {
    pub id: Option<String>,
    pub title: Option<String>,
    pub position: Option<u32>,
    pub length: Option<u64>,
    pub recording: Option<Recording>,
    #[serde(rename = "artist-credit", default, deserialize_with = "null_as_default")]
    pub artist_credit: Vec<ArtistCredit>,
}

/// Cover Art Archive listing for a release group.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CoverArtResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<CoverArtImage>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CoverArtImage {
    pub image: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub front: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub thumbnails: CoverArtThumbnails,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CoverArtThumbnails {
    #[serde(rename = "250")]
    pub small: Option<String>,
    #[serde(rename = "500")]
    pub large: Option<String>,
}

impl CoverArtResponse {
    /// Front image, preferring the 500px thumbnail, else the first image listed.
    pub fn front_image_url(&self) -> Option<String> {
        self.images
            .iter()
            .find(|image| image.front)
            .and_then(|image| {
                image
                    .thumbnails
                    .large
                    .clone()
                    .or_else(|| image.thumbnails.small.clone())
                    .or_else(|| image.image.clone())
            })
            .or_else(|| self.images.iter().find_map(|image| image.image.clone()))
    }
}

fn credited_names(credits: &[ArtistCredit]) -> Vec<String> {
    credits
        .iter()
        .filter_map(|credit| {
            credit
                .name
                .clone()
                .or_else(|| credit.artist.as_ref().and_then(|artist| artist.name.clone()))
        })
        .collect()
}

impl MbArtist {
    pub fn into_artist(self) -> Option<Artist> {
        let id = self.id.filter(|id| !id.is_empty())?;

        // Curated genres win over free-form tags when both are present.
        let mut tags = if self.genres.is_empty() {
            self.tags
        } else {
            self.genres
        };
        tags.sort_by(|a, b| b.count.cmp(&a.count));

        Some(Artist {
            id,
            name: self.name.unwrap_or_default(),
            genres: tags.into_iter().filter_map(|tag| tag.name).collect(),
            popularity: self.score,
            image_url: None,
            follower_count: None,
        })
    }
}

impl ReleaseGroup {
    pub fn kind(&self) -> AlbumKind {
        if self
            .secondary_types
            .iter()
            .any(|kind| kind.eq_ignore_ascii_case("compilation"))
        {
            return AlbumKind::Compilation;
        }
        self.primary_type
            .as_deref()
            .map(AlbumKind::from_upstream)
            .unwrap_or(AlbumKind::Other)
    }

    pub fn into_draft(self) -> AlbumDraft {
        let kind = self.kind();

        let mut links = Vec::new();
        if let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) {
            links.push((
                "musicbrainz".to_string(),
                format!("https://musicbrainz.org/release-group/{id}"),
            ));
        }
        for relation in &self.relations {
            let (Some(relation_type), Some(resource)) = (
                relation.relation_type.as_deref(),
                relation.url.as_ref().and_then(|url| url.resource.clone()),
            ) else {
                continue;
            };
            links.push((relation_type.to_string(), resource));
        }

        AlbumDraft {
            id: self.id,
            title: self.title,
            kind,
            release_date: self.first_release_date,
            track_count: None,
            cover_art_url: None,
            artist_names: credited_names(&self.artist_credit),
            links,
            label: None,
        }
    }
}

impl Release {
    pub fn label(&self) -> Option<String> {
        self.label_info
            .iter()
            .find_map(|info| info.label.as_ref().and_then(|label| label.name.clone()))
    }

    /// Tracks of every medium, in medium order. Malformed media and tracks are skipped.
    pub fn into_track_drafts(self) -> Vec<TrackDraft> {
        self.media
            .into_iter()
            .enumerate()
            .filter_map(|(index, medium)| {
                decode_record::<Medium>(medium)
                    .ok()
                    .map(|medium| (index, medium))
            })
            .flat_map(|(index, medium)| {
                let fallback_disc = u32::try_from(index).unwrap_or(u32::MAX).saturating_add(1);
                let disc = medium.position.unwrap_or(fallback_disc);
                decode_records::<MbTrack>(medium.tracks)
                    .into_iter()
                    .filter_map(Result::ok)
                    .map(move |track| {
                        let (recording_title, recording_length) = track
                            .recording
                            .map(|recording| (recording.title, recording.length))
                            .unwrap_or((None, None));
                        TrackDraft {
                            id: track.id,
                            title: track.title.or(recording_title),
                            ordinal: track.position,
                            disc,
                            duration_ms: track.length,
                            fallback_duration_ms: recording_length,
                            artist_names: credited_names(&track.artist_credit),
                        }
                    })
            })
            .collect()
    }
}
