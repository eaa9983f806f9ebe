// SPDX-License-Identifier: GPL-3.0-or-later

//! Mapping of upstream records onto [`Artist`], [`Album`] and [`Track`].
//!
//! Everything here is pure. Missing fields become `None`; the only records
//! that are dropped are albums failing [`validate_album`].

use crate::models::{Album, AlbumKind, Artist, Track};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

/// Genres kept per artist.
pub const MAX_GENRES: usize = 8;

/// Release dates upstreams use when the date is not known yet.
const PLACEHOLDER_DATES: [&str; 2] = ["TBD", "NA"];

/// Album fields as read from either schema, before validation.
#[derive(Debug, Clone, Default)]
pub struct AlbumDraft {
    pub id: Option<String>,
    pub title: Option<String>,
    pub kind: AlbumKind,
    pub release_date: Option<String>,
    pub track_count: Option<u32>,
    pub cover_art_url: Option<String>,
    pub artist_names: Vec<String>,
    /// Platform links supplied by the upstream itself.
    pub links: Vec<(String, String)>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TrackDraft {
    pub id: Option<String>,
    pub title: Option<String>,
    /// Position within its disc, when the upstream reports one.
    pub ordinal: Option<u32>,
    pub disc: u32,
    pub duration_ms: Option<u64>,
    pub fallback_duration_ms: Option<u64>,
    pub artist_names: Vec<String>,
}

/// Why an album record was left out of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("record does not match the upstream schema")]
    Malformed,
    #[error("record has no id")]
    MissingId,
    #[error("release date is missing or blank")]
    MissingReleaseDate,
    #[error("release date is a placeholder")]
    PlaceholderReleaseDate,
    #[error("release year is not a number")]
    UnparseableYear,
}

/// Text before the first `-` of a release date.
pub fn release_year(release_date: &str) -> &str {
    release_date
        .split('-')
        .next()
        .unwrap_or(release_date)
        .trim()
}

/// Apply the album validity predicate and build the album.
///
/// An album is kept only when its release year exists, is not blank, is not a
/// placeholder and parses as an integer.
pub fn validate_album(draft: AlbumDraft) -> Result<Album, SkipReason> {
    let id = draft
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or(SkipReason::MissingId)?;

    let date = draft
        .release_date
        .as_deref()
        .map(str::trim)
        .filter(|date| !date.is_empty())
        .ok_or(SkipReason::MissingReleaseDate)?;

    let year = release_year(date);
    if year.is_empty() {
        return Err(SkipReason::MissingReleaseDate);
    }
    if PLACEHOLDER_DATES
        .iter()
        .any(|placeholder| year.eq_ignore_ascii_case(placeholder))
    {
        return Err(SkipReason::PlaceholderReleaseDate);
    }
    if year.parse::<i32>().is_err() {
        return Err(SkipReason::UnparseableYear);
    }

    let title = draft.title.unwrap_or_default();
    let mut external_links: BTreeMap<String, String> = draft.links.into_iter().collect();
    if let Some(artist) = draft.artist_names.first() {
        for (platform, url) in streaming_search_links(artist, &title) {
            external_links.entry(platform.to_string()).or_insert(url);
        }
    }

    Ok(Album {
        id,
        title,
        kind: draft.kind,
        release_year: Some(year.to_string()),
        track_count: draft.track_count,
        cover_art_url: draft.cover_art_url,
        artist_names: draft.artist_names,
        external_links,
        label: draft.label,
    })
}

/// Validate every record, keeping upstream order and dropping the failures.
pub fn normalize_albums(
    records: impl IntoIterator<Item = Result<AlbumDraft, SkipReason>>,
) -> Vec<Album> {
    records
        .into_iter()
        .fold(Vec::new(), |mut albums, record| {
            let label = match &record {
                Ok(draft) => draft.id.clone().unwrap_or_default(),
                Err(_) => String::new(),
            };
            match record.and_then(validate_album) {
                Ok(album) => albums.push(album),
                Err(reason) => {
                    debug!(target: "normalize", album_id = %label, %reason, "skipping album");
                }
            }
            albums
        })
}

/// Drop id-less artists and cap the genre list.
pub fn normalize_artists(artists: impl IntoIterator<Item = Option<Artist>>) -> Vec<Artist> {
    artists
        .into_iter()
        .flatten()
        .map(|mut artist| {
            artist.genres.truncate(MAX_GENRES);
            artist
        })
        .collect()
}

/// Build tracks ordered by position.
///
/// Upstream ordinals restart on every disc, so later discs are shifted by the
/// number of tracks on the discs before them. Records without an ordinal take
/// their 1-based index in the response.
pub fn normalize_tracks(drafts: Vec<TrackDraft>) -> Vec<Track> {
    let mut per_disc: BTreeMap<u32, u32> = BTreeMap::new();
    for draft in &drafts {
        let count = per_disc.entry(draft.disc).or_default();
        *count = count.saturating_add(1);
    }
    let mut offsets: HashMap<u32, u32> = HashMap::new();
    let mut running: u32 = 0;
    for (disc, count) in per_disc {
        offsets.insert(disc, running);
        running = running.saturating_add(count);
    }

    let mut tracks: Vec<Track> = drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| {
            let position = match draft.ordinal {
                Some(ordinal) => offsets
                    .get(&draft.disc)
                    .copied()
                    .unwrap_or(0)
                    .saturating_add(ordinal),
                None => u32::try_from(index).unwrap_or(u32::MAX).saturating_add(1),
            };
            Track {
                id: draft.id.unwrap_or_default(),
                title: draft.title.unwrap_or_default(),
                position,
                duration_ms: draft.duration_ms.or(draft.fallback_duration_ms),
                artist_names: draft.artist_names,
            }
        })
        .collect();

    tracks.sort_by_key(|track| track.position);
    tracks
}

/// Search links on platforms the upstream does not link to itself.
pub fn streaming_search_links(artist: &str, album: &str) -> [(&'static str, String); 3] {
    let query = utf8_percent_encode(&format!("{artist} {album}"), NON_ALPHANUMERIC).to_string();
    [
        (
            "appleMusic",
            format!("https://music.apple.com/us/search?term={query}"),
        ),
        (
            "youtube",
            format!("https://www.youtube.com/results?search_query={query}"),
        ),
        ("deezer", format!("https://www.deezer.com/search/{query}")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(id: &str, date: Option<&str>) -> AlbumDraft {
        AlbumDraft {
            id: Some(id.to_string()),
            title: Some(format!("Album {id}")),
            kind: AlbumKind::Album,
            release_date: date.map(str::to_string),
            artist_names: vec!["Drake".to_string()],
            ..AlbumDraft::default()
        }
    }

    #[test]
    fn test_release_year_takes_text_before_first_dash() {
        assert_eq!(release_year("2020-01-01"), "2020");
        assert_eq!(release_year("1997"), "1997");
        assert_eq!(release_year("2019-05"), "2019");
        assert_eq!(release_year("not-a-date"), "not");
    }

    #[test]
    fn test_album_filter_keeps_only_valid_years() {
        let dates = ["2020-01-01", "TBD", "", "NA", "2019-05-05", "not-a-date"];
        let drafts = dates
            .iter()
            .enumerate()
            .map(|(index, date)| Ok(draft(&index.to_string(), Some(date))));

        let albums = normalize_albums(drafts);

        let years: Vec<&str> = albums
            .iter()
            .map(|album| album.release_year.as_deref().unwrap())
            .collect();
        assert_eq!(years, vec!["2020", "2019"]);
        assert_eq!(albums[0].id, "0");
        assert_eq!(albums[1].id, "4");
    }

    #[test]
    fn test_malformed_records_are_dropped_without_losing_neighbours() {
        let records = vec![
            Ok(draft("a", Some("2001-01-01"))),
            Err(SkipReason::Malformed),
            Ok(draft("b", Some("1999"))),
        ];

        let albums = normalize_albums(records);

        let ids: Vec<&str> = albums.iter().map(|album| album.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_skip_reasons() {
        assert_eq!(
            validate_album(draft("a", None)).unwrap_err(),
            SkipReason::MissingReleaseDate
        );
        assert_eq!(
            validate_album(draft("a", Some("   "))).unwrap_err(),
            SkipReason::MissingReleaseDate
        );
        assert_eq!(
            validate_album(draft("a", Some("TBD"))).unwrap_err(),
            SkipReason::PlaceholderReleaseDate
        );
        assert_eq!(
            validate_album(draft("a", Some("-05-01"))).unwrap_err(),
            SkipReason::MissingReleaseDate
        );
        assert_eq!(
            validate_album(draft("a", Some("soon"))).unwrap_err(),
            SkipReason::UnparseableYear
        );
        assert_eq!(
            validate_album(draft("", Some("2020"))).unwrap_err(),
            SkipReason::MissingId
        );
    }

    #[test]
    fn test_streaming_links_are_added_without_overwriting_upstream_links() {
        let mut input = draft("x", Some("2018-06-29"));
        input.title = Some("Scorpion".to_string());
        input.links = vec![(
            "spotify".to_string(),
            "https://open.spotify.com/album/x".to_string(),
        )];

        let album = validate_album(input).unwrap();

        assert_eq!(
            album.external_links["spotify"],
            "https://open.spotify.com/album/x"
        );
        assert_eq!(
            album.external_links["youtube"],
            "https://www.youtube.com/results?search_query=Drake%20Scorpion"
        );
        assert!(album.external_links.contains_key("appleMusic"));
        assert!(album.external_links.contains_key("deezer"));
    }

    #[test]
    fn test_genres_are_capped() {
        let artist = Artist {
            id: "a".to_string(),
            name: "A".to_string(),
            genres: (0..12).map(|n| format!("genre-{n}")).collect(),
            popularity: None,
            image_url: None,
            follower_count: None,
        };

        let artists = normalize_artists(vec![Some(artist), None]);

        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].genres.len(), MAX_GENRES);
        assert_eq!(artists[0].genres[0], "genre-0");
    }

    #[test]
    fn test_track_position_falls_back_to_index() {
        let drafts = ["One", "Two", "Three"]
            .iter()
            .map(|title| TrackDraft {
                id: Some(title.to_lowercase()),
                title: Some(title.to_string()),
                disc: 1,
                ..TrackDraft::default()
            })
            .collect();

        let tracks = normalize_tracks(drafts);

        let positions: Vec<u32> = tracks.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(tracks[2].title, "Three");
    }

    #[test]
    fn test_track_duration_prefers_primary_field() {
        let drafts = vec![
            TrackDraft {
                id: Some("a".into()),
                ordinal: Some(1),
                disc: 1,
                duration_ms: Some(1000),
                fallback_duration_ms: Some(2000),
                ..TrackDraft::default()
            },
            TrackDraft {
                id: Some("b".into()),
                ordinal: Some(2),
                disc: 1,
                fallback_duration_ms: Some(3000),
                ..TrackDraft::default()
            },
        ];

        let tracks = normalize_tracks(drafts);
        assert_eq!(tracks[0].duration_ms, Some(1000));
        assert_eq!(tracks[1].duration_ms, Some(3000));
    }

    #[test]
    fn test_huge_ordinal_on_later_disc_saturates() {
        let drafts = vec![
            TrackDraft {
                id: Some("first".into()),
                ordinal: Some(1),
                disc: 1,
                ..TrackDraft::default()
            },
            TrackDraft {
                id: Some("last".into()),
                ordinal: Some(u32::MAX),
                disc: 2,
                ..TrackDraft::default()
            },
        ];

        let tracks = normalize_tracks(drafts);

        assert_eq!(tracks[0].position, 1);
        assert_eq!(tracks[1].id, "last");
        assert_eq!(tracks[1].position, u32::MAX);
    }

    #[test]
    fn test_later_discs_follow_earlier_ones() {
        let track = |id: &str, disc: u32, ordinal: u32| TrackDraft {
            id: Some(id.to_string()),
            ordinal: Some(ordinal),
            disc,
            ..TrackDraft::default()
        };
        let drafts = vec![
            track("2-1", 2, 1),
            track("1-1", 1, 1),
            track("1-2", 1, 2),
            track("2-2", 2, 2),
        ];

        let tracks = normalize_tracks(drafts);

        let ids: Vec<&str> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1-1", "1-2", "2-1", "2-2"]);
        let positions: Vec<u32> = tracks.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);
    }
}
