// SPDX-License-Identifier: GPL-3.0-or-later

//! Rate-limited access to discography upstreams.
//!
//! This crate handles the client-credentials token exchange and its cache,
//! per-host request spacing, decoding of the Spotify and MusicBrainz wire
//! formats into one internal model, and best-effort cover-art enrichment.

pub mod client;
pub mod credentials;
pub mod enrich;
pub mod error;
pub mod models;
pub mod normalize;
pub mod rate_limiter;
pub mod schema;
pub mod session;

pub use client::{AlbumListing, UpstreamClient, UpstreamClientBuilder};
pub use credentials::CredentialCache;
pub use enrich::{CoverArtEnricher, CoverArtMap, CoverArtSource, EnrichmentHandle, EnrichmentMode};
pub use error::{Result, UpstreamError};
pub use models::{sort_albums_by_year_desc, Album, AlbumKind, Artist, Credential, Track};
pub use rate_limiter::RateLimiter;
pub use schema::UpstreamSchema;
pub use session::{ApiSession, ApiSessionBuilder, Auth};
