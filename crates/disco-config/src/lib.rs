// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Which upstream schema family the client talks to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamKind {
    #[default]
    Spotify,
    MusicBrainz,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    /// Left empty by default; a missing value is reported on the first call.
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_base_url: String,
    pub token_url: String,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base_url: "https://api.spotify.com/v1".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicBrainzConfig {
    pub base_url: String,
    pub cover_art_base_url: String,
}

impl Default for MusicBrainzConfig {
    fn default() -> Self {
        Self {
            base_url: "https://musicbrainz.org/ws/2".to_string(),
            cover_art_base_url: "https://coverartarchive.org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub schema: UpstreamKind,
    pub rate_limit_interval_ms: u64,
    pub request_timeout_secs: u64,
    /// Contact URL or address sent in the User-Agent; the project URL when unset.
    pub contact: Option<String>,
    pub spotify: SpotifyConfig,
    pub musicbrainz: MusicBrainzConfig,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            schema: UpstreamKind::default(),
            rate_limit_interval_ms: 1000,
            request_timeout_secs: 30,
            contact: None,
            spotify: SpotifyConfig::default(),
            musicbrainz: MusicBrainzConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentModeKind {
    /// Return album listings at once and fetch cover art afterwards.
    #[default]
    Background,
    /// Fetch cover art for the first `eager_limit` albums before returning.
    Eager,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    pub mode: EnrichmentModeKind,
    pub eager_limit: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            mode: EnrichmentModeKind::default(),
            eager_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub telemetry: TelemetryConfig,
    pub upstream: UpstreamConfig,
    pub enrichment: EnrichmentConfig,
}

/// Load configuration from defaults, optional TOML file, and environment overrides
/// (prefix: DISCO_, plus the bare SPOTIFY_CLIENT_ID / SPOTIFY_CLIENT_SECRET pair).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment
        .merge(spotify_credentials_env())
        .merge(Env::prefixed("DISCO_").split("__"));

    let config: AppConfig = figment.extract()?;
    info!(
        target: "config",
        schema = ?config.upstream.schema,
        enrichment = ?config.enrichment.mode,
        "configuration loaded"
    );
    Ok(config)
}

fn spotify_credentials_env() -> Env {
    Env::raw()
        .only(&["SPOTIFY_CLIENT_ID", "SPOTIFY_CLIENT_SECRET"])
        .map(|key| {
            if key.as_str().eq_ignore_ascii_case("SPOTIFY_CLIENT_ID") {
                "upstream.spotify.client_id".into()
            } else if key.as_str().eq_ignore_ascii_case("SPOTIFY_CLIENT_SECRET") {
                "upstream.spotify.client_secret".into()
            } else {
                key.as_str().to_string().into()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_overrides() {
        Jail::expect_with(|_jail| {
            let config = load(None).expect("load");
            assert_eq!(config.upstream.schema, UpstreamKind::Spotify);
            assert_eq!(config.upstream.rate_limit_interval_ms, 1000);
            assert_eq!(config.enrichment.mode, EnrichmentModeKind::Background);
            assert_eq!(config.enrichment.eager_limit, 10);
            assert!(config.upstream.spotify.client_id.is_none());
            Ok(())
        });
    }

    #[test]
    fn bare_spotify_credentials_are_picked_up() {
        Jail::expect_with(|jail| {
            jail.set_env("SPOTIFY_CLIENT_ID", "id-123");
            jail.set_env("SPOTIFY_CLIENT_SECRET", "secret-456");
            let config = load(None).expect("load");
            assert_eq!(config.upstream.spotify.client_id.as_deref(), Some("id-123"));
            assert_eq!(
                config.upstream.spotify.client_secret.as_deref(),
                Some("secret-456")
            );
            Ok(())
        });
    }

    #[test]
    fn toml_file_and_prefixed_env_layer() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "disco.toml",
                r#"
                [upstream]
                schema = "musicbrainz"

                [enrichment]
                mode = "eager"
                eager_limit = 4
                "#,
            )?;
            jail.set_env("DISCO_HTTP__PORT", "8080");

            let config = load(Some(Path::new("disco.toml"))).expect("load");
            assert_eq!(config.upstream.schema, UpstreamKind::MusicBrainz);
            assert_eq!(config.enrichment.mode, EnrichmentModeKind::Eager);
            assert_eq!(config.enrichment.eager_limit, 4);
            assert_eq!(config.http.port, 8080);
            Ok(())
        });
    }
}
