// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;
use std::time::Duration;

use disco_config::{AppConfig, EnrichmentModeKind, UpstreamKind};
use disco_upstream::{ApiSession, EnrichmentMode, Result, UpstreamClient, UpstreamSchema};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub client: UpstreamClient,
}

impl AppState {
    pub fn new(config: AppConfig, client: UpstreamClient) -> Self {
        Self {
            config: Arc::new(config),
            client,
        }
    }

    /// Build the process-wide session and client described by `config`.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self::new(config, client))
    }

    pub fn on_start(&self) {
        info!(
            target: "application",
            schema = self.client.schema().as_str(),
            enrichment = ?self.client.enrichment_mode(),
            rate_limit_interval_ms = self.config.upstream.rate_limit_interval_ms,
            request_timeout_secs = self.config.upstream.request_timeout_secs,
            "application state initialized"
        );
    }
}

fn build_client(config: &AppConfig) -> Result<UpstreamClient> {
    let upstream = &config.upstream;

    let mut session = ApiSession::builder();
    if let Some(contact) = upstream.contact.as_deref().filter(|c| !c.trim().is_empty()) {
        session = session.contact(contact);
    }
    let session = session
        .token_url(upstream.spotify.token_url.clone())
        .client_credentials(
            upstream.spotify.client_id.clone(),
            upstream.spotify.client_secret.clone(),
        )
        .timeout(Duration::from_secs(upstream.request_timeout_secs))
        .rate_limit_interval(Duration::from_millis(upstream.rate_limit_interval_ms))
        .build()?;

    let (schema, base_url) = match upstream.schema {
        UpstreamKind::Spotify => (UpstreamSchema::Spotify, &upstream.spotify.api_base_url),
        UpstreamKind::MusicBrainz => (UpstreamSchema::MusicBrainz, &upstream.musicbrainz.base_url),
    };

    UpstreamClient::builder(schema)
        .session(session)
        .base_url(base_url.clone())
        .cover_art_base_url(upstream.musicbrainz.cover_art_base_url.clone())
        .enrichment(enrichment_mode(config))
        .build()
}

fn enrichment_mode(config: &AppConfig) -> EnrichmentMode {
    match config.enrichment.mode {
        EnrichmentModeKind::Background => EnrichmentMode::Background,
        EnrichmentModeKind::Eager => EnrichmentMode::Eager {
            limit: config.enrichment.eager_limit,
        },
    }
}
