// SPDX-License-Identifier: GPL-3.0-or-later

//! Client-credentials token cache.

use crate::error::{Result, UpstreamError};
use crate::models::Credential;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Subtracted from the advertised lifetime so a returned token stays usable for at least this long.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// Holds the single bearer credential of the process and renews it on demand.
///
/// Cloning shares the slot.
#[derive(Debug, Clone)]
pub struct CredentialCache {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    client: Client,
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    slot: RwLock<Option<Credential>>,
    renewal: Mutex<()>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl CredentialCache {
    pub fn new(
        client: Client,
        token_url: impl Into<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                token_url: token_url.into(),
                client_id: non_blank(client_id),
                client_secret: non_blank(client_secret),
                slot: RwLock::new(None),
                renewal: Mutex::new(()),
            }),
        }
    }

    /// Return a credential that is valid for at least [`SAFETY_MARGIN`].
    ///
    /// Only reaches the identity endpoint when the slot is empty or expired.
    pub async fn get_token(&self) -> Result<Credential> {
        self.token_at(Instant::now()).await
    }

    pub(crate) async fn token_at(&self, now: Instant) -> Result<Credential> {
        let (client_id, client_secret) = self.secrets()?;

        if let Some(credential) = self.cached(now).await {
            return Ok(credential);
        }

        // Single flight: whoever waited here re-checks before exchanging again.
        let _renewal = self.inner.renewal.lock().await;
        if let Some(credential) = self.cached(now).await {
            return Ok(credential);
        }

        match self.exchange(client_id, client_secret, now).await {
            Ok(credential) => {
                *self.inner.slot.write().await = Some(credential.clone());
                Ok(credential)
            }
            Err(error) => {
                warn!(target: "credentials", error = %error, "token exchange failed");
                *self.inner.slot.write().await = None;
                Err(error)
            }
        }
    }

    /// Drop the cached credential so the next call performs a fresh exchange.
    pub async fn invalidate(&self) {
        *self.inner.slot.write().await = None;
    }

    async fn cached(&self, now: Instant) -> Option<Credential> {
        self.inner
            .slot
            .read()
            .await
            .as_ref()
            .filter(|credential| credential.is_valid_at(now))
            .cloned()
    }

    fn secrets(&self) -> Result<(&str, &str)> {
        match (
            self.inner.client_id.as_deref(),
            self.inner.client_secret.as_deref(),
        ) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(UpstreamError::Configuration(
                "client id and client secret must both be configured".to_string(),
            )),
        }
    }

    async fn exchange(
        &self,
        client_id: &str,
        client_secret: &str,
        now: Instant,
    ) -> Result<Credential> {
        debug!(target: "credentials", url = %self.inner.token_url, "requesting client-credentials token");

        let basic = STANDARD.encode(format!("{client_id}:{client_secret}"));
        let response = self
            .inner
            .client
            .post(&self.inner.token_url)
            .header("Authorization", format!("Basic {basic}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::UpstreamAuth(format!(
                "identity endpoint returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let body = response.text().await?;
        let payload: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            UpstreamError::UpstreamAuth(format!("unreadable token response: {e}"))
        })?;

        let token = payload
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                UpstreamError::UpstreamAuth("token response has no access_token".to_string())
            })?;

        // A missing lifetime makes the token single-use.
        let lifetime = Duration::from_secs(payload.expires_in.unwrap_or(0));
        let expires_at = now + lifetime.saturating_sub(SAFETY_MARGIN);

        debug!(target: "credentials", lifetime_secs = lifetime.as_secs(), "token issued");
        Ok(Credential { token, expires_at })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
