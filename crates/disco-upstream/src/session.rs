// SPDX-License-Identifier: GPL-3.0-or-later

//! Process-wide upstream state: one credential slot, per-host rate limiting,
//! the cover-art cache and the HTTP connection pool.

use crate::credentials::CredentialCache;
use crate::error::{Result, UpstreamError};
use crate::rate_limiter::RateLimiter;
use moka::sync::Cache;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// MusicBrainz asks every client to identify itself with a contact URL.
pub const USER_AGENT: &str = concat!(
    "Disco/",
    env!("CARGO_PKG_VERSION"),
    " ( ",
    env!("CARGO_PKG_REPOSITORY"),
    " )"
);
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const COVER_ART_CACHE_CAPACITY: u64 = 10_000;

/// How a request is authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    Bearer,
    Anonymous,
}

/// Shared context for every upstream call. Clones share all state.
#[derive(Clone)]
pub struct ApiSession {
    http: Client,
    credentials: CredentialCache,
    rate_limiter: RateLimiter,
    cover_art: Cache<String, String>,
}

impl fmt::Debug for ApiSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSession")
            .field("credentials", &self.credentials)
            .field("rate_limiter", &self.rate_limiter)
            .field("cover_art_entries", &self.cover_art.entry_count())
            .finish()
    }
}

impl ApiSession {
    pub fn builder() -> ApiSessionBuilder {
        ApiSessionBuilder::default()
    }

    /// Album id to cover-art URL, filled by the enricher.
    pub fn cover_art_cache(&self) -> &Cache<String, String> {
        &self.cover_art
    }

    /// Authorize, throttle, GET and decode.
    ///
    /// Non-2xx statuses become [`UpstreamError::Api`] carrying the upstream's own message.
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url, auth: Auth) -> Result<T> {
        let bearer = match auth {
            Auth::Bearer => Some(self.credentials.get_token().await?.token),
            Auth::Anonymous => None,
        };

        self.rate_limiter
            .throttle(&RateLimiter::host_key(&url))
            .await;

        trace!(target: "upstream", "GET {}", url);

        let mut request = self
            .http
            .get(url.clone())
            .header("Accept", "application/json");
        if let Some(token) = bearer.as_deref() {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        debug!(target: "upstream", %status, path = url.path(), "response status");

        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED && auth == Auth::Bearer {
                // Revoked early; the next call exchanges again.
                self.credentials.invalidate().await;
            }
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message: upstream_message(&body).unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown error")
                        .to_string()
                }),
            });
        }

        let body = response.text().await?;
        trace!(target: "upstream", "response body: {}", body);

        Ok(serde_json::from_str(&body)?)
    }
}

/// Error text from the JSON error shapes the upstreams use, else the raw body.
fn upstream_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.to_string());
    };

    value
        .get("error")
        .and_then(|error| {
            error
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| error.as_str())
        })
        .or_else(|| value.get("message").and_then(Value::as_str))
        .map(str::to_string)
        .or_else(|| Some(trimmed.to_string()))
}

/// Builder for an [`ApiSession`].
#[derive(Debug)]
pub struct ApiSessionBuilder {
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    timeout: Duration,
    rate_limit_interval: Duration,
    user_agent: String,
}

impl Default for ApiSessionBuilder {
    fn default() -> Self {
        Self {
            token_url: SPOTIFY_TOKEN_URL.to_string(),
            client_id: None,
            client_secret: None,
            timeout: Duration::from_secs(30),
            rate_limit_interval: Duration::from_secs(1),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl ApiSessionBuilder {
    /// Identity endpoint for the client-credentials exchange.
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn client_credentials(
        mut self,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Self {
        self.client_id = client_id;
        self.client_secret = client_secret;
        self
    }

    /// Set request timeout duration.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set minimum interval between requests to one host.
    pub fn rate_limit_interval(mut self, interval: Duration) -> Self {
        self.rate_limit_interval = interval;
        self
    }

    /// Identify as Disco with a different contact URL or address.
    pub fn contact(self, contact: &str) -> Self {
        self.user_agent(format!(
            "Disco/{} ( {} )",
            env!("CARGO_PKG_VERSION"),
            contact.trim()
        ))
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<ApiSession> {
        let http = Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .build()?;

        Ok(ApiSession {
            credentials: CredentialCache::new(
                http.clone(),
                self.token_url,
                self.client_id,
                self.client_secret,
            ),
            rate_limiter: RateLimiter::new(self.rate_limit_interval),
            cover_art: Cache::new(COVER_ART_CACHE_CAPACITY),
            http,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session_for(server: &MockServer) -> ApiSession {
        ApiSession::builder()
            .token_url(format!("{}/api/token", server.uri()))
            .client_credentials(Some("id".to_string()), Some("secret".to_string()))
            .rate_limit_interval(Duration::from_millis(10))
            .build()
            .unwrap()
    }

    #[test]
    fn test_upstream_message_shapes() {
        assert_eq!(
            upstream_message(r#"{"error":{"status":400,"message":"invalid id"}}"#).as_deref(),
            Some("invalid id")
        );
        assert_eq!(
            upstream_message(r#"{"error":"Not Found"}"#).as_deref(),
            Some("Not Found")
        );
        assert_eq!(upstream_message("gateway down").as_deref(), Some("gateway down"));
        assert_eq!(upstream_message("   "), None);
    }

    #[tokio::test]
    async fn test_bearer_request_carries_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(2)
            .mount(&server)
            .await;

        let session = session_for(&server);
        let url = Url::parse(&format!("{}/ping", server.uri())).unwrap();

        let first: Value = session.get_json(url.clone(), Auth::Bearer).await.unwrap();
        let second: Value = session.get_json(url, Auth::Bearer).await.unwrap();
        assert_eq!(first["ok"], true);
        assert_eq!(second["ok"], true);
    }

    #[tokio::test]
    async fn test_unauthorized_response_drops_cached_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "expires_in": 3600
            })))
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/albums"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "status": 401, "message": "The access token expired" }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/albums"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] })))
            .mount(&server)
            .await;

        let session = session_for(&server);
        let url = Url::parse(&format!("{}/albums", server.uri())).unwrap();

        let rejected: Result<Value> = session.get_json(url.clone(), Auth::Bearer).await;
        match rejected {
            Err(UpstreamError::Api { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "The access token expired");
            }
            other => panic!("expected Api error, got: {other:?}"),
        }

        let accepted: Value = session.get_json(url, Auth::Bearer).await.unwrap();
        assert_eq!(accepted["items"], serde_json::json!([]));
    }

    #[test]
    fn test_user_agent_carries_contact() {
        assert!(USER_AGENT.starts_with("Disco/"));
        assert!(USER_AGENT.contains("( https://"));

        let builder = ApiSession::builder().contact("ops@example.org");
        assert!(builder.user_agent.ends_with("( ops@example.org )"));
    }

    #[tokio::test]
    async fn test_non_success_maps_to_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(
                ResponseTemplate::new(502).set_body_json(serde_json::json!({ "error": "bad gateway" })),
            )
            .mount(&server)
            .await;

        let session = session_for(&server);
        let url = Url::parse(&format!("{}/broken", server.uri())).unwrap();
        let result: Result<Value> = session.get_json(url, Auth::Anonymous).await;

        match result {
            Err(UpstreamError::Api { status, message }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "bad gateway");
            }
            other => panic!("expected Api error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let session = session_for(&server);
        let url = Url::parse(&format!("{}/garbage", server.uri())).unwrap();
        let result: Result<Value> = session.get_json(url, Auth::Anonymous).await;

        assert!(matches!(result, Err(UpstreamError::Decode(_))));
    }
}
