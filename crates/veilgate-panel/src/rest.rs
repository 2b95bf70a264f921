//! HTTP implementation of the panel client.
//!
//! Implements the panel's `/api/user` protocol: `POST /api/user` to create,
//! `GET`/`PUT`/`DELETE /api/user/{handle}` for the rest. Expiry travels as
//! unix seconds; the usable connection string comes back as
//! `subscription_url`.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::client::{
    CredentialInfo, CredentialResult, CredentialStatus, PanelClient, PanelClientFactory,
};
use crate::config::PanelConfig;
use crate::error::{PanelError, PanelResult};

/// REST client for one panel endpoint.
#[derive(Debug)]
pub struct RestPanelClient {
    config: PanelConfig,
    client: Client,
}

/// Body of `GET /api/user/{handle}` (the fields this system reads).
#[derive(Debug, Deserialize)]
struct UserPayload {
    #[serde(default)]
    status: Option<String>,
    /// Unix seconds; 0 or absent means the record never expires.
    #[serde(default)]
    expire: Option<i64>,
    #[serde(default)]
    subscription_url: Option<String>,
}

impl RestPanelClient {
    /// Create a client for the given endpoint.
    pub fn new(config: PanelConfig) -> PanelResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .default_headers(Self::default_headers(&config)?)
            .build()
            .map_err(|e| PanelError::InvalidConfiguration {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { config, client })
    }

    fn default_headers(config: &PanelConfig) -> PanelResult<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", config.api_token))
            .map_err(|_| PanelError::InvalidConfiguration {
                message: "api_token contains characters not valid in a header".into(),
            })?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        Ok(headers)
    }

    fn user_url(&self, handle: &str) -> String {
        format!("{}/api/user/{handle}", self.config.trimmed_base_url())
    }

    fn map_send_error(&self, err: reqwest::Error) -> PanelError {
        if err.is_timeout() {
            PanelError::Timeout {
                timeout_secs: self.config.read_timeout_secs,
            }
        } else {
            PanelError::transport_with_source("request failed", err)
        }
    }

    /// Turn a non-success response into a `Rejected` error.
    async fn rejection(response: Response) -> PanelError {
        let status = response.status().as_u16();
        let message = match response.text().await {
            Ok(body) if !body.is_empty() => truncate(&body, 300),
            _ => "<empty body>".to_string(),
        };
        PanelError::Rejected { status, message }
    }

    /// Parse a 2xx create/update response, requiring a usable payload.
    async fn credential_result(response: Response) -> PanelResult<CredentialResult> {
        let payload: UserPayload = response
            .json()
            .await
            .map_err(|e| PanelError::invalid_payload(format!("malformed response body: {e}")))?;
        require_access_url(payload.subscription_url)
    }
}

/// A connection string must be present and non-empty, even on HTTP success.
fn require_access_url(url: Option<String>) -> PanelResult<CredentialResult> {
    match url {
        Some(url) if !url.trim().is_empty() => Ok(CredentialResult { access_url: url }),
        _ => Err(PanelError::invalid_payload(
            "response carries no subscription_url",
        )),
    }
}

/// Convert the panel's read payload into [`CredentialInfo`].
fn parse_credential(payload: UserPayload) -> PanelResult<CredentialInfo> {
    let status = match payload.status.as_deref() {
        Some(raw) => CredentialStatus::parse(raw)
            .ok_or_else(|| PanelError::invalid_payload(format!("unknown status {raw:?}")))?,
        None => CredentialStatus::Active,
    };

    let expires_at = match payload.expire {
        None | Some(0) => None,
        Some(secs) => Some(
            Utc.timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| PanelError::invalid_payload(format!("bad expire value {secs}")))?,
        ),
    };

    Ok(CredentialInfo {
        status,
        expires_at,
        access_url: payload.subscription_url,
    })
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        text.to_string()
    } else {
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}

#[async_trait]
impl PanelClient for RestPanelClient {
    async fn create_credential(
        &self,
        handle: &str,
        expires_at: DateTime<Utc>,
    ) -> PanelResult<CredentialResult> {
        debug!(handle, %expires_at, "creating panel credential");

        let body = json!({
            "username": handle,
            "data_limit": 0,
            "data_limit_reset_strategy": "no_reset",
            "expire": expires_at.timestamp(),
            "inbounds": { "vless": ["VLESS TCP REALITY"] },
            "proxies": { "vless": { "id": Uuid::new_v4() } },
            "note": "",
            "status": CredentialStatus::Active.as_str(),
        });

        let response = self
            .client
            .post(format!("{}/api/user", self.config.trimmed_base_url()))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Self::credential_result(response).await
    }

    async fn read_credential(&self, handle: &str) -> PanelResult<Option<CredentialInfo>> {
        let response = self
            .client
            .get(self.user_url(handle))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let payload: UserPayload = response
            .json()
            .await
            .map_err(|e| PanelError::invalid_payload(format!("malformed response body: {e}")))?;
        parse_credential(payload).map(Some)
    }

    async fn update_credential(
        &self,
        handle: &str,
        status: CredentialStatus,
        expires_at: DateTime<Utc>,
    ) -> PanelResult<CredentialResult> {
        debug!(handle, %status, %expires_at, "updating panel credential");

        let body = json!({
            "status": status.as_str(),
            "expire": expires_at.timestamp(),
        });

        let response = self
            .client
            .put(self.user_url(handle))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Self::credential_result(response).await
    }

    async fn delete_credential(&self, handle: &str) -> PanelResult<()> {
        let response = self
            .client
            .delete(self.user_url(handle))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        // Already gone counts as deleted.
        if response.status() == StatusCode::NOT_FOUND || response.status().is_success() {
            return Ok(());
        }
        Err(Self::rejection(response).await)
    }
}

/// Factory producing [`RestPanelClient`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestClientFactory;

impl PanelClientFactory for RestClientFactory {
    fn client_for(&self, config: &PanelConfig) -> PanelResult<Box<dyn PanelClient>> {
        Ok(Box::new(RestPanelClient::new(config.clone())?))
    }
}
