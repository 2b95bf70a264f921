//! Per-endpoint client configuration.

use serde::{Deserialize, Serialize};

use crate::error::{PanelError, PanelResult};

/// Configuration for one panel endpoint client.
#[derive(Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Base URL of the panel API, e.g. `https://panel.example.com`.
    pub base_url: String,

    /// Bearer token for the panel API.
    pub api_token: String,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Read timeout in seconds. This bounds every call the client makes.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    30
}

impl PanelConfig {
    /// Create a config with default timeouts.
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> PanelResult<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(PanelError::InvalidConfiguration {
                message: format!("base_url must start with http:// or https://: {}", self.base_url),
            });
        }
        if self.read_timeout_secs == 0 {
            return Err(PanelError::InvalidConfiguration {
                message: "read_timeout_secs must be non-zero".into(),
            });
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

// Manual Debug so the API token never lands in logs.
impl std::fmt::Debug for PanelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .finish()
    }
}
