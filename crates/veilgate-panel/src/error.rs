//! Panel client error types.
//!
//! All remote failures collapse into a single [`PanelError`] so the
//! provisioning layer never has to branch on transport detail. A missing
//! record is not an error: `read_credential` reports it as `Ok(None)`.

use thiserror::Error;

/// Error that can occur while talking to a panel endpoint.
#[derive(Debug, Error)]
pub enum PanelError {
    /// The request did not complete within the configured timeout.
    #[error("panel request timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Connection-level failure (DNS, TLS, refused connection, broken pipe).
    #[error("panel transport failure: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The endpoint answered with a non-success status.
    #[error("panel rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// HTTP success, but the body did not carry a usable credential.
    ///
    /// A 2xx response without a connection string is a provisioning
    /// failure, not a success.
    #[error("panel returned an unusable payload: {message}")]
    InvalidPayload { message: String },

    /// The client itself could not be constructed.
    #[error("invalid panel configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl PanelError {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        PanelError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error with the underlying cause attached.
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        PanelError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an unusable-payload error.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        PanelError::InvalidPayload {
            message: message.into(),
        }
    }

    /// Whether the failure was a transport-level one (as opposed to the
    /// endpoint actively rejecting the request).
    ///
    /// Nothing retries automatically either way; this only feeds the
    /// failure category reported to callers.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            PanelError::Timeout { .. } | PanelError::Transport { .. }
        )
    }
}

/// Result type for panel operations.
pub type PanelResult<T> = Result<T, PanelError>;
