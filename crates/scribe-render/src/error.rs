//! Error types for renderer backends.

/// Error from a renderer backend.
///
/// Callers in the lifecycle engine fold these into a [`RenderMessage`](crate::RenderMessage)
/// so a failed render still yields a usable (raw) result.
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    /// HTTP request failed (network error, timeout, etc).
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] ureq::Error),

    /// HTTP response error (server returned error status).
    #[error("HTTP error: {status} - {body}")]
    HttpResponse {
        /// HTTP status code.
        status: u16,
        /// Response body (may contain error details).
        body: String,
    },

    /// Error header was not valid base64.
    #[error("invalid error header encoding: {0}")]
    HeaderEncoding(#[from] base64::DecodeError),

    /// Error header did not contain a JSON message list.
    #[error("invalid error header payload: {0}")]
    HeaderPayload(#[from] serde_json::Error),
}

impl RendererError {
    /// Short class name used as the message argument when recording the failure.
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::HttpRequest(ureq::Error::Timeout(_)) => "Timeout",
            Self::HttpRequest(_) => "ConnectionError",
            Self::HttpResponse { .. } => "HttpError",
            Self::HeaderEncoding(_) | Self::HeaderPayload(_) => "InvalidErrorHeader",
        }
    }
}
