//! HTTP client for the kumascript macro-expansion service.
//!
//! One request per document:
//!
//! ```text
//! POST {url}/docs/{locale}/{slug}
//! Content-Type: text/html
//! Cache-Control: max-age=0          (optional)
//! X-Kumascript-Base-Url: {base_url} (optional)
//!
//! <document html>
//! ```
//!
//! The response body is the expanded html. Macro problems are reported in the
//! `X-Kumascript-Errors` header as base64-encoded JSON.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ureq::Agent;

use crate::error::RendererError;
use crate::message::RenderMessage;
use crate::renderer::{RenderOutput, RenderRequest, Renderer};

/// Response header carrying encoded render messages.
pub const ERRORS_HEADER: &str = "x-kumascript-errors";

/// Request header carrying the site base URL.
const BASE_URL_HEADER: &str = "X-Kumascript-Base-Url";

/// Create HTTP agent with the specified timeout.
///
/// Status codes are handled manually so that the error body can be captured.
fn create_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Decode the value of the [`ERRORS_HEADER`] response header.
///
/// An empty value decodes to no messages.
///
/// # Errors
///
/// Returns [`RendererError::HeaderEncoding`] for invalid base64 and
/// [`RendererError::HeaderPayload`] for anything other than a JSON message list.
pub fn decode_errors_header(value: &str) -> Result<Vec<RenderMessage>, RendererError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Vec::new());
    }
    let bytes = STANDARD.decode(value)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Kumascript renderer backed by a pooled ureq agent.
pub struct KumascriptClient {
    agent: Agent,
    url: String,
}

impl KumascriptClient {
    /// Create a client for the service at `url` with a default request timeout.
    #[must_use]
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let url = url.into().trim_end_matches('/').to_owned();
        Self {
            agent: create_agent(timeout),
            url,
        }
    }

    /// Service base URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn endpoint(&self, locale: &str, slug: &str) -> String {
        format!("{}/docs/{locale}/{slug}", self.url)
    }
}

impl Renderer for KumascriptClient {
    fn render(&self, request: &RenderRequest<'_>) -> Result<RenderOutput, RendererError> {
        let url = self.endpoint(request.locale, request.slug);
        tracing::debug!(%url, "Requesting kumascript render");

        let mut builder = self.agent.post(&url).header("Content-Type", "text/html");
        if let Some(cache_control) = request.cache_control {
            builder = builder.header("Cache-Control", cache_control);
        }
        if let Some(base_url) = request.base_url {
            builder = builder.header(BASE_URL_HEADER, base_url);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.config().timeout_global(Some(timeout)).build();
        }

        let response = builder.send(request.html.as_bytes())?;

        let status = response.status().as_u16();
        let errors_header = response
            .headers()
            .get(ERRORS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let mut body = response.into_body();

        if status >= 400 {
            let error_body = body
                .read_to_string()
                .unwrap_or_else(|_| String::from("(unable to read error body)"));
            return Err(RendererError::HttpResponse {
                status,
                body: error_body,
            });
        }

        let html = body.read_to_string()?;
        let errors = match errors_header {
            Some(value) => decode_errors_header(&value)?,
            None => Vec::new(),
        };

        Ok(RenderOutput { html, errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageLevel;

    #[test]
    fn test_decode_empty_header() {
        assert!(decode_errors_header("").unwrap().is_empty());
        assert!(decode_errors_header("  ").unwrap().is_empty());
    }

    #[test]
    fn test_decode_errors_header() {
        let json = r#"[{"level":"error","message":"Syntax error","args":["TemplateError","line 3"]}]"#;
        let encoded = STANDARD.encode(json);

        let messages = decode_errors_header(&encoded).unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, MessageLevel::Error);
        assert_eq!(messages[0].message, "Syntax error");
        assert_eq!(messages[0].args.len(), 2);
    }

    #[test]
    fn test_decode_invalid_base64() {
        let err = decode_errors_header("***").unwrap_err();
        assert!(matches!(err, RendererError::HeaderEncoding(_)));
    }

    #[test]
    fn test_decode_invalid_payload() {
        let encoded = STANDARD.encode(r#"{"not":"a list"}"#);
        let err = decode_errors_header(&encoded).unwrap_err();
        assert!(matches!(err, RendererError::HeaderPayload(_)));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = KumascriptClient::new("http://localhost:9080/", Duration::from_secs(2));
        assert_eq!(client.url(), "http://localhost:9080");
        assert_eq!(
            client.endpoint("en-US", "Web/HTML"),
            "http://localhost:9080/docs/en-US/Web/HTML"
        );
    }

    #[test]
    fn test_unreachable_service_is_request_error() {
        let client = KumascriptClient::new("http://127.0.0.1:1", Duration::from_millis(200));
        let request = RenderRequest::new("en-US", "Web", "<p>x</p>");
        let err = client.render(&request).unwrap_err();
        assert!(matches!(err, RendererError::HttpRequest(_)));
    }
}
