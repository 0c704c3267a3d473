//! Renderer trait and request/response types.

use std::time::Duration;

use crate::error::RendererError;
use crate::message::RenderMessage;

/// A request to render one document.
#[derive(Clone, Debug)]
pub struct RenderRequest<'a> {
    /// Document locale (e.g., "en-US").
    pub locale: &'a str,
    /// Document slug (e.g., "Web/HTML/Element").
    pub slug: &'a str,
    /// Raw document html with macro calls.
    pub html: &'a str,
    /// Site base URL handed to macros.
    pub base_url: Option<&'a str>,
    /// Cache-Control directive (e.g., "max-age=0" to force fresh output).
    pub cache_control: Option<&'a str>,
    /// Per-request timeout overriding the backend default.
    pub timeout: Option<Duration>,
}

impl<'a> RenderRequest<'a> {
    /// Create a request with no base URL, cache directive or timeout override.
    #[must_use]
    pub fn new(locale: &'a str, slug: &'a str, html: &'a str) -> Self {
        Self {
            locale,
            slug,
            html,
            base_url: None,
            cache_control: None,
            timeout: None,
        }
    }

    /// Set the base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: Option<&'a str>) -> Self {
        self.base_url = base_url;
        self
    }

    /// Set the Cache-Control directive.
    #[must_use]
    pub fn cache_control(mut self, cache_control: Option<&'a str>) -> Self {
        self.cache_control = cache_control;
        self
    }

    /// Set the timeout override.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Output of a render: expanded html plus any structured messages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderOutput {
    /// Expanded html.
    pub html: String,
    /// Messages reported by macros.
    pub errors: Vec<RenderMessage>,
}

/// Rendering backend.
///
/// Implementations may be slow and fallible. A returned `Err` means the
/// backend could not produce any output at all; macro-level problems belong
/// in [`RenderOutput::errors`].
pub trait Renderer: Send + Sync {
    /// Render a document.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError`] if the backend is unreachable or rejects the request.
    fn render(&self, request: &RenderRequest<'_>) -> Result<RenderOutput, RendererError>;
}

/// Renderer that returns the source html unchanged.
///
/// Used when no macro service is configured.
#[derive(Debug, Default)]
pub struct PassthroughRenderer;

impl Renderer for PassthroughRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<RenderOutput, RendererError> {
        Ok(RenderOutput {
            html: request.html.to_owned(),
            errors: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = RenderRequest::new("fr", "Web", "<p>x</p>")
            .base_url(Some("https://wiki.local"))
            .cache_control(Some("no-cache"))
            .timeout(Some(Duration::from_secs(3)));
        assert_eq!(request.base_url, Some("https://wiki.local"));
        assert_eq!(request.cache_control, Some("no-cache"));
        assert_eq!(request.timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_passthrough_returns_source() {
        let request = RenderRequest::new("en-US", "A", "{{ macro }}");
        let output = PassthroughRenderer.render(&request).unwrap();
        assert_eq!(output.html, "{{ macro }}");
        assert!(output.errors.is_empty());
    }
}
