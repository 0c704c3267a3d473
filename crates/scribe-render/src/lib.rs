//! Macro-expansion renderer client for Scribe.
//!
//! Documents are stored as raw wiki html containing macro calls. Rendering
//! hands that html to an external macro-expansion service (kumascript) and
//! gets back expanded html plus a structured list of macro errors. Partial
//! renders with warnings are a valid outcome, so errors are data, not failures.
//!
//! - [`Renderer`]: Trait implemented by every rendering backend
//! - [`KumascriptClient`]: HTTP client for the kumascript service
//! - [`PassthroughRenderer`]: Returns the source html unchanged
//!
//! # Example
//!
//! ```
//! use scribe_render::{PassthroughRenderer, RenderRequest, Renderer};
//!
//! let renderer = PassthroughRenderer;
//! let request = RenderRequest::new("en-US", "Web/HTML", "<p>Hello</p>");
//! let output = renderer.render(&request).unwrap();
//! assert_eq!(output.html, "<p>Hello</p>");
//! assert!(output.errors.is_empty());
//! ```

mod error;
mod kumascript;
mod message;
mod renderer;

pub use error::RendererError;
pub use kumascript::{ERRORS_HEADER, KumascriptClient, decode_errors_header};
pub use message::{MessageLevel, RenderMessage};
pub use renderer::{PassthroughRenderer, RenderOutput, RenderRequest, Renderer};
