//! Structured render messages.

use serde::{Deserialize, Serialize};

/// Severity of a render message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    /// Macro failed; its output is missing or replaced by an error marker.
    Error,
    /// Macro produced output but flagged a problem.
    Warning,
    /// Informational only.
    Info,
}

/// A single message reported while rendering a document.
///
/// Wire format matches the renderer's JSON:
///
/// ```text
/// {"level": "error", "message": "Template not found", "args": ["TemplateLoadingError"]}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderMessage {
    /// Message severity.
    pub level: MessageLevel,
    /// Human-readable description.
    pub message: String,
    /// Extra context (error class, macro name, line).
    #[serde(default)]
    pub args: Vec<String>,
}

impl RenderMessage {
    /// Create an error-level message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            message: message.into(),
            args: Vec::new(),
        }
    }

    /// Attach an argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Whether this message is error-level.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == MessageLevel::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_deserializes_without_args() {
        let msg: RenderMessage =
            serde_json::from_str(r#"{"level":"warning","message":"deprecated macro"}"#).unwrap();
        assert_eq!(msg.level, MessageLevel::Warning);
        assert!(msg.args.is_empty());
        assert!(!msg.is_error());
    }

    #[test]
    fn test_error_builder() {
        let msg = RenderMessage::error("boom").with_arg("TimeoutError");
        assert!(msg.is_error());
        assert_eq!(msg.args, vec!["TimeoutError".to_owned()]);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""level":"error""#));
    }
}
