//! Terminal output for the `scribe` commands.

use console::{Style, Term};
use scribe_render::{MessageLevel, RenderMessage};

/// Writes command output to stderr, colored by meaning.
pub(crate) struct Output {
    term: Term,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }

    fn line(&self, style: &Style, msg: &str) {
        let _ = self.term.write_line(&style.apply_to(msg).to_string());
    }

    /// Plain text, e.g. rendered html.
    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    pub(crate) fn success(&self, msg: &str) {
        self.line(&Style::new().green(), msg);
    }

    pub(crate) fn warning(&self, msg: &str) {
        self.line(&Style::new().yellow(), msg);
    }

    pub(crate) fn error(&self, msg: &str) {
        self.line(&Style::new().red(), msg);
    }

    /// Secondary lines such as ids, timestamps and list entries.
    pub(crate) fn detail(&self, msg: &str) {
        self.line(&Style::new().dim(), msg);
    }

    /// Document title with its summary line, underlined.
    pub(crate) fn heading(&self, title: &str, summary: &str) {
        self.line(&Style::new().cyan().bold(), title);
        self.detail(summary);
        let width = title.chars().count().max(summary.chars().count());
        let _ = self.term.write_line(&"-".repeat(width));
    }

    /// A macro message reported by the renderer, colored by level.
    pub(crate) fn render_message(&self, message: &RenderMessage) {
        let (style, label) = match message.level {
            MessageLevel::Error => (Style::new().red(), "error"),
            MessageLevel::Warning => (Style::new().yellow(), "warning"),
            MessageLevel::Info => (Style::new().dim(), "info"),
        };
        let text = if message.args.is_empty() {
            format!("{label}: {}", message.message)
        } else {
            format!("{label}: {} [{}]", message.message, message.args.join(", "))
        };
        self.line(&style, &text);
    }
}
