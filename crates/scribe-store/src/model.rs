//! Wiki entities.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scribe_render::RenderMessage;
use serde::{Deserialize, Serialize};

use crate::derived::DerivedFields;

/// TOC depth used when a revision does not set one (h2 through h4).
pub const DEFAULT_TOC_DEPTH: u8 = 4;

static REDIRECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*REDIRECT\s+<a\s+class="redirect"\s+href="([^"]+)"\s*>"#).unwrap()
});

/// Arena key of a document row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

impl DocumentId {
    /// Placeholder for rows not yet inserted.
    pub const UNASSIGNED: Self = Self(0);
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Arena key of a revision row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(pub u64);

impl RevisionId {
    /// Placeholder for rows not yet inserted.
    pub const UNASSIGNED: Self = Self(0);
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A wiki page at one locale.
///
/// `(locale, slug)` is unique across all rows, including soft-deleted ones.
/// `html` always mirrors the content of `current_revision`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub locale: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub html: String,
    /// Macro-expanded html; empty until the first render.
    #[serde(default)]
    pub rendered_html: String,
    #[serde(default)]
    pub rendered_errors: Vec<RenderMessage>,
    pub render_scheduled_at: Option<DateTime<Utc>>,
    pub render_started_at: Option<DateTime<Utc>>,
    pub last_rendered_at: Option<DateTime<Utc>>,
    /// Seconds a render stays valid.
    pub render_max_age: Option<u64>,
    pub render_expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub defer_rendering: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub is_localizable: bool,
    #[serde(default)]
    pub is_redirect: bool,
    pub current_revision: Option<RevisionId>,
    /// Translation source, always in the canonical locale.
    pub parent: Option<DocumentId>,
    /// Breadcrumb parent, same locale.
    pub parent_topic: Option<DocumentId>,
    #[serde(default)]
    pub derived: DerivedFields,
    pub modified: Option<DateTime<Utc>>,
}

impl Document {
    /// Create an unsaved document with empty content.
    #[must_use]
    pub fn new(locale: impl Into<String>, slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: DocumentId::UNASSIGNED,
            locale: locale.into(),
            slug: slug.into(),
            title: title.into(),
            tags: Vec::new(),
            html: String::new(),
            rendered_html: String::new(),
            rendered_errors: Vec::new(),
            render_scheduled_at: None,
            render_started_at: None,
            last_rendered_at: None,
            render_max_age: None,
            render_expires: None,
            defer_rendering: false,
            deleted: false,
            is_localizable: false,
            is_redirect: false,
            current_revision: None,
            parent: None,
            parent_topic: None,
            derived: DerivedFields::default(),
            modified: None,
        }
    }

    /// Natural key, `{locale}/{slug}`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.locale, self.slug)
    }

    /// Public URL path of the document.
    #[must_use]
    pub fn url(&self) -> String {
        format!("/{}/docs/{}", self.locale, self.slug)
    }

    /// Redirect target when the document is a redirect.
    #[must_use]
    pub fn redirect_url(&self) -> Option<&str> {
        if self.is_redirect {
            parse_redirect(&self.html)
        } else {
            None
        }
    }

    /// Slug of the breadcrumb parent implied by the slug path.
    ///
    /// `"Web/HTML/Element"` yields `Some("Web/HTML")`; top-level slugs yield `None`.
    #[must_use]
    pub fn slug_parent(&self) -> Option<&str> {
        self.slug.rsplit_once('/').map(|(parent, _)| parent)
    }

    /// Whether the document is visible to natural-key lookups.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.deleted
    }
}

/// An immutable snapshot of a document's content.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub id: RevisionId,
    pub document: DocumentId,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub review_tags: BTreeSet<String>,
    #[serde(default)]
    pub localization_tags: BTreeSet<String>,
    #[serde(default)]
    pub is_approved: bool,
    pub created: DateTime<Utc>,
    pub creator: String,
    #[serde(default)]
    pub comment: String,
    /// Revision of the canonical original this one derives from.
    pub based_on: Option<RevisionId>,
    pub render_max_age: Option<u64>,
    /// Deepest heading level in the TOC; 0 disables it.
    pub toc_depth: u8,
}

/// Record of a soft delete or purge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionLog {
    pub locale: String,
    pub slug: String,
    pub user: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Build the html of a redirect document pointing at `/{locale}/docs/{slug}`.
#[must_use]
pub fn redirect_html(locale: &str, slug: &str, title: &str) -> String {
    format!(
        r#"REDIRECT <a class="redirect" href="/{locale}/docs/{slug}">{}</a>"#,
        escape_text(title)
    )
}

/// Extract the target URL from redirect html.
#[must_use]
pub fn parse_redirect(html: &str) -> Option<&str> {
    REDIRECT_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
