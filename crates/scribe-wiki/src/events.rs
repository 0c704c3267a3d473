//! Render-completed notifications.
//!
//! Every successful render calls each registered [`RenderListener`] exactly
//! once with the freshly saved document.

use std::sync::mpsc;

use chrono::{DateTime, Utc};
use scribe_cache::{Cache, CacheBucket, CacheBucketJson};
use scribe_render::RenderMessage;
use scribe_store::{DerivedField, Document, DocumentId};
use serde::{Deserialize, Serialize};

/// Receives render-completed notifications.
pub trait RenderListener: Send + Sync {
    /// Called once per successful render.
    fn render_completed(&self, document: &Document);
}

/// A render that finished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderEvent {
    /// Rendered document.
    pub id: DocumentId,
    /// Its locale.
    pub locale: String,
    /// Its slug.
    pub slug: String,
    /// When the render finished.
    pub rendered_at: Option<DateTime<Utc>>,
}

/// [`RenderListener`] that forwards events over a channel.
pub struct RenderEventSender {
    tx: mpsc::Sender<RenderEvent>,
}

impl RenderListener for RenderEventSender {
    fn render_completed(&self, document: &Document) {
        let event = RenderEvent {
            id: document.id,
            locale: document.locale.clone(),
            slug: document.slug.clone(),
            rendered_at: document.last_rendered_at,
        };
        if self.tx.send(event).is_err() {
            tracing::debug!(key = %document.key(), "Render event receiver dropped");
        }
    }
}

/// Receiving end of [`render_events`].
pub struct RenderEventReceiver {
    rx: mpsc::Receiver<RenderEvent>,
}

impl RenderEventReceiver {
    /// Try to receive an event without blocking.
    #[must_use]
    pub fn try_recv(&self) -> Option<RenderEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain every event received so far.
    #[must_use]
    pub fn drain(&self) -> Vec<RenderEvent> {
        self.rx.try_iter().collect()
    }
}

/// Create a connected listener/receiver pair.
#[must_use]
pub fn render_events() -> (RenderEventSender, RenderEventReceiver) {
    let (tx, rx) = mpsc::channel();
    (RenderEventSender { tx }, RenderEventReceiver { rx })
}

/// JSON view of a rendered document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentProjection {
    pub id: DocumentId,
    pub locale: String,
    pub slug: String,
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
    pub summary: String,
    pub toc_html: String,
    pub body_html: String,
    pub quick_links_html: String,
    pub errors: Vec<RenderMessage>,
    pub last_rendered_at: Option<DateTime<Utc>>,
}

impl DocumentProjection {
    /// Build the projection of a rendered document.
    #[must_use]
    pub fn from_document(document: &Document) -> Self {
        let field = |f| document.derived.get(f).value().to_owned();
        Self {
            id: document.id,
            locale: document.locale.clone(),
            slug: document.slug.clone(),
            title: document.title.clone(),
            url: document.url(),
            tags: document.tags.clone(),
            summary: field(DerivedField::Excerpt),
            toc_html: field(DerivedField::TocHtml),
            body_html: field(DerivedField::BodyHtml),
            quick_links_html: field(DerivedField::QuickLinksHtml),
            errors: document.rendered_errors.clone(),
            last_rendered_at: document.last_rendered_at,
        }
    }
}

/// Cache bucket holding document projections.
pub const PROJECTION_BUCKET: &str = "documents";

/// [`RenderListener`] that refreshes the JSON projection of each rendered document.
///
/// Entries are keyed by `{locale}/{slug}` with the render time as etag.
pub struct JsonProjection {
    bucket: Box<dyn CacheBucket>,
}

impl JsonProjection {
    /// Projection stored in `cache`.
    #[must_use]
    pub fn new(cache: &dyn Cache) -> Self {
        Self {
            bucket: cache.bucket(PROJECTION_BUCKET),
        }
    }

    /// Latest projection of a document, if any.
    #[must_use]
    pub fn get(&self, locale: &str, slug: &str) -> Option<DocumentProjection> {
        self.bucket.get_json(&format!("{locale}/{slug}"), "")
    }

    /// Drop the projection of a document.
    pub fn forget(&self, locale: &str, slug: &str) {
        self.bucket.remove(&format!("{locale}/{slug}"));
    }
}

fn etag(document: &Document) -> String {
    document
        .last_rendered_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_default()
}

impl RenderListener for JsonProjection {
    fn render_completed(&self, document: &Document) {
        tracing::debug!(key = %document.key(), "Refreshing document projection");
        self.bucket.set_json(
            &document.key(),
            &etag(document),
            &DocumentProjection::from_document(document),
        );
    }
}
