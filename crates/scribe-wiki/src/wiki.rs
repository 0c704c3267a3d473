//! The lifecycle engine handle.
//!
//! [`Wiki`] bundles the store, renderer, task queue and the pluggable
//! collaborators. Lifecycle operations are implemented in separate modules as
//! `impl Wiki` blocks:
//!
//! - revision ledger (`ledger`)
//! - render scheduler (`render`)
//! - translation linker (`translation`)
//! - tree mutator (`mover`)
//! - create/delete/restore/purge (`lifecycle`)
//!
//! # Concurrency
//!
//! The engine holds no locks of its own. Cross-worker coordination relies on
//! the store's unique keys and on render timestamps with a staleness window.

use std::sync::Arc;
use std::time::Duration;

use scribe_render::Renderer;
use scribe_store::{Document, DocumentId, DocumentStore, Revision, RevisionId, StoreError};

use crate::clock::{Clock, SystemClock};
use crate::collab::{AmmoniaSanitizer, AttachmentLinker, NoAttachments, Sanitizer};
use crate::error::WikiError;
use crate::events::RenderListener;
use crate::tasks::{NullQueue, TaskQueue};

/// Engine settings.
#[derive(Clone, Debug)]
pub struct WikiSettings {
    /// Locale of original documents.
    pub canonical_locale: String,
    /// Accepted locales; empty accepts any.
    pub locales: Vec<String>,
    /// Bound on breadcrumb walks.
    pub max_breadcrumb_depth: usize,
    /// Age after which a pending render is considered abandoned.
    pub render_timeout: Duration,
    /// Render duration that switches a document to deferred rendering.
    pub force_defer: Duration,
    /// Render synchronously even for deferred documents.
    pub force_immediate: bool,
    /// Renderer timeout; zero bypasses the renderer.
    pub renderer_timeout: Duration,
    /// Site base URL handed to the renderer when a call does not supply one.
    pub base_url: Option<String>,
}

impl Default for WikiSettings {
    fn default() -> Self {
        Self {
            canonical_locale: "en-US".to_owned(),
            locales: Vec::new(),
            max_breadcrumb_depth: 64,
            render_timeout: Duration::from_secs(180),
            force_defer: Duration::from_secs(10),
            force_immediate: false,
            renderer_timeout: Duration::from_secs(2),
            base_url: None,
        }
    }
}

impl WikiSettings {
    /// Whether `locale` may hold documents.
    #[must_use]
    pub fn accepts_locale(&self, locale: &str) -> bool {
        self.locales.is_empty()
            || locale == self.canonical_locale
            || self.locales.iter().any(|l| l == locale)
    }
}

/// Builder for [`Wiki`].
pub struct WikiBuilder {
    store: Arc<dyn DocumentStore>,
    renderer: Arc<dyn Renderer>,
    queue: Arc<dyn TaskQueue>,
    clock: Arc<dyn Clock>,
    sanitizer: Box<dyn Sanitizer>,
    attachments: Box<dyn AttachmentLinker>,
    listeners: Vec<Box<dyn RenderListener>>,
    settings: WikiSettings,
}

impl WikiBuilder {
    /// Set the task queue for deferred work.
    #[must_use]
    pub fn queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = queue;
        self
    }

    /// Set the time source.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the content sanitizer.
    #[must_use]
    pub fn sanitizer(mut self, sanitizer: Box<dyn Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Set the attachment linker.
    #[must_use]
    pub fn attachments(mut self, attachments: Box<dyn AttachmentLinker>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Register a render listener.
    #[must_use]
    pub fn listener(mut self, listener: Box<dyn RenderListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Set engine settings.
    #[must_use]
    pub fn settings(mut self, settings: WikiSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Wiki {
        Wiki {
            store: self.store,
            renderer: self.renderer,
            queue: self.queue,
            clock: self.clock,
            sanitizer: self.sanitizer,
            attachments: self.attachments,
            listeners: self.listeners,
            settings: self.settings,
        }
    }
}

/// Document/revision lifecycle engine.
pub struct Wiki {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) renderer: Arc<dyn Renderer>,
    pub(crate) queue: Arc<dyn TaskQueue>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) sanitizer: Box<dyn Sanitizer>,
    pub(crate) attachments: Box<dyn AttachmentLinker>,
    pub(crate) listeners: Vec<Box<dyn RenderListener>>,
    pub(crate) settings: WikiSettings,
}

impl Wiki {
    /// Start building an engine over `store` and `renderer`.
    ///
    /// Defaults: no task queue, system clock, `ammonia` sanitizer, no
    /// attachment linking, no listeners, default settings.
    #[must_use]
    pub fn builder(store: Arc<dyn DocumentStore>, renderer: Arc<dyn Renderer>) -> WikiBuilder {
        WikiBuilder {
            store,
            renderer,
            queue: Arc::new(NullQueue),
            clock: Arc::new(SystemClock),
            sanitizer: Box::new(AmmoniaSanitizer),
            attachments: Box::new(NoAttachments),
            listeners: Vec::new(),
            settings: WikiSettings::default(),
        }
    }

    /// Engine settings.
    #[must_use]
    pub fn settings(&self) -> &WikiSettings {
        &self.settings
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Fetch a document row by id.
    pub fn document(&self, id: DocumentId) -> Result<Document, WikiError> {
        Ok(self.store.get(id)?)
    }

    /// Fetch the live document at `(locale, slug)`.
    pub fn find(&self, locale: &str, slug: &str) -> Result<Document, WikiError> {
        self.store
            .find(locale, slug)?
            .ok_or_else(|| WikiError::NotFound(format!("{locale}/{slug}")))
    }

    /// Fetch a revision by id.
    pub fn revision(&self, id: RevisionId) -> Result<Revision, WikiError> {
        Ok(self.store.get_revision(id)?)
    }

    /// Whether `document` is in the canonical locale.
    pub(crate) fn is_canonical(&self, document: &Document) -> bool {
        document.locale == self.settings.canonical_locale
    }

    /// Save a row, reporting key clashes as slug collisions.
    pub(crate) fn save(&self, document: &Document) -> Result<(), WikiError> {
        self.store
            .save(document)
            .map_err(|e| collision_or(e, document))
    }

    /// Insert a row, reporting key clashes as slug collisions.
    pub(crate) fn insert(&self, document: Document) -> Result<Document, WikiError> {
        let (locale, slug) = (document.locale.clone(), document.slug.clone());
        self.store
            .insert(document)
            .map_err(|e| clash_error(e, &locale, &slug))
    }
}

fn collision_or(err: StoreError, document: &Document) -> WikiError {
    clash_error(err, &document.locale, &document.slug)
}

/// A `(locale, slug)` clash is a slug collision; a translation-key clash is a
/// validation failure naming the occupied translation.
fn clash_error(err: StoreError, locale: &str, slug: &str) -> WikiError {
    if !err.is_already_exists() {
        return err.into();
    }
    if err.key.as_deref() == Some(format!("{locale}/{slug}").as_str()) {
        WikiError::collision(locale, slug)
    } else {
        WikiError::validation(format!(
            "cannot store {locale}/{slug}: {} is already taken",
            err.key.as_deref().unwrap_or("a unique key")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(Wiki: Send, Sync);

    #[test]
    fn test_clash_error_names_translation_key() {
        let slug_clash = StoreError::already_exists("fr/P");
        assert!(matches!(
            clash_error(slug_clash, "fr", "P"),
            WikiError::SlugCollision { .. }
        ));

        let translation_clash = StoreError::already_exists("translation of 1 in fr");
        match clash_error(translation_clash, "fr", "P") {
            WikiError::Validation(message) => {
                assert_eq!(message, "cannot store fr/P: translation of 1 in fr is already taken");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_accepts_locale() {
        let mut settings = WikiSettings::default();
        assert!(settings.accepts_locale("xx"));

        settings.locales = vec!["fr".to_owned()];
        assert!(settings.accepts_locale("fr"));
        assert!(settings.accepts_locale("en-US"));
        assert!(!settings.accepts_locale("de"));
    }
}
