//! Creating, deleting, restoring and purging documents.

use std::collections::BTreeSet;

use scribe_store::{DEFAULT_TOC_DEPTH, DeletionLog, Document, DocumentId, Revision, RevisionId};

use crate::error::WikiError;
use crate::mover::validate_slug;
use crate::wiki::Wiki;

/// A document to create, with the content of its first revision.
#[derive(Clone, Debug, Default)]
pub struct NewDocument {
    pub locale: String,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    /// Translation source; must be in the canonical locale.
    pub parent: Option<DocumentId>,
    /// Breadcrumb parent; must be in the same locale.
    pub parent_topic: Option<DocumentId>,
    pub is_localizable: bool,
    pub render_max_age: Option<u64>,
    pub toc_depth: Option<u8>,
    pub comment: Option<String>,
    /// Explicit `based_on` for the first revision of a translation.
    pub based_on: Option<RevisionId>,
}

impl NewDocument {
    /// A new document with content and nothing else set.
    #[must_use]
    pub fn new(
        locale: impl Into<String>,
        slug: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            locale: locale.into(),
            slug: slug.into(),
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }
}

impl Wiki {
    /// Create a document and its first revision, then schedule rendering.
    ///
    /// A redirect at the slug is reclaimed. Any other row holding the slug,
    /// live or deleted, fails with [`WikiError::SlugCollision`].
    pub fn create_document(&self, new: NewDocument, editor: &str) -> Result<Document, WikiError> {
        if !self.settings.accepts_locale(&new.locale) {
            return Err(WikiError::validation(format!(
                "locale {} is not enabled",
                new.locale
            )));
        }
        validate_slug(&new.slug)?;
        if new.title.trim().is_empty() {
            return Err(WikiError::validation("title must not be empty"));
        }

        let canonical = new.locale == self.settings.canonical_locale;
        if new.is_localizable && !canonical {
            return Err(WikiError::validation(format!(
                "only {} documents can be localizable",
                self.settings.canonical_locale
            )));
        }

        let mut based_on = new.based_on;
        if let Some(parent) = new.parent {
            let source = self.store.get(parent)?;
            if canonical || source.locale != self.settings.canonical_locale {
                return Err(WikiError::validation(format!(
                    "{}/{} cannot translate {}",
                    new.locale,
                    new.slug,
                    source.key()
                )));
            }
            if let Some(existing) = self
                .store
                .translations(parent)?
                .into_iter()
                .find(|d| d.locale == new.locale)
            {
                return Err(WikiError::validation(format!(
                    "{} already has a {} translation at {}",
                    source.key(),
                    new.locale,
                    existing.key()
                )));
            }
            based_on = based_on.or(source.current_revision);
        }
        if let Some(topic) = new.parent_topic {
            let topic = self.store.get(topic)?;
            if topic.locale != new.locale {
                return Err(WikiError::validation(format!(
                    "breadcrumb parent {} is not in locale {}",
                    topic.key(),
                    new.locale
                )));
            }
        }

        if self.store.find_deleted(&new.locale, &new.slug)?.is_some() {
            return Err(WikiError::collision(&new.locale, &new.slug));
        }
        if let Some(existing) = self.store.find(&new.locale, &new.slug)?
            && !existing.is_redirect
        {
            return Err(WikiError::collision(&new.locale, &new.slug));
        }

        let mut doc = Document::new(&new.locale, &new.slug, &new.title);
        doc.parent = new.parent;
        doc.parent_topic = new.parent_topic;
        doc.is_localizable = new.is_localizable;
        doc.render_max_age = new.render_max_age;
        self.check_based_on(&doc, based_on)?;

        self.reclaim_redirect(&new.locale, &new.slug)?;
        let mut doc = self.insert(doc)?;

        let revision = Revision {
            id: RevisionId::UNASSIGNED,
            document: doc.id,
            title: new.title,
            slug: new.slug,
            content: new.content,
            tags: new.tags,
            review_tags: BTreeSet::new(),
            localization_tags: BTreeSet::new(),
            is_approved: true,
            created: self.clock.now(),
            creator: editor.to_owned(),
            comment: new.comment.unwrap_or_default(),
            based_on,
            render_max_age: new.render_max_age,
            toc_depth: new.toc_depth.unwrap_or(DEFAULT_TOC_DEPTH),
        };
        let revision = self.record_revision(&doc, revision)?;
        self.promote_onto(&mut doc, &revision)?;
        tracing::info!(key = %doc.key(), editor, "Created document");

        if doc.parent.is_some() && doc.parent_topic.is_none() {
            doc = match self.acquire_translated_topic_parent(doc.id) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(key = %doc.key(), "Breadcrumb parent unavailable, removing new document: {e}");
                    self.destroy(&self.store.get(doc.id)?)?;
                    return Err(e);
                }
            };
        }
        self.schedule_rendering(doc.id, None, None)?;
        Ok(self.store.get(doc.id)?)
    }

    /// Soft-delete a document and record who deleted it.
    pub fn delete_document(
        &self,
        document: DocumentId,
        user: &str,
        reason: &str,
    ) -> Result<Document, WikiError> {
        let mut doc = self.store.get(document)?;
        if doc.deleted {
            return Err(WikiError::validation(format!("{} is already deleted", doc.key())));
        }
        doc.deleted = true;
        doc.modified = Some(self.clock.now());
        self.save(&doc)?;
        self.log_deletion(&doc, user, reason)?;
        tracing::info!(key = %doc.key(), user, "Deleted document");
        Ok(doc)
    }

    /// Undelete the soft-deleted document at `(locale, slug)`.
    pub fn restore_document(&self, locale: &str, slug: &str) -> Result<Document, WikiError> {
        let mut doc = self
            .store
            .find_deleted(locale, slug)?
            .ok_or_else(|| WikiError::NotFound(format!("deleted document {locale}/{slug}")))?;
        doc.deleted = false;
        doc.modified = Some(self.clock.now());
        self.save(&doc)?;
        tracing::info!(key = %doc.key(), "Restored document");
        Ok(doc)
    }

    /// Permanently remove a soft-deleted document and its revisions.
    ///
    /// Translations and breadcrumb children are detached, and other
    /// documents' revisions based on the purged ones lose their `based_on`.
    pub fn purge_document(
        &self,
        document: DocumentId,
        user: &str,
        reason: &str,
    ) -> Result<(), WikiError> {
        let doc = self.store.get(document)?;
        if !doc.deleted {
            return Err(WikiError::validation(format!(
                "{} must be deleted before it is purged",
                doc.key()
            )));
        }
        self.destroy(&doc)?;
        self.log_deletion(&doc, user, reason)?;
        tracing::info!(key = %doc.key(), user, "Purged document");
        Ok(())
    }

    /// Allow or forbid translations of a document.
    pub fn set_localizable(
        &self,
        document: DocumentId,
        localizable: bool,
    ) -> Result<Document, WikiError> {
        let mut doc = self.store.get(document)?;
        if doc.is_localizable == localizable {
            return Ok(doc);
        }
        if localizable && !self.is_canonical(&doc) {
            return Err(WikiError::validation(format!(
                "only {} documents can be localizable",
                self.settings.canonical_locale
            )));
        }
        if !localizable && self.store.translations(doc.id)?.iter().any(Document::is_live) {
            return Err(WikiError::validation(format!(
                "{} has translations and must stay localizable",
                doc.key()
            )));
        }
        doc.is_localizable = localizable;
        self.save(&doc)?;
        Ok(doc)
    }

    /// Destroy a live redirect occupying `(locale, slug)`.
    ///
    /// Returns whether a redirect was removed.
    pub(crate) fn reclaim_redirect(&self, locale: &str, slug: &str) -> Result<bool, WikiError> {
        match self.store.find(locale, slug)? {
            Some(redirect) if redirect.is_redirect => {
                self.destroy(&redirect)?;
                tracing::debug!(key = %redirect.key(), "Reclaimed redirect slug");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Hard-delete a row with everything that references it.
    pub(crate) fn destroy(&self, document: &Document) -> Result<(), WikiError> {
        for mut translation in self.store.translations(document.id)? {
            translation.parent = None;
            self.store.save(&translation)?;
        }
        for mut child in self.store.topic_children(document.id)? {
            child.parent_topic = None;
            self.store.save(&child)?;
        }

        let mut doc = self.store.get(document.id)?;
        if doc.current_revision.take().is_some() {
            self.store.save(&doc)?;
        }

        let revisions = self.store.revisions(doc.id)?;
        for revision in &revisions {
            self.store.clear_based_on(revision.id)?;
        }
        for revision in &revisions {
            self.store.remove_revision(revision.id)?;
        }
        self.store.remove(doc.id)?;
        Ok(())
    }

    fn log_deletion(&self, doc: &Document, user: &str, reason: &str) -> Result<(), WikiError> {
        self.store.append_deletion_log(DeletionLog {
            locale: doc.locale.clone(),
            slug: doc.slug.clone(),
            user: user.to_owned(),
            reason: reason.to_owned(),
            timestamp: self.clock.now(),
        })?;
        Ok(())
    }
}
