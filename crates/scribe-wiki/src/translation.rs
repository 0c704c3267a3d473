//! Translation linker.
//!
//! Keeps the breadcrumb tree of each locale parallel to the canonical one. A
//! translation's breadcrumb parent is the translation of its source's
//! breadcrumb parent, created as a stub when it does not exist yet.

use std::collections::{BTreeSet, HashSet};

use scribe_store::{Document, DocumentId, Revision, RevisionId};

use crate::error::WikiError;
use crate::wiki::Wiki;

/// Tags added to automatically created breadcrumb stubs.
pub const STUB_TAGS: [&str; 2] = ["TopicStub", "NeedsTranslation"];

/// Localization tag marking an unfinished translation.
pub const IN_PROGRESS: &str = "inprogress";

impl Wiki {
    /// Live translation of `source` in `locale`.
    fn translation_in(
        &self,
        source: DocumentId,
        locale: &str,
    ) -> Result<Option<Document>, WikiError> {
        Ok(self
            .store
            .translations(source)?
            .into_iter()
            .find(|d| d.is_live() && d.locale == locale))
    }

    /// Point a translation's breadcrumb parent at the matching translation of
    /// its source's breadcrumb parent.
    ///
    /// The matching translation is, in order: the existing translation, an
    /// unlinked live document at the same slug (which gets linked), or a new
    /// stub. Canonical documents and documents without a source are left
    /// alone. Writes only when something changes.
    pub fn acquire_translated_topic_parent(
        &self,
        document: DocumentId,
    ) -> Result<Document, WikiError> {
        let mut doc = self.store.get(document)?;
        if self.is_canonical(&doc) {
            return Ok(doc);
        }
        let Some(source_id) = doc.parent else {
            return Ok(doc);
        };
        let source = self.store.get(source_id)?;

        let Some(source_topic_id) = source.parent_topic else {
            if doc.parent_topic.is_some() {
                doc.parent_topic = None;
                self.save(&doc)?;
                tracing::debug!(key = %doc.key(), "Cleared translated breadcrumb parent");
            }
            return Ok(doc);
        };

        let target = match self.translation_in(source_topic_id, &doc.locale)? {
            Some(existing) => existing,
            None => self.link_or_create_topic_parent(source_topic_id, &doc)?,
        };

        if doc.parent_topic != Some(target.id) {
            doc.parent_topic = Some(target.id);
            self.save(&doc)?;
            tracing::debug!(key = %doc.key(), parent = %target.key(), "Acquired translated breadcrumb parent");
        }
        Ok(doc)
    }

    fn link_or_create_topic_parent(
        &self,
        source_topic_id: DocumentId,
        doc: &Document,
    ) -> Result<Document, WikiError> {
        let source_topic = self.store.get(source_topic_id)?;

        let candidate = self
            .store
            .find(&doc.locale, &source_topic.slug)?
            .filter(|d| !d.is_redirect && d.parent.is_none() && d.id != doc.id);
        if let Some(mut same_slug) = candidate {
            same_slug.parent = Some(source_topic.id);
            self.save(&same_slug)?;
            tracing::info!(key = %same_slug.key(), source = %source_topic.key(), "Linked existing document as translation");
            return Ok(same_slug);
        }

        self.create_topic_stub(&source_topic, &doc.locale)
    }

    fn create_topic_stub(&self, source: &Document, locale: &str) -> Result<Document, WikiError> {
        self.reclaim_redirect(locale, &source.slug)?;

        let mut stub = Document::new(locale, &source.slug, &source.title);
        stub.parent = Some(source.id);
        let mut stub = self.insert(stub)?;

        if let Some(source_rev) = source.current_revision {
            let source_rev = self.store.get_revision(source_rev)?;
            let mut tags = source_rev.tags.clone();
            for tag in STUB_TAGS {
                if !tags.iter().any(|t| t == tag) {
                    tags.push(tag.to_owned());
                }
            }
            let revision = Revision {
                id: RevisionId::UNASSIGNED,
                document: stub.id,
                slug: stub.slug.clone(),
                tags,
                review_tags: BTreeSet::new(),
                localization_tags: BTreeSet::from([IN_PROGRESS.to_owned()]),
                is_approved: true,
                created: self.clock.now(),
                based_on: Some(source_rev.id),
                ..source_rev
            };
            let revision = self.record_revision(&stub, revision)?;
            self.promote_onto(&mut stub, &revision)?;
        }

        tracing::info!(key = %stub.key(), source = %source.key(), "Created breadcrumb stub");
        Ok(stub)
    }

    /// Re-acquire translated breadcrumb parents from `document` upward.
    ///
    /// Stops at the first document without a translation source. Cycles and
    /// chains deeper than the configured bound end the walk with a warning.
    pub fn repair_breadcrumbs(&self, document: DocumentId) -> Result<Document, WikiError> {
        let mut visited = HashSet::new();
        let mut current = Some(document);
        let mut first = None;

        while let Some(id) = current {
            if !visited.insert(id) {
                tracing::warn!(document = %id, "Breadcrumb cycle detected, stopping repair");
                break;
            }
            if visited.len() > self.settings.max_breadcrumb_depth {
                tracing::warn!(document = %document, "Breadcrumb chain exceeds depth bound, stopping repair");
                break;
            }

            let mut doc = self.store.get(id)?;
            if doc.parent.is_none() || doc.parent == Some(doc.id) {
                first.get_or_insert(doc);
                break;
            }

            let topic_locale = match doc.parent_topic {
                Some(topic) => Some(self.store.get(topic)?.locale),
                None => None,
            };
            if topic_locale.as_deref() != Some(doc.locale.as_str()) {
                doc = self.acquire_translated_topic_parent(doc.id)?;
            }
            current = doc.parent_topic;
            first.get_or_insert(doc);
        }

        match first {
            Some(doc) => Ok(doc),
            None => Ok(self.store.get(document)?),
        }
    }

    /// The member of `document`'s translation family in `locale`.
    pub fn translated_to(
        &self,
        document: DocumentId,
        locale: &str,
    ) -> Result<Option<Document>, WikiError> {
        let doc = self.store.get(document)?;
        let original = match doc.parent {
            Some(parent) => self.store.get(parent)?,
            None => doc,
        };
        if original.locale == locale {
            return Ok(Some(original).filter(Document::is_live));
        }
        self.translation_in(original.id, locale)
    }

    /// Every other live member of `document`'s translation family, by locale.
    pub fn other_translations(&self, document: DocumentId) -> Result<Vec<Document>, WikiError> {
        let doc = self.store.get(document)?;
        let original = match doc.parent {
            Some(parent) => self.store.get(parent)?,
            None => doc.clone(),
        };
        let mut family: Vec<Document> = std::iter::once(original.clone())
            .chain(self.store.translations(original.id)?)
            .filter(|d| d.is_live() && d.id != doc.id)
            .collect();
        family.sort_by(|a, b| a.locale.cmp(&b.locale));
        Ok(family)
    }

    /// Whether a translation lags behind its source's current revision.
    pub fn is_outdated(&self, document: DocumentId) -> Result<bool, WikiError> {
        let doc = self.store.get(document)?;
        let Some(parent) = doc.parent else {
            return Ok(false);
        };
        let Some(source_current) = self.store.get(parent)?.current_revision else {
            return Ok(false);
        };
        let based_on = match doc.current_revision {
            Some(id) => self.store.get_revision(id)?.based_on,
            None => None,
        };
        Ok(based_on.is_none_or(|b| b < source_current))
    }
}
