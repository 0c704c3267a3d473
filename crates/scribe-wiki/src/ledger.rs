//! Revision ledger: creating, promoting and reverting revisions.
//!
//! Revisions are immutable. The only in-place change ever made to a stored
//! revision is nulling its `based_on` before the referenced revision is deleted.

use std::collections::BTreeSet;

use scribe_store::{DEFAULT_TOC_DEPTH, Document, DocumentId, Revision, RevisionId, parse_redirect};

use crate::content;
use crate::error::WikiError;
use crate::wiki::Wiki;

/// Cache-Control directive used to force a fresh render after a revert.
pub const FORCE_FRESH: &str = "max-age=0";

/// Changes an editor makes on top of the current revision.
///
/// Unset fields carry over from the document.
#[derive(Clone, Debug)]
pub struct RevisionChanges {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub review_tags: BTreeSet<String>,
    pub localization_tags: BTreeSet<String>,
    pub comment: Option<String>,
    pub render_max_age: Option<u64>,
    pub toc_depth: Option<u8>,
    /// Explicit `based_on`; defaults to the original's current revision.
    pub based_on: Option<RevisionId>,
    /// Promote the new revision immediately.
    pub is_approved: bool,
    /// Revision the editor started from, for mid-air collision detection.
    pub expected_current: Option<RevisionId>,
}

impl Default for RevisionChanges {
    fn default() -> Self {
        Self {
            title: None,
            slug: None,
            content: None,
            tags: None,
            review_tags: BTreeSet::new(),
            localization_tags: BTreeSet::new(),
            comment: None,
            render_max_age: None,
            toc_depth: None,
            based_on: None,
            is_approved: true,
            expected_current: None,
        }
    }
}

impl RevisionChanges {
    /// Changes that replace the content.
    #[must_use]
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Leave the revision unpromoted.
    #[must_use]
    pub fn unapproved(mut self) -> Self {
        self.is_approved = false;
        self
    }
}

fn timestamp(revision: &Revision) -> String {
    revision.created.format("%Y-%m-%d %H:%M:%S").to_string()
}

impl Wiki {
    /// Make `revision` the current revision of its document.
    ///
    /// Promoting the revision that is already current changes nothing.
    pub fn promote(&self, revision: RevisionId) -> Result<Document, WikiError> {
        let revision = self.store.get_revision(revision)?;
        let mut document = self.store.get(revision.document)?;
        self.promote_onto(&mut document, &revision)?;
        Ok(document)
    }

    pub(crate) fn promote_onto(
        &self,
        document: &mut Document,
        revision: &Revision,
    ) -> Result<(), WikiError> {
        if revision.document != document.id {
            return Err(WikiError::validation(format!(
                "revision {} belongs to document {}, not {}",
                revision.id, revision.document, document.id
            )));
        }
        if document.current_revision == Some(revision.id) {
            tracing::debug!(key = %document.key(), revision = %revision.id, "Revision already current");
            return Ok(());
        }

        document.title.clone_from(&revision.title);
        document.slug.clone_from(&revision.slug);
        document.html.clone_from(&revision.content);
        document.tags.clone_from(&revision.tags);
        document.render_max_age = revision.render_max_age;
        document.current_revision = Some(revision.id);
        document.is_redirect = parse_redirect(&document.html).is_some();
        document.derived.invalidate_all();
        document.modified = Some(self.clock.now());
        self.save(document)?;

        tracing::debug!(key = %document.key(), revision = %revision.id, "Promoted revision");
        self.attachments.populate(document);
        Ok(())
    }

    /// Reject a `based_on` outside the canonical original's revisions.
    pub(crate) fn check_based_on(
        &self,
        document: &Document,
        based_on: Option<RevisionId>,
    ) -> Result<(), WikiError> {
        let Some(based_on) = based_on else {
            return Ok(());
        };
        let original = document.parent.unwrap_or(document.id);
        let invalid = || WikiError::InvalidBasedOn {
            document: document.key(),
            based_on,
        };
        match self.store.get_revision(based_on) {
            Ok(rev) if rev.document == original => Ok(()),
            Ok(_) => Err(invalid()),
            Err(e) if e.is_not_found() => Err(invalid()),
            Err(e) => Err(e.into()),
        }
    }

    /// Validate and store a new revision of `document`.
    pub(crate) fn record_revision(
        &self,
        document: &Document,
        revision: Revision,
    ) -> Result<Revision, WikiError> {
        self.check_based_on(document, revision.based_on)?;
        let revision = self.store.insert_revision(revision)?;
        tracing::debug!(key = %document.key(), revision = %revision.id, "Recorded revision");
        Ok(revision)
    }

    /// Default `based_on` for a new revision of `document`.
    pub(crate) fn default_based_on(
        &self,
        document: &Document,
    ) -> Result<Option<RevisionId>, WikiError> {
        match document.parent {
            Some(parent) => Ok(self.store.get(parent)?.current_revision),
            None => Ok(document.current_revision),
        }
    }

    /// Record an edit as a new revision.
    ///
    /// With `section_id`, `changes.content` replaces only that section.
    /// Approved revisions are promoted and rendering is rescheduled; others
    /// are returned unpromoted.
    pub fn revise(
        &self,
        document: DocumentId,
        editor: &str,
        changes: RevisionChanges,
        section_id: Option<&str>,
    ) -> Result<Revision, WikiError> {
        let mut document = self.store.get(document)?;
        if let Some(expected) = changes.expected_current
            && document.current_revision != Some(expected)
        {
            return Err(WikiError::MidAirCollision {
                expected,
                actual: document.current_revision,
            });
        }

        let current = document
            .current_revision
            .map(|id| self.store.get_revision(id))
            .transpose()?;

        let content = match (section_id, changes.content) {
            (Some(section), Some(replacement)) => {
                content::replace_section(&document.html, section, &replacement).ok_or_else(
                    || WikiError::NotFound(format!("section {section} in {}", document.key())),
                )?
            }
            (None, Some(content)) => content,
            (_, None) => document.html.clone(),
        };

        if let Some(slug) = &changes.slug
            && *slug != document.slug
        {
            crate::mover::validate_slug(slug)?;
            if self.store.find_deleted(&document.locale, slug)?.is_some() {
                return Err(WikiError::collision(&document.locale, slug));
            }
            if let Some(existing) = self.store.find(&document.locale, slug)?
                && existing.id != document.id
                && !existing.is_redirect
            {
                return Err(WikiError::collision(&document.locale, slug));
            }
            if changes.is_approved {
                self.reclaim_redirect(&document.locale, slug)?;
            }
        }

        let based_on = match changes.based_on {
            Some(explicit) => Some(explicit),
            None => self.default_based_on(&document)?,
        };

        let revision = Revision {
            id: RevisionId::UNASSIGNED,
            document: document.id,
            title: changes.title.unwrap_or_else(|| document.title.clone()),
            slug: changes.slug.unwrap_or_else(|| document.slug.clone()),
            content,
            tags: changes.tags.unwrap_or_else(|| document.tags.clone()),
            review_tags: changes.review_tags,
            localization_tags: changes.localization_tags,
            is_approved: changes.is_approved,
            created: self.clock.now(),
            creator: editor.to_owned(),
            comment: changes.comment.unwrap_or_default(),
            based_on,
            render_max_age: changes.render_max_age.or(document.render_max_age),
            toc_depth: changes
                .toc_depth
                .or(current.as_ref().map(|r| r.toc_depth))
                .unwrap_or(DEFAULT_TOC_DEPTH),
        };
        let revision = self.record_revision(&document, revision)?;

        if revision.is_approved {
            self.promote_onto(&mut document, &revision)?;
            self.schedule_rendering(document.id, None, None)?;
        }
        Ok(revision)
    }

    /// Restore the content of an old revision as a new current revision.
    ///
    /// The old revision is not modified. Rendering is rescheduled with a
    /// cache-busting directive.
    pub fn revert(
        &self,
        revision: RevisionId,
        editor: &str,
        comment: Option<&str>,
    ) -> Result<Revision, WikiError> {
        let old = self.store.get_revision(revision)?;
        let mut document = self.store.get(old.document)?;

        let mut message = format!("Revert to revision of {} by {}", timestamp(&old), old.creator);
        if let Some(comment) = comment.filter(|c| !c.is_empty()) {
            message.push_str(&format!(": \"{comment}\""));
        }

        let based_on = if document.parent.is_none() {
            Some(old.id)
        } else {
            old.based_on
        };

        let reverted = Revision {
            id: RevisionId::UNASSIGNED,
            is_approved: true,
            created: self.clock.now(),
            creator: editor.to_owned(),
            comment: message,
            based_on,
            ..old
        };
        let reverted = self.record_revision(&document, reverted)?;
        self.promote_onto(&mut document, &reverted)?;
        tracing::info!(key = %document.key(), from = %revision, to = %reverted.id, "Reverted document");

        self.schedule_rendering(document.id, Some(FORCE_FRESH), None)?;
        Ok(reverted)
    }

    /// Sanitize the current content into a new revision.
    ///
    /// Returns `None` when the content is already clean.
    pub fn clean_content(
        &self,
        document: DocumentId,
        editor: &str,
    ) -> Result<Option<Revision>, WikiError> {
        let mut document = self.store.get(document)?;
        let Some(current) = document.current_revision else {
            return Ok(None);
        };
        let current = self.store.get_revision(current)?;

        let cleaned = self.sanitizer.clean(&current.content);
        if cleaned == current.content {
            tracing::debug!(key = %document.key(), "Content already clean");
            return Ok(None);
        }

        let revision = Revision {
            id: RevisionId::UNASSIGNED,
            content: cleaned,
            is_approved: true,
            created: self.clock.now(),
            creator: editor.to_owned(),
            comment: format!(
                "Clean prior revision of {} by {}",
                timestamp(&current),
                current.creator
            ),
            ..current
        };
        let revision = self.record_revision(&document, revision)?;
        self.promote_onto(&mut document, &revision)?;
        self.schedule_rendering(document.id, None, None)?;
        Ok(Some(revision))
    }

    /// Revisions of a document, newest first.
    pub fn history(&self, document: DocumentId) -> Result<Vec<Revision>, WikiError> {
        let mut revisions = self.store.revisions(document)?;
        revisions.reverse();
        Ok(revisions)
    }

    /// Delete all but the newest `keep` revisions, never the current one.
    ///
    /// Returns how many revisions were deleted.
    pub fn prune_history(&self, document: DocumentId, keep: usize) -> Result<usize, WikiError> {
        let doc = self.store.get(document)?;
        let doomed: Vec<RevisionId> = self
            .history(document)?
            .into_iter()
            .skip(keep)
            .map(|r| r.id)
            .filter(|id| doc.current_revision != Some(*id))
            .collect();

        for id in &doomed {
            self.store.clear_based_on(*id)?;
        }
        for id in &doomed {
            self.store.remove_revision(*id)?;
        }
        if !doomed.is_empty() {
            tracing::info!(key = %doc.key(), pruned = doomed.len(), "Pruned history");
        }
        Ok(doomed.len())
    }
}
