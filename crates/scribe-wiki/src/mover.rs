//! Tree mutator: moving a document and its breadcrumb subtree.
//!
//! Each node is renamed in place, gets a new revision at its new slug and
//! leaves a redirect at its old one. Children move depth-first after their
//! parent. The move is not transactional: a failing node stops the walk and
//! leaves already-moved nodes where they are.

use std::collections::HashSet;

use scribe_store::{Document, DocumentId, Revision, RevisionId, redirect_html};

use crate::error::{PageMoveError, WikiError};
use crate::tasks::{Job, MoveJob};
use crate::wiki::Wiki;

const RESERVED_SLUG_CHARS: &[char] = &['?', '#', '%', '&', '"', '\'', '*', '+', '$', '<', '>', '\\'];

/// Reject slugs that cannot be addressed by URL.
pub(crate) fn validate_slug(slug: &str) -> Result<(), WikiError> {
    if slug.is_empty() {
        return Err(WikiError::validation("slug must not be empty"));
    }
    if let Some(ch) = slug
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || RESERVED_SLUG_CHARS.contains(c))
    {
        return Err(WikiError::validation(format!(
            "slug {slug:?} contains reserved character {ch:?}"
        )));
    }
    if slug
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(WikiError::validation(format!(
            "slug {slug:?} has an empty or relative segment"
        )));
    }
    Ok(())
}

/// Rewrite `slug` from under `old_prefix` to under `new_prefix`.
fn rebase_slug(slug: &str, old_prefix: &str, new_prefix: &str) -> String {
    match slug.strip_prefix(old_prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => format!("{new_prefix}{rest}"),
        _ => match slug.rsplit_once('/') {
            Some((_, leaf)) => format!("{new_prefix}/{leaf}"),
            None => format!("{new_prefix}/{slug}"),
        },
    }
}

impl Wiki {
    /// Breadcrumb descendants in depth-first order.
    ///
    /// `levels` limits the depth (`Some(1)` is direct children only).
    pub fn get_descendants(
        &self,
        document: DocumentId,
        levels: Option<usize>,
    ) -> Result<Vec<Document>, WikiError> {
        let mut visited = HashSet::from([document]);
        let mut out = Vec::new();
        self.collect_descendants(document, levels, 1, &mut visited, &mut out)?;
        Ok(out)
    }

    fn collect_descendants(
        &self,
        id: DocumentId,
        levels: Option<usize>,
        depth: usize,
        visited: &mut HashSet<DocumentId>,
        out: &mut Vec<Document>,
    ) -> Result<(), WikiError> {
        if levels.is_some_and(|max| depth > max) {
            return Ok(());
        }
        for child in self.store.topic_children(id)? {
            if !child.is_live() {
                continue;
            }
            if !visited.insert(child.id) {
                tracing::warn!(document = %child.id, "Breadcrumb cycle detected in descendants");
                continue;
            }
            let child_id = child.id;
            out.push(child);
            self.collect_descendants(child_id, levels, depth + 1, visited, out)?;
        }
        Ok(())
    }

    /// Breadcrumb ancestors, nearest first.
    pub fn topic_parents(&self, document: DocumentId) -> Result<Vec<Document>, WikiError> {
        let mut visited = HashSet::from([document]);
        let mut parents = Vec::new();
        let mut next = self.store.get(document)?.parent_topic;
        while let Some(id) = next {
            if !visited.insert(id) {
                tracing::warn!(document = %id, "Breadcrumb cycle detected in ancestors");
                break;
            }
            if parents.len() >= self.settings.max_breadcrumb_depth {
                tracing::warn!(document = %document, "Breadcrumb chain exceeds depth bound");
                break;
            }
            let parent = self.store.get(id)?;
            next = parent.parent_topic;
            parents.push(parent);
        }
        Ok(parents)
    }

    /// Breadcrumb children that move along with `document`.
    fn moving_children(&self, document: &Document) -> Result<Vec<Document>, WikiError> {
        Ok(self
            .store
            .topic_children(document.id)?
            .into_iter()
            .filter(|c| c.is_live() && c.locale == document.locale)
            .collect())
    }

    /// Every node of the moving subtree paired with its destination slug.
    ///
    /// Each child is rebased against its own parent, as the move does.
    fn move_plan(
        &self,
        root: Document,
        new_slug: &str,
    ) -> Result<Vec<(Document, String)>, WikiError> {
        let mut visited = HashSet::from([root.id]);
        let mut plan = Vec::new();
        let mut pending = vec![(root, new_slug.to_owned())];
        while let Some((node, destination)) = pending.pop() {
            for child in self.moving_children(&node)?.into_iter().rev() {
                if !visited.insert(child.id) {
                    tracing::warn!(document = %child.id, "Breadcrumb cycle detected in move plan");
                    continue;
                }
                let child_slug = rebase_slug(&child.slug, &node.slug, &destination);
                pending.push((child, child_slug));
            }
            plan.push((node, destination));
        }
        Ok(plan)
    }

    /// Documents that would block moving `document`'s subtree to `new_slug`.
    ///
    /// Every node's destination is checked, not just the root's.
    pub fn tree_conflicts(
        &self,
        document: DocumentId,
        new_slug: &str,
    ) -> Result<Vec<Document>, WikiError> {
        let plan = self.move_plan(self.store.get(document)?, new_slug)?;
        let moving: HashSet<DocumentId> = plan.iter().map(|(d, _)| d.id).collect();

        let mut conflicts = Vec::new();
        for (node, destination) in &plan {
            if let Some(existing) = self.store.find(&node.locale, destination)?
                && !existing.is_redirect
                && !moving.contains(&existing.id)
            {
                conflicts.push(existing);
            }
        }
        Ok(conflicts)
    }

    /// Move `document` and its breadcrumb subtree to `new_slug`.
    ///
    /// Translations of every moved document then re-acquire their breadcrumb
    /// parents from the moved tree.
    pub fn move_tree(
        &self,
        document: DocumentId,
        new_slug: &str,
        user: &str,
        new_title: Option<&str>,
    ) -> Result<Document, WikiError> {
        validate_slug(new_slug)?;
        let root = self.store.get(document)?;
        if new_slug == root.slug {
            return Err(WikiError::validation(format!(
                "{} is already at {new_slug}",
                root.key()
            )));
        }
        if new_slug.starts_with(&format!("{}/", root.slug)) {
            return Err(WikiError::validation(format!(
                "cannot move {} into its own subtree",
                root.key()
            )));
        }

        tracing::info!(from = %root.key(), to = %new_slug, "Moving tree");
        let mut moved = Vec::new();
        let result = self.move_node(root.id, new_slug, user, new_title, &mut moved);

        for id in &moved {
            if let Err(e) = self.relink_translations(*id) {
                if result.is_ok() {
                    return Err(e);
                }
                tracing::warn!(document = %id, "Failed to relink translations after partial move: {e}");
            }
        }
        result
    }

    fn relink_translations(&self, document: DocumentId) -> Result<(), WikiError> {
        for translation in self.store.translations(document)? {
            if translation.is_live() {
                self.acquire_translated_topic_parent(translation.id)?;
                self.repair_breadcrumbs(translation.id)?;
            }
        }
        Ok(())
    }

    fn move_node(
        &self,
        document: DocumentId,
        new_slug: &str,
        user: &str,
        new_title: Option<&str>,
        moved: &mut Vec<DocumentId>,
    ) -> Result<Document, WikiError> {
        let mut doc = self.store.get(document)?;

        if let Some(existing) = self.store.find(&doc.locale, new_slug)?
            && existing.id != doc.id
        {
            if !existing.is_redirect {
                return Err(WikiError::MoveConflict {
                    conflicts: vec![existing.key()],
                });
            }
            self.destroy(&existing)?;
        }

        let current = match doc.current_revision {
            Some(id) => Some(self.store.get_revision(id)?),
            None => None,
        };
        let review_tags = current
            .as_ref()
            .map(|r| r.review_tags.clone())
            .unwrap_or_default();

        let old_slug = doc.slug.clone();
        let title = new_title.map_or_else(|| doc.title.clone(), str::to_owned);
        let redirect = Document::new(&doc.locale, &old_slug, &doc.title);
        let redirect_content = redirect_html(&doc.locale, new_slug, &title);

        let parent_topic = match new_slug.rsplit_once('/') {
            Some((parent_slug, _)) => self
                .store
                .find(&doc.locale, parent_slug)?
                .filter(|p| !p.is_redirect)
                .map(|p| p.id),
            None => None,
        };

        doc.slug = new_slug.to_owned();
        doc.title.clone_from(&title);
        doc.parent_topic = parent_topic;
        doc.modified = Some(self.clock.now());
        self.save(&doc)?;

        let based_on = self.default_based_on(&doc)?;
        let revision = Revision {
            id: RevisionId::UNASSIGNED,
            document: doc.id,
            title,
            slug: new_slug.to_owned(),
            content: doc.html.clone(),
            tags: doc.tags.clone(),
            review_tags,
            localization_tags: current
                .as_ref()
                .map(|r| r.localization_tags.clone())
                .unwrap_or_default(),
            is_approved: true,
            created: self.clock.now(),
            creator: user.to_owned(),
            comment: format!("Moved from {old_slug} to {new_slug}"),
            based_on,
            render_max_age: doc.render_max_age,
            toc_depth: current
                .as_ref()
                .map_or(scribe_store::DEFAULT_TOC_DEPTH, |r| r.toc_depth),
        };
        let revision = self.record_revision(&doc, revision)?;
        self.promote_onto(&mut doc, &revision)?;
        moved.push(doc.id);

        let mut redirect = self.insert(redirect)?;
        let redirect_revision = Revision {
            id: RevisionId::UNASSIGNED,
            document: redirect.id,
            title: redirect.title.clone(),
            slug: old_slug.clone(),
            content: redirect_content,
            is_approved: true,
            created: self.clock.now(),
            creator: user.to_owned(),
            comment: format!("Redirect to {new_slug}"),
            toc_depth: scribe_store::DEFAULT_TOC_DEPTH,
            ..Revision::default()
        };
        let redirect_revision = self.record_revision(&redirect, redirect_revision)?;
        self.promote_onto(&mut redirect, &redirect_revision)?;
        tracing::debug!(from = %old_slug, to = %new_slug, locale = %doc.locale, "Moved document");

        for child in self.moving_children(&doc)? {
            let child_slug = rebase_slug(&child.slug, &old_slug, new_slug);
            self.move_node(child.id, &child_slug, user, None, moved)
                .map_err(|source| {
                    if matches!(source, WikiError::PageMove(_)) {
                        return source;
                    }
                    WikiError::PageMove(Box::new(PageMoveError {
                        id: child.id,
                        locale: child.locale.clone(),
                        slug: child.slug.clone(),
                        source,
                    }))
                })?;
        }

        Ok(doc)
    }

    /// Queue a subtree move for a background worker.
    ///
    /// Fails up front when any node's destination is occupied.
    pub fn request_move(
        &self,
        document: DocumentId,
        new_slug: &str,
        user: &str,
    ) -> Result<(), WikiError> {
        validate_slug(new_slug)?;
        let doc = self.store.get(document)?;
        let conflicts = self.tree_conflicts(document, new_slug)?;
        if !conflicts.is_empty() {
            return Err(WikiError::MoveConflict {
                conflicts: conflicts.iter().map(Document::key).collect(),
            });
        }
        self.queue.enqueue(Job::Move(MoveJob {
            locale: doc.locale,
            old_slug: doc.slug,
            new_slug: new_slug.to_owned(),
            user: user.to_owned(),
        }))
    }

    /// Execute a queued move.
    ///
    /// Returns `None` when the source already redirects to the destination.
    pub fn run_move_job(&self, job: &MoveJob) -> Result<Option<Document>, WikiError> {
        let doc = self.find(&job.locale, &job.old_slug)?;
        let destination = format!("/{}/docs/{}", job.locale, job.new_slug);
        if doc.redirect_url() == Some(destination.as_str()) {
            tracing::info!(from = %doc.key(), to = %job.new_slug, "Move already applied");
            return Ok(None);
        }
        self.move_tree(doc.id, &job.new_slug, &job.user, None).map(Some)
    }
}
