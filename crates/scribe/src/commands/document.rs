//! Document and revision commands.

use std::path::PathBuf;

use clap::Args;
use scribe_store::{DocumentId, RevisionId};
use scribe_wiki::{DocumentProjection, NewDocument, RevisionChanges, WikiError};

use crate::error::CliError;
use crate::output::Output;
use crate::session::{Session, Target};

/// A document addressed by locale and slug.
#[derive(Args)]
pub(crate) struct TargetArgs {
    #[command(flatten)]
    pub target: Target,
}

/// New content, inline or from a file.
#[derive(Args)]
pub(crate) struct ContentArgs {
    /// Html content.
    #[arg(long, conflicts_with = "file")]
    content: Option<String>,

    /// Read html content from a file.
    #[arg(short, long)]
    file: Option<PathBuf>,
}

impl ContentArgs {
    fn resolve(&self) -> Result<Option<String>, CliError> {
        match (&self.content, &self.file) {
            (Some(content), _) => Ok(Some(content.clone())),
            (None, Some(path)) => Ok(Some(std::fs::read_to_string(path)?)),
            (None, None) => Ok(None),
        }
    }
}

/// Arguments for the create command.
#[derive(Args)]
pub(crate) struct CreateArgs {
    #[command(flatten)]
    target: Target,

    #[command(flatten)]
    content: ContentArgs,

    /// Document title (default: last slug segment).
    #[arg(short, long)]
    title: Option<String>,

    /// Slug of the breadcrumb parent in the same locale.
    #[arg(long)]
    parent_topic: Option<String>,

    /// Slug of the canonical document this one translates.
    #[arg(long)]
    translation_of: Option<String>,

    /// Allow translations of this document.
    #[arg(long)]
    localizable: bool,

    /// Seconds a render stays fresh.
    #[arg(long)]
    max_age: Option<u64>,

    /// Deepest heading level in the table of contents (0 disables it).
    #[arg(long)]
    toc_depth: Option<u8>,

    /// Page tags.
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Revision comment.
    #[arg(short, long)]
    message: Option<String>,
}

impl CreateArgs {
    pub(crate) fn execute(
        self,
        session: &Session,
        user: &str,
        output: &Output,
    ) -> Result<(), CliError> {
        let wiki = &session.wiki;
        let parent_topic = self
            .parent_topic
            .as_deref()
            .map(|slug| wiki.find(&self.target.locale, slug).map(|d| d.id))
            .transpose()?;
        let parent = self
            .translation_of
            .as_deref()
            .map(|slug| wiki.find(&wiki.settings().canonical_locale, slug).map(|d| d.id))
            .transpose()?;
        let title = self.title.unwrap_or_else(|| {
            self.target
                .slug
                .rsplit('/')
                .next()
                .unwrap_or(&self.target.slug)
                .to_owned()
        });

        let new = NewDocument {
            tags: self.tags,
            parent,
            parent_topic,
            is_localizable: self.localizable,
            render_max_age: self.max_age,
            toc_depth: self.toc_depth,
            comment: self.message,
            ..NewDocument::new(
                &self.target.locale,
                &self.target.slug,
                title,
                self.content.resolve()?.unwrap_or_default(),
            )
        };
        let doc = wiki.create_document(new, user)?;
        output.success(&format!("Created {} (document {})", doc.url(), doc.id));
        Ok(())
    }
}

/// Arguments for the edit command.
#[derive(Args)]
pub(crate) struct EditArgs {
    #[command(flatten)]
    target: Target,

    #[command(flatten)]
    content: ContentArgs,

    /// New title.
    #[arg(short, long)]
    title: Option<String>,

    /// Replace only the section whose heading has this id.
    #[arg(long)]
    section: Option<String>,

    /// Replace the page tags.
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Review tags for the new revision.
    #[arg(long = "review-tag")]
    review_tags: Vec<String>,

    /// Revision comment.
    #[arg(short, long)]
    message: Option<String>,

    /// Seconds a render stays fresh.
    #[arg(long)]
    max_age: Option<u64>,

    /// Revision the edit started from; refuses to save if it is no longer current.
    #[arg(long)]
    expected: Option<u64>,

    /// Record the revision without making it current.
    #[arg(long)]
    unapproved: bool,
}

impl EditArgs {
    pub(crate) fn execute(
        self,
        session: &Session,
        user: &str,
        output: &Output,
    ) -> Result<(), CliError> {
        let doc = session.find(&self.target)?;
        let content = self.content.resolve()?;
        if self.section.is_some() && content.is_none() {
            return Err(CliError::Validation(
                "--section requires --content or --file".to_owned(),
            ));
        }

        let changes = RevisionChanges {
            title: self.title,
            content,
            tags: (!self.tags.is_empty()).then_some(self.tags),
            review_tags: self.review_tags.into_iter().collect(),
            comment: self.message,
            render_max_age: self.max_age,
            is_approved: !self.unapproved,
            expected_current: self.expected.map(RevisionId),
            ..RevisionChanges::default()
        };
        let revision = session
            .wiki
            .revise(doc.id, user, changes, self.section.as_deref())?;

        if revision.is_approved {
            output.success(&format!("Saved revision {} of {}", revision.id, doc.url()));
        } else {
            output.warning(&format!(
                "Saved revision {} of {} (not yet current)",
                revision.id,
                doc.url()
            ));
        }
        Ok(())
    }
}

/// Arguments for the show command.
#[derive(Args)]
pub(crate) struct ShowArgs {
    #[command(flatten)]
    target: Target,

    /// Print the document projection as JSON.
    #[arg(long)]
    json: bool,

    /// Cache-Control directive forcing a re-render (e.g., max-age=0).
    #[arg(long)]
    cache_control: Option<String>,
}

impl ShowArgs {
    pub(crate) fn execute(self, session: &Session, output: &Output) -> Result<(), CliError> {
        let wiki = &session.wiki;
        let doc = session.find(&self.target)?;
        let rendered = match wiki.get_rendered(doc.id, self.cache_control.as_deref(), None) {
            Ok(rendered) => Some(rendered),
            Err(WikiError::ContentNotYetAvailable) => None,
            Err(e) => return Err(e.into()),
        };
        let doc = wiki.document(doc.id)?;

        if self.json {
            let projection = session
                .projection()
                .get(&doc.locale, &doc.slug)
                .filter(|p| p.last_rendered_at == doc.last_rendered_at)
                .unwrap_or_else(|| DocumentProjection::from_document(&doc));
            output.info(&serde_json::to_string_pretty(&projection)?);
            return Ok(());
        }

        output.heading(
            &doc.title,
            &format!(
                "{} | document {} | revision {} | {:?}",
                doc.url(),
                doc.id,
                doc.current_revision
                    .map_or_else(|| "none".to_owned(), |r| r.to_string()),
                wiki.render_state(&doc)
            ),
        );
        if let Some(target) = doc.redirect_url() {
            output.info(&format!("Redirects to {target}"));
        }
        if wiki.is_outdated(doc.id)? {
            output.warning("Translation is behind its source");
        }

        match rendered {
            Some((html, errors)) => {
                output.info(&html);
                for message in &errors {
                    output.render_message(message);
                }
            }
            None => output.warning("Rendered content is not yet available; run `scribe work`"),
        }
        Ok(())
    }
}

/// Arguments for the history command.
#[derive(Args)]
pub(crate) struct HistoryArgs {
    #[command(flatten)]
    target: Target,

    /// Show at most this many revisions.
    #[arg(short = 'n', long)]
    limit: Option<usize>,
}

impl HistoryArgs {
    pub(crate) fn execute(self, session: &Session, output: &Output) -> Result<(), CliError> {
        let doc = session.find(&self.target)?;
        let history = session.wiki.history(doc.id)?;
        let limit = self.limit.unwrap_or(history.len());

        for revision in history.into_iter().take(limit) {
            let line = format!(
                "{:>6}  {}  {}  {}",
                revision.id,
                revision.created.format("%Y-%m-%d %H:%M:%S"),
                revision.creator,
                revision.comment
            );
            if doc.current_revision == Some(revision.id) {
                output.success(&format!("* {line}"));
            } else if revision.is_approved {
                output.info(&format!("  {line}"));
            } else {
                output.detail(&format!("  {line} (unapproved)"));
            }
        }
        Ok(())
    }
}

/// Arguments for the revert command.
#[derive(Args)]
pub(crate) struct RevertArgs {
    /// Revision to restore.
    revision: u64,

    /// Reason for the revert.
    #[arg(short, long)]
    message: Option<String>,
}

impl RevertArgs {
    pub(crate) fn execute(
        self,
        session: &Session,
        user: &str,
        output: &Output,
    ) -> Result<(), CliError> {
        let revision = session
            .wiki
            .revert(RevisionId(self.revision), user, self.message.as_deref())?;
        let doc = session.wiki.document(revision.document)?;
        output.success(&format!(
            "Reverted {} to revision {} as revision {}",
            doc.url(),
            self.revision,
            revision.id
        ));
        Ok(())
    }
}

pub(crate) fn clean(
    session: &Session,
    args: &TargetArgs,
    user: &str,
    output: &Output,
) -> Result<(), CliError> {
    let doc = session.find(&args.target)?;
    match session.wiki.clean_content(doc.id, user)? {
        Some(revision) => {
            output.success(&format!("Cleaned {} as revision {}", doc.url(), revision.id));
        }
        None => output.info(&format!("{} is already clean", doc.url())),
    }
    Ok(())
}

/// Arguments for the prune command.
#[derive(Args)]
pub(crate) struct PruneArgs {
    #[command(flatten)]
    target: Target,

    /// Number of newest revisions to keep.
    #[arg(long, default_value_t = 10)]
    keep: usize,
}

impl PruneArgs {
    pub(crate) fn execute(self, session: &Session, output: &Output) -> Result<(), CliError> {
        let doc = session.find(&self.target)?;
        let pruned = session.wiki.prune_history(doc.id, self.keep)?;
        output.success(&format!("Deleted {pruned} revisions of {}", doc.url()));
        Ok(())
    }
}

/// Arguments for the localizable command.
#[derive(Args)]
pub(crate) struct LocalizableArgs {
    #[command(flatten)]
    target: Target,

    /// Whether translations are allowed.
    #[arg(action = clap::ArgAction::Set)]
    enabled: bool,
}

impl LocalizableArgs {
    pub(crate) fn execute(self, session: &Session, output: &Output) -> Result<(), CliError> {
        let doc = session.find(&self.target)?;
        let doc = session.wiki.set_localizable(doc.id, self.enabled)?;
        output.success(&format!("{} localizable: {}", doc.url(), doc.is_localizable));
        Ok(())
    }
}

/// Id of a live document, for messages.
pub(crate) fn describe(session: &Session, id: DocumentId) -> String {
    session
        .wiki
        .document(id)
        .map_or_else(|_| format!("document {id}"), |d| d.url())
}
