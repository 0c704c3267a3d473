//! Move and breadcrumb commands.

use clap::Args;

use crate::commands::document::TargetArgs;
use crate::error::CliError;
use crate::output::Output;
use crate::session::{Session, Target};

/// Arguments for the move command.
#[derive(Args)]
pub(crate) struct MoveArgs {
    #[command(flatten)]
    target: Target,

    /// Destination slug.
    new_slug: String,

    /// New title for the moved document.
    #[arg(short, long)]
    title: Option<String>,

    /// List what would move and what blocks the move, without moving.
    #[arg(long)]
    dry_run: bool,
}

impl MoveArgs {
    pub(crate) fn execute(
        self,
        session: &Session,
        user: &str,
        output: &Output,
    ) -> Result<(), CliError> {
        let wiki = &session.wiki;
        let doc = session.find(&self.target)?;

        if self.dry_run {
            let descendants = wiki.get_descendants(doc.id, None)?;
            output.info(&format!(
                "Would move {} and {} descendants to {}",
                doc.url(),
                descendants.len(),
                self.new_slug
            ));
            for descendant in &descendants {
                output.detail(&format!("  {}", descendant.url()));
            }
            print_conflicts(&wiki.tree_conflicts(doc.id, &self.new_slug)?, output);
            return Ok(());
        }

        if self.title.is_some() {
            let moved = wiki.move_tree(doc.id, &self.new_slug, user, self.title.as_deref())?;
            output.success(&format!("Moved {} to {}", self.target.slug, moved.url()));
            return Ok(());
        }

        wiki.request_move(doc.id, &self.new_slug, user)?;
        let report = session.worker().run_pending();
        if let Some((_, err)) = report.failed.into_iter().next() {
            return Err(err.into());
        }
        output.success(&format!(
            "Moved /{}/docs/{} to /{}/docs/{}",
            doc.locale, doc.slug, doc.locale, self.new_slug
        ));
        Ok(())
    }
}

/// Arguments for the conflicts command.
#[derive(Args)]
pub(crate) struct ConflictsArgs {
    #[command(flatten)]
    target: Target,

    /// Destination slug.
    new_slug: String,
}

impl ConflictsArgs {
    pub(crate) fn execute(self, session: &Session, output: &Output) -> Result<(), CliError> {
        let doc = session.find(&self.target)?;
        print_conflicts(&session.wiki.tree_conflicts(doc.id, &self.new_slug)?, output);
        Ok(())
    }
}

fn print_conflicts(conflicts: &[scribe_store::Document], output: &Output) {
    if conflicts.is_empty() {
        output.success("No conflicts");
        return;
    }
    output.warning(&format!("{} conflicting documents:", conflicts.len()));
    for conflict in conflicts {
        output.info(&format!("  {}", conflict.url()));
    }
}

pub(crate) fn repair_breadcrumbs(
    session: &Session,
    args: &TargetArgs,
    output: &Output,
) -> Result<(), CliError> {
    let doc = session.find(&args.target)?;
    session.wiki.repair_breadcrumbs(doc.id)?;

    let trail: Vec<String> = session
        .wiki
        .topic_parents(doc.id)?
        .iter()
        .rev()
        .map(|d| d.title.clone())
        .chain(std::iter::once(doc.title.clone()))
        .collect();
    output.success(&trail.join(" > "));
    Ok(())
}
