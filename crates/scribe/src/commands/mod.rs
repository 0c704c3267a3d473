//! CLI command implementations.

mod document;
mod removal;
mod render;
mod tree;

use clap::Subcommand;

use crate::error::CliError;
use crate::output::Output;
use crate::session::{GlobalArgs, Session};

/// Lifecycle commands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create a document with its first revision.
    Create(document::CreateArgs),
    /// Record a new revision of a document.
    Edit(document::EditArgs),
    /// Show a document and its rendered content.
    Show(document::ShowArgs),
    /// List revisions, newest first.
    History(document::HistoryArgs),
    /// Restore an old revision as the current one.
    Revert(document::RevertArgs),
    /// Sanitize the current content into a new revision.
    Clean(document::TargetArgs),
    /// Delete old revisions.
    Prune(document::PruneArgs),
    /// Allow or forbid translations of a document.
    Localizable(document::LocalizableArgs),
    /// Render a document now.
    Render(render::RenderArgs),
    /// Schedule a document for rendering.
    Schedule(render::ScheduleArgs),
    /// Schedule every document whose render has expired.
    Sweep,
    /// Run queued jobs and renders left pending by earlier runs.
    Work,
    /// Move a document and its breadcrumb subtree.
    Move(tree::MoveArgs),
    /// List documents blocking a move.
    Conflicts(tree::ConflictsArgs),
    /// Re-link translated breadcrumb parents.
    RepairBreadcrumbs(document::TargetArgs),
    /// Soft-delete a document.
    Delete(removal::DeleteArgs),
    /// Undelete a document.
    Restore(document::TargetArgs),
    /// Permanently remove a deleted document.
    Purge(removal::DeleteArgs),
}

impl Command {
    /// Execute the command against the configured store.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration, the store or the lifecycle operation fails.
    pub(crate) fn execute(self, global: &GlobalArgs, output: &Output) -> Result<(), CliError> {
        let session = Session::open(global)?;
        let user = global.user.as_str();

        match self {
            Self::Create(args) => args.execute(&session, user, output),
            Self::Edit(args) => args.execute(&session, user, output),
            Self::Show(args) => args.execute(&session, output),
            Self::History(args) => args.execute(&session, output),
            Self::Revert(args) => args.execute(&session, user, output),
            Self::Clean(args) => document::clean(&session, &args, user, output),
            Self::Prune(args) => args.execute(&session, output),
            Self::Localizable(args) => args.execute(&session, output),
            Self::Render(args) => args.execute(&session, output),
            Self::Schedule(args) => args.execute(&session, output),
            Self::Sweep => render::sweep(&session, output),
            Self::Work => render::work(&session, output),
            Self::Move(args) => args.execute(&session, user, output),
            Self::Conflicts(args) => args.execute(&session, output),
            Self::RepairBreadcrumbs(args) => tree::repair_breadcrumbs(&session, &args, output),
            Self::Delete(args) => args.delete(&session, user, output),
            Self::Restore(args) => removal::restore(&session, &args, output),
            Self::Purge(args) => args.purge(&session, user, output),
        }?;

        session.save()
    }
}
