//! Delete, restore and purge commands.

use clap::Args;

use crate::commands::document::TargetArgs;
use crate::error::CliError;
use crate::output::Output;
use crate::session::{Session, Target};

/// Arguments for the delete and purge commands.
#[derive(Args)]
pub(crate) struct DeleteArgs {
    #[command(flatten)]
    target: Target,

    /// Reason recorded in the deletion log.
    #[arg(short, long, default_value = "")]
    reason: String,
}

impl DeleteArgs {
    pub(crate) fn delete(
        self,
        session: &Session,
        user: &str,
        output: &Output,
    ) -> Result<(), CliError> {
        let doc = session.find(&self.target)?;
        session.wiki.delete_document(doc.id, user, &self.reason)?;
        output.success(&format!("Deleted {}", doc.url()));
        Ok(())
    }

    pub(crate) fn purge(
        self,
        session: &Session,
        user: &str,
        output: &Output,
    ) -> Result<(), CliError> {
        let doc = session
            .wiki
            .store()
            .find_deleted(&self.target.locale, &self.target.slug)?
            .ok_or_else(|| {
                CliError::Validation(format!(
                    "no deleted document at /{}/docs/{}; delete it first",
                    self.target.locale, self.target.slug
                ))
            })?;
        session.wiki.purge_document(doc.id, user, &self.reason)?;
        session.projection().forget(&doc.locale, &doc.slug);
        output.success(&format!("Purged {}", doc.url()));
        Ok(())
    }
}

pub(crate) fn restore(
    session: &Session,
    args: &TargetArgs,
    output: &Output,
) -> Result<(), CliError> {
    let doc = session
        .wiki
        .restore_document(&args.target.locale, &args.target.slug)?;
    output.success(&format!("Restored {}", doc.url()));
    for log in session
        .wiki
        .store()
        .deletion_logs(&doc.locale, &doc.slug)?
        .iter()
        .rev()
        .take(1)
    {
        output.detail(&format!(
            "Deleted by {} at {}: {}",
            log.user,
            log.timestamp.format("%Y-%m-%d %H:%M:%S"),
            log.reason
        ));
    }
    Ok(())
}
