//! Render scheduling commands.

use std::time::Duration;

use clap::Args;
use scribe_wiki::{Job, RenderState};

use super::document::describe;
use crate::error::CliError;
use crate::output::Output;
use crate::session::{Session, Target};

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    #[command(flatten)]
    target: Target,

    /// Cache-Control directive passed to the renderer.
    #[arg(long)]
    cache_control: Option<String>,

    /// Renderer timeout in seconds for this render.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl RenderArgs {
    pub(crate) fn execute(self, session: &Session, output: &Output) -> Result<(), CliError> {
        let doc = session.find(&self.target)?;
        let doc = session.wiki.render(
            doc.id,
            self.cache_control.as_deref(),
            None,
            self.timeout_secs.map(Duration::from_secs),
        )?;

        output.success(&format!("Rendered {}", doc.url()));
        for message in &doc.rendered_errors {
            output.render_message(message);
        }
        if doc.defer_rendering {
            output.detail("Future renders of this document are deferred");
        }
        Ok(())
    }
}

/// Arguments for the schedule command.
#[derive(Args)]
pub(crate) struct ScheduleArgs {
    #[command(flatten)]
    target: Target,

    /// Cache-Control directive passed to the renderer.
    #[arg(long)]
    cache_control: Option<String>,
}

impl ScheduleArgs {
    pub(crate) fn execute(self, session: &Session, output: &Output) -> Result<(), CliError> {
        let doc = session.find(&self.target)?;
        session
            .wiki
            .schedule_rendering(doc.id, self.cache_control.as_deref(), None)?;

        let doc = session.wiki.document(doc.id)?;
        match session.wiki.render_state(&doc) {
            RenderState::Scheduled => {
                output.info(&format!("Queued {}; run `scribe work` to render", doc.url()));
            }
            RenderState::InProgress => {
                output.warning(&format!("{} is already rendering", doc.url()));
            }
            _ => output.success(&format!("Rendered {}", doc.url())),
        }
        Ok(())
    }
}

pub(crate) fn sweep(session: &Session, output: &Output) -> Result<(), CliError> {
    let scheduled = session.wiki.render_stale_documents()?;
    let report = session.worker().run_pending();
    output.success(&format!(
        "Scheduled {scheduled} expired documents, ran {} queued jobs",
        report.completed
    ));
    report_failures(session, &report.failed, output);
    Ok(())
}

pub(crate) fn work(session: &Session, output: &Output) -> Result<(), CliError> {
    let recovered = session.wiki.render_pending_documents()?;
    let report = session.worker().run_pending();
    output.success(&format!(
        "Rendered {recovered} pending documents, ran {} queued jobs",
        report.completed
    ));
    report_failures(session, &report.failed, output);
    Ok(())
}

fn report_failures(session: &Session, failed: &[(Job, scribe_wiki::WikiError)], output: &Output) {
    for (job, err) in failed {
        let what = match job {
            Job::Render(render) => format!("render of {}", describe(session, render.document)),
            Job::Move(job) => format!("move of /{}/docs/{}", job.locale, job.old_slug),
        };
        output.error(&format!("Failed {what}: {err}"));
    }
}
