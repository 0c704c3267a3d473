//! Render scheduler.
//!
//! The render state of a document is derived from three timestamps and the
//! presence of rendered html; nothing else is stored. A pending timestamp
//! older than the render timeout counts as an abandoned attempt.

use chrono::{DateTime, TimeDelta, Utc};
use scribe_render::{RenderMessage, RenderRequest};
use scribe_store::{DEFAULT_TOC_DEPTH, Document, DocumentId, FieldUpdate, RenderResult};

use crate::content::ContentExtractor;
use crate::error::WikiError;
use crate::tasks::{Job, RenderJob};
use crate::wiki::Wiki;

/// Derived render state of a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderState {
    /// Never rendered and nothing pending.
    Unrendered,
    /// Queued and within the timeout.
    Scheduled,
    /// Rendering and within the timeout.
    InProgress,
    /// Rendered html present and nothing pending.
    Rendered,
    /// A pending attempt outlived the timeout.
    Stale,
}

impl RenderState {
    /// Whether another render should be held back.
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Scheduled | Self::InProgress)
    }
}

/// Compute the render state of `document` at `now`.
#[must_use]
pub fn render_state(document: &Document, now: DateTime<Utc>, timeout: TimeDelta) -> RenderState {
    let pending = |at: Option<DateTime<Utc>>| {
        at.filter(|at| document.last_rendered_at.is_none_or(|last| *at > last))
    };
    let fresh = |at: DateTime<Utc>| now - at <= timeout;

    let started = pending(document.render_started_at);
    let scheduled = pending(document.render_scheduled_at);

    if started.is_some_and(fresh) {
        RenderState::InProgress
    } else if scheduled.is_some_and(fresh) {
        RenderState::Scheduled
    } else if started.is_some() || scheduled.is_some() {
        RenderState::Stale
    } else if document.rendered_html.is_empty() {
        RenderState::Unrendered
    } else {
        RenderState::Rendered
    }
}

fn to_delta(duration: std::time::Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

impl Wiki {
    /// Render state of a document now.
    pub fn render_state(&self, document: &Document) -> RenderState {
        render_state(
            document,
            self.clock.now(),
            to_delta(self.settings.render_timeout),
        )
    }

    /// Arrange for a document to be rendered.
    ///
    /// Does nothing while a render is already scheduled or running. Deferred
    /// documents are queued; others render before this returns.
    pub fn schedule_rendering(
        &self,
        document: DocumentId,
        cache_control: Option<&str>,
        base_url: Option<&str>,
    ) -> Result<(), WikiError> {
        let doc = self.store.get(document)?;
        let state = self.render_state(&doc);
        if state.is_pending() {
            tracing::debug!(key = %doc.key(), ?state, "Render already pending");
            return Ok(());
        }

        let now = self.clock.now();
        self.store
            .update_fields(doc.id, &[FieldUpdate::RenderScheduledAt(Some(now))])?;

        if doc.defer_rendering && !self.settings.force_immediate {
            tracing::debug!(key = %doc.key(), "Deferring render");
            return self.queue.enqueue(Job::Render(RenderJob {
                document: doc.id,
                cache_control: cache_control.map(str::to_owned),
                base_url: base_url.map(str::to_owned),
            }));
        }

        match self.render(doc.id, cache_control, base_url, None) {
            Ok(_) | Err(WikiError::RenderingInProgress) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Render a document now.
    ///
    /// Renderer failures do not fail the call: they are recorded as an
    /// error-level message and the raw html is kept as rendered output.
    pub fn render(
        &self,
        document: DocumentId,
        cache_control: Option<&str>,
        base_url: Option<&str>,
        timeout: Option<std::time::Duration>,
    ) -> Result<Document, WikiError> {
        let doc = self.store.get(document)?;
        if self.render_state(&doc) == RenderState::InProgress {
            return Err(WikiError::RenderingInProgress);
        }

        let started = self.clock.now();
        self.store
            .update_fields(doc.id, &[FieldUpdate::RenderStartedAt(Some(started))])?;

        let (rendered_html, rendered_errors) = self.expand(&doc, cache_control, base_url, timeout);

        let toc_depth = match doc.current_revision {
            Some(id) => self.store.get_revision(id)?.toc_depth,
            None => DEFAULT_TOC_DEPTH,
        };
        let source = if rendered_html.is_empty() {
            doc.html.as_str()
        } else {
            rendered_html.as_str()
        };
        let mut derived = doc.derived.clone();
        derived.regenerate_all(true, &ContentExtractor::new(source, toc_depth));

        // Write back render-owned columns only, over the latest row.
        let latest = self.store.get(doc.id)?;
        let finished = self.clock.now();
        let elapsed = finished - started;
        let slow = elapsed >= to_delta(self.settings.force_defer);
        if slow && !latest.defer_rendering {
            tracing::info!(key = %latest.key(), elapsed_ms = elapsed.num_milliseconds(), "Slow render, deferring future renders");
        }
        let result = RenderResult {
            rendered_html,
            rendered_errors,
            derived,
            last_rendered_at: finished,
            render_expires: latest
                .render_max_age
                .filter(|age| *age > 0)
                .and_then(|age| i64::try_from(age).ok())
                .map(|age| finished + TimeDelta::seconds(age)),
            defer_rendering: latest.defer_rendering || slow,
        };
        self.store
            .update_fields(doc.id, &[FieldUpdate::Rendered(Box::new(result))])?;

        let doc = self.store.get(doc.id)?;
        tracing::info!(
            key = %doc.key(),
            errors = doc.rendered_errors.len(),
            elapsed_ms = elapsed.num_milliseconds(),
            "Rendered document"
        );

        for listener in &self.listeners {
            listener.render_completed(&doc);
        }
        Ok(doc)
    }

    fn expand(
        &self,
        doc: &Document,
        cache_control: Option<&str>,
        base_url: Option<&str>,
        timeout: Option<std::time::Duration>,
    ) -> (String, Vec<RenderMessage>) {
        if self.settings.renderer_timeout.is_zero() {
            return (doc.html.clone(), Vec::new());
        }
        let request = RenderRequest::new(&doc.locale, &doc.slug, &doc.html)
            .cache_control(cache_control)
            .base_url(base_url.or(self.settings.base_url.as_deref()))
            .timeout(timeout);
        match self.renderer.render(&request) {
            Ok(output) => (output.html, output.errors),
            Err(e) => {
                tracing::warn!(key = %doc.key(), "Renderer failed, keeping raw html: {e}");
                let message = RenderMessage::error(e.to_string()).with_arg(e.class_name());
                (doc.html.clone(), vec![message])
            }
        }
    }

    /// Rendered html and messages, scheduling a render if needed.
    ///
    /// A `cache_control` directive always reschedules. When nothing has been
    /// rendered yet, returns `("", errors)` if the last attempt reported
    /// errors and [`WikiError::ContentNotYetAvailable`] otherwise.
    pub fn get_rendered(
        &self,
        document: DocumentId,
        cache_control: Option<&str>,
        base_url: Option<&str>,
    ) -> Result<(String, Vec<RenderMessage>), WikiError> {
        let doc = self.store.get(document)?;
        if doc.rendered_html.is_empty() || cache_control.is_some() {
            match self.schedule_rendering(doc.id, cache_control, base_url) {
                Ok(()) => {}
                Err(WikiError::RenderingInProgress) => {
                    return Err(WikiError::ContentNotYetAvailable);
                }
                Err(e) => return Err(e),
            }
        }

        let doc = self.store.get(document)?;
        if doc.rendered_html.is_empty() {
            if doc.rendered_errors.is_empty() {
                return Err(WikiError::ContentNotYetAvailable);
            }
            return Ok((String::new(), doc.rendered_errors));
        }
        Ok((doc.rendered_html, doc.rendered_errors))
    }

    /// Schedule rendering of every live document whose render has expired.
    ///
    /// Returns how many documents were scheduled.
    pub fn render_stale_documents(&self) -> Result<usize, WikiError> {
        let now = self.clock.now();
        let mut scheduled = 0;
        for doc in self.store.scan()? {
            if doc.render_expires.is_none_or(|expires| expires > now) {
                continue;
            }
            match self.schedule_rendering(doc.id, None, None) {
                Ok(()) => scheduled += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!(key = %doc.key(), "Failed to schedule stale render: {e}"),
            }
        }
        Ok(scheduled)
    }

    /// Render every live document left scheduled or abandoned.
    ///
    /// Picks up render jobs lost with a previous process. Returns how many
    /// documents were rendered.
    pub fn render_pending_documents(&self) -> Result<usize, WikiError> {
        let mut rendered = 0;
        for doc in self.store.scan()? {
            if !matches!(
                self.render_state(&doc),
                RenderState::Scheduled | RenderState::Stale
            ) {
                continue;
            }
            match self.render(doc.id, None, None, None) {
                Ok(_) => rendered += 1,
                Err(WikiError::RenderingInProgress) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(rendered)
    }
}
