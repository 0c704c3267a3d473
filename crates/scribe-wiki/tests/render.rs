mod common;

use chrono::TimeDelta;
use pretty_assertions::assert_eq;
use scribe_render::RenderMessage;
use scribe_store::{DerivedField, DocumentStore, FieldUpdate};
use scribe_wiki::{Job, NewDocument, NullQueue, RenderState, WikiError, render_events};

use common::{EDITOR, Fixture, start};

fn defer(fx: &Fixture, id: scribe_store::DocumentId) {
    let mut doc = fx.get(id);
    doc.defer_rendering = true;
    fx.store.save(&doc).unwrap();
}

// ========================================================================
// Scheduling
// ========================================================================

#[test]
fn test_create_renders_synchronously() {
    let fx = Fixture::new();

    let doc = fx.create("en-US", "Root", "<p>Hello</p>");

    assert_eq!(fx.renderer.calls(), 1);
    assert_eq!(doc.rendered_html, "<p>Hello</p>");
    assert_eq!(doc.last_rendered_at, Some(start()));
    assert_eq!(fx.wiki.render_state(&doc), RenderState::Rendered);
}

#[test]
fn test_schedule_twice_queues_one_job() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "<p>Hello</p>");
    defer(&fx, doc.id);
    fx.clock.advance(TimeDelta::seconds(1));

    fx.wiki.schedule_rendering(doc.id, None, None).unwrap();
    fx.wiki.schedule_rendering(doc.id, None, None).unwrap();

    assert_eq!(fx.drain_jobs(), 1);
    assert_eq!(fx.wiki.render_state(&fx.get(doc.id)), RenderState::Scheduled);
}

#[test]
fn test_schedule_while_in_progress_is_noop() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "<p>Hello</p>");
    fx.clock.advance(TimeDelta::seconds(1));
    fx.store
        .update_fields(doc.id, &[FieldUpdate::RenderStartedAt(Some(fx.clock_now()))])
        .unwrap();

    fx.wiki.schedule_rendering(doc.id, None, None).unwrap();

    assert_eq!(fx.renderer.calls(), 1);
    assert!(matches!(
        fx.wiki.render(doc.id, None, None, None),
        Err(WikiError::RenderingInProgress)
    ));
}

#[test]
fn test_stale_render_is_reclaimed() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "<p>Hello</p>");
    fx.clock.advance(TimeDelta::seconds(1));
    fx.store
        .update_fields(doc.id, &[FieldUpdate::RenderStartedAt(Some(fx.clock_now()))])
        .unwrap();

    fx.clock.advance(TimeDelta::seconds(181));
    assert_eq!(fx.wiki.render_state(&fx.get(doc.id)), RenderState::Stale);

    fx.wiki.render(doc.id, None, None, None).unwrap();
    assert_eq!(fx.renderer.calls(), 2);
    assert_eq!(fx.wiki.render_state(&fx.get(doc.id)), RenderState::Rendered);
}

#[test]
fn test_worker_renders_deferred_document() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "<p>Hello</p>");
    defer(&fx, doc.id);
    fx.clock.advance(TimeDelta::seconds(1));
    fx.wiki.schedule_rendering(doc.id, Some("no-cache"), None).unwrap();

    let report = fx.worker().run_pending();

    assert_eq!(report.completed, 1);
    assert!(report.failed.is_empty());
    assert_eq!(fx.renderer.calls(), 2);
    assert_eq!(fx.renderer.last_cache_control().as_deref(), Some("no-cache"));
}

#[test]
fn test_dropped_jobs_are_recovered() {
    let fx = Fixture::with(|builder| builder.queue(std::sync::Arc::new(NullQueue)));
    let doc = fx.create("en-US", "Root", "<p>Hello</p>");
    defer(&fx, doc.id);
    fx.clock.advance(TimeDelta::seconds(1));
    fx.wiki.schedule_rendering(doc.id, None, None).unwrap();
    assert_eq!(fx.renderer.calls(), 1);

    assert_eq!(fx.wiki.render_pending_documents().unwrap(), 1);
    assert_eq!(fx.renderer.calls(), 2);
    assert_eq!(fx.wiki.render_pending_documents().unwrap(), 0);
}

// ========================================================================
// Rendering
// ========================================================================

#[test]
fn test_render_expires_follows_last_render() {
    let fx = Fixture::new();
    let new = NewDocument {
        render_max_age: Some(600),
        ..NewDocument::new("en-US", "Root", "Root", "<p>x</p>")
    };
    let doc = fx.wiki.create_document(new, EDITOR).unwrap();
    assert_eq!(doc.render_expires, Some(start() + TimeDelta::seconds(600)));

    fx.clock.advance(TimeDelta::seconds(50));
    let doc = fx.wiki.render(doc.id, None, None, None).unwrap();

    assert_eq!(doc.render_expires, Some(start() + TimeDelta::seconds(650)));
}

#[test]
fn test_render_without_max_age_clears_expiry() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "<p>x</p>");
    assert_eq!(doc.render_expires, None);
}

#[test]
fn test_slow_render_switches_to_deferred() {
    let fx = Fixture::new();
    fx.renderer.take(TimeDelta::seconds(10));

    let doc = fx.create("en-US", "Root", "<p>x</p>");

    assert!(doc.defer_rendering);
    fx.clock.advance(TimeDelta::seconds(1));
    fx.wiki.schedule_rendering(doc.id, None, None).unwrap();
    assert_eq!(fx.renderer.calls(), 1);
    assert!(matches!(fx.queue.try_next(), Some(Job::Render(_))));
}

#[test]
fn test_render_regenerates_derived_fields() {
    let fx = Fixture::new();
    let doc = fx.create(
        "en-US",
        "Root",
        r#"<p>Intro <b>text</b></p><h2 id="Usage">Usage</h2><p>u</p>"#,
    );

    assert!(doc.derived.all_fresh());
    assert_eq!(doc.derived.get(DerivedField::Excerpt).value(), "Intro text");
    assert_eq!(
        doc.derived.get(DerivedField::TocHtml).value(),
        r##"<ol><li class="toc-h2"><a href="#Usage">Usage</a></li></ol>"##
    );
}

#[test]
fn test_render_listener_fires_once_per_render() {
    let (sender, receiver) = render_events();
    let fx = Fixture::with(|builder| builder.listener(Box::new(sender)));

    let doc = fx.create("en-US", "Root", "<p>x</p>");

    let events = receiver.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, doc.id);
    assert_eq!(events[0].rendered_at, Some(start()));
}

#[test]
fn test_render_keeps_concurrent_edits() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "A", "<p>v1</p>");
    let store = std::sync::Arc::clone(&fx.store);
    let id = doc.id;
    fx.renderer.during(move || {
        let mut row = store.get(id).unwrap();
        row.title = "Edited concurrently".to_owned();
        store.save(&row).unwrap();
    });
    fx.clock.advance(TimeDelta::seconds(5));

    let rendered = fx.wiki.render(doc.id, None, None, None).unwrap();

    assert_eq!(rendered.title, "Edited concurrently");
    assert_eq!(fx.get(doc.id).title, "Edited concurrently");
    assert_eq!(rendered.rendered_html, "<p>v1</p>");
    assert_eq!(rendered.last_rendered_at, Some(fx.clock_now()));
}

#[test]
fn test_renderer_failure_keeps_raw_html() {
    let fx = Fixture::new();
    fx.renderer.fail(true);

    let doc = fx.create("en-US", "Root", "<p>raw</p>");

    assert_eq!(doc.rendered_html, "<p>raw</p>");
    assert_eq!(doc.rendered_errors.len(), 1);
    assert!(doc.rendered_errors[0].is_error());
    assert_eq!(doc.rendered_errors[0].args, vec!["HttpError".to_owned()]);
}

#[test]
fn test_zero_renderer_timeout_bypasses_renderer() {
    let fx = Fixture::with(|builder| {
        builder.settings(scribe_wiki::WikiSettings {
            renderer_timeout: std::time::Duration::ZERO,
            ..scribe_wiki::WikiSettings::default()
        })
    });

    let doc = fx.create("en-US", "Root", "<p>raw</p>");

    assert_eq!(fx.renderer.calls(), 0);
    assert_eq!(doc.rendered_html, "<p>raw</p>");
}

// ========================================================================
// get_rendered
// ========================================================================

#[test]
fn test_get_rendered_returns_macro_messages() {
    let fx = Fixture::new();
    fx.renderer
        .report(vec![RenderMessage::error("unknown macro").with_arg("Foo")]);
    let doc = fx.create("en-US", "Root", "<p>x</p>");

    let (html, errors) = fx.wiki.get_rendered(doc.id, None, None).unwrap();

    assert_eq!(html, "<p>x</p>");
    assert_eq!(errors.len(), 1);
}

#[test]
fn test_get_rendered_empty_with_errors() {
    let fx = Fixture::new();
    fx.renderer.fail(true);
    let doc = fx.create("en-US", "Empty", "");

    let (html, errors) = fx.wiki.get_rendered(doc.id, None, None).unwrap();

    assert_eq!(html, "");
    assert_eq!(errors.len(), 1);
}

#[test]
fn test_get_rendered_not_yet_available_while_deferred() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "<p>x</p>");
    let mut stored = fx.get(doc.id);
    stored.rendered_html.clear();
    stored.defer_rendering = true;
    fx.store.save(&stored).unwrap();
    fx.clock.advance(TimeDelta::seconds(1));

    let err = fx.wiki.get_rendered(doc.id, None, None).unwrap_err();

    assert!(matches!(err, WikiError::ContentNotYetAvailable));
    assert_eq!(fx.drain_jobs(), 1);
}

#[test]
fn test_get_rendered_with_cache_control_rerenders() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "<p>x</p>");
    fx.clock.advance(TimeDelta::seconds(1));

    fx.wiki.get_rendered(doc.id, Some("max-age=0"), None).unwrap();

    assert_eq!(fx.renderer.calls(), 2);
}

// ========================================================================
// Sweeps
// ========================================================================

#[test]
fn test_render_stale_documents_schedules_expired() {
    let fx = Fixture::new();
    let new = NewDocument {
        render_max_age: Some(600),
        ..NewDocument::new("en-US", "Expiring", "Expiring", "<p>x</p>")
    };
    fx.wiki.create_document(new, EDITOR).unwrap();
    fx.create("en-US", "Forever", "<p>y</p>");

    fx.clock.advance(TimeDelta::seconds(599));
    assert_eq!(fx.wiki.render_stale_documents().unwrap(), 0);

    fx.clock.advance(TimeDelta::seconds(2));
    assert_eq!(fx.wiki.render_stale_documents().unwrap(), 1);
    assert_eq!(fx.renderer.calls(), 3);
}
