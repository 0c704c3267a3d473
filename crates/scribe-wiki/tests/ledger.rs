mod common;

use chrono::TimeDelta;
use pretty_assertions::assert_eq;
use scribe_store::DocumentStore;
use scribe_wiki::{FORCE_FRESH, RevisionChanges, WikiError};

use common::{EDITOR, Fixture};

// ========================================================================
// Promotion
// ========================================================================

#[test]
fn test_revise_unapproved_then_promote_then_revert() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "v1");
    let r1 = doc.current_revision.unwrap();

    let r2 = fx
        .wiki
        .revise(doc.id, "bob", RevisionChanges::content("v2").unapproved(), None)
        .unwrap();
    assert_eq!(r2.content, "v2");
    assert_eq!(fx.get(doc.id).current_revision, Some(r1));

    let promoted = fx.wiki.promote(r2.id).unwrap();
    assert_eq!(promoted.html, "v2");
    assert_eq!(promoted.current_revision, Some(r2.id));

    let before = fx.wiki.revision(r1).unwrap();
    let r3 = fx.wiki.revert(r1, "carol", None).unwrap();

    assert_eq!(r3.content, "v1");
    assert_ne!(r3.id, r1);
    assert_eq!(fx.wiki.revision(r1).unwrap(), before);
    let doc = fx.get(doc.id);
    assert_eq!(doc.current_revision, Some(r3.id));
    assert_eq!(doc.html, "v1");
}

#[test]
fn test_promote_current_revision_is_noop() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "v1");
    fx.clock.advance(TimeDelta::seconds(5));

    let again = fx.wiki.promote(doc.current_revision.unwrap()).unwrap();

    assert_eq!(again, fx.get(doc.id));
    assert_eq!(again.modified, doc.modified);
    assert_eq!(again.html, "v1");
}

#[test]
fn test_promote_sets_redirect_flag_from_content() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Old", "<p>x</p>");

    let redirect = scribe_store::redirect_html("en-US", "New", "New");
    fx.wiki
        .revise(doc.id, EDITOR, RevisionChanges::content(redirect), None)
        .unwrap();

    let doc = fx.get(doc.id);
    assert!(doc.is_redirect);
    assert_eq!(doc.redirect_url(), Some("/en-US/docs/New"));
}

// ========================================================================
// Reverts
// ========================================================================

#[test]
fn test_revert_comment_and_based_on() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "v1");
    let r1 = fx.wiki.revision(doc.current_revision.unwrap()).unwrap();
    fx.wiki
        .revise(doc.id, EDITOR, RevisionChanges::content("v2"), None)
        .unwrap();

    let r3 = fx.wiki.revert(r1.id, "carol", Some("vandalism")).unwrap();

    assert_eq!(
        r3.comment,
        "Revert to revision of 2023-11-14 22:13:20 by editor: \"vandalism\""
    );
    assert_eq!(r3.based_on, Some(r1.id));
    assert_eq!(r3.creator, "carol");
    assert_eq!(fx.renderer.last_cache_control().as_deref(), Some(FORCE_FRESH));
}

#[test]
fn test_revert_translation_keeps_source_based_on() {
    let fx = Fixture::new();
    let en = fx.create("en-US", "Root", "v1");
    let en_rev = en.current_revision.unwrap();
    let fr = fx.translate(&en, "fr", "Racine", "fr v1");
    let fr_r1 = fr.current_revision.unwrap();

    fx.wiki
        .revise(en.id, EDITOR, RevisionChanges::content("v2"), None)
        .unwrap();
    fx.wiki
        .revise(fr.id, EDITOR, RevisionChanges::content("fr v2"), None)
        .unwrap();

    let reverted = fx.wiki.revert(fr_r1, EDITOR, None).unwrap();

    assert_eq!(reverted.content, "fr v1");
    assert_eq!(reverted.based_on, Some(en_rev));
}

// ========================================================================
// Edits
// ========================================================================

#[test]
fn test_revise_defaults_based_on_to_prior_current() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "v1");

    let r2 = fx
        .wiki
        .revise(doc.id, EDITOR, RevisionChanges::content("v2"), None)
        .unwrap();

    assert_eq!(r2.based_on, doc.current_revision);
}

#[test]
fn test_revise_translation_based_on_source_current() {
    let fx = Fixture::new();
    let en = fx.create("en-US", "Root", "v1");
    let fr = fx.translate(&en, "fr", "Racine", "fr v1");
    let en_r2 = fx
        .wiki
        .revise(en.id, EDITOR, RevisionChanges::content("v2"), None)
        .unwrap();
    assert!(fx.wiki.is_outdated(fr.id).unwrap());

    let fr_r2 = fx
        .wiki
        .revise(fr.id, EDITOR, RevisionChanges::content("fr v2"), None)
        .unwrap();

    assert_eq!(fr_r2.based_on, Some(en_r2.id));
    assert!(!fx.wiki.is_outdated(fr.id).unwrap());
}

#[test]
fn test_revise_with_foreign_based_on_is_fatal() {
    let fx = Fixture::new();
    let en = fx.create("en-US", "Root", "v1");
    let other = fx.create("en-US", "Other", "o1");
    let fr = fx.translate(&en, "fr", "Racine", "fr v1");
    let history_before = fx.wiki.history(fr.id).unwrap().len();

    let changes = RevisionChanges {
        based_on: other.current_revision,
        ..RevisionChanges::content("fr v2")
    };
    let err = fx.wiki.revise(fr.id, EDITOR, changes, None).unwrap_err();

    assert!(matches!(err, WikiError::InvalidBasedOn { .. }));
    assert!(err.is_fatal());
    assert_eq!(fx.wiki.history(fr.id).unwrap().len(), history_before);
    assert_eq!(fx.get(fr.id).html, "fr v1");
}

#[test]
fn test_revise_detects_mid_air_collision() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "v1");
    let loaded = doc.current_revision.unwrap();
    let r2 = fx
        .wiki
        .revise(doc.id, "alice", RevisionChanges::content("v2"), None)
        .unwrap();

    let changes = RevisionChanges {
        expected_current: Some(loaded),
        ..RevisionChanges::content("v3")
    };
    let err = fx.wiki.revise(doc.id, "bob", changes, None).unwrap_err();

    match err {
        WikiError::MidAirCollision { expected, actual } => {
            assert_eq!(expected, loaded);
            assert_eq!(actual, Some(r2.id));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fx.get(doc.id).html, "v2");
}

#[test]
fn test_revise_section_replaces_only_that_section() {
    let fx = Fixture::new();
    let doc = fx.create(
        "en-US",
        "Root",
        r#"<p>Intro</p><h2 id="Usage">Usage</h2><p>old</p><h2 id="Notes">Notes</h2><p>n</p>"#,
    );

    fx.wiki
        .revise(
            doc.id,
            EDITOR,
            RevisionChanges::content(r#"<h2 id="Usage">Usage</h2><p>new</p>"#),
            Some("Usage"),
        )
        .unwrap();

    assert_eq!(
        fx.get(doc.id).html,
        r#"<p>Intro</p><h2 id="Usage">Usage</h2><p>new</p><h2 id="Notes">Notes</h2><p>n</p>"#
    );
}

#[test]
fn test_revise_missing_section_is_not_found() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "<p>Intro</p>");

    let err = fx
        .wiki
        .revise(doc.id, EDITOR, RevisionChanges::content("x"), Some("Nope"))
        .unwrap_err();

    assert!(matches!(err, WikiError::NotFound(_)));
}

#[test]
fn test_revise_rejects_invalid_slug() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "v1");

    let changes = RevisionChanges {
        slug: Some("bad slug".to_owned()),
        ..RevisionChanges::default()
    };
    let err = fx.wiki.revise(doc.id, EDITOR, changes, None).unwrap_err();

    assert!(matches!(err, WikiError::Validation(_)));
}

// ========================================================================
// Cleaning and history
// ========================================================================

#[test]
fn test_clean_content_is_idempotent() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", r#"<p>ok</p><script>alert(1)</script>"#);

    let cleaned = fx.wiki.clean_content(doc.id, "janitor").unwrap().unwrap();
    assert_eq!(cleaned.content, "<p>ok</p>");
    assert!(cleaned.comment.starts_with("Clean prior revision of "));
    assert_eq!(fx.get(doc.id).html, "<p>ok</p>");

    assert!(fx.wiki.clean_content(doc.id, "janitor").unwrap().is_none());
}

#[test]
fn test_history_is_newest_first() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "v1");
    for content in ["v2", "v3"] {
        fx.clock.advance(TimeDelta::seconds(1));
        fx.wiki
            .revise(doc.id, EDITOR, RevisionChanges::content(content), None)
            .unwrap();
    }

    let contents: Vec<_> = fx
        .wiki
        .history(doc.id)
        .unwrap()
        .into_iter()
        .map(|r| r.content)
        .collect();

    assert_eq!(contents, vec!["v3", "v2", "v1"]);
}

#[test]
fn test_prune_history_keeps_current_and_newest() {
    let fx = Fixture::new();
    let doc = fx.create("en-US", "Root", "v1");
    let r1 = doc.current_revision.unwrap();
    for content in ["v2", "v3", "v4"] {
        fx.wiki
            .revise(doc.id, EDITOR, RevisionChanges::content(content), None)
            .unwrap();
    }
    fx.wiki.promote(r1).unwrap();

    let pruned = fx.wiki.prune_history(doc.id, 2).unwrap();

    assert_eq!(pruned, 1);
    let ids: Vec<_> = fx.store.revisions(doc.id).unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.contains(&r1));
    for revision in fx.store.revisions(doc.id).unwrap() {
        assert!(revision.based_on.is_none_or(|b| ids.contains(&b)));
    }
}
