mod common;

use pretty_assertions::assert_eq;
use scribe_store::DocumentStore;
use scribe_wiki::{IN_PROGRESS, NewDocument, STUB_TAGS};

use common::{EDITOR, Fixture};

/// `en-US/Web > Web/HTML` and an `fr` translation of the child.
fn translated_child() -> (Fixture, scribe_store::Document) {
    let fx = Fixture::new();
    let web = fx.create("en-US", "Web", "<p>web</p>");
    let html = fx.create_child(&web, "Web/HTML", "<p>html</p>");
    let fr = fx.translate(&html, "fr", "Web/HTML", "<p>fr html</p>");
    (fx, fr)
}

// ========================================================================
// Breadcrumb parents
// ========================================================================

#[test]
fn test_translation_gets_stub_parent() {
    let (fx, fr) = translated_child();

    let stub = fx.find("fr", "Web").expect("stub created");
    let en_web = fx.find("en-US", "Web").unwrap();

    assert_eq!(fr.parent_topic, Some(stub.id));
    assert_eq!(stub.parent, Some(en_web.id));
    assert_eq!(stub.parent_topic, None);
    assert_eq!(stub.html, "<p>web</p>");

    let rev = fx.wiki.revision(stub.current_revision.unwrap()).unwrap();
    assert_eq!(rev.based_on, en_web.current_revision);
    for tag in STUB_TAGS {
        assert!(rev.tags.iter().any(|t| t == tag), "missing {tag}");
    }
    assert!(rev.localization_tags.contains(IN_PROGRESS));
}

#[test]
fn test_acquire_is_idempotent() {
    let (fx, fr) = translated_child();
    let documents = fx.store.scan().unwrap().len();
    let before = fx.get(fr.id);

    let first = fx.wiki.acquire_translated_topic_parent(fr.id).unwrap();
    let second = fx.wiki.acquire_translated_topic_parent(fr.id).unwrap();

    assert_eq!(first.parent_topic, before.parent_topic);
    assert_eq!(second.parent_topic, before.parent_topic);
    assert_eq!(fx.get(fr.id), before);
    assert_eq!(fx.store.scan().unwrap().len(), documents);
}

#[test]
fn test_acquire_links_unlinked_document_at_same_slug() {
    let fx = Fixture::new();
    let web = fx.create("en-US", "Web", "<p>web</p>");
    let html = fx.create_child(&web, "Web/HTML", "<p>html</p>");
    let orphan = fx.create("fr", "Web", "<p>fr web</p>");

    let fr = fx.translate(&html, "fr", "Web/HTML", "<p>fr html</p>");

    assert_eq!(fr.parent_topic, Some(orphan.id));
    assert_eq!(fx.get(orphan.id).parent, Some(web.id));
    assert_eq!(fx.get(orphan.id).html, "<p>fr web</p>");
}

#[test]
fn test_acquire_uses_existing_translation() {
    let fx = Fixture::new();
    let web = fx.create("en-US", "Web", "<p>web</p>");
    let html = fx.create_child(&web, "Web/HTML", "<p>html</p>");
    let fr_web = fx.translate(&web, "fr", "Toile", "<p>toile</p>");

    let fr = fx.translate(&html, "fr", "Toile/HTML", "<p>fr html</p>");

    assert_eq!(fr.parent_topic, Some(fr_web.id));
    assert!(fx.find("fr", "Web").is_none());
}

#[test]
fn test_acquire_clears_parent_when_source_is_top_level() {
    let fx = Fixture::new();
    let web = fx.create("en-US", "Web", "<p>web</p>");
    let other = fx.create("fr", "Autre", "<p>autre</p>");
    let new = NewDocument {
        parent: Some(web.id),
        parent_topic: Some(other.id),
        ..NewDocument::new("fr", "Toile", "Toile", "<p>toile</p>")
    };
    let fr = fx.wiki.create_document(new, EDITOR).unwrap();
    assert_eq!(fr.parent_topic, Some(other.id));

    let fr = fx.wiki.acquire_translated_topic_parent(fr.id).unwrap();

    assert_eq!(fr.parent_topic, None);
}

#[test]
fn test_canonical_documents_are_untouched() {
    let fx = Fixture::new();
    let web = fx.create("en-US", "Web", "<p>web</p>");
    let html = fx.create_child(&web, "Web/HTML", "<p>html</p>");

    let after = fx.wiki.acquire_translated_topic_parent(html.id).unwrap();

    assert_eq!(after, fx.get(html.id));
    assert_eq!(after.parent_topic, Some(web.id));
}

// ========================================================================
// Repair
// ========================================================================

#[test]
fn test_repair_breadcrumbs_builds_stub_chain() {
    let fx = Fixture::new();
    let web = fx.create("en-US", "Web", "<p>web</p>");
    let html = fx.create_child(&web, "Web/HTML", "<p>html</p>");
    let element = fx.create_child(&html, "Web/HTML/Element", "<p>el</p>");
    let fr = fx.translate(&element, "fr", "Web/HTML/Element", "<p>fr el</p>");

    fx.wiki.repair_breadcrumbs(fr.id).unwrap();

    let fr_html = fx.find("fr", "Web/HTML").unwrap();
    let fr_web = fx.find("fr", "Web").unwrap();
    assert_eq!(fx.get(fr.id).parent_topic, Some(fr_html.id));
    assert_eq!(fr_html.parent_topic, Some(fr_web.id));
    assert_eq!(fr_web.parent_topic, None);
}

#[test]
fn test_repair_breadcrumbs_stops_on_cycle() {
    let fx = Fixture::new();
    let a = fx.create("en-US", "A", "<p>a</p>");
    let b = fx.create("en-US", "B", "<p>b</p>");
    let fr_a = fx.translate(&a, "fr", "A", "<p>fr a</p>");
    let fr_b = fx.translate(&b, "fr", "B", "<p>fr b</p>");

    let mut looped = fx.get(fr_a.id);
    looped.parent_topic = Some(fr_b.id);
    fx.store.save(&looped).unwrap();
    let mut looped = fx.get(fr_b.id);
    looped.parent_topic = Some(fr_a.id);
    fx.store.save(&looped).unwrap();

    let repaired = fx.wiki.repair_breadcrumbs(fr_a.id).unwrap();

    assert_eq!(repaired.id, fr_a.id);
    assert_eq!(repaired.parent_topic, Some(fr_b.id));
}

// ========================================================================
// Translation family
// ========================================================================

#[test]
fn test_translated_to_and_other_translations() {
    let fx = Fixture::new();
    let web = fx.create("en-US", "Web", "<p>web</p>");
    let fr = fx.translate(&web, "fr", "Toile", "<p>toile</p>");
    let de = fx.translate(&web, "de", "Netz", "<p>netz</p>");

    assert_eq!(fx.wiki.translated_to(fr.id, "de").unwrap().unwrap().id, de.id);
    assert_eq!(fx.wiki.translated_to(fr.id, "en-US").unwrap().unwrap().id, web.id);
    assert!(fx.wiki.translated_to(fr.id, "ja").unwrap().is_none());

    let locales: Vec<_> = fx
        .wiki
        .other_translations(fr.id)
        .unwrap()
        .into_iter()
        .map(|d| d.locale)
        .collect();
    assert_eq!(locales, vec!["de", "en-US"]);
}

#[test]
fn test_second_translation_in_locale_is_rejected() {
    let fx = Fixture::new();
    let web = fx.create("en-US", "Web", "<p>web</p>");
    fx.translate(&web, "fr", "Toile", "<p>toile</p>");

    let new = NewDocument {
        parent: Some(web.id),
        ..NewDocument::new("fr", "Toile2", "Toile", "<p>x</p>")
    };
    assert!(fx.wiki.create_document(new, EDITOR).is_err());
}
