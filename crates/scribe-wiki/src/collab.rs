//! Pluggable collaborators: content sanitizer and attachment linker.

use scribe_store::Document;

/// Cleans untrusted html.
pub trait Sanitizer: Send + Sync {
    /// Return a sanitized copy of `html`.
    fn clean(&self, html: &str) -> String;
}

/// [`Sanitizer`] backed by `ammonia` with wiki-friendly attributes allowed.
///
/// Heading `id`s and element `class`es survive cleaning so sections and
/// macro hooks keep working.
#[derive(Debug, Default)]
pub struct AmmoniaSanitizer;

impl Sanitizer for AmmoniaSanitizer {
    fn clean(&self, html: &str) -> String {
        ammonia::Builder::default()
            .add_generic_attributes(["id", "class"])
            .clean(html)
            .to_string()
    }
}

/// Links attachments referenced by a document's content.
pub trait AttachmentLinker: Send + Sync {
    /// Called after a revision is promoted.
    fn populate(&self, document: &Document);
}

/// [`AttachmentLinker`] that does nothing.
#[derive(Debug, Default)]
pub struct NoAttachments;

impl AttachmentLinker for NoAttachments {
    fn populate(&self, _document: &Document) {}
}
