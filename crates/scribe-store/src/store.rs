//! Document store trait.

use chrono::{DateTime, Utc};

use scribe_render::RenderMessage;

use crate::derived::DerivedFields;
use crate::error::StoreError;
use crate::model::{DeletionLog, Document, DocumentId, Revision, RevisionId};

/// Columns owned by a finished render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderResult {
    pub rendered_html: String,
    pub rendered_errors: Vec<RenderMessage>,
    pub derived: DerivedFields,
    pub last_rendered_at: DateTime<Utc>,
    pub render_expires: Option<DateTime<Utc>>,
    pub defer_rendering: bool,
}

impl RenderResult {
    /// Copy the render-owned columns onto `document`.
    pub fn apply(&self, document: &mut Document) {
        document.rendered_html.clone_from(&self.rendered_html);
        document.rendered_errors.clone_from(&self.rendered_errors);
        document.derived.clone_from(&self.derived);
        document.last_rendered_at = Some(self.last_rendered_at);
        document.render_expires = self.render_expires;
        document.defer_rendering = self.defer_rendering;
    }
}

/// A single-column write that bypasses a full-row save.
///
/// Only the named column is written; the rest of the row is left as stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldUpdate {
    /// Set or clear `render_scheduled_at`.
    RenderScheduledAt(Option<DateTime<Utc>>),
    /// Set or clear `render_started_at`.
    RenderStartedAt(Option<DateTime<Utc>>),
    /// Store the output of a render; other columns are untouched.
    Rendered(Box<RenderResult>),
}

/// Persistence for documents, revisions and deletion logs.
///
/// Implementations enforce the unique keys `(locale, slug)` over all rows
/// (soft-deleted included) and `(parent, locale)` over translations, and
/// maintain the breadcrumb and translation adjacency indices.
pub trait DocumentStore: Send + Sync {
    /// Fetch a row by id, deleted or not.
    fn get(&self, id: DocumentId) -> Result<Document, StoreError>;

    /// Fetch the live document at a natural key.
    fn find(&self, locale: &str, slug: &str) -> Result<Option<Document>, StoreError>;

    /// Fetch the soft-deleted document at a natural key.
    fn find_deleted(&self, locale: &str, slug: &str) -> Result<Option<Document>, StoreError>;

    /// Insert a new document and assign its id.
    ///
    /// Fails with `AlreadyExists` on a unique-key clash.
    fn insert(&self, document: Document) -> Result<Document, StoreError>;

    /// Replace an existing row.
    ///
    /// Key changes are checked for uniqueness like an insert.
    fn save(&self, document: &Document) -> Result<(), StoreError>;

    /// Apply targeted column writes to one row.
    fn update_fields(&self, id: DocumentId, updates: &[FieldUpdate]) -> Result<(), StoreError>;

    /// Delete a row.
    ///
    /// Fails with `StillReferenced` while revisions, translations or
    /// breadcrumb children still point at it.
    fn remove(&self, id: DocumentId) -> Result<(), StoreError>;

    /// All live documents, ordered by id.
    fn scan(&self) -> Result<Vec<Document>, StoreError>;

    /// Rows whose breadcrumb parent is `id`, soft-deleted included.
    fn topic_children(&self, id: DocumentId) -> Result<Vec<Document>, StoreError>;

    /// Rows whose translation parent is `id`, soft-deleted included.
    fn translations(&self, id: DocumentId) -> Result<Vec<Document>, StoreError>;

    /// Insert a new revision and assign its id.
    fn insert_revision(&self, revision: Revision) -> Result<Revision, StoreError>;

    /// Fetch a revision by id.
    fn get_revision(&self, id: RevisionId) -> Result<Revision, StoreError>;

    /// Revisions of a document, oldest first.
    fn revisions(&self, document: DocumentId) -> Result<Vec<Revision>, StoreError>;

    /// Null every `based_on` pointing at `id`; returns how many were cleared.
    fn clear_based_on(&self, id: RevisionId) -> Result<usize, StoreError>;

    /// Delete a revision.
    ///
    /// Fails with `StillReferenced` while it is current or another revision is based on it.
    fn remove_revision(&self, id: RevisionId) -> Result<(), StoreError>;

    /// Append a deletion log entry.
    fn append_deletion_log(&self, entry: DeletionLog) -> Result<(), StoreError>;

    /// Deletion log entries for a natural key, oldest first.
    fn deletion_logs(&self, locale: &str, slug: &str) -> Result<Vec<DeletionLog>, StoreError>;
}
