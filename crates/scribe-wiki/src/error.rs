//! Error types for lifecycle operations.

use scribe_store::{DocumentId, RevisionId, StoreError, StoreErrorKind};

/// Error returned by lifecycle operations.
///
/// Business conditions ([`is_expected`](Self::is_expected)) are meant for the
/// immediate caller to act on. [`InvalidBasedOn`](Self::InvalidBasedOn) is a
/// programming error and aborts the operation before anything is written.
#[derive(Debug, thiserror::Error)]
pub enum WikiError {
    /// Create or rename targets an occupied slug.
    #[error("a document already exists at {locale}/{slug}")]
    SlugCollision {
        /// Target locale.
        locale: String,
        /// Target slug.
        slug: String,
    },

    /// Another render is active and not yet stale.
    #[error("rendering is already in progress")]
    RenderingInProgress,

    /// No rendered content exists yet.
    #[error("rendered content is not yet available")]
    ContentNotYetAvailable,

    /// Move destination is occupied by non-redirect documents.
    #[error("move conflicts with existing documents: {}", .conflicts.join(", "))]
    MoveConflict {
        /// `{locale}/{slug}` of each blocking document.
        conflicts: Vec<String>,
    },

    /// A node of a subtree move failed.
    #[error(transparent)]
    PageMove(Box<PageMoveError>),

    /// A revision's `based_on` is outside the canonical original's history.
    #[error("revision for {document} cannot be based on revision {based_on}")]
    InvalidBasedOn {
        /// `{locale}/{slug}` of the document being revised.
        document: String,
        /// The offending `based_on`.
        based_on: RevisionId,
    },

    /// The document changed since the editor loaded it.
    #[error("mid-air collision: expected current revision {expected}, found {}", .actual.map_or_else(|| "none".to_owned(), |r| r.to_string()))]
    MidAirCollision {
        /// Revision the editor started from.
        expected: RevisionId,
        /// Revision that is current now.
        actual: Option<RevisionId>,
    },

    /// Document or revision does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request violates a lifecycle rule.
    #[error("{0}")]
    Validation(String),

    /// Persistence failure.
    #[error(transparent)]
    Store(StoreError),
}

impl WikiError {
    /// Whether this error is a programming-invariant violation.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::InvalidBasedOn { .. } => true,
            Self::PageMove(inner) => inner.source.is_fatal(),
            _ => false,
        }
    }

    /// Whether this error is an ordinary outcome the caller should handle.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::SlugCollision { .. }
                | Self::RenderingInProgress
                | Self::ContentNotYetAvailable
                | Self::MoveConflict { .. }
                | Self::PageMove(_)
                | Self::MidAirCollision { .. }
        )
    }

    pub(crate) fn collision(locale: &str, slug: &str) -> Self {
        Self::SlugCollision {
            locale: locale.to_owned(),
            slug: slug.to_owned(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<StoreError> for WikiError {
    fn from(err: StoreError) -> Self {
        match err.kind {
            StoreErrorKind::NotFound => Self::NotFound(err.key.unwrap_or_default()),
            _ => Self::Store(err),
        }
    }
}

/// Failure while moving one node of a subtree.
#[derive(Debug, thiserror::Error)]
#[error("failed to move {locale}/{slug} (document {id}): {source}")]
pub struct PageMoveError {
    /// Document that failed to move.
    pub id: DocumentId,
    /// Its locale.
    pub locale: String,
    /// Its slug before the move.
    pub slug: String,
    /// Underlying cause.
    pub source: WikiError,
}

impl PageMoveError {
    /// Innermost cause, skipping nested move errors.
    #[must_use]
    pub fn root_cause(&self) -> &WikiError {
        match &self.source {
            WikiError::PageMove(inner) => inner.root_cause(),
            other => other,
        }
    }
}
