//! Persistence layer for the Scribe wiki engine.
//!
//! This crate provides the wiki entities and a [`DocumentStore`] trait that
//! abstracts how they are persisted. The lifecycle engine only talks to the
//! trait, which enables:
//!
//! - **Unit testing** against the in-memory store
//! - **Backend flexibility** (JSON snapshot today, a database later)
//! - **Clean separation** between lifecycle rules and storage mechanics
//!
//! # Architecture
//!
//! The crate provides:
//! - [`Document`], [`Revision`] and [`DeletionLog`] entities
//! - [`DerivedFields`], memoized values computed from document content
//! - [`DocumentStore`] trait with unique-key inserts, targeted field updates and
//!   two adjacency indices (breadcrumb tree and translation tree)
//! - [`MemoryStore`], an arena-backed implementation with JSON snapshots
//!
//! # Example
//!
//! ```
//! use scribe_store::{Document, DocumentStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let doc = store.insert(Document::new("en-US", "Web/HTML", "HTML")).unwrap();
//! assert_eq!(store.find("en-US", "Web/HTML").unwrap().unwrap().id, doc.id);
//! ```

mod derived;
mod error;
mod memory;
mod model;
mod store;

pub use derived::{DerivedField, DerivedFields, FieldExtractor, Memo};
pub use error::{StoreError, StoreErrorKind};
pub use memory::MemoryStore;
pub use model::{
    DEFAULT_TOC_DEPTH, DeletionLog, Document, DocumentId, Revision, RevisionId, parse_redirect,
    redirect_html,
};
pub use store::{DocumentStore, FieldUpdate, RenderResult};
