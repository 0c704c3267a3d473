//! Document and revision lifecycle engine for Scribe.
//!
//! This crate provides:
//! - [`Wiki`]: the engine handle, built with [`Wiki::builder`]
//! - Revision ledger: [`Wiki::revise`], [`Wiki::promote`], [`Wiki::revert`]
//! - Render scheduler: [`RenderState`], [`Wiki::schedule_rendering`], [`Wiki::render`]
//! - Translation linker: [`Wiki::acquire_translated_topic_parent`], [`Wiki::repair_breadcrumbs`]
//! - Tree mutator: [`Wiki::move_tree`], [`Wiki::tree_conflicts`]
//! - Background jobs: [`TaskQueue`], [`ChannelQueue`], [`Worker`]
//!
//! # Quick Start
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use scribe_render::PassthroughRenderer;
//! use scribe_store::MemoryStore;
//! use scribe_wiki::{NewDocument, RevisionChanges, Wiki};
//!
//! let wiki = Wiki::builder(Arc::new(MemoryStore::new()), Arc::new(PassthroughRenderer)).build();
//!
//! let doc = wiki.create_document(NewDocument::new("en-US", "Web", "Web", "<p>v1</p>"), "alice")?;
//! wiki.revise(doc.id, "bob", RevisionChanges::content("<p>v2</p>"), None)?;
//!
//! let (html, errors) = wiki.get_rendered(doc.id, None, None)?;
//! assert_eq!(html, "<p>v2</p>");
//! assert!(errors.is_empty());
//! # Ok(())
//! # }
//! ```

mod clock;
mod collab;
pub mod content;
mod error;
mod events;
mod ledger;
mod lifecycle;
mod mover;
mod render;
mod tasks;
mod translation;
mod wiki;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collab::{AmmoniaSanitizer, AttachmentLinker, NoAttachments, Sanitizer};
pub use error::{PageMoveError, WikiError};
pub use events::{
    DocumentProjection, JsonProjection, PROJECTION_BUCKET, RenderEvent, RenderEventReceiver,
    RenderEventSender, RenderListener, render_events,
};
pub use ledger::{FORCE_FRESH, RevisionChanges};
pub use lifecycle::NewDocument;
pub use render::{RenderState, render_state};
pub use tasks::{ChannelQueue, Job, MoveJob, NullQueue, RenderJob, TaskQueue, Worker, WorkerReport};
pub use translation::{IN_PROGRESS, STUB_TAGS};
pub use wiki::{Wiki, WikiBuilder, WikiSettings};
