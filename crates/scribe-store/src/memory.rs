//! In-memory document store with JSON snapshots.
//!
//! Rows live in flat id-keyed tables. Natural keys and the two trees are kept
//! as secondary indices that are rebuilt whenever a snapshot is loaded.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreErrorKind};
use crate::model::{DeletionLog, Document, DocumentId, Revision, RevisionId};
use crate::store::{DocumentStore, FieldUpdate};

const BACKEND: &str = "Memory";

/// On-disk snapshot format.
#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    next_document_id: u64,
    next_revision_id: u64,
    documents: Vec<Document>,
    revisions: Vec<Revision>,
    deletion_logs: Vec<DeletionLog>,
}

#[derive(Debug, Default)]
struct Tables {
    next_document_id: u64,
    next_revision_id: u64,
    documents: BTreeMap<DocumentId, Document>,
    revisions: BTreeMap<RevisionId, Revision>,
    deletion_logs: Vec<DeletionLog>,
    keys: HashMap<(String, String), DocumentId>,
    translation_keys: HashMap<(DocumentId, String), DocumentId>,
    topic_children: HashMap<DocumentId, BTreeSet<DocumentId>>,
    translations: HashMap<DocumentId, BTreeSet<DocumentId>>,
    doc_revisions: HashMap<DocumentId, BTreeSet<RevisionId>>,
}

impl Tables {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut tables = Self {
            next_document_id: snapshot.next_document_id,
            next_revision_id: snapshot.next_revision_id,
            deletion_logs: snapshot.deletion_logs,
            ..Self::default()
        };
        for document in snapshot.documents {
            tables.next_document_id = tables.next_document_id.max(document.id.0);
            tables.index_document(&document);
            tables.documents.insert(document.id, document);
        }
        for revision in snapshot.revisions {
            tables.next_revision_id = tables.next_revision_id.max(revision.id.0);
            tables
                .doc_revisions
                .entry(revision.document)
                .or_default()
                .insert(revision.id);
            tables.revisions.insert(revision.id, revision);
        }
        tables
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            next_document_id: self.next_document_id,
            next_revision_id: self.next_revision_id,
            documents: self.documents.values().cloned().collect(),
            revisions: self.revisions.values().cloned().collect(),
            deletion_logs: self.deletion_logs.clone(),
        }
    }

    fn index_document(&mut self, document: &Document) {
        self.keys.insert(
            (document.locale.clone(), document.slug.clone()),
            document.id,
        );
        if let Some(parent) = document.parent {
            self.translation_keys
                .insert((parent, document.locale.clone()), document.id);
            self.translations.entry(parent).or_default().insert(document.id);
        }
        if let Some(topic) = document.parent_topic {
            self.topic_children
                .entry(topic)
                .or_default()
                .insert(document.id);
        }
    }

    fn unindex_document(&mut self, document: &Document) {
        self.keys
            .remove(&(document.locale.clone(), document.slug.clone()));
        if let Some(parent) = document.parent {
            self.translation_keys
                .remove(&(parent, document.locale.clone()));
            if let Some(set) = self.translations.get_mut(&parent) {
                set.remove(&document.id);
            }
        }
        if let Some(topic) = document.parent_topic {
            if let Some(set) = self.topic_children.get_mut(&topic) {
                set.remove(&document.id);
            }
        }
    }

    /// Check the unique keys of `document` against every other row.
    fn check_unique(&self, document: &Document) -> Result<(), StoreError> {
        let key = (document.locale.clone(), document.slug.clone());
        if let Some(owner) = self.keys.get(&key) {
            if *owner != document.id {
                return Err(StoreError::already_exists(document.key()).with_backend(BACKEND));
            }
        }
        if let Some(parent) = document.parent {
            if let Some(owner) = self.translation_keys.get(&(parent, document.locale.clone())) {
                if *owner != document.id {
                    return Err(StoreError::already_exists(format!(
                        "translation of {parent} in {}",
                        document.locale
                    ))
                    .with_backend(BACKEND));
                }
            }
        }
        Ok(())
    }

    fn check_references(&self, document: &Document) -> Result<(), StoreError> {
        for (label, reference) in [("parent", document.parent), ("parent_topic", document.parent_topic)] {
            if let Some(id) = reference {
                if id == document.id || !self.documents.contains_key(&id) {
                    return Err(StoreError::new(StoreErrorKind::InvalidKey)
                        .with_key(format!("{label} {id} of {}", document.key()))
                        .with_backend(BACKEND));
                }
            }
        }
        Ok(())
    }

    fn linked(
        &self,
        index: &HashMap<DocumentId, BTreeSet<DocumentId>>,
        id: DocumentId,
    ) -> Vec<Document> {
        index
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.documents.get(child))
            .cloned()
            .collect()
    }

    fn document_mut(&mut self, id: DocumentId) -> Result<&mut Document, StoreError> {
        self.documents
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("document {id}")).with_backend(BACKEND))
    }
}

/// Arena-backed [`DocumentStore`].
///
/// # Example
///
/// ```no_run
/// use scribe_store::MemoryStore;
///
/// let store = MemoryStore::open(".scribe/wiki.json")?;
/// // ... run lifecycle operations ...
/// store.persist(".scribe/wiki.json")?;
/// # Ok::<(), scribe_store::StoreError>(())
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a JSON snapshot, or start empty if the file is missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let key = path.display().to_string();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %key, "Snapshot not found, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(StoreError::io(e, key).with_backend(BACKEND)),
        };
        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::new(StoreErrorKind::Serialization)
                .with_source(e)
                .with_key(key.clone())
                .with_backend(BACKEND)
        })?;
        tracing::debug!(
            path = %key,
            documents = snapshot.documents.len(),
            revisions = snapshot.revisions.len(),
            "Loaded snapshot"
        );
        Ok(Self {
            tables: RwLock::new(Tables::from_snapshot(snapshot)),
        })
    }

    /// Write a JSON snapshot.
    ///
    /// The snapshot is written to a sibling temp file and renamed into place.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let key = path.display().to_string();
        let json = {
            let tables = self.tables.read().unwrap();
            serde_json::to_vec_pretty(&tables.to_snapshot()).map_err(|e| {
                StoreError::new(StoreErrorKind::Serialization)
                    .with_source(e)
                    .with_key(key.clone())
                    .with_backend(BACKEND)
            })?
        };
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .map_err(|e| StoreError::io(e, key.clone()).with_backend(BACKEND))?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| StoreError::io(e, key.clone()).with_backend(BACKEND))?;
        std::fs::rename(&tmp, path).map_err(|e| StoreError::io(e, key).with_backend(BACKEND))?;
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, id: DocumentId) -> Result<Document, StoreError> {
        self.tables
            .read()
            .unwrap()
            .documents
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("document {id}")).with_backend(BACKEND))
    }

    fn find(&self, locale: &str, slug: &str) -> Result<Option<Document>, StoreError> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .keys
            .get(&(locale.to_owned(), slug.to_owned()))
            .and_then(|id| tables.documents.get(id))
            .filter(|doc| doc.is_live())
            .cloned())
    }

    fn find_deleted(&self, locale: &str, slug: &str) -> Result<Option<Document>, StoreError> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .keys
            .get(&(locale.to_owned(), slug.to_owned()))
            .and_then(|id| tables.documents.get(id))
            .filter(|doc| doc.deleted)
            .cloned())
    }

    fn insert(&self, mut document: Document) -> Result<Document, StoreError> {
        let mut tables = self.tables.write().unwrap();
        document.id = DocumentId(tables.next_document_id + 1);
        tables.check_unique(&document)?;
        tables.check_references(&document)?;
        tables.next_document_id += 1;
        tables.index_document(&document);
        tables.documents.insert(document.id, document.clone());
        tracing::debug!(id = %document.id, key = %document.key(), "Inserted document");
        Ok(document)
    }

    fn save(&self, document: &Document) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        let previous = tables
            .documents
            .get(&document.id)
            .cloned()
            .ok_or_else(|| {
                StoreError::not_found(format!("document {}", document.id)).with_backend(BACKEND)
            })?;
        tables.check_unique(document)?;
        tables.check_references(document)?;
        tables.unindex_document(&previous);
        tables.index_document(document);
        tables.documents.insert(document.id, document.clone());
        Ok(())
    }

    fn update_fields(&self, id: DocumentId, updates: &[FieldUpdate]) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        let document = tables.document_mut(id)?;
        for update in updates {
            match update {
                FieldUpdate::RenderScheduledAt(at) => document.render_scheduled_at = *at,
                FieldUpdate::RenderStartedAt(at) => document.render_started_at = *at,
                FieldUpdate::Rendered(result) => result.apply(document),
            }
        }
        Ok(())
    }

    fn remove(&self, id: DocumentId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        let referenced = tables.doc_revisions.get(&id).is_some_and(|s| !s.is_empty())
            || tables.translations.get(&id).is_some_and(|s| !s.is_empty())
            || tables.topic_children.get(&id).is_some_and(|s| !s.is_empty());
        if referenced {
            return Err(StoreError::new(StoreErrorKind::StillReferenced)
                .with_key(format!("document {id}"))
                .with_backend(BACKEND));
        }
        let document = tables
            .documents
            .remove(&id)
            .ok_or_else(|| StoreError::not_found(format!("document {id}")).with_backend(BACKEND))?;
        tables.unindex_document(&document);
        tables.doc_revisions.remove(&id);
        tables.translations.remove(&id);
        tables.topic_children.remove(&id);
        Ok(())
    }

    fn scan(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .documents
            .values()
            .filter(|doc| doc.is_live())
            .cloned()
            .collect())
    }

    fn topic_children(&self, id: DocumentId) -> Result<Vec<Document>, StoreError> {
        let tables = self.tables.read().unwrap();
        Ok(tables.linked(&tables.topic_children, id))
    }

    fn translations(&self, id: DocumentId) -> Result<Vec<Document>, StoreError> {
        let tables = self.tables.read().unwrap();
        Ok(tables.linked(&tables.translations, id))
    }

    fn insert_revision(&self, mut revision: Revision) -> Result<Revision, StoreError> {
        let mut tables = self.tables.write().unwrap();
        if !tables.documents.contains_key(&revision.document) {
            return Err(StoreError::new(StoreErrorKind::InvalidKey)
                .with_key(format!("document {} of new revision", revision.document))
                .with_backend(BACKEND));
        }
        if let Some(based_on) = revision.based_on {
            if !tables.revisions.contains_key(&based_on) {
                return Err(StoreError::new(StoreErrorKind::InvalidKey)
                    .with_key(format!("based_on revision {based_on}"))
                    .with_backend(BACKEND));
            }
        }
        tables.next_revision_id += 1;
        revision.id = RevisionId(tables.next_revision_id);
        tables
            .doc_revisions
            .entry(revision.document)
            .or_default()
            .insert(revision.id);
        tables.revisions.insert(revision.id, revision.clone());
        Ok(revision)
    }

    fn get_revision(&self, id: RevisionId) -> Result<Revision, StoreError> {
        self.tables
            .read()
            .unwrap()
            .revisions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("revision {id}")).with_backend(BACKEND))
    }

    fn revisions(&self, document: DocumentId) -> Result<Vec<Revision>, StoreError> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .doc_revisions
            .get(&document)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.revisions.get(id))
            .cloned()
            .collect())
    }

    fn clear_based_on(&self, id: RevisionId) -> Result<usize, StoreError> {
        let mut tables = self.tables.write().unwrap();
        let mut cleared = 0;
        for revision in tables.revisions.values_mut() {
            if revision.based_on == Some(id) {
                revision.based_on = None;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    fn remove_revision(&self, id: RevisionId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        let referenced = tables.revisions.values().any(|r| r.based_on == Some(id))
            || tables
                .documents
                .values()
                .any(|d| d.current_revision == Some(id));
        if referenced {
            return Err(StoreError::new(StoreErrorKind::StillReferenced)
                .with_key(format!("revision {id}"))
                .with_backend(BACKEND));
        }
        let revision = tables
            .revisions
            .remove(&id)
            .ok_or_else(|| StoreError::not_found(format!("revision {id}")).with_backend(BACKEND))?;
        if let Some(set) = tables.doc_revisions.get_mut(&revision.document) {
            set.remove(&id);
        }
        Ok(())
    }

    fn append_deletion_log(&self, entry: DeletionLog) -> Result<(), StoreError> {
        self.tables.write().unwrap().deletion_logs.push(entry);
        Ok(())
    }

    fn deletion_logs(&self, locale: &str, slug: &str) -> Result<Vec<DeletionLog>, StoreError> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .deletion_logs
            .iter()
            .filter(|log| log.locale == locale && log.slug == slug)
            .cloned()
            .collect())
    }
}
