//! Shared-document records and the store that indexes them.

use padsync_proto::DocumentId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One document shared in the session.
///
/// `content` tracks the text last agreed with the remote model: it advances
/// when an authoritative update arrives and when a local patch is emitted,
/// and serves as the diff baseline for the next outbound patch.
#[derive(Debug, Clone)]
pub struct SharedDocument {
    id: DocumentId,
    /// Session-relative path, `/`-separated.
    path: String,
    content: String,
    /// True once the initial full sync has been received. No outbound
    /// patches are produced before this.
    populated: bool,
    /// Save locally when the next authoritative content lands (set when a
    /// remote save finds no live buffer, consumed by remote apply).
    should_save: bool,
}

impl SharedDocument {
    /// A freshly announced document: no content yet, not populated.
    pub fn new(id: DocumentId, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            content: String::new(),
            populated: false,
            should_save: false,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn populated(&self) -> bool {
        self.populated
    }

    pub fn should_save(&self) -> bool {
        self.should_save
    }

    pub fn set_should_save(&mut self, should_save: bool) {
        self.should_save = should_save;
    }

    /// Record synchronized text. The first call marks the document populated.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.populated = true;
    }

    /// Where the document's backing file lives under the session root.
    pub fn storage_path(&self, root: &Path) -> PathBuf {
        root.join(&self.path)
    }
}

/// All documents shared in the session, keyed by id with a path index.
#[derive(Debug, Default)]
pub struct Documents {
    by_id: HashMap<DocumentId, SharedDocument>,
    /// Session-relative path -> id (documents never change path).
    by_path: HashMap<String, DocumentId>,
}

impl Documents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document, replacing any prior record with the same id.
    pub fn insert(&mut self, doc: SharedDocument) {
        if let Some(old) = self.by_id.get(&doc.id) {
            debug!("Replacing document record {}: {}", doc.id, old.path);
            self.by_path.remove(&old.path);
        }
        self.by_path.insert(doc.path.clone(), doc.id);
        self.by_id.insert(doc.id, doc);
    }

    pub fn remove(&mut self, id: DocumentId) -> Option<SharedDocument> {
        let doc = self.by_id.remove(&id)?;
        self.by_path.remove(&doc.path);
        Some(doc)
    }

    pub fn get(&self, id: DocumentId) -> Option<&SharedDocument> {
        self.by_id.get(&id)
    }

    pub fn get_mut(&mut self, id: DocumentId) -> Option<&mut SharedDocument> {
        self.by_id.get_mut(&id)
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Find the document whose session path matches `abs_path` under `root`.
    ///
    /// This is the lookup-by-identity search used to bind editors: an editor
    /// corresponds to a document iff its file path, made session-relative,
    /// equals the document's path.
    pub fn find_by_path(&self, root: &Path, abs_path: &Path) -> Option<DocumentId> {
        let rel = abs_path.strip_prefix(root).ok()?;
        self.by_path.get(rel.to_str()?).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedDocument> {
        self.by_id.values()
    }
}
