//! Editor/buffer lifecycle: binding host objects to document identities.
//!
//! Many editors may present one buffer, and one buffer backs at most one
//! document. Both directions live in the session's side tables and are kept
//! consistent on every bind and unbind; host objects never carry identity.

use crate::buffer::LocalBuffer;
use crate::detector::BufferActivity;
use crate::host::{BufferId, EditorId, HostEditor};
use crate::session::Session;
use crate::storage::Storage;
use padsync_proto::DocumentId;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything tracked for one observed editor.
#[derive(Debug, Clone)]
pub(crate) struct EditorRecord {
    /// The buffer this editor presents.
    pub(crate) buffer: BufferId,
    /// The host's file path for that buffer, if it has one.
    pub(crate) path: Option<PathBuf>,
    /// Bound document; `None` is the observed-but-unbound sentinel.
    pub(crate) doc: Option<DocumentId>,
}

impl<H: HostEditor, S: Storage> Session<H, S> {
    /// Start tracking a newly opened editor and the buffer it presents.
    ///
    /// The editor's path is resolved against the shared documents ("find
    /// the document this editor corresponds to"); editors on paths not
    /// shared in this session are tracked unbound and bind later if the
    /// document is announced. When this is the first editor on the buffer,
    /// `initial_text` seeds the mirror and the buffer is registered for
    /// change detection; a second editor on the same buffer does not
    /// re-register it.
    pub fn open_editor(
        &mut self,
        editor: EditorId,
        buffer: BufferId,
        path: Option<&Path>,
        initial_text: &str,
    ) {
        if self.editors.contains_key(&editor) {
            warn!("Editor {} already tracked, ignoring re-open", editor);
            return;
        }

        // The buffer's existing binding wins: one buffer, one document.
        let doc = match self.buffer_docs.get(&buffer).copied() {
            Some(id) => Some(id),
            None => path.and_then(|p| self.documents.find_by_path(&self.config.root, p)),
        };

        if !self.buffers.contains_key(&buffer) {
            self.buffers.insert(buffer, LocalBuffer::new(initial_text));
            self.activity.insert(buffer, BufferActivity::default());
        }
        if let Some(id) = doc {
            self.bind_buffer(buffer, id);
        }

        self.editors.insert(
            editor,
            EditorRecord {
                buffer,
                path: path.map(Path::to_path_buf),
                doc,
            },
        );

        match doc {
            Some(id) => {
                self.doc_editors.entry(id).or_default().push(editor);
                debug!("Editor {} bound to document {}", editor, id);
                self.rerender_highlights_for(id);
            }
            None => debug!(
                "Editor {} opened on a path not shared in this session",
                editor
            ),
        }
    }

    /// The host destroyed an editor. Its bindings and marker bookkeeping
    /// are dropped (host markers die with the editor, so no destroy
    /// commands are issued); the document and other editors' markers stay.
    pub fn close_editor(&mut self, editor: EditorId) {
        let Some(record) = self.editors.remove(&editor) else {
            return;
        };
        if let Some(id) = record.doc {
            self.remove_editor_binding(id, editor);
        }
        debug!("Editor {} closed", editor);
    }

    /// The host destroyed a buffer. Its mirror and change-detector entry
    /// are disposed; editors on it get their own close notifications.
    pub fn close_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
        self.activity.remove(&buffer);
        if let Some(id) = self.buffer_docs.get(&buffer).copied() {
            self.unbind_buffer_from(id, buffer);
        }
        debug!("Buffer {} closed", buffer);
    }

    /// The host reports a new path for an editor: re-resolve its document
    /// from scratch (never carried over) and rebind.
    pub fn path_changed(&mut self, editor: EditorId, path: Option<&Path>) {
        if self.guard.is_held() {
            return;
        }
        let Some(record) = self.editors.get(&editor) else {
            return;
        };
        let buffer = record.buffer;
        let old_doc = record.doc;
        let new_doc = path.and_then(|p| self.documents.find_by_path(&self.config.root, p));

        if let Some(record) = self.editors.get_mut(&editor) {
            record.path = path.map(Path::to_path_buf);
        }
        if old_doc == new_doc {
            return;
        }
        info!(
            "Editor {} path changed, rebinding: {:?} -> {:?}",
            editor, old_doc, new_doc
        );

        if let Some(old) = old_doc {
            // The editor is still alive, so its stale markers must go.
            self.destroy_markers_for_editor(old, editor);
            self.remove_editor_binding(old, editor);
            self.unbind_buffer_from(old, buffer);
        }
        if let Some(record) = self.editors.get_mut(&editor) {
            record.doc = new_doc;
        }
        if let Some(new) = new_doc {
            self.doc_editors.entry(new).or_default().push(editor);
            self.bind_buffer(buffer, new);
            self.rerender_highlights_for(new);
        }
    }

    /// Bind any observed-but-unbound editors whose path matches `id`.
    ///
    /// Announce-after-open and open-after-announce converge to the same
    /// bindings.
    pub(crate) fn bind_waiting_editors(&mut self, id: DocumentId) {
        let Some(doc) = self.documents.get(id) else {
            return;
        };
        let doc_rel = PathBuf::from(doc.path());

        let waiting: Vec<(EditorId, BufferId)> = self
            .editors
            .iter()
            .filter(|(_, record)| record.doc.is_none())
            .filter(|(_, record)| {
                record
                    .path
                    .as_deref()
                    .and_then(|p| p.strip_prefix(&self.config.root).ok())
                    == Some(doc_rel.as_path())
            })
            .map(|(editor, record)| (*editor, record.buffer))
            .collect();

        for (editor, buffer) in waiting {
            if let Some(record) = self.editors.get_mut(&editor) {
                record.doc = Some(id);
            }
            self.doc_editors.entry(id).or_default().push(editor);
            self.bind_buffer(buffer, id);
            debug!("Editor {} bound to newly announced document {}", editor, id);
        }
    }

    /// Associate a buffer with a document, keeping the reverse index
    /// consistent. Rebinding to a different document clears the old
    /// association first.
    pub(crate) fn bind_buffer(&mut self, buffer: BufferId, id: DocumentId) {
        let current = self.buffer_docs.get(&buffer).copied();
        match current {
            Some(bound) if bound == id => return,
            Some(bound) => self.unbind_buffer_from(bound, buffer),
            None => {}
        }
        self.buffer_docs.insert(buffer, id);
        self.doc_buffers.entry(id).or_default().push(buffer);
    }

    pub(crate) fn unbind_buffer_from(&mut self, id: DocumentId, buffer: BufferId) {
        if self.buffer_docs.get(&buffer) == Some(&id) {
            self.buffer_docs.remove(&buffer);
        }
        if let Some(buffers) = self.doc_buffers.get_mut(&id) {
            buffers.retain(|b| *b != buffer);
            if buffers.is_empty() {
                self.doc_buffers.remove(&id);
            }
        }
    }

    /// Drop `editor` from `id`'s reverse set and marker bookkeeping. Does
    /// not issue host commands; callers that rebind a live editor destroy
    /// its markers first.
    pub(crate) fn remove_editor_binding(&mut self, id: DocumentId, editor: EditorId) {
        if let Some(editors) = self.doc_editors.get_mut(&id) {
            editors.retain(|e| *e != editor);
            if editors.is_empty() {
                self.doc_editors.remove(&id);
            }
        }
        if let Some(users) = self.highlights.get_mut(&id) {
            for markers in users.values_mut() {
                markers.retain(|(e, _)| *e != editor);
            }
            users.retain(|_, markers| !markers.is_empty());
        }
    }
}
