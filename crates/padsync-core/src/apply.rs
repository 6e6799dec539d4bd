//! Remote application: content, saves, and deletions arriving from the
//! shared session, applied to the host under the feedback guard.
//!
//! Failures here are caught and logged, never propagated; the worst case
//! is a temporarily stale view, corrected by the next authoritative update.

use crate::host::{BufferId, HostEditor};
use crate::session::Session;
use crate::storage::Storage;
use padsync_proto::DocumentId;
use tracing::{debug, error, info, warn};

impl<H: HostEditor, S: Storage> Session<H, S> {
    /// Authoritative content arrived for a document.
    ///
    /// The document record is updated first (content set, `populated`
    /// marked). Without a live bound buffer the text goes straight to
    /// backing storage; otherwise every bound mirror and host buffer is
    /// set under the feedback guard, and a deferred save is issued on the
    /// first buffer that accepts the write. The deferred-save flag is
    /// consumed in both branches, since a storage write is already a save.
    pub(crate) fn apply_content(&mut self, id: DocumentId, text: &str) {
        let bound: Vec<BufferId> = self.doc_buffers.get(&id).cloned().unwrap_or_default();
        let Some(doc) = self.documents.get_mut(id) else {
            warn!("Content for unknown document: {}", id);
            return;
        };
        let first = !doc.populated();
        doc.set_content(text);
        let should_save = doc.should_save();
        doc.set_should_save(false);
        let path = doc.storage_path(&self.config.root);
        if first {
            info!("Document {} populated: {}", id, doc.path());
        }

        // Mirrors are session-owned and echo nothing back; the guard is for
        // the host commands below.
        for buffer in &bound {
            if let Some(mirror) = self.buffers.get_mut(buffer) {
                mirror.set_text(text);
            }
        }

        let alive: Vec<BufferId> = bound
            .iter()
            .copied()
            .filter(|buffer| self.host.is_alive(*buffer))
            .collect();

        let _hold = self.guard.hold();
        if alive.is_empty() {
            if let Err(err) = self.storage.write(&path, text) {
                error!("Failed to write document {} to storage: {}", id, err);
            }
            return;
        }
        let mut save_pending = should_save;
        for buffer in alive {
            if let Err(err) = self.host.set_text(buffer, text) {
                warn!("Failed to set text on buffer {}: {}", buffer, err);
                continue;
            }
            if save_pending {
                save_pending = false;
                if let Err(err) = self.host.save(buffer) {
                    warn!("Failed to save buffer {}: {}", buffer, err);
                }
            }
        }
    }

    /// The shared session saved a document. A live bound buffer gets a
    /// guarded host save; without one the save is deferred until content
    /// next arrives.
    pub(crate) fn apply_saved(&mut self, id: DocumentId) {
        let live = self
            .doc_buffers
            .get(&id)
            .into_iter()
            .flatten()
            .copied()
            .find(|buffer| self.host.is_alive(*buffer));
        match live {
            Some(buffer) => {
                let _hold = self.guard.hold();
                if let Err(err) = self.host.save(buffer) {
                    warn!("Failed to save buffer {}: {}", buffer, err);
                }
            }
            None => {
                if let Some(doc) = self.documents.get_mut(id) {
                    doc.set_should_save(true);
                    debug!("No live buffer for document {}, deferring save", id);
                }
            }
        }
    }

    /// The shared session deleted a document: every editor and buffer
    /// bound to it is unbound, its highlight bookkeeping and record are
    /// dropped, and with `force` the backing file goes too. Editors and
    /// buffers themselves stay open, simply no longer shared.
    pub(crate) fn apply_deleted(&mut self, id: DocumentId, force: bool) {
        let Some(doc) = self.documents.remove(id) else {
            debug!("Deletion for unknown document: {}", id);
            return;
        };

        if let Some(editors) = self.doc_editors.remove(&id) {
            for editor in editors {
                if let Some(record) = self.editors.get_mut(&editor) {
                    record.doc = None;
                }
            }
        }

        if let Some(users) = self.highlights.remove(&id) {
            for markers in users.into_values() {
                for (editor, marker) in markers {
                    if let Err(err) = self.host.destroy_marker(editor, marker) {
                        warn!("Failed to destroy marker {}: {}", marker, err);
                    }
                }
            }
        }
        self.last_highlights.remove(&id);

        if let Some(buffers) = self.doc_buffers.remove(&id) {
            for buffer in buffers {
                self.buffer_docs.remove(&buffer);
                if let Some(activity) = self.activity.get_mut(&buffer) {
                    activity.clear();
                }
            }
        }

        if force {
            let path = doc.storage_path(&self.config.root);
            let _hold = self.guard.hold();
            if let Err(err) = self.storage.remove(&path) {
                error!("Failed to delete {} from storage: {}", path.display(), err);
            }
        }
        info!("Document {} deleted: {}", id, doc.path());
    }
}

#[cfg(test)]
mod tests {
    use crate::host::{EditorId, InMemoryHost};
    use crate::session::{Session, SessionConfig};
    use crate::storage::InMemoryStorage;
    use padsync_proto::{DocumentId, HighlightEvent, OffsetSpan, RemoteEvent};
    use std::path::Path;

    fn session() -> Session<InMemoryHost, InMemoryStorage> {
        Session::new(
            InMemoryHost::new(),
            InMemoryStorage::new(),
            SessionConfig::new("/ws"),
        )
    }

    #[test]
    fn test_content_reaches_bound_buffer_and_mirror() {
        let mut session = session();
        let id = DocumentId::new(1);
        session.create_document(id, "a.md");
        let (editor, buffer) = session.host_mut().open("old");
        session.open_editor(editor, buffer, Some(Path::new("/ws/a.md")), "old");

        session.handle_remote(RemoteEvent::Content {
            id,
            text: "new text".into(),
        });

        assert_eq!(session.host().text(buffer), Some("new text"));
        assert_eq!(session.buffers[&buffer].text(), "new text");
        assert!(!session.guard().is_held());
        // Applying remote content is not a local change.
        assert!(session.drain_outbound().is_empty());
        // Nothing was written to storage while a live buffer existed.
        assert!(session.storage().is_empty());
    }

    #[test]
    fn test_content_without_buffer_writes_storage() {
        let mut session = session();
        let id = DocumentId::new(1);
        session.create_document(id, "notes/a.md");
        session.handle_remote(RemoteEvent::Content {
            id,
            text: "persisted".into(),
        });

        assert_eq!(
            session.storage().read(Path::new("/ws/notes/a.md")),
            Some("persisted")
        );
        assert!(!session.guard().is_held());
    }

    #[test]
    fn test_content_for_dead_buffer_falls_back_to_storage() {
        let mut session = session();
        let id = DocumentId::new(1);
        session.create_document(id, "a.md");
        let (editor, buffer) = session.host_mut().open("old");
        session.open_editor(editor, buffer, Some(Path::new("/ws/a.md")), "old");
        session.host_mut().destroy_buffer(buffer);

        session.handle_remote(RemoteEvent::Content {
            id,
            text: "rescued".into(),
        });
        assert_eq!(
            session.storage().read(Path::new("/ws/a.md")),
            Some("rescued")
        );
    }

    #[test]
    fn test_content_for_unknown_document_is_dropped() {
        let mut session = session();
        session.handle_remote(RemoteEvent::Content {
            id: DocumentId::new(9),
            text: "stray".into(),
        });
        assert!(session.storage().is_empty());
        assert!(session.drain_outbound().is_empty());
    }

    #[test]
    fn test_saved_saves_first_live_buffer() {
        let mut session = session();
        let id = DocumentId::new(1);
        session.create_document(id, "a.md");
        session.handle_remote(RemoteEvent::Content {
            id,
            text: "text".into(),
        });
        let (e1, b1) = session.host_mut().open("text");
        session.open_editor(e1, b1, Some(Path::new("/ws/a.md")), "text");
        let (e2, b2) = session.host_mut().open("text");
        session.open_editor(e2, b2, Some(Path::new("/ws/a.md")), "text");

        session.host_mut().destroy_buffer(b1);
        session.handle_remote(RemoteEvent::Saved { id });

        assert_eq!(session.host().saves(), &[b2]);
        assert!(!session.guard().is_held());
    }

    #[test]
    fn test_saved_without_live_buffer_defers_until_content() {
        let mut session = session();
        let id = DocumentId::new(1);
        session.create_document(id, "a.md");

        session.handle_remote(RemoteEvent::Saved { id });
        assert!(session.documents().get(id).unwrap().should_save());

        let (editor, buffer) = session.host_mut().open("");
        session.open_editor(editor, buffer, Some(Path::new("/ws/a.md")), "");
        session.handle_remote(RemoteEvent::Content {
            id,
            text: "arrived".into(),
        });

        // The deferred save fired along with the content write.
        assert_eq!(session.host().saves(), &[buffer]);
        assert!(!session.documents().get(id).unwrap().should_save());
    }

    #[test]
    fn test_deferred_save_consumed_by_storage_write_too() {
        let mut session = session();
        let id = DocumentId::new(1);
        session.create_document(id, "a.md");
        session.handle_remote(RemoteEvent::Saved { id });
        session.handle_remote(RemoteEvent::Content {
            id,
            text: "on disk".into(),
        });
        assert!(!session.documents().get(id).unwrap().should_save());
        assert_eq!(
            session.storage().read(Path::new("/ws/a.md")),
            Some("on disk")
        );
    }

    fn highlighted_session() -> (Session<InMemoryHost, InMemoryStorage>, EditorId) {
        let mut session = session();
        let id = DocumentId::new(1);
        session.create_document(id, "a.md");
        session.handle_remote(RemoteEvent::Content {
            id,
            text: "abc\ndef".into(),
        });
        let (editor, buffer) = session.host_mut().open("abc\ndef");
        session.open_editor(editor, buffer, Some(Path::new("/ws/a.md")), "abc\ndef");
        session.handle_remote(RemoteEvent::Highlight(HighlightEvent {
            id,
            username: "alice".into(),
            ranges: vec![OffsetSpan(0, 2)],
            ping: false,
            summon: false,
            following: false,
        }));
        (session, editor)
    }

    #[test]
    fn test_deleted_unbinds_and_destroys_markers() {
        let (mut session, editor) = highlighted_session();
        let id = DocumentId::new(1);
        assert_eq!(session.host().marker_count(editor), 1);

        session.handle_remote(RemoteEvent::Deleted { id, force: false });

        assert!(session.documents().get(id).is_none());
        assert_eq!(session.document_for_editor(editor), None);
        assert!(session.editors_of(id).is_empty());
        assert_eq!(session.host().marker_count(editor), 0);
        assert!(!session.guard().is_held());
    }

    #[test]
    fn test_forced_delete_removes_backing_file() {
        let mut session = session();
        let id = DocumentId::new(1);
        session.create_document(id, "a.md");
        session.handle_remote(RemoteEvent::Content {
            id,
            text: "bytes".into(),
        });
        assert!(session.storage().read(Path::new("/ws/a.md")).is_some());

        session.handle_remote(RemoteEvent::Deleted { id, force: true });
        assert!(session.storage().read(Path::new("/ws/a.md")).is_none());
    }

    #[test]
    fn test_unforced_delete_keeps_backing_file() {
        let mut session = session();
        let id = DocumentId::new(1);
        session.create_document(id, "a.md");
        session.handle_remote(RemoteEvent::Content {
            id,
            text: "bytes".into(),
        });
        session.handle_remote(RemoteEvent::Deleted { id, force: false });
        assert!(session.storage().read(Path::new("/ws/a.md")).is_some());
    }

    #[test]
    fn test_edits_after_delete_stay_local() {
        let (mut session, _) = highlighted_session();
        let id = DocumentId::new(1);
        let buffer = *session.buffers.keys().next().unwrap();
        session.handle_remote(RemoteEvent::Deleted { id, force: false });

        session.buffer_edited(buffer, 0, 0, "local ");
        session.buffer_stopped_changing(buffer);
        assert!(session.drain_outbound().is_empty());
        // The mirror still tracks the open buffer.
        assert_eq!(session.buffers[&buffer].text(), "local abc\ndef");
    }
}
