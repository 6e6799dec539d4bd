//! Outbound traffic: patches, saves, and selection highlights toward the
//! shared session.
//!
//! All three flows share the same gates: nothing leaves while the feedback
//! guard is held, nothing leaves for an unbound buffer, and nothing leaves
//! for a document that has not yet received its content.

use crate::buffer::Position;
use crate::host::{BufferId, EditorId, HostEditor};
use crate::session::Session;
use crate::storage::Storage;
use padsync_proto::{OffsetSpan, OutboundEvent};
use similar::TextDiff;
use tracing::debug;

/// Render a unified diff of two document texts, empty when they are equal.
///
/// The diff rides along with the full replacement text so the receiving
/// side can show what changed without recomputing it.
pub fn unified_diff(old: &str, new: &str) -> String {
    if old == new {
        return String::new();
    }
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .to_string()
}

impl<H: HostEditor, S: Storage> Session<H, S> {
    /// A tracked buffer went quiet: send its pending edits as one patch.
    ///
    /// The dirty flag is consumed up front, before any gate: a buffer that
    /// settles while unbound or unpopulated drops its pending state rather
    /// than replaying it later. On emission the document's last-known
    /// content advances to the sent text, so the next patch diffs against
    /// what the session was already told.
    pub(crate) fn settle_buffer(&mut self, buffer: BufferId) {
        if self.guard.is_held() {
            return;
        }
        let Some(activity) = self.activity.get_mut(&buffer) else {
            return;
        };
        if !activity.take_dirty() {
            return;
        }
        let Some(id) = self.buffer_docs.get(&buffer).copied() else {
            return;
        };
        let Some(mirror) = self.buffers.get(&buffer) else {
            return;
        };
        let text = mirror.text();
        let Some(doc) = self.documents.get_mut(id) else {
            return;
        };
        if !doc.populated() || doc.content() == text {
            return;
        }
        let diff = unified_diff(doc.content(), &text);
        doc.set_content(text.clone());

        debug!("Buffer {} settled, patching document {}", buffer, id);
        self.emit(OutboundEvent::Patch { id, text, diff });
    }

    /// The host saved a buffer (a user action, not an echo of ours):
    /// forward the save to the session so other participants persist too.
    pub fn buffer_saved(&mut self, buffer: BufferId) {
        if self.guard.is_held() {
            return;
        }
        let Some(id) = self.buffer_docs.get(&buffer).copied() else {
            return;
        };
        let populated = self.documents.get(id).is_some_and(|doc| doc.populated());
        if !populated {
            return;
        }
        debug!("Buffer {} saved, forwarding for document {}", buffer, id);
        self.emit(OutboundEvent::Saved { id });
    }

    /// The host reports new selections in an editor: publish them as this
    /// participant's highlight.
    ///
    /// Selections are position pairs in host order; each is converted to a
    /// character-offset span with endpoints normalized so start <= end. If
    /// any selection fails to convert the whole event is dropped, never
    /// sent as a partial set.
    pub fn selections_changed(&mut self, editor: EditorId, selections: &[(Position, Position)]) {
        if self.guard.is_held() || selections.is_empty() {
            return;
        }
        let Some(record) = self.editors.get(&editor) else {
            return;
        };
        let Some(id) = record.doc else {
            return;
        };
        let buffer = record.buffer;
        if !self.documents.get(id).is_some_and(|doc| doc.populated()) {
            return;
        }
        let Some(mirror) = self.buffers.get(&buffer) else {
            return;
        };

        let mut ranges = Vec::with_capacity(selections.len());
        for (start, end) in selections {
            let (Some(a), Some(b)) = (
                mirror.position_to_offset(*start),
                mirror.position_to_offset(*end),
            ) else {
                debug!(
                    "Dropping selection update for editor {}: selection outside buffer",
                    editor
                );
                return;
            };
            ranges.push(OffsetSpan(a.min(b), a.max(b)));
        }

        self.emit(OutboundEvent::Highlight {
            id,
            ranges,
            ping: false,
            summon: false,
            following: self.following,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryHost;
    use crate::session::SessionConfig;
    use crate::storage::InMemoryStorage;
    use padsync_proto::{DocumentId, RemoteEvent};
    use std::path::Path;
    use std::time::Duration;

    fn session() -> Session<InMemoryHost, InMemoryStorage> {
        Session::new(
            InMemoryHost::new(),
            InMemoryStorage::new(),
            SessionConfig::new("/ws").settle_after(Duration::ZERO),
        )
    }

    fn bound(
        session: &mut Session<InMemoryHost, InMemoryStorage>,
        id: u64,
        path: &str,
        text: &str,
    ) -> (EditorId, BufferId) {
        let id = DocumentId::new(id);
        session.create_document(id, path);
        session.handle_remote(RemoteEvent::Content {
            id,
            text: text.into(),
        });
        let (editor, buffer) = session.host_mut().open(text);
        let abs = session.config().root.join(path);
        session.open_editor(editor, buffer, Some(&abs), text);
        (editor, buffer)
    }

    #[test]
    fn test_settle_emits_patch_and_advances_baseline() {
        let mut session = session();
        let (_, buffer) = bound(&mut session, 1, "a.md", "one\ntwo\n");

        session.buffer_edited(buffer, 4, 7, "2");
        session.buffer_stopped_changing(buffer);

        let events = session.drain_outbound();
        assert_eq!(events.len(), 1);
        match &events[0] {
            OutboundEvent::Patch { id, text, diff } => {
                assert_eq!(*id, DocumentId::new(1));
                assert_eq!(text, "one\n2\n");
                assert!(diff.contains("-two"));
                assert!(diff.contains("+2"));
            }
            other => panic!("expected patch, got {:?}", other),
        }
        let doc = session.documents().get(DocumentId::new(1)).unwrap();
        assert_eq!(doc.content(), "one\n2\n");

        // Baseline advanced and flag consumed: settling again sends nothing.
        session.buffer_stopped_changing(buffer);
        assert!(session.drain_outbound().is_empty());
    }

    #[test]
    fn test_unpopulated_document_never_patches() {
        let mut session = session();
        let id = DocumentId::new(1);
        session.create_document(id, "a.md");
        let (editor, buffer) = session.host_mut().open("draft");
        session.open_editor(editor, buffer, Some(Path::new("/ws/a.md")), "draft");

        session.buffer_edited(buffer, 0, 0, "x");
        session.buffer_stopped_changing(buffer);
        session.buffer_stopped_changing(buffer);
        assert!(session.drain_outbound().is_empty());

        // Population alone does not replay the consumed edit.
        session.handle_remote(RemoteEvent::Content {
            id,
            text: "fresh".into(),
        });
        session.buffer_stopped_changing(buffer);
        assert!(session.drain_outbound().is_empty());

        // A new edit after population flows normally.
        session.buffer_edited(buffer, 0, 0, "y");
        session.buffer_stopped_changing(buffer);
        assert_eq!(session.drain_outbound().len(), 1);
    }

    #[test]
    fn test_identical_sessions_emit_identical_patches() {
        let run = || {
            let mut session = session();
            let (_, buffer) = bound(&mut session, 1, "a.md", "alpha\nbeta\ngamma\n");
            session.buffer_edited(buffer, 6, 10, "BETA");
            session.buffer_edited(buffer, 0, 0, ">> ");
            session.buffer_stopped_changing(buffer);
            session.drain_outbound()
        };
        let first = run();
        let second = run();
        assert_eq!(first.len(), 1);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_noop_edit_cycle_sends_nothing() {
        let mut session = session();
        let (_, buffer) = bound(&mut session, 1, "a.md", "stable");
        session.buffer_edited(buffer, 0, 6, "other");
        session.buffer_edited(buffer, 0, 5, "stable");
        session.buffer_stopped_changing(buffer);
        assert!(session.drain_outbound().is_empty());
    }

    #[test]
    fn test_save_forwarded_only_when_bound_and_populated() {
        let mut session = session();
        let (_, buffer) = bound(&mut session, 1, "a.md", "text");
        session.buffer_saved(buffer);
        let events = session.drain_outbound();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            OutboundEvent::Saved { id } if id == DocumentId::new(1)
        ));

        // Guarded saves are echoes of our own save commands.
        let hold = session.guard().hold();
        session.buffer_saved(buffer);
        drop(hold);
        assert!(session.drain_outbound().is_empty());

        // Unbound buffers have no document to forward to.
        let (_, other) = session.host_mut().open("scratch");
        session.buffer_saved(other);
        assert!(session.drain_outbound().is_empty());
    }

    #[test]
    fn test_selections_become_ordered_spans() {
        let mut session = session();
        let (editor, _) = bound(&mut session, 1, "a.md", "abc\ndef");

        // Second selection is reversed; both land normalized.
        session.selections_changed(
            editor,
            &[
                (Position { row: 0, col: 1 }, Position { row: 0, col: 3 }),
                (Position { row: 1, col: 3 }, Position { row: 1, col: 0 }),
            ],
        );
        let events = session.drain_outbound();
        assert_eq!(events.len(), 1);
        match &events[0] {
            OutboundEvent::Highlight {
                id,
                ranges,
                ping,
                summon,
                following,
            } => {
                assert_eq!(*id, DocumentId::new(1));
                assert_eq!(ranges, &[OffsetSpan(1, 3), OffsetSpan(4, 7)]);
                assert!(!ping && !summon && !following);
            }
            other => panic!("expected highlight, got {:?}", other),
        }
    }

    #[test]
    fn test_following_flag_rides_selection_updates() {
        let mut session = session();
        let (editor, _) = bound(&mut session, 1, "a.md", "abc");
        session.set_following(true);
        session.selections_changed(
            editor,
            &[(Position { row: 0, col: 0 }, Position { row: 0, col: 0 })],
        );
        match &session.drain_outbound()[0] {
            OutboundEvent::Highlight { following, .. } => assert!(following),
            other => panic!("expected highlight, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_or_invalid_selections_are_dropped() {
        let mut session = session();
        let (editor, _) = bound(&mut session, 1, "a.md", "abc");

        session.selections_changed(editor, &[]);
        assert!(session.drain_outbound().is_empty());

        // One selection out of range: the whole event is dropped.
        session.selections_changed(
            editor,
            &[
                (Position { row: 0, col: 0 }, Position { row: 0, col: 1 }),
                (Position { row: 9, col: 0 }, Position { row: 9, col: 1 }),
            ],
        );
        assert!(session.drain_outbound().is_empty());
    }

    #[test]
    fn test_unified_diff_shape() {
        assert_eq!(unified_diff("same\n", "same\n"), "");
        let diff = unified_diff("a\nb\nc\n", "a\nB\nc\n");
        assert!(diff.contains("-b"));
        assert!(diff.contains("+B"));
        assert!(diff.contains("@@"));
    }
}
