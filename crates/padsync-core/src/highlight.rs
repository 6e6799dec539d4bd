//! Remote selection highlights projected into host editor markers.
//!
//! A remote user's selections arrive as offset spans against the document
//! text and become visual range markers in every bound editor, colored by a
//! stable per-username class. A user's marker set is always replaced
//! wholesale: destroyed in full, then recreated. There is no merge path.

use crate::buffer::LocalBuffer;
use crate::host::{BufferRange, EditorId, HostEditor, MarkerId};
use crate::session::Session;
use crate::storage::Storage;
use padsync_proto::{DocumentId, HighlightEvent, OffsetSpan};
use tracing::{debug, warn};

/// Stable CSS class for a username: the same name yields the same color in
/// every session, with no assignment state kept anywhere. Eight classes,
/// matching the stylesheet palette.
pub fn highlight_class(username: &str) -> String {
    format!("padsync-user-{}", fnv1a_hash(username) % 8)
}

/// FNV-1a hash for the username → color mapping.
/// Stable across Rust versions (unlike DefaultHasher).
fn fnv1a_hash(s: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET;
    for byte in s.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Map an offset span into a host range against `mirror`.
///
/// Degenerate spans (carets) are widened by one column so they stay
/// visible: a caret sitting at the end of a non-empty line shrinks its
/// start column, anywhere else (an empty line included, where there is
/// nothing to shrink over) the end column grows. Columns count characters,
/// so a caret after a multi-byte character widens over that whole
/// character.
pub(crate) fn project_span(mirror: &LocalBuffer, span: OffsetSpan) -> Option<BufferRange> {
    let mut start = mirror.offset_to_position(span.start())?;
    let mut end = mirror.offset_to_position(span.end())?;
    if start == end {
        let line_len = mirror.line_len(end.row)?;
        if line_len > 0 && end.col == line_len {
            start.col -= 1;
        } else {
            end.col += 1;
        }
    }
    Some(BufferRange { start, end })
}

impl<H: HostEditor, S: Storage> Session<H, S> {
    /// A remote user's selection changed: replace their markers in every
    /// editor bound to the document.
    ///
    /// Nothing is touched unless the event is actionable: empty ranges,
    /// unknown or unpopulated documents, spans outside the document text,
    /// and spans no bound mirror can place all leave the existing markers
    /// exactly as they were. A valid
    /// payload is remembered even when no editor is bound yet, so an
    /// editor that opens later starts with the current selections.
    pub(crate) fn apply_highlight(&mut self, event: &HighlightEvent) {
        let id = event.id;
        if event.ranges.is_empty() {
            debug!("Dropping empty highlight from {}", event.username);
            return;
        }
        let Some(doc) = self.documents.get(id) else {
            debug!("Dropping highlight for unknown document: {}", id);
            return;
        };
        if !doc.populated() {
            debug!("Dropping highlight for unpopulated document: {}", id);
            return;
        }
        let content_len = doc.content().chars().count();
        if event.ranges.iter().any(|span| !span.fits(content_len)) {
            warn!(
                "Dropping malformed highlight from {}: span outside document {}",
                event.username, id
            );
            return;
        }

        self.last_highlights
            .entry(id)
            .or_default()
            .insert(event.username.clone(), event.clone());

        let editors: Vec<EditorId> = self.doc_editors.get(&id).cloned().unwrap_or_default();
        if editors.is_empty() {
            debug!("No editors bound to document {}, highlight kept for later", id);
            return;
        }

        // Project against every editor's mirror before touching the old
        // set. A mirror with pending local edits can reject a span the
        // document text accepts; in that case the previous markers stay.
        let mut projected: Vec<(EditorId, Vec<BufferRange>)> = Vec::new();
        for editor in editors {
            let Some(record) = self.editors.get(&editor) else {
                continue;
            };
            let Some(mirror) = self.buffers.get(&record.buffer) else {
                continue;
            };
            let mut ranges = Vec::with_capacity(event.ranges.len());
            for span in &event.ranges {
                match project_span(mirror, *span) {
                    Some(range) => ranges.push(range),
                    None => {
                        warn!(
                            "Highlight from {} does not fit the buffer of editor {}, \
                             keeping the previous markers",
                            event.username, editor
                        );
                        return;
                    }
                }
            }
            projected.push((editor, ranges));
        }

        // The old set goes in full before any new marker exists.
        self.remove_user_markers(id, &event.username);

        let class = highlight_class(&event.username);
        let mut created: Vec<(EditorId, MarkerId)> = Vec::new();
        for (editor, ranges) in projected {
            for range in ranges {
                match self.host.create_marker(editor, range, &class) {
                    Ok(marker) => created.push((editor, marker)),
                    Err(err) => {
                        warn!("Failed to create marker in editor {}: {}", editor, err);
                    }
                }
            }
        }
        debug!(
            "Highlight from {} on document {}: {} markers",
            event.username,
            id,
            created.len()
        );
        if !created.is_empty() {
            self.highlights
                .entry(id)
                .or_default()
                .insert(event.username.clone(), created);
        }
    }

    /// Destroy every recorded marker for `username` on `id`. Individual
    /// failures are logged and skipped; destruction always runs to the end.
    pub(crate) fn remove_user_markers(&mut self, id: DocumentId, username: &str) {
        let Some(users) = self.highlights.get_mut(&id) else {
            return;
        };
        let Some(markers) = users.remove(username) else {
            return;
        };
        for (editor, marker) in markers {
            if let Err(err) = self.host.destroy_marker(editor, marker) {
                warn!("Failed to destroy marker {}: {}", marker, err);
            }
        }
    }

    /// Destroy the markers recorded on one editor only. A live editor
    /// leaving a document takes its stale markers down; other editors on
    /// the same document keep theirs.
    pub(crate) fn destroy_markers_for_editor(&mut self, id: DocumentId, editor: EditorId) {
        let Some(users) = self.highlights.get_mut(&id) else {
            return;
        };
        let mut doomed: Vec<MarkerId> = Vec::new();
        for markers in users.values_mut() {
            markers.retain(|(owner, marker)| {
                if *owner == editor {
                    doomed.push(*marker);
                    false
                } else {
                    true
                }
            });
        }
        users.retain(|_, markers| !markers.is_empty());
        for marker in doomed {
            if let Err(err) = self.host.destroy_marker(editor, marker) {
                warn!("Failed to destroy marker {}: {}", marker, err);
            }
        }
    }

    /// Re-apply the stored highlight payloads for a document. Called when
    /// an editor newly binds, so it catches up on selections that arrived
    /// before it opened.
    pub(crate) fn rerender_highlights_for(&mut self, id: DocumentId) {
        let Some(stored) = self.last_highlights.get(&id) else {
            return;
        };
        let events: Vec<HighlightEvent> = stored.values().cloned().collect();
        for event in events {
            self.apply_highlight(&event);
        }
    }
}
