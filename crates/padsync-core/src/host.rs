//! Host-editor abstraction: what the bridge must be able to do *to* the
//! embedding editor.
//!
//! Implementations:
//! - `InMemoryHost` - For testing
//! - Real hosts - An adapter over the editor's plugin API
//!
//! Notifications flow the other way (host → bridge) as direct calls on
//! [`crate::Session`]; this trait only covers commands: rewriting buffer
//! text, saving, and managing selection markers. The bridge never mutates
//! host objects to carry identity; ids are opaque handles minted by the
//! host and mapped through the bridge's own side tables.

use crate::buffer::Position;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Unknown editor: {0}")]
    UnknownEditor(EditorId),

    #[error("Unknown buffer: {0}")]
    UnknownBuffer(BufferId),

    #[error("Unknown marker {marker} on editor {editor}")]
    UnknownMarker { editor: EditorId, marker: MarkerId },
}

pub type Result<T> = std::result::Result<T, HostError>;

/// Handle for one editor pane host-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EditorId(u64);

impl EditorId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for EditorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for one text buffer host-side. Several editors may present the
/// same buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

impl BufferId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for BufferId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for one visual range marker created on an editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(u64);

impl MarkerId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for MarkerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A row/column range in a buffer, as the host addresses text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRange {
    pub start: Position,
    pub end: Position,
}

impl BufferRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// Command surface the bridge drives in the embedding editor.
pub trait HostEditor {
    /// Replace a buffer's entire contents.
    fn set_text(&mut self, buffer: BufferId, text: &str) -> Result<()>;

    /// Save a buffer to its backing file.
    fn save(&mut self, buffer: BufferId) -> Result<()>;

    /// Whether the buffer still exists host-side.
    fn is_alive(&self, buffer: BufferId) -> bool;

    /// Create a visual marker over `range`, styled with the CSS-ish `class`.
    fn create_marker(&mut self, editor: EditorId, range: BufferRange, class: &str)
    -> Result<MarkerId>;

    /// Remove a marker previously created on `editor`.
    fn destroy_marker(&mut self, editor: EditorId, marker: MarkerId) -> Result<()>;
}

#[derive(Debug, Clone)]
struct FakeBuffer {
    text: String,
    alive: bool,
}

#[derive(Debug, Clone)]
struct FakeMarker {
    range: BufferRange,
    class: String,
}

#[derive(Debug, Clone)]
struct FakeEditor {
    buffer: BufferId,
    markers: HashMap<MarkerId, FakeMarker>,
}

/// In-memory host editor for testing.
///
/// Mints ids, tracks fake buffers/editors/markers, and records every save
/// command in order.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    next_id: u64,
    buffers: HashMap<BufferId, FakeBuffer>,
    editors: HashMap<EditorId, FakeEditor>,
    saves: Vec<BufferId>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Open a new buffer with `text` and one editor presenting it.
    pub fn open(&mut self, text: &str) -> (EditorId, BufferId) {
        let buffer = BufferId(self.mint());
        self.buffers.insert(
            buffer,
            FakeBuffer {
                text: text.to_string(),
                alive: true,
            },
        );
        (self.open_editor_on(buffer), buffer)
    }

    /// Open another editor presenting an existing buffer.
    pub fn open_editor_on(&mut self, buffer: BufferId) -> EditorId {
        assert!(self.buffers.contains_key(&buffer), "no such buffer");
        let editor = EditorId(self.mint());
        self.editors.insert(
            editor,
            FakeEditor {
                buffer,
                markers: HashMap::new(),
            },
        );
        editor
    }

    /// The buffer is gone host-side.
    pub fn destroy_buffer(&mut self, buffer: BufferId) {
        if let Some(b) = self.buffers.get_mut(&buffer) {
            b.alive = false;
        }
    }

    /// The editor is gone host-side (its markers die with it).
    pub fn destroy_editor(&mut self, editor: EditorId) {
        self.editors.remove(&editor);
    }

    /// Drop a marker behind the bridge's back, so a later `destroy_marker`
    /// for it fails. Emulates host-side teardown races.
    pub fn forget_marker(&mut self, editor: EditorId, marker: MarkerId) {
        if let Some(e) = self.editors.get_mut(&editor) {
            e.markers.remove(&marker);
        }
    }

    pub fn text(&self, buffer: BufferId) -> Option<&str> {
        self.buffers.get(&buffer).map(|b| b.text.as_str())
    }

    /// Every save command received, in order.
    pub fn saves(&self) -> &[BufferId] {
        &self.saves
    }

    /// Markers currently live on `editor`, ordered by creation.
    pub fn markers(&self, editor: EditorId) -> Vec<(MarkerId, BufferRange, String)> {
        let Some(e) = self.editors.get(&editor) else {
            return Vec::new();
        };
        let mut out: Vec<_> = e
            .markers
            .iter()
            .map(|(id, m)| (*id, m.range, m.class.clone()))
            .collect();
        out.sort_by_key(|(id, _, _)| *id);
        out
    }

    pub fn marker_count(&self, editor: EditorId) -> usize {
        self.editors.get(&editor).map_or(0, |e| e.markers.len())
    }
}

impl HostEditor for InMemoryHost {
    fn set_text(&mut self, buffer: BufferId, text: &str) -> Result<()> {
        match self.buffers.get_mut(&buffer) {
            Some(b) if b.alive => {
                b.text = text.to_string();
                Ok(())
            }
            _ => Err(HostError::UnknownBuffer(buffer)),
        }
    }

    fn save(&mut self, buffer: BufferId) -> Result<()> {
        match self.buffers.get(&buffer) {
            Some(b) if b.alive => {
                self.saves.push(buffer);
                Ok(())
            }
            _ => Err(HostError::UnknownBuffer(buffer)),
        }
    }

    fn is_alive(&self, buffer: BufferId) -> bool {
        self.buffers.get(&buffer).is_some_and(|b| b.alive)
    }

    fn create_marker(
        &mut self,
        editor: EditorId,
        range: BufferRange,
        class: &str,
    ) -> Result<MarkerId> {
        let marker = MarkerId(self.mint());
        let e = self
            .editors
            .get_mut(&editor)
            .ok_or(HostError::UnknownEditor(editor))?;
        e.markers.insert(
            marker,
            FakeMarker {
                range,
                class: class.to_string(),
            },
        );
        Ok(marker)
    }

    fn destroy_marker(&mut self, editor: EditorId, marker: MarkerId) -> Result<()> {
        let e = self
            .editors
            .get_mut(&editor)
            .ok_or(HostError::UnknownEditor(editor))?;
        e.markers
            .remove(&marker)
            .map(|_| ())
            .ok_or(HostError::UnknownMarker { editor, marker })
    }
}
