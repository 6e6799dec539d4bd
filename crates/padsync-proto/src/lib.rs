//! Event shapes exchanged with the remote synchronization channel.
//!
//! These types define the message *shapes* the bridge consumes and produces;
//! the transport and its byte-level encoding live elsewhere. Everything here
//! derives serde so any JSON-ish carrier can move it. Events are internally
//! tagged on a `name` field, e.g. `{"name":"saved","id":7}`.
//!
//! Offsets are zero-based absolute character indices into a document's full
//! text. All ranges are `[start, end]` pairs with `start <= end`.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Identity of a shared document, unique and stable for the document's
/// lifetime within a session.
///
/// Wraps a u64 and serializes as a bare number, matching the remote model's
/// numeric ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(u64);

impl DocumentId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DocumentId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<DocumentId> for u64 {
    fn from(id: DocumentId) -> u64 {
        id.0
    }
}

/// A `[start, end]` character-offset pair into a document's full text.
///
/// Serializes as a two-element array, so a `ranges` field reads
/// `[[0,5],[9,9]]` on the wire. A span with `start == end` is a caret
/// (degenerate selection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetSpan(pub usize, pub usize);

impl OffsetSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self(start, end)
    }

    pub fn start(&self) -> usize {
        self.0
    }

    pub fn end(&self) -> usize {
        self.1
    }

    /// True when the span is a caret (no selected characters).
    pub fn is_caret(&self) -> bool {
        self.0 == self.1
    }

    /// True when the span is ordered and lies inside a text of `len` characters.
    pub fn fits(&self, len: usize) -> bool {
        self.0 <= self.1 && self.1 <= len
    }
}

/// A remote user's current selection set for one document.
///
/// Wire shape:
/// `{"name":"highlight","id":7,"username":"alice","ranges":[[0,5],[9,9]],"ping":false,...}`
///
/// The boolean flags are advisory (ping requests attention, summon asks the
/// local user to jump there, following reports the sender's follow state) and
/// default to false when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightEvent {
    pub id: DocumentId,
    pub username: String,
    pub ranges: Vec<OffsetSpan>,
    #[serde(default)]
    pub ping: bool,
    #[serde(default)]
    pub summon: bool,
    #[serde(default)]
    pub following: bool,
}

/// Events arriving from the remote, authoritative shared-document model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum RemoteEvent {
    /// A document exists in the session (sent on join and on remote create).
    /// Creates the local record; content arrives separately.
    Created { id: DocumentId, path: String },

    /// Authoritative full text for a document. The first one marks the
    /// document populated; every one replaces local buffer text wholesale.
    Content { id: DocumentId, text: String },

    /// A remote participant saved the document.
    Saved { id: DocumentId },

    /// The document was deleted from the session. `force` additionally
    /// requests deletion of the local backing file.
    Deleted {
        id: DocumentId,
        #[serde(default)]
        force: bool,
    },

    /// A remote user's selection changed.
    Highlight(HighlightEvent),
}

/// Events produced toward the remote synchronization channel.
///
/// All sends are fire-and-forget: the bridge queues these and the embedding
/// transport ships them with no acknowledgment at this layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Full current text for a document, sent when local edits settle.
    ///
    /// `diff` is a unified diff from the last-synchronized text to `text`,
    /// for logs and thin consumers; `text` is the authoritative payload.
    Patch {
        id: DocumentId,
        text: String,
        diff: String,
    },

    /// The local copy was saved.
    Saved { id: DocumentId },

    /// The local user's selection changed.
    Highlight {
        id: DocumentId,
        ranges: Vec<OffsetSpan>,
        ping: bool,
        summon: bool,
        following: bool,
    },
}

impl OutboundEvent {
    /// The document the event concerns.
    pub fn document(&self) -> DocumentId {
        match self {
            OutboundEvent::Patch { id, .. } => *id,
            OutboundEvent::Saved { id } => *id,
            OutboundEvent::Highlight { id, .. } => *id,
        }
    }
}
