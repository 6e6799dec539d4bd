//! Session state: everything the bridge tracks for one shared-document
//! session, plus remote-event dispatch and the outbound queue.

use crate::buffer::LocalBuffer;
use crate::detector::BufferActivity;
use crate::document::{Documents, SharedDocument};
use crate::guard::FeedbackGuard;
use crate::host::{BufferId, EditorId, HostEditor, MarkerId};
use crate::registry::EditorRecord;
use crate::storage::Storage;
use padsync_proto::{DocumentId, HighlightEvent, OutboundEvent, RemoteEvent};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Default quiet period after the last edit before a buffer counts as
/// settled (used by `poll_settled`; hosts with their own debounce deliver
/// `buffer_stopped_changing` instead).
pub const DEFAULT_SETTLE_MS: u64 = 300;

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory the session's document paths resolve against.
    pub root: PathBuf,
    /// Quiet period before `poll_settled` considers a dirty buffer settled.
    pub settle_after: Duration,
}

impl SessionConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            settle_after: Duration::from_millis(DEFAULT_SETTLE_MS),
        }
    }

    /// Replace the settle window: how long a buffer must stay quiet before
    /// its pending edits are sent.
    pub fn settle_after(mut self, window: Duration) -> Self {
        self.settle_after = window;
        self
    }
}

/// The synchronization bridge for one collaborative editing session.
///
/// Owns the document store, the editor/buffer side tables, the rope
/// mirrors, the highlight bookkeeping, the feedback guard, and the outbound
/// queue. Host notifications arrive as direct method calls (`open_editor`,
/// `buffer_edited`, `buffer_saved`, ...); remote events come through
/// [`Session::handle_remote`]; outbound events queue until the embedding
/// transport drains them with [`Session::drain_outbound`].
///
/// Every method runs to completion on the caller's thread. Interleaving of
/// the two event sources is the only concurrency, so a remote apply and a
/// local change handler never overlap mid-mutation and no locking is needed
/// beyond the guard's engage/release discipline.
pub struct Session<H: HostEditor, S: Storage> {
    pub(crate) config: SessionConfig,

    /// All documents shared in the session.
    pub(crate) documents: Documents,

    /// Suppresses local handlers during remote-driven mutation.
    pub(crate) guard: FeedbackGuard,

    /// Command surface of the embedding editor.
    pub(crate) host: H,

    /// Backing files, for content with no open buffer and forced deletes.
    pub(crate) storage: S,

    // Identity side tables. Host objects never carry document ids; these
    // maps do, in both directions.
    pub(crate) editors: HashMap<EditorId, EditorRecord>,
    pub(crate) doc_editors: HashMap<DocumentId, Vec<EditorId>>,
    pub(crate) buffer_docs: HashMap<BufferId, DocumentId>,
    pub(crate) doc_buffers: HashMap<DocumentId, Vec<BufferId>>,

    /// Rope mirrors for open buffers.
    pub(crate) buffers: HashMap<BufferId, LocalBuffer>,

    /// Per-buffer dirty state for change detection.
    pub(crate) activity: HashMap<BufferId, BufferActivity>,

    /// Live markers per document: username -> (editor, marker) pairs.
    pub(crate) highlights: HashMap<DocumentId, HashMap<String, Vec<(EditorId, MarkerId)>>>,

    /// Last highlight payload per document and user, re-projected when a
    /// new editor binds.
    pub(crate) last_highlights: HashMap<DocumentId, HashMap<String, HighlightEvent>>,

    /// Events awaiting the embedding transport (fire-and-forget).
    pub(crate) outbound: VecDeque<OutboundEvent>,

    /// Reported on outbound highlights: whether we follow a collaborator.
    pub(crate) following: bool,
}

impl<H: HostEditor, S: Storage> Session<H, S> {
    pub fn new(host: H, storage: S, config: SessionConfig) -> Self {
        Self {
            config,
            documents: Documents::new(),
            guard: FeedbackGuard::new(),
            host,
            storage,
            editors: HashMap::new(),
            doc_editors: HashMap::new(),
            buffer_docs: HashMap::new(),
            doc_buffers: HashMap::new(),
            buffers: HashMap::new(),
            activity: HashMap::new(),
            highlights: HashMap::new(),
            last_highlights: HashMap::new(),
            outbound: VecDeque::new(),
            following: false,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn documents(&self) -> &Documents {
        &self.documents
    }

    /// The suppression guard, shared with any embedder-side mutation that
    /// must not re-enter change detection.
    pub fn guard(&self) -> &FeedbackGuard {
        &self.guard
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn following(&self) -> bool {
        self.following
    }

    /// Set the follow state reported on outbound highlights.
    pub fn set_following(&mut self, following: bool) {
        self.following = following;
    }

    /// The document an editor is bound to, if any.
    pub fn document_for_editor(&self, editor: EditorId) -> Option<DocumentId> {
        self.editors.get(&editor).and_then(|record| record.doc)
    }

    /// The document a buffer is bound to, if any.
    pub fn document_for_buffer(&self, buffer: BufferId) -> Option<DocumentId> {
        self.buffer_docs.get(&buffer).copied()
    }

    /// Editors currently bound to a document.
    pub fn editors_of(&self, id: DocumentId) -> &[EditorId] {
        self.doc_editors.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Queue an outbound event for the transport. Never blocks.
    pub(crate) fn emit(&mut self, event: OutboundEvent) {
        self.outbound.push_back(event);
    }

    /// Take everything queued for the transport, in emission order.
    pub fn drain_outbound(&mut self) -> Vec<OutboundEvent> {
        self.outbound.drain(..).collect()
    }

    pub fn pending_outbound(&self) -> usize {
        self.outbound.len()
    }

    /// Dispatch one event from the remote synchronization channel.
    pub fn handle_remote(&mut self, event: RemoteEvent) {
        match event {
            RemoteEvent::Created { id, path } => self.create_document(id, &path),
            RemoteEvent::Content { id, text } => self.apply_content(id, &text),
            RemoteEvent::Saved { id } => self.apply_saved(id),
            RemoteEvent::Deleted { id, force } => self.apply_deleted(id, force),
            RemoteEvent::Highlight(event) => self.apply_highlight(&event),
        }
    }

    /// Register a document announced by the session (the first remote
    /// reference). Content arrives separately; until it does the document
    /// stays unpopulated and produces no patches.
    pub fn create_document(&mut self, id: DocumentId, path: &str) {
        debug!("Document announced: {} at {}", id, path);
        self.documents.insert(SharedDocument::new(id, path));
        self.bind_waiting_editors(id);
    }
}
