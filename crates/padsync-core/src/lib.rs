//! padsync-core: Synchronization bridge between a host editor and a remote
//! shared-document session.
//!
//! This crate provides the core functionality for:
//! - Mirroring host buffers and translating offsets ↔ row/column positions
//! - Debounced local change detection and outbound patch emission
//! - Applying remote content, saves, and deletions under a feedback guard
//! - Projecting remote users' selections into host editor markers
//! - HostEditor and Storage trait abstractions

pub mod apply;
pub mod buffer;
pub mod detector;
pub mod document;
pub mod guard;
pub mod highlight;
pub mod host;
pub mod outbound;
pub mod registry;
pub mod session;
pub mod storage;

pub use buffer::{LocalBuffer, Position};
pub use document::{Documents, SharedDocument};
pub use guard::{FeedbackGuard, GuardHold};
pub use highlight::highlight_class;
pub use host::{
    BufferId, BufferRange, EditorId, HostEditor, HostError, InMemoryHost, MarkerId,
};
pub use outbound::unified_diff;
pub use session::{Session, SessionConfig, DEFAULT_SETTLE_MS};
pub use storage::{DirStorage, InMemoryStorage, Storage, StorageError};
