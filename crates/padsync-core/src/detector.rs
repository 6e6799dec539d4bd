//! Local change detection.
//!
//! Host edits mark a buffer dirty; a patch is emitted only after the buffer
//! has stayed quiet for the configured settle window. Hosts that provide
//! their own stopped-changing notification call [`Session::buffer_stopped_changing`]
//! directly; hosts that don't call [`Session::poll_settled`] on a timer.

use crate::host::{BufferId, HostEditor};
use crate::session::Session;
use crate::storage::Storage;
use std::time::Duration;
use web_time::Instant;

/// Dirty state for one tracked buffer.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BufferActivity {
    dirty: bool,
    last_edit: Option<Instant>,
}

impl BufferActivity {
    /// Record an edit: the buffer is dirty and the settle window restarts.
    pub(crate) fn touch(&mut self) {
        self.dirty = true;
        self.last_edit = Some(Instant::now());
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Consume the dirty flag, reporting whether it was set.
    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// True once the buffer is dirty and no edit has landed for `window`.
    pub(crate) fn settled(&self, window: Duration) -> bool {
        self.dirty
            && self
                .last_edit
                .is_some_and(|at| at.elapsed() >= window)
    }

    pub(crate) fn clear(&mut self) {
        self.dirty = false;
        self.last_edit = None;
    }
}

impl<H: HostEditor, S: Storage> Session<H, S> {
    /// The host reports a buffer edit: `replacement` took the place of the
    /// character range `start..end`.
    ///
    /// Edits made while the feedback guard is held are the session's own
    /// writes echoing back from the host and are ignored outright; the
    /// mirror was already updated when the write was issued.
    pub fn buffer_edited(&mut self, buffer: BufferId, start: usize, end: usize, replacement: &str) {
        if self.guard.is_held() {
            return;
        }
        let Some(mirror) = self.buffers.get_mut(&buffer) else {
            return;
        };
        mirror.edit(start, end, replacement);
        if let Some(activity) = self.activity.get_mut(&buffer) {
            activity.touch();
        }
    }

    /// The host reports that a buffer has stopped changing. No waiting:
    /// settle it now.
    pub fn buffer_stopped_changing(&mut self, buffer: BufferId) {
        self.settle_buffer(buffer);
    }

    /// Settle every buffer whose own settle window has elapsed. For hosts
    /// without a stopped-changing notification; call on a timer.
    pub fn poll_settled(&mut self) {
        let window = self.config.settle_after;
        let due: Vec<BufferId> = self
            .activity
            .iter()
            .filter(|(_, activity)| activity.settled(window))
            .map(|(buffer, _)| *buffer)
            .collect();
        for buffer in due {
            self.settle_buffer(buffer);
        }
    }
}
