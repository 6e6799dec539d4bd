//! Suppression of locally-originated handlers during programmatic mutation.
//!
//! Remote-driven writes (setting buffer text, issuing saves) fire the same
//! host notifications as the user typing. Unsuppressed, that loops forever:
//! local edit → outbound patch → remote rebroadcast → inbound apply → change
//! notification → outbound patch. The guard breaks the cycle structurally:
//! it is engaged for exactly the scope of a programmatic mutation, and every
//! locally-originated handler (change, save, selection, path-change) checks
//! it first and no-ops entirely while it is held.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared suppression flag for remote-driven mutation.
///
/// `hold()` engages the guard and returns a token; dropping the token
/// releases it. Because release rides on `Drop`, the guard is released on
/// every exit path out of the mutation, early returns and error paths
/// included. There is no timer or counter fallback: the token's scope *is*
/// the suppression window.
#[derive(Debug, Clone, Default)]
pub struct FeedbackGuard {
    engaged: Arc<AtomicBool>,
}

impl FeedbackGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engage the guard for the scope of the returned token.
    ///
    /// Holds do not nest: handlers run to completion on one thread, and only
    /// remote-apply paths take a hold, one at a time.
    pub fn hold(&self) -> GuardHold {
        self.engaged.store(true, Ordering::SeqCst);
        GuardHold {
            engaged: Arc::clone(&self.engaged),
        }
    }

    /// True while a [`GuardHold`] is alive.
    pub fn is_held(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }
}

/// Token keeping a [`FeedbackGuard`] engaged; releases on drop.
#[derive(Debug)]
pub struct GuardHold {
    engaged: Arc<AtomicBool>,
}

impl Drop for GuardHold {
    fn drop(&mut self) {
        self.engaged.store(false, Ordering::SeqCst);
    }
}
