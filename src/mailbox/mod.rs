//! Cross-thread paint mailbox
//!
//! A single-slot, coalescing handoff between the engine's compositor thread
//! and the host's render thread. The compositor side posts the dirty region
//! of every paint it composited; the render side drains whatever is pending
//! once per frame. Posts never queue up: a second post before the next drain
//! grows the pending region to the union of both, so the render thread sees
//! every changed pixel exactly once per drain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::geometry::Rect;

/// Counters for mailbox traffic
#[derive(Debug, Default)]
pub struct MailboxStats {
    /// Non-empty regions posted
    pub posted: AtomicU64,
    /// Posts folded into an already pending region
    pub coalesced: AtomicU64,
    /// Drains that returned a region
    pub drained: AtomicU64,
}

impl MailboxStats {
    /// Number of posts that were merged instead of delivered on their own
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    pub fn posted(&self) -> u64 {
        self.posted.load(Ordering::Relaxed)
    }

    pub fn drained(&self) -> u64 {
        self.drained.load(Ordering::Relaxed)
    }
}

/// Single-slot dirty region mailbox
#[derive(Debug, Default)]
pub struct Mailbox {
    slot: Mutex<Option<Rect>>,
    stats: MailboxStats,
}

impl Mailbox {
    /// Create an empty mailbox
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned slot still holds a valid `Option<Rect>`.
    fn slot(&self) -> MutexGuard<'_, Option<Rect>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Post a dirty region, merging it into any pending one.
    ///
    /// Returns `true` when the region was folded into an existing signal.
    /// Empty regions are ignored.
    pub fn post(&self, dirty: Rect) -> bool {
        if dirty.is_empty() {
            return false;
        }

        let mut slot = self.slot();
        self.stats.posted.fetch_add(1, Ordering::Relaxed);
        match slot.as_mut() {
            Some(pending) => {
                *pending = pending.union(&dirty);
                self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => {
                *slot = Some(dirty);
                false
            }
        }
    }

    /// Take the pending region, leaving the slot empty
    pub fn drain_if_pending(&self) -> Option<Rect> {
        let taken = self.slot().take();
        if taken.is_some() {
            self.stats.drained.fetch_add(1, Ordering::Relaxed);
        }
        taken
    }

    /// Check for a pending region without taking it
    pub fn is_pending(&self) -> bool {
        self.slot().is_some()
    }

    /// Drop any pending region
    pub fn clear(&self) {
        self.slot().take();
    }

    /// Traffic counters
    pub fn stats(&self) -> &MailboxStats {
        &self.stats
    }
}
