//! Non-blocking exclusive-access token for the execution ring.

use core::sync::atomic::{AtomicBool, Ordering};

/// Exclusive-access flag guarding the execution ring cursors.
///
/// Acquisition never spins: a context that finds the ring held gives up and
/// retries on its next pass. Only a load and a store are used, so the flag works
/// on cores without compare-and-swap; it relies on the two contexts sharing one core.
#[derive(Debug, Default)]
pub struct RingLock {
    locked: AtomicBool,
}

impl RingLock {
    /// Create an unlocked flag.
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Try to take the ring. The returned guard releases it when dropped.
    pub fn try_acquire(&self) -> Option<RingGuard<'_>> {
        if self.locked.load(Ordering::Acquire) {
            return None;
        }
        self.locked.store(true, Ordering::Release);
        Some(RingGuard { lock: self })
    }

    /// Check if some context holds the ring.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

/// Scope of one hold on a [`RingLock`].
#[derive(Debug)]
pub struct RingGuard<'a> {
    lock: &'a RingLock,
}

impl Drop for RingGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}
