use std::sync::atomic::{AtomicBool, Ordering};

/// Exclusion flag for one pass type.
///
/// Acquisition is a single compare-and-set, so of two racing triggers exactly
/// one wins. The flag is cleared when the returned permit is dropped.
#[derive(Debug, Default)]
pub struct PassGuard {
    busy: AtomicBool,
}

impl PassGuard {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// `None` while another holder is running.
    pub fn try_acquire(&self) -> Option<PassPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassPermit { guard: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
#[must_use = "the guard is released as soon as the permit is dropped"]
pub struct PassPermit<'a> {
    guard: &'a PassGuard,
}

impl Drop for PassPermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}
