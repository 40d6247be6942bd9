//! Buffer pool frames.
//!
//! A frame holds its page bytes inline, so the pool's frame array is the one
//! arena all pages are read into. A frame's page identity is set while it is
//! being filled and cleared when it goes back to the free list. The fix count says how many callers currently hold the
//! frame's bytes; a frame with a nonzero count is never evicted or freed.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::innodb::constants::PAGE_SIZE;
use crate::innodb::page::PageId;

pub(crate) type PageBuf = [u8; PAGE_SIZE];

pub(crate) struct Frame {
    page_id: Mutex<Option<PageId>>,
    fix_count: AtomicU32,
    data: RwLock<PageBuf>,
}

impl Frame {
    pub(crate) fn new() -> Self {
        Frame {
            page_id: Mutex::new(None),
            fix_count: AtomicU32::new(0),
            data: RwLock::new([0u8; PAGE_SIZE]),
        }
    }

    pub(crate) fn page_id(&self) -> Option<PageId> {
        *self.page_id.lock()
    }

    pub(crate) fn set_page_id(&self, page_id: Option<PageId>) {
        *self.page_id.lock() = page_id;
    }

    pub(crate) fn fix(&self) -> u32 {
        self.fix_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn unfix(&self) -> u32 {
        let prev = self.fix_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "unfix of an unfixed frame");
        prev.saturating_sub(1)
    }

    /// Mark a frame just taken off the free list as fixed by its filler.
    pub(crate) fn claim(&self) {
        self.fix_count.store(1, Ordering::Release);
    }

    /// Reset a frame that is going back to the free list.
    pub(crate) fn release(&self) {
        self.set_page_id(None);
        self.fix_count.store(0, Ordering::Release);
    }

    pub(crate) fn fix_count(&self) -> u32 {
        self.fix_count.load(Ordering::Acquire)
    }

    pub(crate) fn is_fixed(&self) -> bool {
        self.fix_count() > 0
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, PageBuf> {
        self.data.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, PageBuf> {
        self.data.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_counting() {
        let frame = Frame::new();
        assert!(!frame.is_fixed());
        assert_eq!(frame.fix(), 1);
        assert_eq!(frame.fix(), 2);
        assert_eq!(frame.unfix(), 1);
        assert!(frame.is_fixed());
        assert_eq!(frame.unfix(), 0);
        assert!(!frame.is_fixed());
    }

    #[test]
    fn test_release_clears_identity() {
        let frame = Frame::new();
        frame.claim();
        frame.set_page_id(Some(PageId::new(1, 2)));
        assert_eq!(frame.page_id(), Some(PageId::new(1, 2)));
        frame.release();
        assert_eq!(frame.page_id(), None);
        assert_eq!(frame.fix_count(), 0);
    }
}
