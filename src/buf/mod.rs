//! Buffer pool.
//!
//! [`BufferPool`] caches tablespace pages in a fixed set of page-sized
//! frames allocated up front. Pages are looked up by [`PageId`] through a
//! hash index; cached frames sit on an LRU list with InnoDB's old sublist
//! ([`lru::LruList`]); unused frames sit on a free list. On a miss the pool
//! takes a free frame, evicting an unfixed frame from the LRU tail when none
//! is free, and fills it through the [`PageReader`] registered for the
//! page's space.
//!
//! [`get_page`](BufferPool::get_page) returns a [`PageGuard`] that keeps the
//! frame fixed: a fixed frame is never evicted or put on the free list, so
//! the bytes behind the guard stay those of the requested page until the
//! guard is dropped.
//!
//! The hash index, the LRU list and the free list have separate locks. The
//! LRU lock is always taken before the hash lock and before the free list
//! lock. A frame that leaves one list is counted in flight until it joins
//! the other, and both changes happen under the lock of the list involved,
//! so [`stats`](BufferPool::stats) always sees every frame accounted for.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use ibd::buf::{BufferPool, BufferPoolConfig, FetchMode};
//! use ibd::innodb::constants::*;
//! use ibd::innodb::page::PageId;
//! use ibd::innodb::tablespace::FileSpaceReader;
//! use byteorder::{BigEndian, ByteOrder};
//!
//! let mut image = vec![0u8; 4 * PAGE_SIZE];
//! BigEndian::write_u32(&mut image[FSP_HEADER_OFFSET + FSP_SPACE_ID..], 3);
//! BigEndian::write_u32(&mut image[2 * PAGE_SIZE + FIL_PAGE_OFFSET..], 2);
//!
//! let pool = BufferPool::new(BufferPoolConfig::default().with_frames(2)).unwrap();
//! pool.add_space(Arc::new(FileSpaceReader::from_bytes(image).unwrap()));
//!
//! let page = pool.get_page(PageId::new(3, 2), FetchMode::Normal).unwrap();
//! assert_eq!(BigEndian::read_u32(&page[FIL_PAGE_OFFSET..]), 2);
//! ```

mod frame;
pub mod lru;

use std::collections::{HashMap, VecDeque};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde::Serialize;

use crate::buf::frame::{Frame, PageBuf};
use crate::buf::lru::{LruList, OLD_RATIO_DIV};
use crate::innodb::constants::PAGE_SIZE;
use crate::innodb::page::PageId;
use crate::innodb::tablespace::PageReader;
use crate::IdbError;

/// Index of a frame in the pool.
pub type FrameId = usize;

/// How a page access affects its LRU position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FetchMode {
    /// Regular access; may promote the page to the LRU head.
    Normal,
    /// Part of a large scan; never promotes.
    Scan,
}

/// Default pool size: 100 MiB of 16 KiB frames.
pub const DEFAULT_FRAMES: usize = 6400;
/// Default old sublist share, 3/8 of the LRU list.
pub const DEFAULT_OLD_RATIO: usize = 384;
/// Smallest accepted old sublist share (about 5%).
pub const OLD_RATIO_MIN: usize = 51;
/// LRU length at which the old sublist is established.
pub const DEFAULT_OLD_MIN_LEN: usize = 64;

/// Buffer pool configuration.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub n_frames: usize,
    /// Old sublist share of the LRU list, in 1024ths.
    pub old_ratio_per_1024: usize,
    /// LRU length at which the old sublist is established.
    pub old_min_len: usize,
    /// How long after its first access an old page must be accessed again
    /// to be promoted.
    pub old_threshold: Duration,
    /// Attempts to obtain a free frame before giving up.
    pub free_retry_limit: u32,
    /// Sleep between failed attempts.
    pub free_retry_backoff: Duration,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        BufferPoolConfig {
            n_frames: DEFAULT_FRAMES,
            old_ratio_per_1024: DEFAULT_OLD_RATIO,
            old_min_len: DEFAULT_OLD_MIN_LEN,
            old_threshold: Duration::from_millis(1000),
            free_retry_limit: 20,
            free_retry_backoff: Duration::from_millis(10),
        }
    }
}

impl BufferPoolConfig {
    pub fn with_frames(mut self, n_frames: usize) -> Self {
        self.n_frames = n_frames;
        self
    }

    pub fn with_old_ratio(mut self, per_1024: usize) -> Self {
        self.old_ratio_per_1024 = per_1024;
        self
    }

    pub fn with_old_min_len(mut self, len: usize) -> Self {
        self.old_min_len = len;
        self
    }

    pub fn with_old_threshold(mut self, threshold: Duration) -> Self {
        self.old_threshold = threshold;
        self
    }

    pub fn with_free_retry(mut self, limit: u32, backoff: Duration) -> Self {
        self.free_retry_limit = limit;
        self.free_retry_backoff = backoff;
        self
    }

    fn validate(&self) -> Result<(), IdbError> {
        if self.n_frames == 0 {
            return Err(IdbError::Argument(
                "buffer pool needs at least one frame".to_string(),
            ));
        }
        if !(OLD_RATIO_MIN..=OLD_RATIO_DIV).contains(&self.old_ratio_per_1024) {
            return Err(IdbError::Argument(format!(
                "old ratio {} outside {}..={}",
                self.old_ratio_per_1024, OLD_RATIO_MIN, OLD_RATIO_DIV
            )));
        }
        if self.free_retry_limit == 0 {
            return Err(IdbError::Argument(
                "free retry limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Point-in-time frame accounting and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub free: usize,
    pub lru: usize,
    pub old: usize,
    /// Frames on neither list: being filled, or on their way back to the
    /// free list.
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Fixed-capacity page cache shared by reference between readers.
pub struct BufferPool {
    config: BufferPoolConfig,
    frames: Vec<Frame>,
    hash: Mutex<HashMap<PageId, FrameId>>,
    lru: Mutex<LruList>,
    free: Mutex<VecDeque<FrameId>>,
    readers: RwLock<HashMap<u64, Arc<dyn PageReader>>>,
    in_flight: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl BufferPool {
    /// Allocate every frame and put it on the free list.
    pub fn new(config: BufferPoolConfig) -> Result<Self, IdbError> {
        config.validate()?;
        let n = config.n_frames;
        debug!(
            "allocating buffer pool: {} frames ({} KiB)",
            n,
            n * PAGE_SIZE / 1024
        );

        Ok(BufferPool {
            frames: {
                let mut frames = Vec::with_capacity(n);
                frames.resize_with(n, Frame::new);
                frames
            },
            hash: Mutex::new(HashMap::with_capacity(n)),
            lru: Mutex::new(LruList::new(
                n,
                config.old_ratio_per_1024,
                config.old_min_len,
                config.old_threshold,
            )),
            free: Mutex::new((0..n).collect()),
            readers: RwLock::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            config,
        })
    }

    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    /// Register the reader for its space. A space keeps its first reader;
    /// registering another one returns false.
    pub fn add_space(&self, reader: Arc<dyn PageReader>) -> bool {
        let space_id = reader.space_id();
        let mut readers = self.readers.write();
        if readers.contains_key(&space_id) {
            warn!(
                "space {} already has a reader; keeping the registered one",
                space_id
            );
            return false;
        }
        readers.insert(space_id, reader);
        debug!("registered reader for space {}", space_id);
        true
    }

    pub fn has_space(&self, space_id: u64) -> bool {
        self.readers.read().contains_key(&space_id)
    }

    /// Return the page fixed in a frame, reading it on a cache miss.
    ///
    /// Fails with [`IdbError::UnknownSpace`] if no reader is registered for
    /// the page's space, with the reader's error if the read fails, and
    /// with [`IdbError::PoolExhausted`] if no frame could be freed within
    /// the configured retries.
    pub fn get_page(&self, page_id: PageId, mode: FetchMode) -> Result<PageGuard<'_>, IdbError> {
        if let Some(frame_id) = self.lookup_and_fix(page_id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.lru.lock().touch(frame_id, mode, Instant::now());
            return Ok(self.guard(frame_id, page_id));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let reader = self
            .readers
            .read()
            .get(&page_id.space_id)
            .cloned()
            .ok_or(IdbError::UnknownSpace(page_id.space_id))?;
        let page_no = u32::try_from(page_id.page_no).map_err(|_| {
            IdbError::Argument(format!("page number {} out of range", page_id.page_no))
        })?;

        let frame_id = self.take_free_frame()?;
        self.fill(frame_id, page_id, page_no, reader.as_ref(), mode)
    }

    /// A fetch function for the navigators: page fetch failures become
    /// `None` and are logged.
    pub fn fetcher<'a>(&'a self, mode: FetchMode) -> impl FnMut(PageId) -> Option<PageGuard<'a>> + 'a {
        move |page_id| match self.get_page(page_id, mode) {
            Ok(page) => Some(page),
            Err(e) => {
                debug!("fetch of page {} failed: {}", page_id, e);
                None
            }
        }
    }

    /// Returns true if the page is currently cached.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.hash.lock().contains_key(&page_id)
    }

    /// Free the frame `frame_id` back to the free list.
    ///
    /// Returns `Ok(false)` if the frame holds no cached page, and
    /// [`IdbError::PageFixed`] without touching it if it is fixed.
    pub fn free_one_page(&self, frame_id: FrameId) -> Result<bool, IdbError> {
        if frame_id >= self.frames.len() {
            return Err(IdbError::Argument(format!(
                "frame {} out of range ({} frames)",
                frame_id,
                self.frames.len()
            )));
        }
        self.free_frame(frame_id, None)
    }

    /// Drop `page_id` from the cache. Same results as [`free_one_page`].
    ///
    /// [`free_one_page`]: Self::free_one_page
    pub fn evict_page(&self, page_id: PageId) -> Result<bool, IdbError> {
        let frame_id = match self.hash.lock().get(&page_id) {
            Some(&f) => f,
            None => return Ok(false),
        };
        self.free_frame(frame_id, Some(page_id))
    }

    /// Number of pages in the space, if a reader is registered for it.
    pub fn space_page_count(&self, space_id: u64) -> Option<u64> {
        self.readers.read().get(&space_id).map(|r| r.page_count())
    }

    /// Frame accounting and counters. `free + lru + in_flight == total`
    /// holds in every snapshot, also while other threads fetch.
    pub fn stats(&self) -> PoolStats {
        let lru = self.lru.lock();
        let free = self.free.lock().len();
        PoolStats {
            total: self.frames.len(),
            free,
            lru: lru.len(),
            old: lru.old_len(),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn lookup_and_fix(&self, page_id: PageId) -> Option<FrameId> {
        let hash = self.hash.lock();
        let frame_id = *hash.get(&page_id)?;
        self.frames[frame_id].fix();
        Some(frame_id)
    }

    fn guard(&self, frame_id: FrameId, page_id: PageId) -> PageGuard<'_> {
        PageGuard {
            pool: self,
            frame_id,
            page_id,
            data: self.frames[frame_id].read(),
        }
    }

    /// Pop a free frame, evicting when the free list is empty. Each round
    /// tries the old sublist first and then the whole LRU list; gives up
    /// after `free_retry_limit` rounds in which nothing could be evicted.
    fn take_free_frame(&self) -> Result<FrameId, IdbError> {
        let mut attempts = 0u32;
        loop {
            if let Some(frame_id) = self.pop_free() {
                return Ok(frame_id);
            }
            if self
                .evict_one_page(false)
                .or_else(|| self.evict_one_page(true))
                .is_some()
            {
                continue;
            }

            attempts += 1;
            if attempts >= self.config.free_retry_limit {
                warn!(
                    "buffer pool exhausted: all {} frames fixed after {} attempts",
                    self.frames.len(),
                    attempts
                );
                return Err(IdbError::PoolExhausted { attempts });
            }
            debug!(
                "no evictable frame (attempt {}), retrying in {:?}",
                attempts, self.config.free_retry_backoff
            );
            thread::sleep(self.config.free_retry_backoff);
        }
    }

    fn pop_free(&self) -> Option<FrameId> {
        let mut free = self.free.lock();
        let frame_id = free.pop_front()?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Some(frame_id)
    }

    /// Evict one unfixed frame from the LRU tail onto the free list.
    fn evict_one_page(&self, scan_all: bool) -> Option<FrameId> {
        let mut evicted_page = None;
        let victim = self.lru.lock().evict(scan_all, |frame_id| {
            let frame = &self.frames[frame_id];
            if frame.is_fixed() {
                return false;
            }
            let mut hash = self.hash.lock();
            // Lookups fix under the hash lock, so this check is final.
            if frame.is_fixed() {
                return false;
            }
            if let Some(page_id) = frame.page_id() {
                if hash.get(&page_id) == Some(&frame_id) {
                    hash.remove(&page_id);
                }
                evicted_page = Some(page_id);
            }
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            true
        })?;

        self.evictions.fetch_add(1, Ordering::Relaxed);
        if let Some(page_id) = evicted_page {
            debug!("evicted page {} from frame {}", page_id, victim);
        }
        self.release_to_free(victim);
        Some(victim)
    }

    fn free_frame(&self, frame_id: FrameId, expected: Option<PageId>) -> Result<bool, IdbError> {
        let frame = &self.frames[frame_id];
        {
            let mut lru = self.lru.lock();
            if !lru.contains(frame_id) {
                return Ok(false);
            }
            let mut hash = self.hash.lock();
            let Some(page_id) = frame.page_id() else {
                return Ok(false);
            };
            if expected.is_some_and(|e| e != page_id) {
                return Ok(false);
            }
            if frame.is_fixed() {
                return Err(IdbError::PageFixed(page_id));
            }
            hash.remove(&page_id);
            drop(hash);
            lru.remove(frame_id);
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            debug!("freed page {} from frame {}", page_id, frame_id);
        }
        self.release_to_free(frame_id);
        Ok(true)
    }

    /// Put an in-flight frame on the free list.
    fn release_to_free(&self, frame_id: FrameId) {
        self.frames[frame_id].release();
        let mut free = self.free.lock();
        free.push_back(frame_id);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Read `page_id` into the in-flight frame `frame_id` and publish it.
    ///
    /// The frame is fixed for the caller from the start and only becomes
    /// visible through the hash index once its bytes are complete. If
    /// another thread published the same page meanwhile, its frame is used
    /// and this one goes back to the free list.
    fn fill(
        &self,
        frame_id: FrameId,
        page_id: PageId,
        page_no: u32,
        reader: &dyn PageReader,
        mode: FetchMode,
    ) -> Result<PageGuard<'_>, IdbError> {
        let frame = &self.frames[frame_id];
        frame.claim();
        frame.set_page_id(Some(page_id));

        let read = {
            let mut data = frame.write();
            reader.read_page(page_no, &mut *data)
        };
        if let Err(e) = read {
            self.release_to_free(frame_id);
            debug!("read of page {} failed: {}", page_id, e);
            return Err(e);
        }

        let target = {
            let mut lru = self.lru.lock();
            let mut hash = self.hash.lock();
            let target = match hash.get(&page_id) {
                Some(&existing) => {
                    self.frames[existing].fix();
                    existing
                }
                None => {
                    hash.insert(page_id, frame_id);
                    lru.add(frame_id, true);
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    frame_id
                }
            };
            drop(hash);
            lru.touch(target, mode, Instant::now());
            target
        };

        if target != frame_id {
            debug!("page {} was read concurrently; using frame {}", page_id, target);
            self.release_to_free(frame_id);
        } else {
            debug!("read page {} into frame {}", page_id, frame_id);
        }
        Ok(self.guard(target, page_id))
    }
}

/// A fixed page. Dereferences to the page bytes; dropping it unfixes the
/// frame.
pub struct PageGuard<'a> {
    pool: &'a BufferPool,
    frame_id: FrameId,
    page_id: PageId,
    data: RwLockReadGuard<'a, PageBuf>,
}

impl PageGuard<'_> {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn as_array(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }
}

impl Deref for PageGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data[..]
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        self.pool.frames[self.frame_id].unfix();
    }
}
