//! Index-linked LRU list with an "old" sublist.
//!
//! The list runs from the most recently used frame (head) to the least
//! recently used (tail). Once it holds `old_min_len` frames, a boundary
//! (`old`) marks where the old sublist begins; everything from the boundary
//! to the tail is old, and the sublist is kept at `old_ratio / 1024` of the
//! list length. Pages read for the first time are linked at the boundary
//! rather than at the head, so a one-off scan ages out through the old
//! sublist without pushing the hot pages off the tail.
//!
//! Nodes are addressed by frame index; the list never owns page memory.

use std::time::{Duration, Instant};

use log::trace;

use crate::buf::{FetchMode, FrameId};

/// Divisor of the old sublist ratio.
pub const OLD_RATIO_DIV: usize = 1024;

#[derive(Debug, Clone, Default)]
struct LruNode {
    prev: Option<FrameId>,
    next: Option<FrameId>,
    linked: bool,
    old: bool,
    /// First access since the frame was linked.
    access_time: Option<Instant>,
    /// Pool eviction clock when the frame was last put at the head; 0 for
    /// a frame linked into the old sublist.
    freed_page_clock: u64,
}

/// LRU list over a fixed set of frames.
#[derive(Debug)]
pub struct LruList {
    nodes: Vec<LruNode>,
    head: Option<FrameId>,
    tail: Option<FrameId>,
    len: usize,
    /// First (head-most) frame of the old sublist.
    old: Option<FrameId>,
    old_len: usize,
    old_ratio: usize,
    old_min_len: usize,
    old_threshold: Duration,
    /// Number of frames evicted so far.
    freed_page_clock: u64,
}

impl LruList {
    /// Create an empty list for `n_frames` frames.
    ///
    /// `old_ratio` is expressed in 1024ths of the list length.
    pub fn new(n_frames: usize, old_ratio: usize, old_min_len: usize, old_threshold: Duration) -> Self {
        LruList {
            nodes: vec![LruNode::default(); n_frames],
            head: None,
            tail: None,
            len: 0,
            old: None,
            old_len: 0,
            old_ratio,
            old_min_len,
            old_threshold,
            freed_page_clock: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length of the old sublist (0 until the boundary is established).
    pub fn old_len(&self) -> usize {
        self.old_len
    }

    pub fn contains(&self, frame: FrameId) -> bool {
        self.nodes.get(frame).is_some_and(|n| n.linked)
    }

    pub fn is_old(&self, frame: FrameId) -> bool {
        self.nodes.get(frame).is_some_and(|n| n.linked && n.old)
    }

    pub fn freed_page_clock(&self) -> u64 {
        self.freed_page_clock
    }

    /// Frames from head (most recent) to tail.
    pub fn iter(&self) -> impl Iterator<Item = FrameId> + '_ {
        std::iter::successors(self.head, move |&f| self.nodes[f].next)
    }

    /// Old sublist length the boundary is steered towards.
    fn old_target(&self) -> usize {
        (self.len * self.old_ratio / OLD_RATIO_DIV).clamp(1, self.len)
    }

    /// Link `frame`. A frame added with `old` set goes right behind the old
    /// boundary once the boundary exists; otherwise it goes to the head.
    ///
    /// Returns false if the frame is already linked or out of range.
    pub fn add(&mut self, frame: FrameId, old: bool) -> bool {
        if frame >= self.nodes.len() || self.nodes[frame].linked {
            return false;
        }

        match self.old {
            Some(boundary) if old => {
                self.link_after(boundary, frame);
                self.nodes[frame].old = true;
                self.nodes[frame].freed_page_clock = 0;
                self.old_len += 1;
            }
            _ => {
                self.push_front(frame);
                self.nodes[frame].old = false;
                self.nodes[frame].freed_page_clock = self.freed_page_clock;
            }
        }
        self.nodes[frame].access_time = None;
        self.len += 1;

        if self.len > self.old_min_len {
            if self.old.is_none() {
                self.old_init();
            } else {
                self.adjust_old_len();
            }
        } else if self.len == self.old_min_len {
            self.old_init();
        }
        true
    }

    /// Unlink `frame`. Returns false if it was not linked.
    pub fn remove(&mut self, frame: FrameId) -> bool {
        if !self.contains(frame) {
            return false;
        }

        if self.old == Some(frame) {
            // The boundary moves one step towards the head.
            match self.nodes[frame].prev {
                Some(prev) => {
                    self.old = Some(prev);
                    self.nodes[prev].old = true;
                    self.old_len += 1;
                }
                None => self.old = self.nodes[frame].next,
            }
        }

        self.unlink(frame);
        self.len -= 1;
        if self.nodes[frame].old {
            self.old_len -= 1;
        }
        self.nodes[frame].old = false;
        self.nodes[frame].access_time = None;

        if self.len < self.old_min_len {
            if self.old.is_some() {
                let frames: Vec<FrameId> = self.iter().collect();
                for f in frames {
                    self.nodes[f].old = false;
                }
                self.old = None;
                self.old_len = 0;
            }
        } else if self.old.is_some() {
            self.adjust_old_len();
        }
        true
    }

    /// Move `frame` to the head of the list.
    pub fn make_young(&mut self, frame: FrameId) -> bool {
        if !self.remove(frame) {
            return false;
        }
        self.add(frame, false)
    }

    /// Record an access to `frame` and promote it to the head if the policy
    /// says so. Returns true if the frame was moved.
    ///
    /// `Scan` accesses never promote. A `Normal` access promotes an old
    /// frame only once its first access is at least `old_threshold` in the
    /// past, and promotes a young frame only once enough evictions have
    /// happened since it was last put at the head that it risks drifting
    /// into the old sublist.
    pub fn touch(&mut self, frame: FrameId, mode: FetchMode, now: Instant) -> bool {
        if !self.contains(frame) {
            return false;
        }
        let node = &mut self.nodes[frame];
        let first_access = *node.access_time.get_or_insert(now);
        let is_old = node.old;

        if mode == FetchMode::Scan {
            return false;
        }

        let promote = if is_old && !self.old_threshold.is_zero() {
            now.saturating_duration_since(first_access) >= self.old_threshold
        } else {
            !self.is_young(frame)
        };

        if promote {
            trace!("lru: promoting frame {} to head", frame);
            self.make_young(frame);
        }
        promote
    }

    /// Whether a frame is still close enough to the head not to need
    /// promotion: fewer than about a quarter of the young sublist's capacity
    /// has been evicted since it was last put at the head.
    fn is_young(&self, frame: FrameId) -> bool {
        let distance = self.nodes.len() * (OLD_RATIO_DIV - self.old_ratio) / (OLD_RATIO_DIV * 4);
        self.freed_page_clock < self.nodes[frame].freed_page_clock + distance as u64
    }

    /// Scan from the tail for a frame `claim` accepts, unlink it and count
    /// one eviction. Only the old sublist is scanned unless `scan_all` is
    /// set or the sublist is not established yet.
    pub fn evict<F>(&mut self, scan_all: bool, mut claim: F) -> Option<FrameId>
    where
        F: FnMut(FrameId) -> bool,
    {
        let limit = if scan_all || self.old.is_none() {
            self.len
        } else {
            self.old_len
        };

        let mut cursor = self.tail;
        let mut scanned = 0;
        while let Some(frame) = cursor {
            if scanned >= limit {
                break;
            }
            scanned += 1;
            cursor = self.nodes[frame].prev;
            if claim(frame) {
                self.remove(frame);
                self.freed_page_clock += 1;
                return Some(frame);
            }
        }
        None
    }

    /// Establish the boundary: everything is old, then shrink to the ratio.
    fn old_init(&mut self) {
        let frames: Vec<FrameId> = self.iter().collect();
        for &f in &frames {
            self.nodes[f].old = true;
        }
        self.old = self.head;
        self.old_len = self.len;
        self.adjust_old_len();
    }

    /// Step the boundary until the old sublist matches its target length.
    /// Each add or remove changes the target and the sublist by at most
    /// one, so this moves the boundary a bounded number of steps.
    fn adjust_old_len(&mut self) {
        let target = self.old_target();
        while let Some(boundary) = self.old {
            if self.old_len < target {
                let Some(prev) = self.nodes[boundary].prev else {
                    break;
                };
                self.nodes[prev].old = true;
                self.old = Some(prev);
                self.old_len += 1;
            } else if self.old_len > target {
                let Some(next) = self.nodes[boundary].next else {
                    break;
                };
                self.nodes[boundary].old = false;
                self.old = Some(next);
                self.old_len -= 1;
            } else {
                break;
            }
        }
    }

    fn push_front(&mut self, frame: FrameId) {
        let node = &mut self.nodes[frame];
        node.prev = None;
        node.next = self.head;
        node.linked = true;
        match self.head {
            Some(h) => self.nodes[h].prev = Some(frame),
            None => self.tail = Some(frame),
        }
        self.head = Some(frame);
    }

    fn link_after(&mut self, anchor: FrameId, frame: FrameId) {
        let next = self.nodes[anchor].next;
        {
            let node = &mut self.nodes[frame];
            node.prev = Some(anchor);
            node.next = next;
            node.linked = true;
        }
        self.nodes[anchor].next = Some(frame);
        match next {
            Some(n) => self.nodes[n].prev = Some(frame),
            None => self.tail = Some(frame),
        }
    }

    fn unlink(&mut self, frame: FrameId) {
        let (prev, next) = (self.nodes[frame].prev, self.nodes[frame].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        let node = &mut self.nodes[frame];
        node.prev = None;
        node.next = None;
        node.linked = false;
    }

    /// Walk the list and check every structural invariant.
    #[cfg(test)]
    pub(crate) fn check(&self) {
        let frames: Vec<FrameId> = self.iter().collect();
        assert_eq!(frames.len(), self.len);
        assert_eq!(frames.last().copied(), self.tail);
        let n_old = frames.iter().filter(|&&f| self.nodes[f].old).count();
        assert_eq!(n_old, self.old_len);
        if let Some(boundary) = self.old {
            let pos = frames.iter().position(|&f| f == boundary).unwrap();
            assert!(frames[pos..].iter().all(|&f| self.nodes[f].old));
            assert!(frames[..pos].iter().all(|&f| !self.nodes[f].old));
        } else {
            assert_eq!(self.old_len, 0);
        }
    }
}
