//! Segment inodes (INODE pages).
//!
//! A file segment (the leaf or non-leaf pages of one B+Tree, for example)
//! is described by a 192-byte [`InodeEntry`]: its id, three extent lists
//! (free, not full, full) and an array of 32 individually allocated
//! fragment pages. INODE pages hold up to 85 entries after a 12-byte list
//! node that links the page into the FSP `SEG_INODES_FULL` or
//! `SEG_INODES_FREE` list.
//!
//! Index pages reach their segments through [`FsegHeader`]s, resolved here
//! by [`lookup_segment`].

use std::ops::Deref;

use serde::Serialize;

use crate::innodb::constants::*;
use crate::innodb::flst::{ListBaseNode, ListEntry, ListNode};
use crate::innodb::index::FsegHeader;
use crate::innodb::mach;
use crate::innodb::page::PageId;

/// One segment inode entry (192 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InodeEntry {
    /// Slot of this entry within its INODE page (`0..85`).
    pub slot: usize,
    /// Segment id, 0 for an unused slot.
    pub seg_id: u64,
    /// Number of used pages in the `not_full` extent list.
    pub not_full_n_used: u32,
    /// Extents owned by the segment with no used page.
    pub free: ListBaseNode,
    /// Extents with some used pages.
    pub not_full: ListBaseNode,
    /// Extents with every page used.
    pub full: ListBaseNode,
    pub magic: u32,
    /// Fragment page numbers, `-1` (FIL_NULL) for empty slots.
    pub frag_array: [i32; FSEG_FRAG_ARR_N_SLOTS],
}

impl InodeEntry {
    /// Parse the entry in slot `slot` of an INODE page.
    ///
    /// Returns `None` for a slot outside `0..85` or a truncated buffer. The
    /// magic number is not checked; see [`is_valid`](Self::is_valid).
    pub fn parse_nth(page: &[u8], slot: usize) -> Option<Self> {
        if slot >= FSP_SEG_INODES_PER_PAGE {
            return None;
        }
        let base = FSEG_ARR_OFFSET + slot * FSEG_INODE_SIZE;

        let mut frag_array = [0i32; FSEG_FRAG_ARR_N_SLOTS];
        for (i, frag) in frag_array.iter_mut().enumerate() {
            *frag = mach::read_i32(page, base + FSEG_FRAG_ARR + i * FSEG_FRAG_SLOT_SIZE)?;
        }

        Some(InodeEntry {
            slot,
            seg_id: mach::read_u64(page, base + FSEG_ID)?,
            not_full_n_used: mach::read_u32(page, base + FSEG_NOT_FULL_N_USED)?,
            free: ListBaseNode::parse(page, base + FSEG_FREE)?,
            not_full: ListBaseNode::parse(page, base + FSEG_NOT_FULL)?,
            full: ListBaseNode::parse(page, base + FSEG_FULL)?,
            magic: mach::read_u32(page, base + FSEG_MAGIC_N)?,
            frag_array,
        })
    }

    /// Parse the entry starting at byte `offset`, as addressed by an FSEG
    /// header. Offsets that do not start an entry yield `None`.
    pub fn parse_at(page: &[u8], offset: u16) -> Option<Self> {
        let rel = (offset as usize).checked_sub(FSEG_ARR_OFFSET)?;
        if rel % FSEG_INODE_SIZE != 0 {
            return None;
        }
        Self::parse_nth(page, rel / FSEG_INODE_SIZE)
    }

    /// Returns true if the magic number matches `FSEG_MAGIC_N_VALUE`.
    pub fn is_valid(&self) -> bool {
        self.magic == FSEG_MAGIC_N_VALUE
    }

    /// Returns true if the slot is assigned to a segment.
    pub fn is_used(&self) -> bool {
        self.is_valid() && self.seg_id != 0
    }

    /// Allocated fragment pages, skipping empty slots.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibd::innodb::constants::*;
    /// use ibd::innodb::inode::InodeEntry;
    /// use byteorder::{BigEndian, ByteOrder};
    ///
    /// let mut page = vec![0xFFu8; PAGE_SIZE];
    /// let base = FSEG_ARR_OFFSET;
    /// BigEndian::write_u32(&mut page[base + FSEG_MAGIC_N..], FSEG_MAGIC_N_VALUE);
    /// BigEndian::write_u32(&mut page[base + FSEG_FRAG_ARR..], 3);
    /// BigEndian::write_u32(&mut page[base + FSEG_FRAG_ARR + 8..], 9);
    ///
    /// let entry = InodeEntry::parse_nth(&page, 0).unwrap();
    /// assert!(entry.is_valid());
    /// assert_eq!(entry.fragment_pages().collect::<Vec<_>>(), vec![3, 9]);
    /// ```
    pub fn fragment_pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.frag_array
            .iter()
            .map(|&f| f as u32)
            .filter(|&p| p != FIL_NULL)
    }

    /// Pages owned by the segment that are accounted for by its lists and
    /// fragment array: full extents, used pages of not-full extents, and
    /// fragment pages.
    pub fn used_pages(&self) -> u64 {
        self.full.length as u64 * FSP_EXTENT_SIZE as u64
            + self.not_full_n_used as u64
            + self.fragment_pages().count() as u64
    }
}

/// A decoded INODE page.
#[derive(Debug, Clone, Serialize)]
pub struct InodePage {
    /// Links the page into an FSP inode page list.
    pub list_node: ListNode,
    /// Entries whose magic number is valid, in slot order.
    pub entries: Vec<InodeEntry>,
}

impl InodePage {
    /// Parse an INODE page. Slots with a bad magic number are skipped.
    pub fn parse(page: &[u8]) -> Option<Self> {
        let list_node = ListNode::parse(page, FSEG_INODE_PAGE_NODE)?;
        let entries = (0..FSP_SEG_INODES_PER_PAGE)
            .map_while(|slot| InodeEntry::parse_nth(page, slot))
            .filter(InodeEntry::is_valid)
            .collect();
        Some(InodePage { list_node, entries })
    }

    /// Entries assigned to a segment.
    pub fn used_entries(&self) -> impl Iterator<Item = &InodeEntry> {
        self.entries.iter().filter(|e| e.is_used())
    }
}

impl ListEntry for InodePage {
    /// An INODE page is linked through the node at the start of its body.
    fn decode(page: &[u8], offset: u16) -> Option<(Self, ListNode)> {
        if offset as usize != FSEG_INODE_PAGE_NODE {
            return None;
        }
        let inode = InodePage::parse(page)?;
        let node = inode.list_node;
        Some((inode, node))
    }
}

/// Resolve an FSEG header to its segment inode entry.
///
/// `fetch` is called once with the page the header points to. Returns
/// `None` if the header is unset, the page is unavailable, or the addressed
/// bytes are not a valid inode entry.
pub fn lookup_segment<F, P>(fseg: &FsegHeader, fetch: F) -> Option<InodeEntry>
where
    F: FnOnce(PageId) -> Option<P>,
    P: Deref<Target = [u8]>,
{
    if fseg.page_no == FIL_NULL {
        return None;
    }
    let page = fetch(PageId::new(fseg.space_id as u64, fseg.page_no as u64))?;
    InodeEntry::parse_at(&page, fseg.offset).filter(InodeEntry::is_valid)
}
