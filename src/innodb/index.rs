//! INDEX page internal structure parsing.
//!
//! INDEX pages (page type 17855 / `FIL_PAGE_INDEX`) are the B+Tree nodes that
//! store table data and secondary index entries. Each INDEX page contains a
//! 36-byte [`IndexHeader`] at `FIL_PAGE_DATA` (byte 38), followed by two
//! 10-byte FSEG inode pointers ([`FsegHeader`]) for the leaf and non-leaf
//! segments, and the infimum/supremum system records ([`SystemRecords`]).
//!
//! The page directory grows downward from the FIL trailer: slot `n` is a
//! 2-byte offset of the record that owns the slot's group of records.

use serde::Serialize;

use crate::innodb::constants::*;
use crate::innodb::mach;
use crate::innodb::record::RecordHeader;

/// Parsed INDEX page header (36 bytes, at FIL_PAGE_DATA offset within an INDEX page).
#[derive(Debug, Clone, Serialize)]
pub struct IndexHeader {
    /// Number of directory slots in the page directory.
    pub n_dir_slots: u16,
    /// Pointer to record heap top.
    pub heap_top: u16,
    /// Number of records in the heap. Bit 15 is the compact format flag.
    pub n_heap_raw: u16,
    /// Pointer to start of free record list (0 if none).
    pub free: u16,
    /// Number of bytes in deleted records (garbage).
    pub garbage: u16,
    /// Pointer to the last inserted record (0 if reset).
    pub last_insert: u16,
    /// Last insert direction.
    pub direction: u16,
    /// Number of consecutive inserts in the same direction.
    pub n_direction: u16,
    /// Number of user records on the page.
    pub n_recs: u16,
    /// Highest trx id that may have modified a record (secondary indexes only).
    pub max_trx_id: u64,
    /// Level in the B+Tree (0 = leaf).
    pub level: u16,
    /// Index ID where the page belongs.
    pub index_id: u64,
}

impl IndexHeader {
    /// Parse an INDEX page header from a full page buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibd::innodb::index::IndexHeader;
    /// use ibd::innodb::constants::*;
    /// use byteorder::{BigEndian, ByteOrder};
    ///
    /// let mut page = vec![0u8; 256];
    /// let base = PAGE_HEADER;
    /// BigEndian::write_u16(&mut page[base + PAGE_N_DIR_SLOTS..], 4);
    /// BigEndian::write_u16(&mut page[base + PAGE_N_HEAP..], 0x8003); // compact + 3 records
    /// BigEndian::write_u16(&mut page[base + PAGE_N_RECS..], 1);
    /// BigEndian::write_u16(&mut page[base + PAGE_LEVEL..], 1);
    /// BigEndian::write_u64(&mut page[base + PAGE_INDEX_ID..], 100);
    ///
    /// let hdr = IndexHeader::parse(&page).unwrap();
    /// assert_eq!(hdr.n_dir_slots, 4);
    /// assert!(hdr.is_compact());
    /// assert_eq!(hdr.n_heap(), 3);
    /// assert!(!hdr.is_leaf());
    /// assert_eq!(hdr.index_id, 100);
    /// ```
    pub fn parse(page_data: &[u8]) -> Option<Self> {
        let base = PAGE_HEADER;
        if page_data.len() < base + INDEX_HEADER_SIZE {
            return None;
        }

        Some(IndexHeader {
            n_dir_slots: mach::read_u16(page_data, base + PAGE_N_DIR_SLOTS)?,
            heap_top: mach::read_u16(page_data, base + PAGE_HEAP_TOP)?,
            n_heap_raw: mach::read_u16(page_data, base + PAGE_N_HEAP)?,
            free: mach::read_u16(page_data, base + PAGE_FREE)?,
            garbage: mach::read_u16(page_data, base + PAGE_GARBAGE)?,
            last_insert: mach::read_u16(page_data, base + PAGE_LAST_INSERT)?,
            direction: mach::read_u16(page_data, base + PAGE_DIRECTION)?,
            n_direction: mach::read_u16(page_data, base + PAGE_N_DIRECTION)?,
            n_recs: mach::read_u16(page_data, base + PAGE_N_RECS)?,
            max_trx_id: mach::read_u64(page_data, base + PAGE_MAX_TRX_ID)?,
            level: mach::read_u16(page_data, base + PAGE_LEVEL)?,
            index_id: mach::read_u64(page_data, base + PAGE_INDEX_ID)?,
        })
    }

    /// Returns the actual number of records in the heap (masking out the compact flag).
    pub fn n_heap(&self) -> u16 {
        self.n_heap_raw & 0x7FFF
    }

    /// Returns true if this page uses the compact row format.
    pub fn is_compact(&self) -> bool {
        (self.n_heap_raw & 0x8000) != 0
    }

    pub fn direction_name(&self) -> &'static str {
        match self.direction {
            PAGE_LEFT => "left",
            PAGE_RIGHT => "right",
            PAGE_SAME_REC => "same_rec",
            PAGE_SAME_PAGE => "same_page",
            PAGE_NO_DIRECTION => "no_direction",
            _ => "unknown",
        }
    }

    /// Returns true if this is a leaf-level page.
    pub fn is_leaf(&self) -> bool {
        self.level == 0
    }
}

/// FSEG (file segment) header: pointer to a segment inode (10 bytes).
///
/// Root pages carry two of them after the INDEX header: the leaf segment
/// and the non-leaf (internal) segment of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FsegHeader {
    /// Space ID of the inode.
    pub space_id: u32,
    /// Page number of the INODE page.
    pub page_no: u32,
    /// Byte offset of the inode entry within that page.
    pub offset: u16,
}

impl FsegHeader {
    /// Parse an FSEG header at `offset` within `buf`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibd::innodb::index::FsegHeader;
    /// use byteorder::{BigEndian, ByteOrder};
    ///
    /// let mut data = vec![0u8; 10];
    /// BigEndian::write_u32(&mut data[0..], 3);   // space_id
    /// BigEndian::write_u32(&mut data[4..], 7);   // page_no
    /// BigEndian::write_u16(&mut data[8..], 50);  // offset
    ///
    /// let fseg = FsegHeader::parse(&data, 0).unwrap();
    /// assert_eq!((fseg.space_id, fseg.page_no, fseg.offset), (3, 7, 50));
    /// assert!(FsegHeader::parse(&data, 1).is_none());
    /// ```
    pub fn parse(buf: &[u8], offset: usize) -> Option<Self> {
        Some(FsegHeader {
            space_id: mach::read_u32(buf, offset + FSEG_HDR_SPACE)?,
            page_no: mach::read_u32(buf, offset + FSEG_HDR_PAGE_NO)?,
            offset: mach::read_u16(buf, offset + FSEG_HDR_OFFSET)?,
        })
    }

    /// Leaf segment header of an index root page.
    pub fn parse_leaf(page_data: &[u8]) -> Option<Self> {
        Self::parse(page_data, PAGE_HEADER + PAGE_BTR_SEG_LEAF)
    }

    /// Non-leaf segment header of an index root page.
    pub fn parse_internal(page_data: &[u8]) -> Option<Self> {
        Self::parse(page_data, PAGE_HEADER + PAGE_BTR_SEG_TOP)
    }

    /// Returns true if the header points at an inode (non-root pages
    /// leave it zeroed or `FIL_NULL`).
    pub fn is_set(&self) -> bool {
        self.page_no != FIL_NULL && self.offset != 0
    }
}

/// Headers of the infimum and supremum pseudo-records of a compact page.
#[derive(Debug, Clone, Serialize)]
pub struct SystemRecords {
    pub infimum: RecordHeader,
    pub supremum: RecordHeader,
    /// The infimum body reads `infimum\0`.
    pub infimum_tag_ok: bool,
    /// The supremum body reads `supremum`.
    pub supremum_tag_ok: bool,
}

impl SystemRecords {
    /// Parse both system records from a full page buffer.
    pub fn parse(page_data: &[u8]) -> Option<Self> {
        let infimum = RecordHeader::parse(page_data, PAGE_NEW_INFIMUM)?;
        let supremum = RecordHeader::parse(page_data, PAGE_NEW_SUPREMUM)?;
        let infimum_tag = mach::field(page_data, PAGE_NEW_INFIMUM, 8)?;
        let supremum_tag = mach::field(page_data, PAGE_NEW_SUPREMUM, 8)?;

        Some(SystemRecords {
            infimum,
            supremum,
            infimum_tag_ok: infimum_tag == b"infimum\0",
            supremum_tag_ok: supremum_tag == b"supremum",
        })
    }
}

/// Byte offset of page directory slot `n` (slot 0 is the infimum's).
pub fn dir_slot_offset(n: usize) -> usize {
    PAGE_SIZE - PAGE_DIR - (n + 1) * PAGE_DIR_SLOT_SIZE
}

/// Record offset stored in directory slot `n`, or `None` if `n` is not
/// below the page's `n_dir_slots`.
///
/// # Examples
///
/// ```
/// use ibd::innodb::constants::*;
/// use ibd::innodb::index::{dir_slot, dir_slot_offset};
/// use byteorder::{BigEndian, ByteOrder};
///
/// let mut page = vec![0u8; PAGE_SIZE];
/// BigEndian::write_u16(&mut page[PAGE_HEADER + PAGE_N_DIR_SLOTS..], 2);
/// BigEndian::write_u16(&mut page[dir_slot_offset(0)..], PAGE_NEW_INFIMUM as u16);
/// BigEndian::write_u16(&mut page[dir_slot_offset(1)..], PAGE_NEW_SUPREMUM as u16);
///
/// assert_eq!(dir_slot_offset(0), 16374);
/// assert_eq!(dir_slot(&page, 1), Some(112));
/// assert_eq!(dir_slot(&page, 2), None);
/// ```
pub fn dir_slot(page_data: &[u8], n: usize) -> Option<u16> {
    let n_slots = mach::read_u16(page_data, PAGE_HEADER + PAGE_N_DIR_SLOTS)? as usize;
    if n >= n_slots || page_data.len() < PAGE_SIZE {
        return None;
    }
    mach::read_u16(page_data, dir_slot_offset(n))
}

/// One page directory slot with the header of the record that owns it.
#[derive(Debug, Clone, Serialize)]
pub struct DirSlot {
    pub slot: usize,
    pub owner_offset: u16,
    /// Number of records the owner owns (its `n_owned`).
    pub n_owned: u8,
}

/// All page directory slots, in slot order. Stops at the first slot whose
/// owner record header cannot be read.
pub fn dir_slots(page_data: &[u8]) -> Vec<DirSlot> {
    let mut slots = Vec::new();
    let mut n = 0;
    while let Some(owner_offset) = dir_slot(page_data, n) {
        let Some(header) = RecordHeader::parse(page_data, owner_offset as usize) else {
            break;
        };
        slots.push(DirSlot {
            slot: n,
            owner_offset,
            n_owned: header.n_owned,
        });
        n += 1;
    }
    slots
}
