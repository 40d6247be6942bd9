//! Record headers and in-page record chains for InnoDB compact format.
//!
//! In compact format, 5 bytes precede each record origin:
//! - byte -5: info bits (delete mark, min_rec flag) and n_owned
//! - bytes -4/-3: heap_no (13 bits) and record status (3 bits)
//! - bytes -2/-1: next-record pointer, relative to the record origin
//!
//! Records of a page form a singly-linked chain from the infimum
//! pseudo-record to the supremum. [`RecordChain`] follows that chain;
//! [`walk_records`] collects it.

use serde::Serialize;

use crate::innodb::constants::*;
use crate::innodb::mach;
use crate::innodb::page::PageId;

/// Record status from the 3 low bits of the header's heap_no/status field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordType {
    /// Ordinary user record (leaf page).
    Ordinary,
    /// Node pointer record (non-leaf page).
    NodePtr,
    /// Infimum system record.
    Infimum,
    /// Supremum system record.
    Supremum,
}

impl RecordType {
    /// Convert a 3-bit status value to a `RecordType`.
    ///
    /// Only the lowest 3 bits of `val` are used; reserved values map to
    /// `Ordinary`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibd::innodb::record::RecordType;
    ///
    /// assert_eq!(RecordType::from_u8(0), RecordType::Ordinary);
    /// assert_eq!(RecordType::from_u8(1), RecordType::NodePtr);
    /// assert_eq!(RecordType::from_u8(2), RecordType::Infimum);
    /// assert_eq!(RecordType::from_u8(3), RecordType::Supremum);
    /// assert_eq!(RecordType::from_u8(0x09), RecordType::NodePtr);
    /// ```
    pub fn from_u8(val: u8) -> Self {
        match val & REC_NEW_STATUS_MASK {
            REC_STATUS_NODE_PTR => RecordType::NodePtr,
            REC_STATUS_INFIMUM => RecordType::Infimum,
            REC_STATUS_SUPREMUM => RecordType::Supremum,
            _ => RecordType::Ordinary,
        }
    }

    /// Returns the MySQL source-style name (e.g. `"REC_STATUS_ORDINARY"`).
    pub fn name(&self) -> &'static str {
        match self {
            RecordType::Ordinary => "REC_STATUS_ORDINARY",
            RecordType::NodePtr => "REC_STATUS_NODE_PTR",
            RecordType::Infimum => "REC_STATUS_INFIMUM",
            RecordType::Supremum => "REC_STATUS_SUPREMUM",
        }
    }
}

/// Decoded compact record header (the 5 bytes before a record origin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordHeader {
    /// Upper nibble of byte -5.
    pub info_bits: u8,
    /// Number of records owned by this record in the page directory.
    pub n_owned: u8,
    /// Delete mark flag.
    pub delete_mark: bool,
    /// Min-rec flag (leftmost node pointer on a non-leaf level).
    pub min_rec: bool,
    /// Record's position in the heap.
    pub heap_no: u16,
    pub rec_type: RecordType,
    /// Raw relative next-record pointer; 0 ends the chain.
    pub next_offset: u16,
}

impl RecordHeader {
    /// Parse the header of the record whose origin is at `origin`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibd::innodb::record::{RecordHeader, RecordType};
    /// use byteorder::{BigEndian, ByteOrder};
    ///
    /// let mut page = vec![0u8; 64];
    /// let origin = 20;
    /// // delete_mark (0x20), n_owned=2
    /// page[origin - 5] = 0x22;
    /// // heap_no=7, status=ordinary
    /// BigEndian::write_u16(&mut page[origin - 4..], 7 << 3);
    /// BigEndian::write_u16(&mut page[origin - 2..], 42);
    ///
    /// let hdr = RecordHeader::parse(&page, origin).unwrap();
    /// assert_eq!(hdr.n_owned, 2);
    /// assert!(hdr.delete_mark);
    /// assert!(!hdr.min_rec);
    /// assert_eq!(hdr.heap_no, 7);
    /// assert_eq!(hdr.rec_type, RecordType::Ordinary);
    /// assert_eq!(hdr.next_offset, 42);
    ///
    /// assert!(RecordHeader::parse(&page, 4).is_none());
    /// ```
    pub fn parse(page: &[u8], origin: usize) -> Option<Self> {
        let start = origin.checked_sub(REC_N_NEW_EXTRA_BYTES)?;
        let extra = mach::field(page, start, REC_N_NEW_EXTRA_BYTES)?;

        let byte0 = extra[0];
        let info_bits = byte0 & REC_INFO_BITS_MASK;
        let heap_status = mach::read_u16(page, origin - REC_NEW_HEAP_NO)?;

        Some(RecordHeader {
            info_bits: info_bits >> 4,
            n_owned: byte0 & REC_N_OWNED_MASK,
            delete_mark: info_bits & REC_INFO_DELETED_FLAG != 0,
            min_rec: info_bits & REC_INFO_MIN_REC_FLAG != 0,
            heap_no: (heap_status & REC_HEAP_NO_MASK) >> REC_HEAP_NO_SHIFT,
            rec_type: RecordType::from_u8(extra[REC_N_NEW_EXTRA_BYTES - REC_NEW_STATUS]),
            next_offset: mach::read_u16(page, origin - REC_NEXT)?,
        })
    }

    /// Absolute offset of the next record, see [`next_record_offset`].
    pub fn next(&self, origin: usize) -> Option<usize> {
        next_record_offset(origin, self.next_offset)
    }
}

/// Absolute in-page offset of the record following the one at `origin`.
///
/// The relative pointer is added modulo the page size, so a "negative"
/// step is stored as its 16-bit two's complement. A zero pointer ends the
/// chain.
///
/// # Examples
///
/// ```
/// use ibd::innodb::record::next_record_offset;
///
/// assert_eq!(next_record_offset(99, 101), Some(200));
/// assert_eq!(next_record_offset(200, 65486), Some(150)); // -50
/// assert_eq!(next_record_offset(200, 0), None);
/// ```
pub fn next_record_offset(origin: usize, relative: u16) -> Option<usize> {
    if relative == 0 {
        return None;
    }
    Some((origin + relative as usize) % PAGE_SIZE)
}

/// A record position on a page, with its parsed header.
#[derive(Debug, Clone, Serialize)]
pub struct RecordInfo {
    /// Absolute offset of the record origin within the page.
    pub offset: usize,
    pub header: RecordHeader,
}

/// A record of a specific page: a position, never a borrow of page bytes.
///
/// Valid for decoding only while the page it came from is still fixed in
/// the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Record {
    pub page_id: PageId,
    /// Offset of the record origin within the page.
    pub offset: usize,
    pub header: RecordHeader,
}

impl Record {
    pub fn is_node_ptr(&self) -> bool {
        self.header.rec_type == RecordType::NodePtr
    }

    pub fn is_supremum(&self) -> bool {
        self.header.rec_type == RecordType::Supremum
    }

    pub fn is_user_record(&self) -> bool {
        matches!(
            self.header.rec_type,
            RecordType::Ordinary | RecordType::NodePtr
        )
    }
}

/// Upper bound on chain length: heap_no is 13 bits wide.
const MAX_CHAIN_STEPS: usize = 1 << 13;

/// Iterator over the user records of one page, from the record after the
/// infimum up to (not including) the supremum.
///
/// Stops early on an unreadable header, a zero next pointer before the
/// supremum, or a chain longer than any page can hold; in those cases
/// [`reached_supremum`](Self::reached_supremum) stays false.
pub struct RecordChain<'a> {
    page: &'a [u8],
    next: Option<usize>,
    steps: usize,
    reached_supremum: bool,
}

impl<'a> RecordChain<'a> {
    /// Start at the infimum of a compact page.
    pub fn new(page: &'a [u8]) -> Self {
        let next = RecordHeader::parse(page, PAGE_NEW_INFIMUM)
            .and_then(|h| h.next(PAGE_NEW_INFIMUM));
        RecordChain {
            page,
            next,
            steps: 0,
            reached_supremum: false,
        }
    }

    /// Continue from the record at `origin` (the next yielded record is the
    /// one after it).
    pub fn after(page: &'a [u8], origin: usize) -> Self {
        let next = RecordHeader::parse(page, origin).and_then(|h| h.next(origin));
        RecordChain {
            page,
            next,
            steps: 0,
            reached_supremum: false,
        }
    }

    pub fn reached_supremum(&self) -> bool {
        self.reached_supremum
    }
}

impl Iterator for RecordChain<'_> {
    type Item = RecordInfo;

    fn next(&mut self) -> Option<RecordInfo> {
        let offset = self.next.take()?;
        self.steps += 1;
        if self.steps > MAX_CHAIN_STEPS {
            return None;
        }
        let header = RecordHeader::parse(self.page, offset)?;
        if header.rec_type == RecordType::Supremum {
            self.reached_supremum = true;
            return None;
        }
        self.next = header.next(offset);
        Some(RecordInfo { offset, header })
    }
}

/// Walk all user records on a compact-format INDEX page.
///
/// # Examples
///
/// ```no_run
/// use ibd::innodb::record::walk_records;
/// use ibd::innodb::tablespace::{FileSpaceReader, PageReader};
///
/// let reader = FileSpaceReader::open("table.ibd").unwrap();
/// let mut page = [0u8; 16384];
/// reader.read_page(3, &mut page).unwrap();
/// for rec in walk_records(&page) {
///     println!("Record at offset {}, type: {}", rec.offset, rec.header.rec_type.name());
/// }
/// ```
pub fn walk_records(page: &[u8]) -> Vec<RecordInfo> {
    RecordChain::new(page).collect()
}
