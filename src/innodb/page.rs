//! InnoDB page header and trailer parsing.
//!
//! Every InnoDB page begins with a 38-byte FIL header ([`FilHeader`]) containing
//! the checksum, page number, prev/next pointers, LSN, page type, flush LSN, and
//! space ID. The last 8 bytes form the FIL trailer ([`FilTrailer`]) with the
//! old-style checksum and low 32 bits of the LSN.
//!
//! Page 0 of every tablespace also contains the FSP header ([`FspHeader`]) at
//! byte offset 38, which stores the space size and the roots of the extent
//! and inode lists.
//!
//! [`Page`] decodes a whole page buffer once, by page type, into the
//! structures a reader needs for that kind of page.

use std::fmt;

use serde::Serialize;

use crate::innodb::constants::*;
use crate::innodb::flst::ListBaseNode;
use crate::innodb::index::{FsegHeader, IndexHeader, SystemRecords};
use crate::innodb::inode::InodePage;
use crate::innodb::mach;
use crate::innodb::page_types::PageType;
use crate::innodb::xdes::{self, XdesEntry};

/// Globally unique page identity: space id plus page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PageId {
    pub space_id: u64,
    pub page_no: u64,
}

impl PageId {
    pub fn new(space_id: u64, page_no: u64) -> Self {
        PageId { space_id, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.space_id, self.page_no)
    }
}

/// Parsed FIL header (38 bytes, present at the start of every InnoDB page).
#[derive(Debug, Clone, Serialize)]
pub struct FilHeader {
    /// Checksum (or space id in older formats). Bytes 0-3.
    pub checksum: u32,
    /// Page number within the tablespace. Bytes 4-7.
    pub page_number: u32,
    /// Previous page at the same B+Tree level. Bytes 8-11.
    /// FIL_NULL (0xFFFFFFFF) if not used.
    pub prev_page: u32,
    /// Next page at the same B+Tree level. Bytes 12-15.
    /// FIL_NULL (0xFFFFFFFF) if not used.
    pub next_page: u32,
    /// LSN of newest modification to this page. Bytes 16-23.
    pub lsn: u64,
    /// Page type. Bytes 24-25.
    pub page_type: PageType,
    /// Flush LSN (only meaningful for page 0 of the system tablespace). Bytes 26-33.
    pub flush_lsn: u64,
    /// Space ID this page belongs to. Bytes 34-37.
    pub space_id: u32,
}

impl FilHeader {
    /// Parse a FIL header from a byte slice.
    ///
    /// The slice must be at least SIZE_FIL_HEAD (38) bytes.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < SIZE_FIL_HEAD {
            return None;
        }

        Some(FilHeader {
            checksum: mach::read_u32(data, FIL_PAGE_SPACE_OR_CHKSUM)?,
            page_number: mach::read_u32(data, FIL_PAGE_OFFSET)?,
            prev_page: mach::read_u32(data, FIL_PAGE_PREV)?,
            next_page: mach::read_u32(data, FIL_PAGE_NEXT)?,
            lsn: mach::read_u64(data, FIL_PAGE_LSN)?,
            page_type: PageType::from_u16(mach::read_u16(data, FIL_PAGE_TYPE)?),
            flush_lsn: mach::read_u64(data, FIL_PAGE_FILE_FLUSH_LSN)?,
            space_id: mach::read_u32(data, FIL_PAGE_SPACE_ID)?,
        })
    }

    /// Returns true if prev_page points at a page.
    pub fn has_prev(&self) -> bool {
        self.prev_page != FIL_NULL
    }

    /// Returns true if next_page points at a page.
    pub fn has_next(&self) -> bool {
        self.next_page != FIL_NULL
    }
}

/// Parsed FIL trailer (8 bytes, present at the end of every InnoDB page).
#[derive(Debug, Clone, Serialize)]
pub struct FilTrailer {
    /// Old-style checksum. Bytes 0-3 of trailer.
    pub checksum: u32,
    /// Low 32 bits of the LSN. Bytes 4-7 of trailer.
    pub lsn_low32: u32,
}

impl FilTrailer {
    /// Parse the FIL trailer from a full page buffer.
    pub fn parse(page_data: &[u8]) -> Option<Self> {
        let base = page_data.len().checked_sub(SIZE_FIL_TRAILER)?;
        Some(FilTrailer {
            checksum: mach::read_u32(page_data, base)?,
            lsn_low32: mach::read_u32(page_data, base + 4)?,
        })
    }
}

/// Parsed FSP header (from page 0 of a tablespace, starts at FIL_PAGE_DATA).
#[derive(Debug, Clone, Serialize)]
pub struct FspHeader {
    /// Space ID.
    pub space_id: u32,
    /// Current size of the tablespace in pages.
    pub size: u32,
    /// Minimum page number not yet initialized.
    pub free_limit: u32,
    /// Space flags (page size, compression, encryption info).
    pub flags: u32,
    /// Number of used pages in the FSP_FREE_FRAG list.
    pub frag_n_used: u32,
    /// Extents with no used page.
    pub free: ListBaseNode,
    /// Extents with some free pages, allocated page by page.
    pub free_frag: ListBaseNode,
    /// Fragment extents with every page used.
    pub full_frag: ListBaseNode,
    /// First segment id not yet assigned.
    pub next_unused_seg_id: u64,
    /// INODE pages with no free inode slot.
    pub seg_inodes_full: ListBaseNode,
    /// INODE pages with at least one free inode slot.
    pub seg_inodes_free: ListBaseNode,
}

impl FspHeader {
    /// Parse the FSP header from page 0's data area.
    ///
    /// `page_data` should be the full page buffer; the header starts at
    /// FIL_PAGE_DATA (byte 38).
    ///
    /// # Examples
    ///
    /// ```
    /// use ibd::innodb::constants::*;
    /// use ibd::innodb::page::FspHeader;
    /// use byteorder::{BigEndian, ByteOrder};
    ///
    /// let mut page = vec![0u8; PAGE_SIZE];
    /// let fsp = FSP_HEADER_OFFSET;
    /// BigEndian::write_u32(&mut page[fsp + FSP_SPACE_ID..], 12);
    /// BigEndian::write_u32(&mut page[fsp + FSP_SIZE..], 448);
    /// BigEndian::write_u32(&mut page[fsp + FSP_FREE + FLST_LEN..], 2);
    /// BigEndian::write_u64(&mut page[fsp + FSP_SEG_ID..], 9);
    ///
    /// let hdr = FspHeader::parse(&page).unwrap();
    /// assert_eq!(hdr.space_id, 12);
    /// assert_eq!(hdr.size, 448);
    /// assert_eq!(hdr.free.length, 2);
    /// assert_eq!(hdr.next_unused_seg_id, 9);
    /// ```
    pub fn parse(page_data: &[u8]) -> Option<Self> {
        let base = FSP_HEADER_OFFSET;
        if page_data.len() < base + FSP_HEADER_SIZE {
            return None;
        }

        Some(FspHeader {
            space_id: mach::read_u32(page_data, base + FSP_SPACE_ID)?,
            size: mach::read_u32(page_data, base + FSP_SIZE)?,
            free_limit: mach::read_u32(page_data, base + FSP_FREE_LIMIT)?,
            flags: mach::read_u32(page_data, base + FSP_SPACE_FLAGS)?,
            frag_n_used: mach::read_u32(page_data, base + FSP_FRAG_N_USED)?,
            free: ListBaseNode::parse(page_data, base + FSP_FREE)?,
            free_frag: ListBaseNode::parse(page_data, base + FSP_FREE_FRAG)?,
            full_frag: ListBaseNode::parse(page_data, base + FSP_FULL_FRAG)?,
            next_unused_seg_id: mach::read_u64(page_data, base + FSP_SEG_ID)?,
            seg_inodes_full: ListBaseNode::parse(page_data, base + FSP_SEG_INODES_FULL)?,
            seg_inodes_free: ListBaseNode::parse(page_data, base + FSP_SEG_INODES_FREE)?,
        })
    }
}

/// A page buffer decoded according to its FIL page type.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Page {
    /// Page 0: FSP header plus the first descriptor array.
    FspHdr {
        fil: FilHeader,
        fsp: FspHeader,
        extents: Vec<XdesEntry>,
    },
    /// Extent descriptor page (every 16384th page after page 0).
    Xdes {
        fil: FilHeader,
        extents: Vec<XdesEntry>,
    },
    /// Segment inode page.
    Inode { fil: FilHeader, inode: InodePage },
    /// B+Tree page (INDEX, SDI or R-tree).
    Index {
        fil: FilHeader,
        index: IndexHeader,
        leaf_segment: Option<FsegHeader>,
        internal_segment: Option<FsegHeader>,
        system_records: Option<SystemRecords>,
    },
    /// Any other page type; only the FIL header is decoded.
    Other { fil: FilHeader },
}

impl Page {
    /// Decode a page buffer by the page type in its FIL header.
    ///
    /// Returns `None` only when the FIL header itself cannot be read. A
    /// page whose type-specific structures fail to decode falls back to
    /// [`Page::Other`].
    pub fn parse(page_data: &[u8]) -> Option<Self> {
        let fil = FilHeader::parse(page_data)?;

        let decoded = match fil.page_type {
            PageType::FspHdr => FspHeader::parse(page_data).map(|fsp| Page::FspHdr {
                fil: fil.clone(),
                fsp,
                extents: xdes::initialized_entries(page_data),
            }),
            PageType::Xdes => Some(Page::Xdes {
                fil: fil.clone(),
                extents: xdes::initialized_entries(page_data),
            }),
            PageType::Inode => InodePage::parse(page_data).map(|inode| Page::Inode {
                fil: fil.clone(),
                inode,
            }),
            t if t.is_index() => IndexHeader::parse(page_data).map(|index| Page::Index {
                fil: fil.clone(),
                index,
                leaf_segment: FsegHeader::parse_leaf(page_data),
                internal_segment: FsegHeader::parse_internal(page_data),
                system_records: SystemRecords::parse(page_data),
            }),
            _ => None,
        };

        Some(decoded.unwrap_or(Page::Other { fil }))
    }

    /// The FIL header of the decoded page.
    pub fn fil(&self) -> &FilHeader {
        match self {
            Page::FspHdr { fil, .. }
            | Page::Xdes { fil, .. }
            | Page::Inode { fil, .. }
            | Page::Index { fil, .. }
            | Page::Other { fil } => fil,
        }
    }

    pub fn page_type(&self) -> PageType {
        self.fil().page_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};

    #[allow(clippy::too_many_arguments)]
    fn make_fil_header_bytes(
        checksum: u32,
        page_num: u32,
        prev: u32,
        next: u32,
        lsn: u64,
        page_type: u16,
        flush_lsn: u64,
        space_id: u32,
    ) -> Vec<u8> {
        let mut buf = vec![0u8; PAGE_SIZE];
        BigEndian::write_u32(&mut buf[FIL_PAGE_SPACE_OR_CHKSUM..], checksum);
        BigEndian::write_u32(&mut buf[FIL_PAGE_OFFSET..], page_num);
        BigEndian::write_u32(&mut buf[FIL_PAGE_PREV..], prev);
        BigEndian::write_u32(&mut buf[FIL_PAGE_NEXT..], next);
        BigEndian::write_u64(&mut buf[FIL_PAGE_LSN..], lsn);
        BigEndian::write_u16(&mut buf[FIL_PAGE_TYPE..], page_type);
        BigEndian::write_u64(&mut buf[FIL_PAGE_FILE_FLUSH_LSN..], flush_lsn);
        BigEndian::write_u32(&mut buf[FIL_PAGE_SPACE_ID..], space_id);
        buf
    }

    #[test]
    fn test_fil_header_parse() {
        let data = make_fil_header_bytes(0x12345678, 42, 41, 43, 1000, FIL_PAGE_INDEX, 2000, 5);
        let hdr = FilHeader::parse(&data).unwrap();
        assert_eq!(hdr.checksum, 0x12345678);
        assert_eq!(hdr.page_number, 42);
        assert_eq!(hdr.prev_page, 41);
        assert_eq!(hdr.next_page, 43);
        assert_eq!(hdr.lsn, 1000);
        assert_eq!(hdr.page_type, PageType::Index);
        assert_eq!(hdr.flush_lsn, 2000);
        assert_eq!(hdr.space_id, 5);
        assert!(hdr.has_prev());
        assert!(hdr.has_next());
    }

    #[test]
    fn test_fil_header_null_pages() {
        let data = make_fil_header_bytes(0, 0, FIL_NULL, FIL_NULL, 0, 0, 0, 0);
        let hdr = FilHeader::parse(&data).unwrap();
        assert!(!hdr.has_prev());
        assert!(!hdr.has_next());
    }

    #[test]
    fn test_fil_header_too_short() {
        let data = vec![0u8; 10];
        assert!(FilHeader::parse(&data).is_none());
        assert!(Page::parse(&data).is_none());
    }

    #[test]
    fn test_fil_trailer_parse() {
        let mut data = vec![0u8; PAGE_SIZE];
        BigEndian::write_u32(&mut data[PAGE_SIZE - 8..], 0xAABBCCDD);
        BigEndian::write_u32(&mut data[PAGE_SIZE - 4..], 0x11223344);
        let trl = FilTrailer::parse(&data).unwrap();
        assert_eq!(trl.checksum, 0xAABBCCDD);
        assert_eq!(trl.lsn_low32, 0x11223344);
    }

    #[test]
    fn test_fsp_header_list_offsets() {
        let mut page = make_fil_header_bytes(0, 0, FIL_NULL, FIL_NULL, 0, FIL_PAGE_TYPE_FSP_HDR, 0, 3);
        let fsp = FSP_HEADER_OFFSET;
        // Each base node gets a distinct length so a shifted offset shows up.
        for (i, off) in [
            FSP_FREE,
            FSP_FREE_FRAG,
            FSP_FULL_FRAG,
            FSP_SEG_INODES_FULL,
            FSP_SEG_INODES_FREE,
        ]
        .iter()
        .enumerate()
        {
            BigEndian::write_u32(&mut page[fsp + off + FLST_LEN..], i as u32 + 1);
            BigEndian::write_u32(&mut page[fsp + off + FLST_FIRST..], FIL_NULL);
            BigEndian::write_u32(&mut page[fsp + off + FLST_LAST..], FIL_NULL);
        }
        BigEndian::write_u64(&mut page[fsp + FSP_SEG_ID..], 0x0102030405060708);

        let hdr = FspHeader::parse(&page).unwrap();
        assert_eq!(hdr.free.length, 1);
        assert_eq!(hdr.free_frag.length, 2);
        assert_eq!(hdr.full_frag.length, 3);
        assert_eq!(hdr.seg_inodes_full.length, 4);
        assert_eq!(hdr.seg_inodes_free.length, 5);
        assert_eq!(hdr.next_unused_seg_id, 0x0102030405060708);
        assert!(!hdr.free.first.valid());
    }

    #[test]
    fn test_page_dispatch_by_type() {
        let fsp = make_fil_header_bytes(0, 0, FIL_NULL, FIL_NULL, 0, FIL_PAGE_TYPE_FSP_HDR, 0, 1);
        assert!(matches!(Page::parse(&fsp), Some(Page::FspHdr { .. })));

        let index = make_fil_header_bytes(0, 4, FIL_NULL, FIL_NULL, 0, FIL_PAGE_INDEX, 0, 1);
        let page = Page::parse(&index).unwrap();
        assert!(matches!(page, Page::Index { .. }));
        assert_eq!(page.page_type(), PageType::Index);

        let other = make_fil_header_bytes(0, 5, FIL_NULL, FIL_NULL, 0, 2, 0, 1);
        assert!(matches!(Page::parse(&other), Some(Page::Other { .. })));
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(PageId::new(3, 17).to_string(), "3:17");
    }
}
