//! InnoDB page type definitions.
//!
//! Maps the 2-byte page type field (bytes 24-25 of the FIL header) to a
//! [`PageType`] enum. Values follow `fil0fil.h` of MySQL 8.0; codes this
//! crate does not know are kept verbatim in [`PageType::Other`] so that a
//! page can always be re-identified.

use serde::Serialize;
use std::fmt;

use crate::innodb::constants::*;

/// InnoDB page types of MySQL 8.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PageType {
    /// Freshly allocated, type field not initialized (FIL_PAGE_TYPE_ALLOCATED = 0)
    Allocated,
    /// Unused page type marker (FIL_PAGE_TYPE_UNUSED = 1)
    Unused,
    /// Undo log page (FIL_PAGE_UNDO_LOG = 2)
    UndoLog,
    /// File segment inode (FIL_PAGE_INODE = 3)
    Inode,
    /// Insert buffer free list (FIL_PAGE_IBUF_FREE_LIST = 4)
    IbufFreeList,
    /// Insert buffer bitmap (FIL_PAGE_IBUF_BITMAP = 5)
    IbufBitmap,
    /// System internal page (FIL_PAGE_TYPE_SYS = 6)
    Sys,
    /// Transaction system header (FIL_PAGE_TYPE_TRX_SYS = 7)
    TrxSys,
    /// File space header, page 0 of each tablespace (FIL_PAGE_TYPE_FSP_HDR = 8)
    FspHdr,
    /// Extent descriptor (FIL_PAGE_TYPE_XDES = 9)
    Xdes,
    /// Uncompressed BLOB page (FIL_PAGE_TYPE_BLOB = 10)
    Blob,
    /// Unknown/reserved (FIL_PAGE_TYPE_UNKNOWN = 13)
    Unknown,
    /// SDI BLOB page (FIL_PAGE_SDI_BLOB = 18)
    SdiBlob,
    /// LOB index page (FIL_PAGE_TYPE_LOB_INDEX = 22)
    LobIndex,
    /// LOB data page (FIL_PAGE_TYPE_LOB_DATA = 23)
    LobData,
    /// LOB first page (FIL_PAGE_TYPE_LOB_FIRST = 24)
    LobFirst,
    /// SDI index page (FIL_PAGE_SDI = 17853)
    Sdi,
    /// R-tree index page for spatial indexes (FIL_PAGE_RTREE = 17854)
    Rtree,
    /// B+Tree index page for table and index data (FIL_PAGE_INDEX = 17855)
    Index,
    /// Any other code, kept as read from disk.
    Other(u16),
}

impl PageType {
    /// Parse a page type from a u16 value read from the FIL header.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibd::innodb::page_types::PageType;
    ///
    /// assert_eq!(PageType::from_u16(17855), PageType::Index);
    /// assert_eq!(PageType::from_u16(8), PageType::FspHdr);
    /// assert_eq!(PageType::from_u16(9), PageType::Xdes);
    ///
    /// // Unrecognized values keep their code
    /// assert_eq!(PageType::from_u16(9999), PageType::Other(9999));
    /// assert_eq!(PageType::from_u16(9999).as_u16(), 9999);
    /// ```
    pub fn from_u16(value: u16) -> Self {
        match value {
            FIL_PAGE_TYPE_ALLOCATED => PageType::Allocated,
            1 => PageType::Unused,
            2 => PageType::UndoLog,
            FIL_PAGE_INODE => PageType::Inode,
            4 => PageType::IbufFreeList,
            5 => PageType::IbufBitmap,
            6 => PageType::Sys,
            7 => PageType::TrxSys,
            FIL_PAGE_TYPE_FSP_HDR => PageType::FspHdr,
            FIL_PAGE_TYPE_XDES => PageType::Xdes,
            10 => PageType::Blob,
            13 => PageType::Unknown,
            18 => PageType::SdiBlob,
            22 => PageType::LobIndex,
            23 => PageType::LobData,
            24 => PageType::LobFirst,
            FIL_PAGE_SDI => PageType::Sdi,
            FIL_PAGE_RTREE => PageType::Rtree,
            FIL_PAGE_INDEX => PageType::Index,
            other => PageType::Other(other),
        }
    }

    /// Returns the raw u16 value of this page type.
    pub fn as_u16(self) -> u16 {
        match self {
            PageType::Allocated => FIL_PAGE_TYPE_ALLOCATED,
            PageType::Unused => 1,
            PageType::UndoLog => 2,
            PageType::Inode => FIL_PAGE_INODE,
            PageType::IbufFreeList => 4,
            PageType::IbufBitmap => 5,
            PageType::Sys => 6,
            PageType::TrxSys => 7,
            PageType::FspHdr => FIL_PAGE_TYPE_FSP_HDR,
            PageType::Xdes => FIL_PAGE_TYPE_XDES,
            PageType::Blob => 10,
            PageType::Unknown => 13,
            PageType::SdiBlob => 18,
            PageType::LobIndex => 22,
            PageType::LobData => 23,
            PageType::LobFirst => 24,
            PageType::Sdi => FIL_PAGE_SDI,
            PageType::Rtree => FIL_PAGE_RTREE,
            PageType::Index => FIL_PAGE_INDEX,
            PageType::Other(v) => v,
        }
    }

    /// Returns the MySQL source name of this page type.
    pub fn name(self) -> &'static str {
        match self {
            PageType::Allocated => "FIL_PAGE_TYPE_ALLOCATED",
            PageType::Unused => "FIL_PAGE_TYPE_UNUSED",
            PageType::UndoLog => "FIL_PAGE_UNDO_LOG",
            PageType::Inode => "FIL_PAGE_INODE",
            PageType::IbufFreeList => "FIL_PAGE_IBUF_FREE_LIST",
            PageType::IbufBitmap => "FIL_PAGE_IBUF_BITMAP",
            PageType::Sys => "FIL_PAGE_TYPE_SYS",
            PageType::TrxSys => "FIL_PAGE_TYPE_TRX_SYS",
            PageType::FspHdr => "FIL_PAGE_TYPE_FSP_HDR",
            PageType::Xdes => "FIL_PAGE_TYPE_XDES",
            PageType::Blob => "FIL_PAGE_TYPE_BLOB",
            PageType::Unknown => "FIL_PAGE_TYPE_UNKNOWN",
            PageType::SdiBlob => "FIL_PAGE_SDI_BLOB",
            PageType::LobIndex => "FIL_PAGE_TYPE_LOB_INDEX",
            PageType::LobData => "FIL_PAGE_TYPE_LOB_DATA",
            PageType::LobFirst => "FIL_PAGE_TYPE_LOB_FIRST",
            PageType::Sdi => "FIL_PAGE_SDI",
            PageType::Rtree => "FIL_PAGE_RTREE",
            PageType::Index => "FIL_PAGE_INDEX",
            PageType::Other(_) => "OTHER",
        }
    }

    /// Returns true for page types that carry an INDEX page header.
    pub fn is_index(self) -> bool {
        matches!(self, PageType::Index | PageType::Sdi | PageType::Rtree)
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageType::Other(v) => write!(f, "not found type: {}", v),
            _ => f.write_str(self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_type_from_u16() {
        assert_eq!(PageType::from_u16(0), PageType::Allocated);
        assert_eq!(PageType::from_u16(3), PageType::Inode);
        assert_eq!(PageType::from_u16(8), PageType::FspHdr);
        assert_eq!(PageType::from_u16(9), PageType::Xdes);
        assert_eq!(PageType::from_u16(17853), PageType::Sdi);
        assert_eq!(PageType::from_u16(17855), PageType::Index);
    }

    #[test]
    fn test_page_type_roundtrip() {
        for v in [0u16, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 13, 18, 22, 23, 24, 17853, 17854, 17855, 31] {
            assert_eq!(PageType::from_u16(v).as_u16(), v);
        }
    }

    #[test]
    fn test_page_type_display() {
        assert_eq!(PageType::Index.to_string(), "FIL_PAGE_INDEX");
        assert_eq!(PageType::Other(77).to_string(), "not found type: 77");
    }

    #[test]
    fn test_index_like_types() {
        assert!(PageType::Index.is_index());
        assert!(PageType::Sdi.is_index());
        assert!(!PageType::Inode.is_index());
    }
}
