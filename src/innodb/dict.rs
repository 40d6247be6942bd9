//! Data dictionary header.
//!
//! Page 7 of the system tablespace holds the dictionary header: the
//! counters InnoDB hands out row, table and index IDs from, and the root
//! pages of the legacy `SYS_*` dictionary tables' clustered indexes.

use serde::Serialize;

use crate::buf::{BufferPool, FetchMode};
use crate::innodb::constants::*;
use crate::innodb::index::FsegHeader;
use crate::innodb::mach;
use crate::innodb::page::PageId;
use crate::IdbError;

/// Decoded `DICT_HDR` (at `FIL_PAGE_DATA` of page 0:7).
#[derive(Debug, Clone, Serialize)]
pub struct DictHeader {
    pub row_id: u64,
    pub table_id: u64,
    pub index_id: u64,
    pub max_space_id: u32,
    pub mix_id_low: u32,
    /// Root of the SYS_TABLES clustered index.
    pub tables_root: u32,
    /// Root of the SYS_TABLE_IDS secondary index.
    pub table_ids_root: u32,
    pub columns_root: u32,
    pub indexes_root: u32,
    pub fields_root: u32,
    /// Segment holding the header page itself.
    pub fseg: FsegHeader,
}

impl DictHeader {
    /// Page ID of the dictionary header.
    pub const PAGE_ID: PageId = PageId {
        space_id: DICT_HDR_SPACE as u64,
        page_no: DICT_HDR_PAGE_NO as u64,
    };

    /// Parse the dictionary header from a full page buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibd::innodb::constants::*;
    /// use ibd::innodb::dict::DictHeader;
    /// use byteorder::{BigEndian, ByteOrder};
    ///
    /// let mut page = vec![0u8; PAGE_SIZE];
    /// BigEndian::write_u64(&mut page[DICT_HDR + DICT_HDR_TABLE_ID..], 1030);
    /// BigEndian::write_u32(&mut page[DICT_HDR + DICT_HDR_TABLES..], 8);
    ///
    /// let hdr = DictHeader::parse(&page).unwrap();
    /// assert_eq!(hdr.table_id, 1030);
    /// assert_eq!(hdr.tables_root, 8);
    /// ```
    pub fn parse(page: &[u8]) -> Option<Self> {
        let base = DICT_HDR;
        Some(DictHeader {
            row_id: mach::read_u64(page, base + DICT_HDR_ROW_ID)?,
            table_id: mach::read_u64(page, base + DICT_HDR_TABLE_ID)?,
            index_id: mach::read_u64(page, base + DICT_HDR_INDEX_ID)?,
            max_space_id: mach::read_u32(page, base + DICT_HDR_MAX_SPACE_ID)?,
            mix_id_low: mach::read_u32(page, base + DICT_HDR_MIX_ID_LOW)?,
            tables_root: mach::read_u32(page, base + DICT_HDR_TABLES)?,
            table_ids_root: mach::read_u32(page, base + DICT_HDR_TABLE_IDS)?,
            columns_root: mach::read_u32(page, base + DICT_HDR_COLUMNS)?,
            indexes_root: mach::read_u32(page, base + DICT_HDR_INDEXES)?,
            fields_root: mach::read_u32(page, base + DICT_HDR_FIELDS)?,
            fseg: FsegHeader::parse(page, base + DICT_HDR_FSEG_HEADER)?,
        })
    }

    /// Read the header of the system tablespace through `pool`.
    pub fn fetch(pool: &BufferPool) -> Result<Self, IdbError> {
        let page = pool.get_page(Self::PAGE_ID, FetchMode::Normal)?;
        Self::parse(&page)
            .ok_or_else(|| IdbError::Parse("cannot parse dictionary header".to_string()))
    }

    /// Root pages of the system tables, by table name.
    pub fn system_roots(&self) -> [(&'static str, PageId); 5] {
        let root = |page_no: u32| PageId::new(DICT_HDR_SPACE as u64, page_no as u64);
        [
            ("SYS_TABLES", root(self.tables_root)),
            ("SYS_TABLE_IDS", root(self.table_ids_root)),
            ("SYS_COLUMNS", root(self.columns_root)),
            ("SYS_INDEXES", root(self.indexes_root)),
            ("SYS_FIELDS", root(self.fields_root)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buf::BufferPoolConfig;
    use crate::innodb::tablespace::FileSpaceReader;
    use byteorder::{BigEndian, ByteOrder};
    use std::sync::Arc;

    fn system_image() -> Vec<u8> {
        let mut image = vec![0u8; 8 * PAGE_SIZE];
        let page = &mut image[7 * PAGE_SIZE..];
        let base = DICT_HDR;
        BigEndian::write_u64(&mut page[base + DICT_HDR_ROW_ID..], 512);
        BigEndian::write_u64(&mut page[base + DICT_HDR_INDEX_ID..], 77);
        BigEndian::write_u32(&mut page[base + DICT_HDR_MAX_SPACE_ID..], 12);
        BigEndian::write_u32(&mut page[base + DICT_HDR_TABLES..], 8);
        BigEndian::write_u32(&mut page[base + DICT_HDR_TABLE_IDS..], 9);
        BigEndian::write_u32(&mut page[base + DICT_HDR_COLUMNS..], 10);
        BigEndian::write_u32(&mut page[base + DICT_HDR_INDEXES..], 11);
        BigEndian::write_u32(&mut page[base + DICT_HDR_FIELDS..], 12);
        BigEndian::write_u32(&mut page[base + DICT_HDR_FSEG_HEADER + FSEG_HDR_PAGE_NO..], 2);
        BigEndian::write_u16(&mut page[base + DICT_HDR_FSEG_HEADER + FSEG_HDR_OFFSET..], 50);
        image
    }

    #[test]
    fn test_fetch_through_pool() {
        let pool = BufferPool::new(BufferPoolConfig::default().with_frames(2)).unwrap();
        pool.add_space(Arc::new(FileSpaceReader::from_bytes(system_image()).unwrap()));

        let hdr = DictHeader::fetch(&pool).unwrap();
        assert_eq!(hdr.row_id, 512);
        assert_eq!(hdr.index_id, 77);
        assert_eq!(hdr.max_space_id, 12);
        assert_eq!(hdr.fseg.page_no, 2);
        assert_eq!(hdr.fseg.offset, 50);

        let roots = hdr.system_roots();
        assert_eq!(roots[0], ("SYS_TABLES", PageId::new(0, 8)));
        assert_eq!(roots[4], ("SYS_FIELDS", PageId::new(0, 12)));
    }

    #[test]
    fn test_fetch_without_system_space() {
        let pool = BufferPool::new(BufferPoolConfig::default().with_frames(2)).unwrap();
        assert!(matches!(DictHeader::fetch(&pool), Err(IdbError::UnknownSpace(0))));
    }

    #[test]
    fn test_short_page() {
        assert!(DictHeader::parse(&[0u8; 64]).is_none());
    }
}
