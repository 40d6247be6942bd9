//! Integration tests for ibd-nav.
//!
//! These tests write a small synthetic tablespace to disk (FSP header with
//! one fragment extent, an INODE page and a two-level B+Tree) and navigate
//! it through the buffer pool the way the CLI does.

use byteorder::{BigEndian, ByteOrder};
use std::cmp::Ordering;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

use ibd::buf::{BufferPool, BufferPoolConfig, FetchMode};
use ibd::innodb::btree::{first_record, search, Compare, Index, IndexCursor, NodePtrFormat};
use ibd::innodb::constants::*;
use ibd::innodb::page::{Page, PageId};
use ibd::innodb::record::Record;
use ibd::innodb::space::{IndexSegments, PageAllocation, SpaceSummary};
use ibd::innodb::tablespace::{FileSpaceReader, PageReader};
use ibd::IdbError;

const SPACE_ID: u32 = 7;
const N_PAGES: usize = 9;
const ROOT: u64 = 3;

fn write_addr(page: &mut [u8], offset: usize, page_no: u32, byte: u16) {
    BigEndian::write_u32(&mut page[offset..], page_no);
    BigEndian::write_u16(&mut page[offset + 4..], byte);
}

fn write_fil(page: &mut [u8], page_no: u32, page_type: u16, prev: u32, next: u32) {
    BigEndian::write_u32(&mut page[FIL_PAGE_OFFSET..], page_no);
    BigEndian::write_u32(&mut page[FIL_PAGE_PREV..], prev);
    BigEndian::write_u32(&mut page[FIL_PAGE_NEXT..], next);
    BigEndian::write_u64(&mut page[FIL_PAGE_LSN..], 1000 + page_no as u64);
    BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], page_type);
    BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_ID..], SPACE_ID);
}

/// FSP header page: extent 0 alone on FSP_FREE_FRAG with pages 0..=6 in
/// use, INODE page 2 alone on FSP_SEG_INODES_FREE.
fn build_fsp_hdr_page(page: &mut [u8]) {
    write_fil(page, 0, FIL_PAGE_TYPE_FSP_HDR, FIL_NULL, FIL_NULL);
    let fsp = FSP_HEADER_OFFSET;
    BigEndian::write_u32(&mut page[fsp + FSP_SPACE_ID..], SPACE_ID);
    BigEndian::write_u32(&mut page[fsp + FSP_SIZE..], N_PAGES as u32);
    BigEndian::write_u32(&mut page[fsp + FSP_FREE_LIMIT..], 64);
    BigEndian::write_u32(&mut page[fsp + FSP_FRAG_N_USED..], 7);
    BigEndian::write_u64(&mut page[fsp + FSP_SEG_ID..], 3);
    for list in [FSP_FREE, FSP_FULL_FRAG, FSP_SEG_INODES_FULL] {
        write_addr(page, fsp + list + FLST_FIRST, FIL_NULL, 0);
        write_addr(page, fsp + list + FLST_LAST, FIL_NULL, 0);
    }

    let node = (XDES_ARR_OFFSET + XDES_FLST_NODE) as u16;
    BigEndian::write_u32(&mut page[fsp + FSP_FREE_FRAG + FLST_LEN..], 1);
    write_addr(page, fsp + FSP_FREE_FRAG + FLST_FIRST, 0, node);
    write_addr(page, fsp + FSP_FREE_FRAG + FLST_LAST, 0, node);

    let xdes = XDES_ARR_OFFSET;
    write_addr(page, xdes + XDES_FLST_NODE + FLST_PREV, FIL_NULL, 0);
    write_addr(page, xdes + XDES_FLST_NODE + FLST_NEXT, FIL_NULL, 0);
    BigEndian::write_u32(&mut page[xdes + XDES_STATE..], XDES_FREE_FRAG);
    page[xdes + XDES_BITMAP] = 0x55;
    page[xdes + XDES_BITMAP + 1] = 0x15;

    let inode = FSEG_INODE_PAGE_NODE as u16;
    BigEndian::write_u32(&mut page[fsp + FSP_SEG_INODES_FREE + FLST_LEN..], 1);
    write_addr(page, fsp + FSP_SEG_INODES_FREE + FLST_FIRST, 2, inode);
    write_addr(page, fsp + FSP_SEG_INODES_FREE + FLST_LAST, 2, inode);
}

/// INODE page with the leaf segment (id 1) in slot 0 and the non-leaf
/// segment (id 2) in slot 1.
fn build_inode_page(page: &mut [u8]) {
    write_fil(page, 2, FIL_PAGE_INODE, FIL_NULL, FIL_NULL);
    write_addr(page, FSEG_INODE_PAGE_NODE + FLST_PREV, FIL_NULL, 0);
    write_addr(page, FSEG_INODE_PAGE_NODE + FLST_NEXT, FIL_NULL, 0);
    for (slot, seg_id, frags) in [(0usize, 1u64, &[4u32, 5, 6][..]), (1, 2, &[3][..])] {
        let base = FSEG_ARR_OFFSET + slot * FSEG_INODE_SIZE;
        BigEndian::write_u64(&mut page[base + FSEG_ID..], seg_id);
        BigEndian::write_u32(&mut page[base + FSEG_MAGIC_N..], FSEG_MAGIC_N_VALUE);
        for i in 0..FSEG_FRAG_ARR_N_SLOTS {
            let value = frags.get(i).copied().unwrap_or(FIL_NULL);
            BigEndian::write_u32(&mut page[base + FSEG_FRAG_ARR + i * FSEG_FRAG_SLOT_SIZE..], value);
        }
    }
}

/// Compact INDEX page whose records hold a 4-byte key followed, on the
/// non-leaf level, by the child page number.
fn build_index_page(page: &mut [u8], page_no: u32, level: u16, prev: u32, next: u32, recs: &[(u32, u32)]) {
    write_fil(page, page_no, FIL_PAGE_INDEX, prev, next);
    let ph = PAGE_HEADER;
    BigEndian::write_u16(&mut page[ph + PAGE_N_DIR_SLOTS..], 2);
    BigEndian::write_u16(&mut page[ph + PAGE_N_HEAP..], 0x8002 + recs.len() as u16);
    BigEndian::write_u16(&mut page[ph + PAGE_N_RECS..], recs.len() as u16);
    BigEndian::write_u16(&mut page[ph + PAGE_LEVEL..], level);
    BigEndian::write_u64(&mut page[ph + PAGE_INDEX_ID..], 42);

    let user_status = if level > 0 {
        REC_STATUS_NODE_PTR
    } else {
        REC_STATUS_ORDINARY
    };
    let mut chain = vec![(PAGE_NEW_INFIMUM, 0u16, REC_STATUS_INFIMUM)];
    for i in 0..recs.len() {
        chain.push((128 + i * 32, i as u16 + 2, user_status));
    }
    chain.push((PAGE_NEW_SUPREMUM, 1, REC_STATUS_SUPREMUM));

    for (i, &(origin, heap_no, status)) in chain.iter().enumerate() {
        let rel = chain
            .get(i + 1)
            .map_or(0, |&(next, _, _)| (next as u16).wrapping_sub(origin as u16));
        BigEndian::write_u16(&mut page[origin - 4..], (heap_no << 3) | status as u16);
        BigEndian::write_u16(&mut page[origin - 2..], rel);
    }
    page[PAGE_NEW_INFIMUM..PAGE_NEW_INFIMUM + 8].copy_from_slice(b"infimum\0");
    page[PAGE_NEW_SUPREMUM..PAGE_NEW_SUPREMUM + 8].copy_from_slice(b"supremum");

    for (i, &(key, child)) in recs.iter().enumerate() {
        let origin = 128 + i * 32;
        BigEndian::write_u32(&mut page[origin..], key);
        if level > 0 {
            BigEndian::write_u32(&mut page[origin + 4..], child);
        }
    }
}

fn write_fseg_header(page: &mut [u8], field: usize, slot: usize) {
    let hdr = PAGE_HEADER + field;
    BigEndian::write_u32(&mut page[hdr + FSEG_HDR_SPACE..], SPACE_ID);
    BigEndian::write_u32(&mut page[hdr + FSEG_HDR_PAGE_NO..], 2);
    BigEndian::write_u16(
        &mut page[hdr + FSEG_HDR_OFFSET..],
        (FSEG_ARR_OFFSET + slot * FSEG_INODE_SIZE) as u16,
    );
}

/// Root page 3 over leaves 4 (10..=12), 5 (20, 21) and 6 (30..=32).
fn build_tablespace() -> Vec<u8> {
    let mut image = vec![0u8; N_PAGES * PAGE_SIZE];
    let mut pages: Vec<&mut [u8]> = image.chunks_mut(PAGE_SIZE).collect();
    build_fsp_hdr_page(&mut pages[0]);
    build_inode_page(&mut pages[2]);
    build_index_page(&mut pages[3], 3, 1, FIL_NULL, FIL_NULL, &[(10, 4), (20, 5), (30, 6)]);
    write_fseg_header(&mut pages[3], PAGE_BTR_SEG_LEAF, 0);
    write_fseg_header(&mut pages[3], PAGE_BTR_SEG_TOP, 1);
    build_index_page(&mut pages[4], 4, 0, FIL_NULL, 5, &[(10, 0), (11, 0), (12, 0)]);
    build_index_page(&mut pages[5], 5, 0, 4, 6, &[(20, 0), (21, 0)]);
    build_index_page(&mut pages[6], 6, 0, 5, FIL_NULL, &[(30, 0), (31, 0), (32, 0)]);
    image
}

fn write_tablespace(image: &[u8]) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("create temp file");
    tmp.write_all(image).expect("write tablespace");
    tmp.flush().expect("flush");
    tmp
}

fn open_pool(tmp: &NamedTempFile, frames: usize) -> BufferPool {
    let reader = FileSpaceReader::open(tmp.path()).expect("open tablespace");
    assert_eq!(reader.space_id(), SPACE_ID as u64);
    assert_eq!(reader.page_count(), N_PAGES as u64);
    let pool = BufferPool::new(BufferPoolConfig::default().with_frames(frames)).unwrap();
    assert!(pool.add_space(Arc::new(reader)));
    pool
}

fn index() -> Index {
    Index::new(PageId::new(SPACE_ID as u64, ROOT), 1, NodePtrFormat::Fixed(4))
}

fn key(page: &[u8], rec: &Record) -> u32 {
    BigEndian::read_u32(&page[rec.offset..])
}

fn all_keys(pool: &BufferPool, mode: FetchMode) -> Vec<u32> {
    let index = index();
    let mut cursor = IndexCursor::open(pool, &index, mode).unwrap();
    let mut keys = Vec::new();
    while let Some(rec) = cursor.next_record().unwrap() {
        keys.push(key(cursor.page(), &rec));
    }
    keys
}

// ========== Tablespace summary ==========

#[test]
fn test_space_summary_from_file() {
    let tmp = write_tablespace(&build_tablespace());
    let pool = open_pool(&tmp, 16);

    let summary = SpaceSummary::collect(&pool, SPACE_ID as u64).unwrap();
    assert_eq!(summary.space_id, SPACE_ID as u64);
    assert_eq!(summary.fsp.size, N_PAGES as u32);
    assert_eq!(summary.fsp.frag_n_used, 7);
    assert!(!summary.truncated());

    let names: Vec<&str> = summary.extent_lists.iter().map(|l| l.name).collect();
    assert_eq!(names, vec!["FSP_FREE", "FSP_FREE_FRAG", "FSP_FULL_FRAG"]);
    assert!(summary.extent_lists[0].extents.is_empty());

    let free_frag = &summary.extent_lists[1];
    assert_eq!(free_frag.length, 1);
    assert_eq!(free_frag.extents.len(), 1);
    assert_eq!(free_frag.extents[0].first_page, 0);
    assert_eq!(free_frag.extents[0].free_pages, 57);

    let segments: Vec<u64> = summary.segments().map(|s| s.seg_id).collect();
    assert_eq!(segments, vec![1, 2]);
}

#[test]
fn test_index_segments_from_root() {
    let tmp = write_tablespace(&build_tablespace());
    let pool = open_pool(&tmp, 16);

    let segs = IndexSegments::collect(&pool, PageId::new(SPACE_ID as u64, ROOT)).unwrap();
    assert_eq!(segs.leaf.as_ref().map(|s| s.seg_id), Some(1));
    assert_eq!(segs.internal.as_ref().map(|s| s.seg_id), Some(2));
    assert_eq!(segs.fragment_pages(), vec![4, 5, 6, 3]);
}

#[test]
fn test_page_allocation_from_bitmap() {
    let tmp = write_tablespace(&build_tablespace());
    let pool = open_pool(&tmp, 16);

    for page_no in 0..=6 {
        let alloc = PageAllocation::lookup(&pool, PageId::new(SPACE_ID as u64, page_no)).unwrap();
        assert!(!alloc.free, "page {} should be in use", page_no);
        assert_eq!(alloc.extent_state, "free_frag");
    }
    let alloc = PageAllocation::lookup(&pool, PageId::new(SPACE_ID as u64, 7)).unwrap();
    assert!(alloc.free);
    assert_eq!(alloc.location.descriptor_page, 0);
    assert_eq!(alloc.location.page_in_extent, 7);
}

#[test]
fn test_page_decode_by_type() {
    let tmp = write_tablespace(&build_tablespace());
    let pool = open_pool(&tmp, 16);

    let fetch = |page_no| {
        let page = pool
            .get_page(PageId::new(SPACE_ID as u64, page_no), FetchMode::Normal)
            .unwrap();
        Page::parse(&page).unwrap()
    };
    assert!(matches!(fetch(0), Page::FspHdr { .. }));
    assert!(matches!(fetch(2), Page::Inode { .. }));
    match fetch(ROOT) {
        Page::Index { index, system_records, .. } => {
            assert_eq!(index.level, 1);
            assert_eq!(index.n_recs, 3);
            let sys = system_records.unwrap();
            assert!(sys.infimum_tag_ok && sys.supremum_tag_ok);
        }
        other => panic!("expected an index page, got {:?}", other.page_type()),
    }
    assert!(matches!(fetch(8), Page::Other { .. }));
}

// ========== B+Tree navigation ==========

#[test]
fn test_cursor_walks_leaf_level_in_order() {
    let tmp = write_tablespace(&build_tablespace());
    let pool = open_pool(&tmp, 16);
    assert_eq!(all_keys(&pool, FetchMode::Normal), vec![10, 11, 12, 20, 21, 30, 31, 32]);
}

#[test]
fn test_cursor_with_small_pool() {
    let tmp = write_tablespace(&build_tablespace());
    let pool = open_pool(&tmp, 2);
    assert_eq!(all_keys(&pool, FetchMode::Scan).len(), 8);

    let stats = pool.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.free + stats.lru, stats.total);
    assert!(stats.evictions >= 2);
}

#[test]
fn test_first_record_of_root() {
    let tmp = write_tablespace(&build_tablespace());
    let pool = open_pool(&tmp, 16);
    let root = pool
        .get_page(PageId::new(SPACE_ID as u64, ROOT), FetchMode::Normal)
        .unwrap();
    let rec = first_record(&root).unwrap();
    assert!(rec.is_node_ptr());
    assert_eq!(key(&root, &rec), 10);
}

#[test]
fn test_search_point_lookup() {
    let tmp = write_tablespace(&build_tablespace());
    let pool = open_pool(&tmp, 16);

    let mut found = Vec::new();
    let matched = search(
        &pool,
        &index(),
        FetchMode::Normal,
        |page: &[u8], rec: &Record| match key(page, rec).cmp(&21) {
            Ordering::Less => Compare::NeqContinue,
            Ordering::Equal => Compare::EqBreak,
            Ordering::Greater => Compare::NeqBreak,
        },
        |page: &[u8], rec: &Record| found.push((rec.page_id.page_no, key(page, rec))),
    )
    .unwrap();
    assert_eq!(matched, 1);
    assert_eq!(found, vec![(5, 21)]);
    // Only the root and the one leaf were read.
    assert!(!pool.contains(PageId::new(SPACE_ID as u64, 4)));
    assert!(!pool.contains(PageId::new(SPACE_ID as u64, 6)));
}

#[test]
fn test_search_range_crosses_siblings() {
    let tmp = write_tablespace(&build_tablespace());
    let pool = open_pool(&tmp, 16);

    let mut keys = Vec::new();
    let matched = search(
        &pool,
        &index(),
        FetchMode::Scan,
        |page: &[u8], rec: &Record| {
            if key(page, rec) < 20 {
                Compare::NeqContinue
            } else {
                Compare::EqContinue
            }
        },
        |page: &[u8], rec: &Record| keys.push(key(page, rec)),
    )
    .unwrap();
    assert_eq!(matched, 5);
    assert_eq!(keys, vec![20, 21, 30, 31, 32]);
}

#[test]
fn test_search_missing_key() {
    let tmp = write_tablespace(&build_tablespace());
    let pool = open_pool(&tmp, 16);

    let matched = search(
        &pool,
        &index(),
        FetchMode::Normal,
        |page: &[u8], rec: &Record| match key(page, rec).cmp(&25) {
            Ordering::Less => Compare::NeqContinue,
            Ordering::Equal => Compare::EqBreak,
            Ordering::Greater => Compare::NeqBreak,
        },
        |_: &[u8], _: &Record| panic!("no record should match"),
    )
    .unwrap();
    assert_eq!(matched, 0);
}

// ========== Error paths ==========

#[test]
fn test_open_rejects_short_file() {
    let tmp = write_tablespace(&[0u8; 100]);
    assert!(matches!(FileSpaceReader::open(tmp.path()), Err(IdbError::Parse(_))));
}

#[test]
fn test_page_beyond_end_of_file() {
    let tmp = write_tablespace(&build_tablespace());
    let pool = open_pool(&tmp, 4);
    let err = pool
        .get_page(PageId::new(SPACE_ID as u64, N_PAGES as u64), FetchMode::Normal)
        .err()
        .unwrap();
    assert!(matches!(err, IdbError::Io(_)));
    assert_eq!(pool.stats().free, 4);
}

#[test]
fn test_cursor_on_non_index_root() {
    let tmp = write_tablespace(&build_tablespace());
    let pool = open_pool(&tmp, 4);
    let index = Index::new(PageId::new(SPACE_ID as u64, 2), 1, NodePtrFormat::Fixed(4));
    assert!(IndexCursor::open(&pool, &index, FetchMode::Normal).is_err());
}

#[test]
fn test_two_spaces_share_one_pool() {
    let tmp = write_tablespace(&build_tablespace());
    let pool = open_pool(&tmp, 8);

    let mut other = vec![0u8; 2 * PAGE_SIZE];
    BigEndian::write_u32(&mut other[FSP_HEADER_OFFSET + FSP_SPACE_ID..], 8);
    BigEndian::write_u32(&mut other[PAGE_SIZE + FIL_PAGE_OFFSET..], 1);
    assert!(pool.add_space(Arc::new(FileSpaceReader::from_bytes(other).unwrap())));

    let a = pool.get_page(PageId::new(SPACE_ID as u64, 1), FetchMode::Normal).unwrap();
    let b = pool.get_page(PageId::new(8, 1), FetchMode::Normal).unwrap();
    assert_ne!(a.frame_id(), b.frame_id());
    assert_eq!(BigEndian::read_u32(&a[FIL_PAGE_SPACE_ID..]), 0);
    assert_eq!(BigEndian::read_u32(&b[FIL_PAGE_OFFSET..]), 1);
    assert!(matches!(
        pool.get_page(PageId::new(99, 0), FetchMode::Normal),
        Err(IdbError::UnknownSpace(99))
    ));
}
