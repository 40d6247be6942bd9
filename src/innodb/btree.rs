//! B+Tree navigation through the buffer pool.
//!
//! An [`Index`] is known by its root page. [`IndexCursor`] walks the tree in
//! key order starting from the root's first record: a node pointer leads to
//! the first record of its child page, and reaching the supremum of a page
//! continues on its right sibling (`FIL_PAGE_NEXT`). Starting from the root
//! this visits the leftmost node pointer of each non-leaf level and then
//! every leaf record.
//!
//! [`search`] descends from the root to the leaf that may hold a key and
//! scans leaf records from there, steered by a caller comparator returning
//! [`Compare`]. Full scans use [`always_true`].
//!
//! Pages are only read through the pool. A cursor holds one page fixed
//! between steps and two while stepping into a child or sibling.
//!
//! A walk enters each page at most once, so it may enter no more pages than
//! the space holds; entering more means the sibling links form a cycle.
//! Children sit one level below their parent and siblings on the same level.

use log::trace;

use crate::buf::{BufferPool, FetchMode, PageGuard};
use crate::innodb::constants::*;
use crate::innodb::index::IndexHeader;
use crate::innodb::mach;
use crate::innodb::page::{FilHeader, PageId};
use crate::innodb::record::{Record, RecordChain, RecordHeader};
use crate::IdbError;

/// Where a node pointer record stores its child page number.
///
/// The child page number follows the key fields, whose width depends on the
/// index's column types.
#[derive(Debug, Clone, Copy)]
pub enum NodePtrFormat {
    /// Keys are always this many bytes.
    Fixed(usize),
    /// Called with the page bytes and the record origin.
    Resolver(fn(&[u8], usize) -> Option<u32>),
}

impl NodePtrFormat {
    /// Child page number of the node pointer at `origin`, or `None` if it
    /// cannot be read or is `FIL_NULL`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibd::innodb::btree::NodePtrFormat;
    /// use byteorder::{BigEndian, ByteOrder};
    ///
    /// let mut page = vec![0u8; 256];
    /// BigEndian::write_u32(&mut page[128..], 42); // key
    /// BigEndian::write_u32(&mut page[132..], 7); // child
    ///
    /// assert_eq!(NodePtrFormat::Fixed(4).child_page_no(&page, 128), Some(7));
    /// assert_eq!(NodePtrFormat::Fixed(4).child_page_no(&page, 254), None);
    /// ```
    pub fn child_page_no(&self, page: &[u8], origin: usize) -> Option<u32> {
        let child = match *self {
            NodePtrFormat::Fixed(key_len) => mach::read_u32(page, origin.checked_add(key_len)?),
            NodePtrFormat::Resolver(resolve) => resolve(page, origin),
        }?;
        (child != FIL_NULL).then_some(child)
    }
}

/// A B+Tree index of one tablespace.
#[derive(Debug, Clone)]
pub struct Index {
    pub root: PageId,
    /// Number of fields that make a key unique.
    pub n_unique: u32,
    pub node_ptr: NodePtrFormat,
}

impl Index {
    pub fn new(root: PageId, n_unique: u32, node_ptr: NodePtrFormat) -> Self {
        Index {
            root,
            n_unique,
            node_ptr,
        }
    }

    fn child_id(&self, page: &PageGuard<'_>, origin: usize) -> Result<PageId, IdbError> {
        let page_id = page.page_id();
        self.node_ptr
            .child_page_no(page, origin)
            .map(|child| PageId::new(page_id.space_id, child as u64))
            .ok_or_else(|| {
                IdbError::Parse(format!(
                    "node pointer at offset {} of page {} has no child page",
                    origin, page_id
                ))
            })
    }
}

/// Comparator verdict for one record.
///
/// `Eq*` records match; `*Break` ends the search after this record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    EqContinue,
    EqBreak,
    NeqContinue,
    NeqBreak,
}

impl Compare {
    pub fn is_eq(self) -> bool {
        matches!(self, Compare::EqContinue | Compare::EqBreak)
    }

    pub fn is_break(self) -> bool {
        matches!(self, Compare::EqBreak | Compare::NeqBreak)
    }
}

/// Matches every record: a full scan.
pub fn always_true(_page: &[u8], _rec: &Record) -> Compare {
    Compare::EqContinue
}

/// Matches the first record reached and stops.
pub fn true_once(_page: &[u8], _rec: &Record) -> Compare {
    Compare::EqBreak
}

/// The record following `origin` on `page`.
pub fn record_after(page_id: PageId, page: &[u8], origin: usize) -> Option<Record> {
    let next = RecordHeader::parse(page, origin)?.next(origin)?;
    let header = RecordHeader::parse(page, next)?;
    Some(Record {
        page_id,
        offset: next,
        header,
    })
}

/// The record following the infimum; the supremum if the page is empty.
pub fn first_record(page: &PageGuard<'_>) -> Option<Record> {
    record_after(page.page_id(), page, PAGE_NEW_INFIMUM)
}

fn fetch_index_page<'a>(
    pool: &'a BufferPool,
    page_id: PageId,
    mode: FetchMode,
) -> Result<(PageGuard<'a>, IndexHeader), IdbError> {
    let page = pool.get_page(page_id, mode)?;
    let fil = FilHeader::parse(&page)
        .ok_or_else(|| IdbError::Parse(format!("cannot parse FIL header of page {}", page_id)))?;
    if !fil.page_type.is_index() {
        return Err(IdbError::Parse(format!(
            "page {} is {}, not an index page",
            page_id,
            fil.page_type.name()
        )));
    }
    let header = IndexHeader::parse(&page)
        .ok_or_else(|| IdbError::Parse(format!("cannot parse index header of page {}", page_id)))?;
    Ok((page, header))
}

fn right_sibling(page: &PageGuard<'_>) -> Result<Option<PageId>, IdbError> {
    let page_id = page.page_id();
    let fil = FilHeader::parse(page)
        .ok_or_else(|| IdbError::Parse(format!("cannot parse FIL header of page {}", page_id)))?;
    Ok(fil
        .has_next()
        .then(|| PageId::new(page_id.space_id, fil.next_page as u64)))
}

/// Pages a walk of `index` may enter: the size of its space.
fn page_budget(pool: &BufferPool, index: &Index) -> Result<u64, IdbError> {
    pool.space_page_count(index.root.space_id)
        .ok_or(IdbError::UnknownSpace(index.root.space_id))
}

fn cycle_error(page_id: PageId, root: PageId) -> IdbError {
    IdbError::Parse(format!(
        "walk of the index rooted at {} entered more pages than its space holds (next page {})",
        root, page_id
    ))
}

fn level_error(page_id: PageId, level: u16, from: PageId, expected: u16) -> IdbError {
    IdbError::Parse(format!(
        "page {} at level {} reached from page {}, expected level {}",
        page_id, level, from, expected
    ))
}

/// Key-order cursor over an index.
pub struct IndexCursor<'a> {
    pool: &'a BufferPool,
    index: &'a Index,
    mode: FetchMode,
    page: PageGuard<'a>,
    level: u16,
    record: Option<Record>,
    pages_left: u64,
}

impl<'a> IndexCursor<'a> {
    /// Position on the first record of the root page.
    pub fn open(pool: &'a BufferPool, index: &'a Index, mode: FetchMode) -> Result<Self, IdbError> {
        let pages_left = page_budget(pool, index)?.saturating_sub(1);
        let (page, header) = fetch_index_page(pool, index.root, mode)?;
        let mut cursor = IndexCursor {
            pool,
            index,
            mode,
            page,
            level: header.level,
            record: None,
            pages_left,
        };
        cursor.record = cursor.first_on_page()?;
        Ok(cursor)
    }

    /// The current record, `None` once the walk is past the last leaf.
    pub fn record(&self) -> Option<Record> {
        self.record
    }

    /// The page holding the current record.
    pub fn page(&self) -> &PageGuard<'a> {
        &self.page
    }

    /// Step to the next record and return it.
    ///
    /// A node pointer steps into its child; the last record of a page steps
    /// to the first record of the right sibling, skipping empty pages.
    /// Returns `Ok(None)` at the end of the index.
    pub fn next_record(&mut self) -> Result<Option<Record>, IdbError> {
        let Some(current) = self.record else {
            return Ok(None);
        };
        let next = if current.is_node_ptr() {
            let child = self.index.child_id(&self.page, current.offset)?;
            let level = self.level.checked_sub(1).ok_or_else(|| {
                IdbError::Parse(format!(
                    "node pointer at offset {} of leaf page {}",
                    current.offset,
                    self.page.page_id()
                ))
            })?;
            self.enter(child, level)?;
            self.first_on_page()?
        } else {
            self.next_in_chain(&current)?
        };
        self.record = next;
        Ok(next)
    }

    fn next_in_chain(&mut self, current: &Record) -> Result<Option<Record>, IdbError> {
        let page_id = self.page.page_id();
        let next = record_after(page_id, &self.page, current.offset).ok_or_else(|| {
            IdbError::Parse(format!(
                "record chain of page {} breaks at offset {}",
                page_id, current.offset
            ))
        })?;
        if next.is_supremum() {
            return self.first_on_next_page();
        }
        Ok(Some(next))
    }

    fn first_on_page(&mut self) -> Result<Option<Record>, IdbError> {
        let rec = first_record(&self.page).ok_or_else(|| {
            IdbError::Parse(format!("cannot read infimum of page {}", self.page.page_id()))
        })?;
        if rec.is_supremum() {
            return self.first_on_next_page();
        }
        Ok(Some(rec))
    }

    fn first_on_next_page(&mut self) -> Result<Option<Record>, IdbError> {
        loop {
            let Some(next) = right_sibling(&self.page)? else {
                return Ok(None);
            };
            self.enter(next, self.level)?;
            let rec = first_record(&self.page).ok_or_else(|| {
                IdbError::Parse(format!("cannot read infimum of page {}", next))
            })?;
            if !rec.is_supremum() {
                return Ok(Some(rec));
            }
        }
    }

    fn enter(&mut self, page_id: PageId, level: u16) -> Result<(), IdbError> {
        if self.pages_left == 0 {
            return Err(cycle_error(page_id, self.index.root));
        }
        self.pages_left -= 1;
        let (page, header) = fetch_index_page(self.pool, page_id, self.mode)?;
        if header.level != level {
            return Err(level_error(page_id, header.level, self.page.page_id(), level));
        }
        trace!("cursor moves from page {} to {}", self.page.page_id(), page_id);
        self.page = page;
        self.level = level;
        Ok(())
    }
}

/// Pick the node pointer to descend through: the last `NeqContinue`
/// record before the first `Eq*`/`NeqBreak`, or the first record.
fn descend_target<C>(page: &PageGuard<'_>, compare: &mut C) -> Result<Record, IdbError>
where
    C: FnMut(&[u8], &Record) -> Compare,
{
    let page_id = page.page_id();
    let bytes: &[u8] = page;
    let mut target = None;
    for info in RecordChain::new(bytes) {
        let rec = Record {
            page_id,
            offset: info.offset,
            header: info.header,
        };
        if compare(bytes, &rec) == Compare::NeqContinue {
            target = Some(rec);
        } else {
            target.get_or_insert(rec);
            break;
        }
    }
    target.ok_or_else(|| IdbError::Parse(format!("non-leaf page {} has no records", page_id)))
}

/// Search `index`, calling `oper` on every matching leaf record.
///
/// At each non-leaf level `compare` picks the node pointer to follow (see
/// [`Compare`]); at the leaf level records are scanned from the first one,
/// across right siblings, until a `*Break` verdict or the last leaf.
/// Returns the number of matches.
///
/// `compare` sees node pointer records on the way down and leaf records
/// afterwards; both start with the key fields.
pub fn search<C, O>(
    pool: &BufferPool,
    index: &Index,
    mode: FetchMode,
    mut compare: C,
    mut oper: O,
) -> Result<usize, IdbError>
where
    C: FnMut(&[u8], &Record) -> Compare,
    O: FnMut(&[u8], &Record),
{
    let mut pages_left = page_budget(pool, index)?.saturating_sub(1);
    let (mut page, mut header) = fetch_index_page(pool, index.root, mode)?;
    while !header.is_leaf() {
        let target = descend_target(&page, &mut compare)?;
        let child_id = index.child_id(&page, target.offset)?;
        let (child, child_header) = fetch_index_page(pool, child_id, mode)?;
        if child_header.level.checked_add(1) != Some(header.level) {
            return Err(level_error(
                child_id,
                child_header.level,
                page.page_id(),
                header.level.saturating_sub(1),
            ));
        }
        pages_left = pages_left.saturating_sub(1);
        trace!("search descends from page {} to {}", page.page_id(), child_id);
        page = child;
        header = child_header;
    }

    let mut matches = 0;
    loop {
        let page_id = page.page_id();
        let bytes: &[u8] = &page;
        let mut chain = RecordChain::new(bytes);
        for info in chain.by_ref() {
            let rec = Record {
                page_id,
                offset: info.offset,
                header: info.header,
            };
            let verdict = compare(bytes, &rec);
            if verdict.is_eq() {
                oper(bytes, &rec);
                matches += 1;
            }
            if verdict.is_break() {
                return Ok(matches);
            }
        }
        if !chain.reached_supremum() {
            return Err(IdbError::Parse(format!(
                "record chain of page {} does not reach the supremum",
                page_id
            )));
        }

        let Some(next) = right_sibling(&page)? else {
            return Ok(matches);
        };
        if pages_left == 0 {
            return Err(cycle_error(next, index.root));
        }
        pages_left -= 1;
        let (sibling, sibling_header) = fetch_index_page(pool, next, mode)?;
        if !sibling_header.is_leaf() {
            return Err(level_error(next, sibling_header.level, page.page_id(), 0));
        }
        page = sibling;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buf::BufferPoolConfig;
    use crate::innodb::tablespace::FileSpaceReader;
    use byteorder::{BigEndian, ByteOrder};
    use std::sync::Arc;

    const SPACE: u64 = 5;

    /// Write a compact index page whose records carry a 4-byte key, plus a
    /// child page number on non-leaf levels.
    fn index_page(image: &mut [u8], page_no: u32, level: u16, next: u32, recs: &[(u32, u32)]) {
        let page = &mut image[page_no as usize * PAGE_SIZE..][..PAGE_SIZE];
        BigEndian::write_u32(&mut page[FIL_PAGE_OFFSET..], page_no);
        BigEndian::write_u32(&mut page[FIL_PAGE_PREV..], FIL_NULL);
        BigEndian::write_u32(&mut page[FIL_PAGE_NEXT..], next);
        BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], FIL_PAGE_INDEX);
        BigEndian::write_u16(&mut page[PAGE_HEADER + PAGE_N_HEAP..], 0x8002 + recs.len() as u16);
        BigEndian::write_u16(&mut page[PAGE_HEADER + PAGE_N_RECS..], recs.len() as u16);
        BigEndian::write_u16(&mut page[PAGE_HEADER + PAGE_LEVEL..], level);

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
        for (i, &(key, child)) in recs.iter().enumerate() {
            let origin = 128 + i * 32;
            BigEndian::write_u32(&mut page[origin..], key);
            if level > 0 {
                BigEndian::write_u32(&mut page[origin + 4..], child);
            }
        }
    }

    /// Root 3 (level 1) over leaves 4 (keys 1..=3) and 5 (keys 5..=7).
    fn two_level_tree() -> Vec<u8> {
        let mut image = vec![0u8; 8 * PAGE_SIZE];
        BigEndian::write_u32(&mut image[FSP_HEADER_OFFSET + FSP_SPACE_ID..], SPACE as u32);
        index_page(&mut image, 3, 1, FIL_NULL, &[(1, 4), (5, 5)]);
        index_page(&mut image, 4, 0, 5, &[(1, 0), (2, 0), (3, 0)]);
        index_page(&mut image, 5, 0, FIL_NULL, &[(5, 0), (6, 0), (7, 0)]);
        image
    }

    fn pool_with(image: Vec<u8>) -> BufferPool {
        let pool = BufferPool::new(BufferPoolConfig::default().with_frames(8)).unwrap();
        pool.add_space(Arc::new(FileSpaceReader::from_bytes(image).unwrap()));
        pool
    }

    fn index() -> Index {
        Index::new(PageId::new(SPACE, 3), 1, NodePtrFormat::Fixed(4))
    }

    fn key(page: &[u8], rec: &Record) -> u32 {
        mach::read_u32(page, rec.offset).unwrap()
    }

    fn lookup(target: u32) -> impl FnMut(&[u8], &Record) -> Compare {
        move |page, rec| match key(page, rec).cmp(&target) {
            std::cmp::Ordering::Less => Compare::NeqContinue,
            std::cmp::Ordering::Equal => Compare::EqBreak,
            std::cmp::Ordering::Greater => Compare::NeqBreak,
        }
    }

    #[test]
    fn test_first_record_follows_infimum() {
        let pool = pool_with(two_level_tree());
        let page = pool.get_page(PageId::new(SPACE, 4), FetchMode::Normal).unwrap();
        let rec = first_record(&page).unwrap();
        assert_eq!(rec.offset, 128);
        assert_eq!(key(&page, &rec), 1);
        assert!(rec.is_user_record());
    }

    #[test]
    fn test_cursor_walks_in_key_order() {
        let pool = pool_with(two_level_tree());
        let index = index();
        let mut cursor = IndexCursor::open(&pool, &index, FetchMode::Scan).unwrap();

        let mut seen = Vec::new();
        while let Some(rec) = cursor.record() {
            let page = cursor.page();
            seen.push((rec.page_id.page_no, rec.is_node_ptr(), key(page, &rec)));
            cursor.next_record().unwrap();
        }
        assert_eq!(
            seen,
            vec![
                (3, true, 1),
                (4, false, 1),
                (4, false, 2),
                (4, false, 3),
                (5, false, 5),
                (5, false, 6),
                (5, false, 7),
            ]
        );
        assert_eq!(cursor.next_record().unwrap(), None);
    }

    #[test]
    fn test_cursor_skips_empty_sibling() {
        let mut image = two_level_tree();
        index_page(&mut image, 4, 0, 6, &[(1, 0)]);
        index_page(&mut image, 6, 0, 5, &[]);
        let pool = pool_with(image);
        let index = index();
        let mut cursor = IndexCursor::open(&pool, &index, FetchMode::Normal).unwrap();

        let mut pages = Vec::new();
        while let Some(rec) = cursor.next_record().unwrap() {
            pages.push(rec.page_id.page_no);
        }
        assert_eq!(pages, vec![4, 5, 5, 5]);
    }

    #[test]
    fn test_full_scan_visits_every_leaf_record() {
        let pool = pool_with(two_level_tree());
        let mut keys = Vec::new();
        let n = search(&pool, &index(), FetchMode::Scan, always_true, |page, rec| {
            keys.push(key(page, rec))
        })
        .unwrap();
        assert_eq!(n, 6);
        assert_eq!(keys, vec![1, 2, 3, 5, 6, 7]);
    }

    #[test]
    fn test_true_once_stops_after_first_match() {
        let pool = pool_with(two_level_tree());
        let mut keys = Vec::new();
        let n = search(&pool, &index(), FetchMode::Normal, true_once, |page, rec| {
            keys.push(key(page, rec))
        })
        .unwrap();
        assert_eq!((n, keys), (1, vec![1]));
    }

    #[test]
    fn test_point_lookup_descends_to_one_leaf() {
        let pool = pool_with(two_level_tree());
        let mut found = Vec::new();
        let n = search(&pool, &index(), FetchMode::Normal, lookup(6), |page, rec| {
            found.push((rec.page_id.page_no, key(page, rec)))
        })
        .unwrap();
        assert_eq!(n, 1);
        assert_eq!(found, vec![(5, 6)]);
        // Only the root and leaf 5 were read.
        assert_eq!(pool.stats().misses, 2);
        assert!(!pool.contains(PageId::new(SPACE, 4)));
    }

    #[test]
    fn test_missing_key_reports_no_match() {
        let pool = pool_with(two_level_tree());
        let n = search(&pool, &index(), FetchMode::Normal, lookup(4), |_, _| {
            panic!("no record should match")
        })
        .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_sibling_cycle_is_an_error() {
        let mut image = two_level_tree();
        index_page(&mut image, 5, 0, 4, &[(5, 0)]);
        let pool = pool_with(image);
        assert!(matches!(
            search(&pool, &index(), FetchMode::Normal, always_true, |_, _| {}),
            Err(IdbError::Parse(_))
        ));

        let index = index();
        let mut cursor = IndexCursor::open(&pool, &index, FetchMode::Normal).unwrap();
        assert!(walk_to_end(&mut cursor).is_err());
    }

    fn walk_to_end(cursor: &mut IndexCursor<'_>) -> Result<Option<Record>, IdbError> {
        loop {
            match cursor.next_record() {
                Ok(Some(_)) => continue,
                other => break other,
            }
        }
    }

    #[test]
    fn test_cycle_walk_is_bounded_by_space_size() {
        let mut image = two_level_tree();
        index_page(&mut image, 5, 0, 4, &[(5, 0)]);
        let pool = pool_with(image);
        let index = index();
        let mut cursor = IndexCursor::open(&pool, &index, FetchMode::Normal).unwrap();

        let mut steps = 0;
        while let Ok(Some(_)) = cursor.next_record() {
            steps += 1;
        }
        // Eight pages in the space: at most seven entered after the root,
        // each holding no more than three records.
        assert!(steps <= 7 * 3, "walked {} records", steps);
        assert!(matches!(cursor.next_record(), Ok(None) | Err(_)));
    }

    #[test]
    fn test_level_mismatch_is_an_error() {
        // Leaf 4 names the root as its right sibling.
        let mut image = two_level_tree();
        index_page(&mut image, 4, 0, 3, &[(1, 0)]);
        let pool = pool_with(image);
        let index = index();
        assert!(matches!(
            search(&pool, &index, FetchMode::Normal, always_true, |_, _| {}),
            Err(IdbError::Parse(_))
        ));
        let mut cursor = IndexCursor::open(&pool, &index, FetchMode::Normal).unwrap();
        assert!(matches!(walk_to_end(&mut cursor), Err(IdbError::Parse(_))));

        // A root two levels above its leaves.
        let mut image = two_level_tree();
        index_page(&mut image, 3, 2, FIL_NULL, &[(1, 4), (5, 5)]);
        let pool = pool_with(image);
        assert!(matches!(
            search(&pool, &index, FetchMode::Normal, always_true, |_, _| {}),
            Err(IdbError::Parse(_))
        ));
        let mut cursor = IndexCursor::open(&pool, &index, FetchMode::Normal).unwrap();
        assert!(matches!(walk_to_end(&mut cursor), Err(IdbError::Parse(_))));
    }

    #[test]
    fn test_root_must_be_an_index_page() {
        let pool = pool_with(two_level_tree());
        let not_index = Index::new(PageId::new(SPACE, 1), 1, NodePtrFormat::Fixed(4));
        assert!(matches!(
            IndexCursor::open(&pool, &not_index, FetchMode::Normal),
            Err(IdbError::Parse(_))
        ));
    }

    #[test]
    fn test_resolver_node_pointer_format() {
        fn after_key(page: &[u8], origin: usize) -> Option<u32> {
            mach::read_u32(page, origin + 4)
        }
        let pool = pool_with(two_level_tree());
        let index = Index::new(PageId::new(SPACE, 3), 1, NodePtrFormat::Resolver(after_key));
        let n = search(&pool, &index, FetchMode::Normal, lookup(2), |_, _| {}).unwrap();
        assert_eq!(n, 1);
    }
}
