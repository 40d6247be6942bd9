//! Tablespace-level views assembled through the buffer pool.
//!
//! [`SpaceSummary::collect`] reads the FSP header of a space and walks its
//! extent lists and segment inode page lists. [`IndexSegments::collect`]
//! resolves the two segments of a B+Tree from its root page, and
//! [`PageAllocation::lookup`] reads the extent descriptor covering any page.

use serde::Serialize;

use crate::buf::{BufferPool, FetchMode};
use crate::innodb::constants::*;
use crate::innodb::flst::{Addr, InodePageListIter, ListBaseNode, XdesListIter};
use crate::innodb::index::FsegHeader;
use crate::innodb::inode::{lookup_segment, InodeEntry};
use crate::innodb::page::{FspHeader, PageId};
use crate::innodb::xdes::{self, DescriptorLocation, XdesEntry};
use crate::IdbError;

/// An extent reached through an extent list.
#[derive(Debug, Clone, Serialize)]
pub struct ExtentSummary {
    /// Address of the descriptor's list node.
    pub addr: Addr,
    /// First page of the extent.
    pub first_page: u64,
    pub state: &'static str,
    pub seg_id: u64,
    pub free_pages: u32,
}

/// One walked extent list.
#[derive(Debug, Clone, Serialize)]
pub struct ExtentList {
    pub name: &'static str,
    /// Length declared by the base node.
    pub length: u32,
    pub extents: Vec<ExtentSummary>,
    /// The walk ended before `length` members.
    pub truncated: bool,
}

/// One INODE page reached through an inode page list.
#[derive(Debug, Clone, Serialize)]
pub struct InodePageSummary {
    pub page_no: u32,
    /// Entries assigned to a segment.
    pub segments: Vec<InodeEntry>,
}

/// One walked inode page list.
#[derive(Debug, Clone, Serialize)]
pub struct InodeList {
    pub name: &'static str,
    pub length: u32,
    pub pages: Vec<InodePageSummary>,
    pub truncated: bool,
}

/// Allocation structures of one tablespace.
#[derive(Debug, Clone, Serialize)]
pub struct SpaceSummary {
    pub space_id: u64,
    pub fsp: FspHeader,
    /// `FSP_FREE`, `FSP_FREE_FRAG` and `FSP_FULL_FRAG`.
    pub extent_lists: Vec<ExtentList>,
    /// `FSP_SEG_INODES_FULL` and `FSP_SEG_INODES_FREE`.
    pub inode_lists: Vec<InodeList>,
}

impl SpaceSummary {
    /// Read page 0 of `space_id` and walk every list it anchors.
    ///
    /// List pages are fetched in scan mode. A list whose walk stops early
    /// is kept with `truncated` set; only a failure to read page 0 is an
    /// error.
    pub fn collect(pool: &BufferPool, space_id: u64) -> Result<Self, IdbError> {
        let fsp = {
            let page = pool.get_page(PageId::new(space_id, 0), FetchMode::Normal)?;
            FspHeader::parse(&page).ok_or_else(|| {
                IdbError::Parse(format!("cannot parse FSP header of space {}", space_id))
            })?
        };

        let extent_lists = vec![
            walk_extents(pool, space_id, "FSP_FREE", &fsp.free),
            walk_extents(pool, space_id, "FSP_FREE_FRAG", &fsp.free_frag),
            walk_extents(pool, space_id, "FSP_FULL_FRAG", &fsp.full_frag),
        ];
        let inode_lists = vec![
            walk_inodes(pool, space_id, "FSP_SEG_INODES_FULL", &fsp.seg_inodes_full),
            walk_inodes(pool, space_id, "FSP_SEG_INODES_FREE", &fsp.seg_inodes_free),
        ];

        Ok(SpaceSummary {
            space_id,
            fsp,
            extent_lists,
            inode_lists,
        })
    }

    /// Every segment found through the inode lists.
    pub fn segments(&self) -> impl Iterator<Item = &InodeEntry> {
        self.inode_lists
            .iter()
            .flat_map(|list| &list.pages)
            .flat_map(|page| &page.segments)
    }

    /// True if any list walk stopped early.
    pub fn truncated(&self) -> bool {
        self.extent_lists.iter().any(|l| l.truncated) || self.inode_lists.iter().any(|l| l.truncated)
    }
}

fn walk_extents(
    pool: &BufferPool,
    space_id: u64,
    name: &'static str,
    base: &ListBaseNode,
) -> ExtentList {
    let mut iter = XdesListIter::new(space_id, base, pool.fetcher(FetchMode::Scan));
    let extents = iter
        .by_ref()
        .map(|(addr, entry)| ExtentSummary {
            addr,
            first_page: extent_first_page(addr).unwrap_or(u64::MAX),
            state: entry.state_name(),
            seg_id: entry.seg_id,
            free_pages: entry.free_page_count(),
        })
        .collect();
    ExtentList {
        name,
        length: base.length,
        extents,
        truncated: iter.truncated(),
    }
}

fn walk_inodes(pool: &BufferPool, space_id: u64, name: &'static str, base: &ListBaseNode) -> InodeList {
    let mut iter = InodePageListIter::new(space_id, base, pool.fetcher(FetchMode::Scan));
    let pages = iter
        .by_ref()
        .map(|(addr, page)| InodePageSummary {
            page_no: addr.page_number,
            segments: page.used_entries().cloned().collect(),
        })
        .collect();
    InodeList {
        name,
        length: base.length,
        pages,
        truncated: iter.truncated(),
    }
}

/// First page of the extent whose descriptor's list node is at `addr`.
fn extent_first_page(addr: Addr) -> Option<u64> {
    let index = xdes::entry_index(addr.offset)?;
    Some(addr.page_number as u64 + (index as u64) * FSP_EXTENT_SIZE as u64)
}

/// The leaf and non-leaf segments of a B+Tree.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSegments {
    pub root: PageId,
    pub leaf: Option<InodeEntry>,
    pub internal: Option<InodeEntry>,
}

impl IndexSegments {
    /// Resolve the FSEG headers stored on the root page `root`.
    ///
    /// A segment whose header is unset or does not lead to a valid inode
    /// entry is `None`.
    pub fn collect(pool: &BufferPool, root: PageId) -> Result<Self, IdbError> {
        let (leaf_hdr, internal_hdr) = {
            let page = pool.get_page(root, FetchMode::Normal)?;
            (FsegHeader::parse_leaf(&page), FsegHeader::parse_internal(&page))
        };
        let resolve = |hdr: Option<FsegHeader>| {
            hdr.filter(FsegHeader::is_set)
                .and_then(|hdr| lookup_segment(&hdr, pool.fetcher(FetchMode::Normal)))
        };
        Ok(IndexSegments {
            root,
            leaf: resolve(leaf_hdr),
            internal: resolve(internal_hdr),
        })
    }

    /// Fragment pages of both segments, leaf segment first.
    pub fn fragment_pages(&self) -> Vec<u32> {
        [&self.leaf, &self.internal]
            .into_iter()
            .flatten()
            .flat_map(|seg| seg.fragment_pages())
            .collect()
    }
}

/// Allocation state of a single page from its extent descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct PageAllocation {
    pub page_id: PageId,
    pub location: DescriptorLocation,
    pub extent_state: &'static str,
    pub seg_id: u64,
    pub free: bool,
    pub clean: bool,
}

impl PageAllocation {
    /// Read the descriptor covering `page_id` through the pool.
    pub fn lookup(pool: &BufferPool, page_id: PageId) -> Result<Self, IdbError> {
        let page_no = u32::try_from(page_id.page_no).map_err(|_| {
            IdbError::Argument(format!("page number {} out of range", page_id.page_no))
        })?;
        let location = xdes::descriptor_location(page_no);
        let descriptor_id = PageId::new(page_id.space_id, location.descriptor_page as u64);
        let entry = {
            let page = pool.get_page(descriptor_id, FetchMode::Normal)?;
            XdesEntry::parse_nth(&page, location.entry_index).ok_or_else(|| {
                IdbError::Parse(format!("cannot read descriptor of page {}", page_id))
            })?
        };
        Ok(PageAllocation {
            page_id,
            location,
            extent_state: entry.state_name(),
            seg_id: entry.seg_id,
            free: entry.is_page_free(location.page_in_extent),
            clean: entry.is_page_clean(location.page_in_extent),
        })
    }
}
