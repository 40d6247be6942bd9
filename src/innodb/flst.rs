//! InnoDB file lists (FLST).
//!
//! InnoDB links extents and segment inode pages into doubly-linked lists
//! that live on disk. A list is anchored by a 16-byte [`ListBaseNode`]
//! (length, first, last) and every member embeds a 12-byte [`ListNode`]
//! (prev, next). Pointers are [`Addr`] values, a `(page number, byte offset)`
//! pair; page number `FIL_NULL` marks the end of the chain.
//!
//! [`ListIter`] follows such a list forward, fetching one page per hop
//! through a caller-supplied fetch function (normally backed by the
//! [`BufferPool`](crate::buf::BufferPool)). The entry type decides how the
//! bytes at each address are decoded: [`XdesListIter`] yields extent
//! descriptors, [`InodePageListIter`] yields whole INODE pages.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

use log::{debug, trace};
use serde::Serialize;

use crate::innodb::constants::*;
use crate::innodb::inode::InodePage;
use crate::innodb::mach;
use crate::innodb::page::PageId;
use crate::innodb::xdes::XdesEntry;

/// On-disk pointer to a byte offset inside a page (6 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Addr {
    /// Page number, `FIL_NULL` for the null address.
    pub page_number: u32,
    /// Byte offset within the page.
    pub offset: u16,
}

impl Addr {
    /// The null address (`FIL_NULL`, offset 0).
    pub const NULL: Addr = Addr {
        page_number: FIL_NULL,
        offset: 0,
    };

    pub fn new(page_number: u32, offset: u16) -> Self {
        Addr {
            page_number,
            offset,
        }
    }

    /// Parse a 6-byte address at `offset` within `buf`.
    pub fn parse(buf: &[u8], offset: usize) -> Option<Self> {
        Some(Addr {
            page_number: mach::read_u32(buf, offset + FIL_ADDR_PAGE)?,
            offset: mach::read_u16(buf, offset + FIL_ADDR_BYTE)?,
        })
    }

    /// Returns false only for the `FIL_NULL` page number.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibd::innodb::flst::Addr;
    ///
    /// assert!(!Addr::new(u32::MAX, 0).valid());
    /// assert!(Addr::new(0, 0).valid());
    /// assert!(Addr::new(7, 150).valid());
    /// ```
    pub fn valid(&self) -> bool {
        self.page_number != FIL_NULL
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid() {
            write!(f, "{}:{}", self.page_number, self.offset)
        } else {
            f.write_str("null")
        }
    }
}

/// List base node: length plus first and last member addresses (16 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListBaseNode {
    /// Number of members in the list.
    pub length: u32,
    /// Address of the first member's list node.
    pub first: Addr,
    /// Address of the last member's list node.
    pub last: Addr,
}

impl ListBaseNode {
    /// Parse a base node at `offset` within `buf`.
    pub fn parse(buf: &[u8], offset: usize) -> Option<Self> {
        Some(ListBaseNode {
            length: mach::read_u32(buf, offset + FLST_LEN)?,
            first: Addr::parse(buf, offset + FLST_FIRST)?,
            last: Addr::parse(buf, offset + FLST_LAST)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// List node embedded in every list member (12 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListNode {
    pub prev: Addr,
    pub next: Addr,
}

impl ListNode {
    /// Parse a list node at `offset` within `buf`.
    pub fn parse(buf: &[u8], offset: usize) -> Option<Self> {
        Some(ListNode {
            prev: Addr::parse(buf, offset + FLST_PREV)?,
            next: Addr::parse(buf, offset + FLST_NEXT)?,
        })
    }
}

/// A list member that can be decoded from the page holding its list node.
pub trait ListEntry: Sized {
    /// Decode the member whose list node sits at `offset` within `page`.
    ///
    /// Returns the decoded member together with its list node, or `None`
    /// when the bytes do not describe a member.
    fn decode(page: &[u8], offset: u16) -> Option<(Self, ListNode)>;
}

/// Lazy forward iterator over an on-disk file list.
///
/// Each step fetches the page holding the current address, decodes the
/// member and moves to its `next` address. Iteration ends at the null
/// address or after `length` members. A page that cannot be fetched or a
/// member that cannot be decoded ends iteration early; [`truncated`]
/// reports whether that happened.
///
/// [`truncated`]: ListIter::truncated
pub struct ListIter<E, F> {
    fetch: F,
    space_id: u64,
    next: Addr,
    remaining: u32,
    truncated: bool,
    _entry: PhantomData<E>,
}

/// Iterator over an extent descriptor list (FSP_FREE, FSEG_FULL, ...).
pub type XdesListIter<F> = ListIter<XdesEntry, F>;

/// Iterator over a segment inode page list (FSP_SEG_INODES_FULL/FREE).
pub type InodePageListIter<F> = ListIter<InodePage, F>;

impl<E, F> ListIter<E, F> {
    /// Start at `base.first` of a list stored in space `space_id`.
    pub fn new(space_id: u64, base: &ListBaseNode, fetch: F) -> Self {
        ListIter {
            fetch,
            space_id,
            next: base.first,
            remaining: base.length,
            truncated: false,
            _entry: PhantomData,
        }
    }

    /// True if iteration stopped before the list's declared end.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn stop(&mut self, reason: &str) {
        debug!(
            "list walk in space {} stopped at {} with {} members left: {}",
            self.space_id, self.next, self.remaining, reason
        );
        self.truncated = true;
        self.remaining = 0;
    }
}

impl<E, F, P> Iterator for ListIter<E, F>
where
    E: ListEntry,
    F: FnMut(PageId) -> Option<P>,
    P: Deref<Target = [u8]>,
{
    type Item = (Addr, E);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        if !self.next.valid() {
            self.stop("null address before declared length");
            return None;
        }

        let addr = self.next;
        trace!("list hop to {} in space {}", addr, self.space_id);
        let page = match (self.fetch)(PageId::new(self.space_id, addr.page_number as u64)) {
            Some(p) => p,
            None => {
                self.stop("page unavailable");
                return None;
            }
        };

        match E::decode(&*page, addr.offset) {
            Some((entry, node)) => {
                self.remaining -= 1;
                self.next = node.next;
                Some((addr, entry))
            }
            None => {
                self.stop("member does not decode");
                None
            }
        }
    }
}
