//! Extent descriptors (XDES).
//!
//! Every extent of 64 pages is described by a 40-byte [`XdesEntry`]: the
//! owning segment id, a [`ListNode`] linking the extent into one of the
//! FSP or FSEG extent lists, the extent state and a 16-byte bitmap with two
//! bits per page. Descriptor arrays start at byte 150 of the FSP header page
//! (page 0) and of every XDES page, which repeat every 16384 pages.
//!
//! Bit 0 of each page's pair is the free bit and bit 1 the clean bit. A
//! page is reported free when its free bit is clear, so an all-zero bitmap
//! describes an extent whose 64 pages are all free.

use serde::Serialize;

use crate::innodb::constants::*;
use crate::innodb::flst::{ListEntry, ListNode};
use crate::innodb::mach;

/// One extent descriptor (40 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XdesEntry {
    /// Id of the segment owning the extent (0 if it belongs to the space).
    pub seg_id: u64,
    /// Node linking this descriptor into an extent list.
    pub list_node: ListNode,
    /// Extent state (`XDES_FREE`, `XDES_FSEG`, ...).
    pub state: u32,
    /// Two bits per page: free bit, clean bit.
    pub page_state_bitmap: [u8; XDES_BITMAP_SIZE],
}

impl XdesEntry {
    /// Parse the descriptor that starts at `offset` within `buf`.
    pub fn parse(buf: &[u8], offset: usize) -> Option<Self> {
        let bitmap = mach::field(buf, offset + XDES_BITMAP, XDES_BITMAP_SIZE)?;
        let mut page_state_bitmap = [0u8; XDES_BITMAP_SIZE];
        page_state_bitmap.copy_from_slice(bitmap);

        Some(XdesEntry {
            seg_id: mach::read_u64(buf, offset + XDES_ID)?,
            list_node: ListNode::parse(buf, offset + XDES_FLST_NODE)?,
            state: mach::read_u32(buf, offset + XDES_STATE)?,
            page_state_bitmap,
        })
    }

    /// Parse the `index`-th descriptor of an FSP header or XDES page.
    pub fn parse_nth(page: &[u8], index: usize) -> Option<Self> {
        if index >= XDES_PER_PAGE {
            return None;
        }
        Self::parse(page, XDES_ARR_OFFSET + index * XDES_SIZE)
    }

    fn page_bit(&self, page_in_extent: u32, bit: u32) -> Option<bool> {
        if page_in_extent >= FSP_EXTENT_SIZE {
            return None;
        }
        let index = page_in_extent * XDES_BITS_PER_PAGE + bit;
        let byte = self.page_state_bitmap[(index / 8) as usize];
        Some(byte & (1 << (index % 8)) != 0)
    }

    /// Returns true if page `page_in_extent` of this extent is free.
    ///
    /// Page numbers outside `0..64` are never free.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibd::innodb::xdes::XdesEntry;
    /// use ibd::innodb::flst::{Addr, ListNode};
    ///
    /// let mut xdes = XdesEntry {
    ///     seg_id: 0,
    ///     list_node: ListNode { prev: Addr::NULL, next: Addr::NULL },
    ///     state: 1,
    ///     page_state_bitmap: [0; 16],
    /// };
    /// assert!(xdes.is_page_free(0));
    /// assert!(xdes.is_page_free(63));
    /// assert!(!xdes.is_page_free(64));
    ///
    /// // Page 5's free bit is bit 2 of byte 1.
    /// xdes.page_state_bitmap[1] = 0b0000_0100;
    /// assert!(!xdes.is_page_free(5));
    /// assert!(xdes.is_page_free(4));
    /// ```
    pub fn is_page_free(&self, page_in_extent: u32) -> bool {
        self.page_bit(page_in_extent, XDES_FREE_BIT) == Some(false)
    }

    /// Returns true if the clean bit of page `page_in_extent` is set.
    pub fn is_page_clean(&self, page_in_extent: u32) -> bool {
        self.page_bit(page_in_extent, XDES_CLEAN_BIT) == Some(true)
    }

    /// Number of free pages in the extent.
    pub fn free_page_count(&self) -> u32 {
        (0..FSP_EXTENT_SIZE).filter(|&i| self.is_page_free(i)).count() as u32
    }

    pub fn is_initialized(&self) -> bool {
        self.state != XDES_NOT_INITED
    }

    pub fn state_name(&self) -> &'static str {
        state_name(self.state)
    }
}

impl ListEntry for XdesEntry {
    /// The list node sits 8 bytes into the descriptor, after the segment id.
    fn decode(page: &[u8], offset: u16) -> Option<(Self, ListNode)> {
        let index = entry_index(offset)?;
        let entry = XdesEntry::parse_nth(page, index)?;
        let node = entry.list_node;
        Some((entry, node))
    }
}

/// Name of an extent state value.
pub fn state_name(state: u32) -> &'static str {
    match state {
        XDES_NOT_INITED => "not_inited",
        XDES_FREE => "free",
        XDES_FREE_FRAG => "free_frag",
        XDES_FULL_FRAG => "full_frag",
        XDES_FSEG => "fseg",
        XDES_FSEG_FRAG => "fseg_frag",
        _ => "unknown",
    }
}

/// Index in the descriptor array of the descriptor whose list node is at
/// byte `node_offset`, or `None` if the offset is not a descriptor's node.
///
/// # Examples
///
/// ```
/// use ibd::innodb::xdes::entry_index;
///
/// assert_eq!(entry_index(158), Some(0));
/// assert_eq!(entry_index(198), Some(1));
/// assert_eq!(entry_index(160), None);
/// assert_eq!(entry_index(38), None);
/// ```
pub fn entry_index(node_offset: u16) -> Option<usize> {
    let start = (node_offset as usize).checked_sub(XDES_FLST_NODE)?;
    let rel = start.checked_sub(XDES_ARR_OFFSET)?;
    if rel % XDES_SIZE != 0 {
        return None;
    }
    let index = rel / XDES_SIZE;
    (index < XDES_PER_PAGE).then_some(index)
}

/// Where the descriptor of a page lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DescriptorLocation {
    /// FSP header page (0) or XDES page holding the descriptor.
    pub descriptor_page: u32,
    /// Index of the descriptor within that page's array.
    pub entry_index: usize,
    /// Position of the page within its extent (`0..64`).
    pub page_in_extent: u32,
}

/// Locate the descriptor that covers `page_no`.
///
/// # Examples
///
/// ```
/// use ibd::innodb::xdes::descriptor_location;
///
/// let loc = descriptor_location(16384 + 130);
/// assert_eq!(loc.descriptor_page, 16384);
/// assert_eq!(loc.entry_index, 2);
/// assert_eq!(loc.page_in_extent, 2);
/// ```
pub fn descriptor_location(page_no: u32) -> DescriptorLocation {
    let within = page_no % XDES_DESCRIBED_PER_PAGE;
    DescriptorLocation {
        descriptor_page: page_no - within,
        entry_index: (within / FSP_EXTENT_SIZE) as usize,
        page_in_extent: within % FSP_EXTENT_SIZE,
    }
}

/// All initialized descriptors of an FSP header or XDES page, in array order.
pub fn initialized_entries(page: &[u8]) -> Vec<XdesEntry> {
    (0..XDES_PER_PAGE)
        .map_while(|i| XdesEntry::parse_nth(page, i))
        .filter(XdesEntry::is_initialized)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::innodb::flst::Addr;
    use byteorder::{BigEndian, ByteOrder};

    fn write_entry(page: &mut [u8], index: usize, seg_id: u64, state: u32, next: Addr) {
        let base = XDES_ARR_OFFSET + index * XDES_SIZE;
        BigEndian::write_u64(&mut page[base + XDES_ID..], seg_id);
        BigEndian::write_u32(&mut page[base + XDES_FLST_NODE..], FIL_NULL);
        BigEndian::write_u32(&mut page[base + XDES_FLST_NODE + FLST_NEXT..], next.page_number);
        BigEndian::write_u16(&mut page[base + XDES_FLST_NODE + FLST_NEXT + 4..], next.offset);
        BigEndian::write_u32(&mut page[base + XDES_STATE..], state);
    }

    #[test]
    fn test_all_zero_bitmap_is_all_free() {
        let mut page = vec![0u8; PAGE_SIZE];
        write_entry(&mut page, 0, 0, XDES_FREE, Addr::NULL);
        let xdes = XdesEntry::parse_nth(&page, 0).unwrap();
        for i in 0..64 {
            assert!(xdes.is_page_free(i), "page {} should be free", i);
        }
        assert_eq!(xdes.free_page_count(), 64);
        assert!(!xdes.is_page_free(64));
        assert!(!xdes.is_page_free(u32::MAX));
    }

    #[test]
    fn test_bitmap_bit_packing() {
        let mut page = vec![0u8; PAGE_SIZE];
        write_entry(&mut page, 3, 7, XDES_FSEG, Addr::NULL);
        let bitmap = XDES_ARR_OFFSET + 3 * XDES_SIZE + XDES_BITMAP;
        // Pages 0..4 used, page 63 used and clean.
        page[bitmap] = 0b0101_0101;
        page[bitmap + 15] = 0b1100_0000;

        let xdes = XdesEntry::parse_nth(&page, 3).unwrap();
        assert_eq!(xdes.seg_id, 7);
        assert_eq!(xdes.state_name(), "fseg");
        for i in 0..4 {
            assert!(!xdes.is_page_free(i));
            assert!(!xdes.is_page_clean(i));
        }
        assert!(xdes.is_page_free(4));
        assert!(!xdes.is_page_free(63));
        assert!(xdes.is_page_clean(63));
        assert_eq!(xdes.free_page_count(), 59);
    }

    #[test]
    fn test_list_entry_decode_uses_node_offset() {
        let mut page = vec![0u8; PAGE_SIZE];
        write_entry(&mut page, 1, 0, XDES_FREE_FRAG, Addr::new(0, 238));
        let node_offset = (XDES_ARR_OFFSET + XDES_SIZE + XDES_FLST_NODE) as u16;

        let (entry, node) = XdesEntry::decode(&page, node_offset).unwrap();
        assert_eq!(entry.state, XDES_FREE_FRAG);
        assert_eq!(node.next, Addr::new(0, 238));
        assert!(!node.prev.valid());

        // Offset of the descriptor start rather than its node.
        assert!(XdesEntry::decode(&page, (XDES_ARR_OFFSET + XDES_SIZE) as u16).is_none());
    }

    #[test]
    fn test_entry_index_range() {
        let last = XDES_ARR_OFFSET + (XDES_PER_PAGE - 1) * XDES_SIZE + XDES_FLST_NODE;
        assert_eq!(entry_index(last as u16), Some(XDES_PER_PAGE - 1));
        assert_eq!(entry_index((last + XDES_SIZE) as u16), None);
        assert_eq!(entry_index(0), None);
    }

    #[test]
    fn test_descriptor_location() {
        let loc = descriptor_location(0);
        assert_eq!((loc.descriptor_page, loc.entry_index, loc.page_in_extent), (0, 0, 0));

        let loc = descriptor_location(16383);
        assert_eq!((loc.descriptor_page, loc.entry_index, loc.page_in_extent), (0, 255, 63));

        let loc = descriptor_location(3 * 16384 + 64);
        assert_eq!((loc.descriptor_page, loc.entry_index, loc.page_in_extent), (49152, 1, 0));
    }

    #[test]
    fn test_initialized_entries_skips_empty_slots() {
        let mut page = vec![0u8; PAGE_SIZE];
        write_entry(&mut page, 0, 0, XDES_FREE_FRAG, Addr::NULL);
        write_entry(&mut page, 2, 0, XDES_FREE, Addr::NULL);
        let entries = initialized_entries(&page);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].state, XDES_FREE);
        assert!(initialized_entries(&page[..100]).is_empty());
    }
}
