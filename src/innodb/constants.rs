/// InnoDB page and file structure constants.
///
/// These values follow the MySQL 8.0 InnoDB on-disk format headers:
/// - fil0fil.h (FIL header/trailer)
/// - fsp0fsp.h, fsp0types.h (FSP header, extent descriptors, inodes)
/// - fut0lst.h (file lists)
/// - page0page.h, rem0rec.h (index page header, record header)
/// - dict0boot.h (dictionary header)
// Page size (only 16K tablespaces are navigated)
pub const PAGE_SIZE: usize = 16384;
pub const SIZE_PAGE_DEFAULT: u32 = 16384;

// FIL Header (38 bytes total)
pub const SIZE_FIL_HEAD: usize = 38;
pub const FIL_PAGE_SPACE_OR_CHKSUM: usize = 0; // 4 bytes - checksum or space id
pub const FIL_PAGE_OFFSET: usize = 4; // 4 bytes - page number
pub const FIL_PAGE_PREV: usize = 8; // 4 bytes - previous page
pub const FIL_PAGE_NEXT: usize = 12; // 4 bytes - next page
pub const FIL_PAGE_LSN: usize = 16; // 8 bytes - LSN of newest modification
pub const FIL_PAGE_TYPE: usize = 24; // 2 bytes - page type
pub const FIL_PAGE_FILE_FLUSH_LSN: usize = 26; // 8 bytes - flush LSN
pub const FIL_PAGE_SPACE_ID: usize = 34; // 4 bytes - space id

// FIL Trailer (8 bytes total, at PAGE_SIZE - SIZE_FIL_TRAILER)
pub const SIZE_FIL_TRAILER: usize = 8;

// Start of page data (immediately after FIL header)
pub const FIL_PAGE_DATA: usize = 38;

// Page type codes used by the navigators
pub const FIL_PAGE_TYPE_ALLOCATED: u16 = 0;
pub const FIL_PAGE_INODE: u16 = 3;
pub const FIL_PAGE_TYPE_FSP_HDR: u16 = 8;
pub const FIL_PAGE_TYPE_XDES: u16 = 9;
pub const FIL_PAGE_SDI: u16 = 17853;
pub const FIL_PAGE_RTREE: u16 = 17854;
pub const FIL_PAGE_INDEX: u16 = 17855;

// Special page number values
pub const FIL_NULL: u32 = 0xFFFFFFFF; // "null" page reference (4294967295)

// File list (FLST) structures
pub const FIL_ADDR_PAGE: usize = 0; // 4 bytes - page number
pub const FIL_ADDR_BYTE: usize = 4; // 2 bytes - byte offset within the page
pub const FIL_ADDR_SIZE: usize = 6;
pub const FLST_LEN: usize = 0; // 4 bytes - list length
pub const FLST_FIRST: usize = 4; // 6 bytes - address of the first node
pub const FLST_LAST: usize = 4 + FIL_ADDR_SIZE; // 6 bytes - address of the last node
pub const FLST_BASE_NODE_SIZE: usize = 4 + 2 * FIL_ADDR_SIZE; // 16
pub const FLST_PREV: usize = 0; // 6 bytes - previous node
pub const FLST_NEXT: usize = FIL_ADDR_SIZE; // 6 bytes - next node
pub const FLST_NODE_SIZE: usize = 2 * FIL_ADDR_SIZE; // 12

// FSP Header (112 bytes, starts at FIL_PAGE_DATA on page 0)
pub const FSP_HEADER_OFFSET: usize = FIL_PAGE_DATA;
pub const FSP_HEADER_SIZE: usize = 32 + 5 * FLST_BASE_NODE_SIZE; // 112
pub const FSP_SPACE_ID: usize = 0; // 4 bytes - space id
pub const FSP_NOT_USED: usize = 4; // 4 bytes - unused
pub const FSP_SIZE: usize = 8; // 4 bytes - tablespace size in pages
pub const FSP_FREE_LIMIT: usize = 12; // 4 bytes - minimum page not yet initialized
pub const FSP_SPACE_FLAGS: usize = 16; // 4 bytes - flags
pub const FSP_FRAG_N_USED: usize = 20; // 4 bytes - used pages in FSP_FREE_FRAG list
pub const FSP_FREE: usize = 24; // 16 bytes - free extents
pub const FSP_FREE_FRAG: usize = 40; // 16 bytes - partially used fragment extents
pub const FSP_FULL_FRAG: usize = 56; // 16 bytes - full fragment extents
pub const FSP_SEG_ID: usize = 72; // 8 bytes - next unused segment id
pub const FSP_SEG_INODES_FULL: usize = 80; // 16 bytes - full inode pages
pub const FSP_SEG_INODES_FREE: usize = 96; // 16 bytes - inode pages with free slots

// Extent descriptors (XDES)
pub const FSP_EXTENT_SIZE: u32 = 64; // pages per extent (16K pages)
pub const XDES_ID: usize = 0; // 8 bytes - owning segment id
pub const XDES_FLST_NODE: usize = 8; // 12 bytes - list node
pub const XDES_STATE: usize = 20; // 4 bytes - extent state
pub const XDES_BITMAP: usize = 24; // 16 bytes - 2 bits per page
pub const XDES_BITS_PER_PAGE: u32 = 2;
pub const XDES_FREE_BIT: u32 = 0;
pub const XDES_CLEAN_BIT: u32 = 1;
pub const XDES_BITMAP_SIZE: usize = (FSP_EXTENT_SIZE * XDES_BITS_PER_PAGE / 8) as usize; // 16
pub const XDES_SIZE: usize = XDES_BITMAP + XDES_BITMAP_SIZE; // 40
pub const XDES_ARR_OFFSET: usize = FSP_HEADER_OFFSET + FSP_HEADER_SIZE; // 150
pub const XDES_PER_PAGE: usize = PAGE_SIZE / FSP_EXTENT_SIZE as usize; // 256
pub const XDES_DESCRIBED_PER_PAGE: u32 = PAGE_SIZE as u32; // pages covered by one XDES page

// Extent states
pub const XDES_NOT_INITED: u32 = 0;
pub const XDES_FREE: u32 = 1;
pub const XDES_FREE_FRAG: u32 = 2;
pub const XDES_FULL_FRAG: u32 = 3;
pub const XDES_FSEG: u32 = 4;
pub const XDES_FSEG_FRAG: u32 = 5;

// Segment inodes (INODE pages)
pub const FSEG_INODE_PAGE_NODE: usize = FIL_PAGE_DATA; // 12 bytes - list node of the inode page
pub const FSEG_ARR_OFFSET: usize = FSEG_INODE_PAGE_NODE + FLST_NODE_SIZE; // 50
pub const FSEG_ID: usize = 0; // 8 bytes - segment id
pub const FSEG_NOT_FULL_N_USED: usize = 8; // 4 bytes - used pages in the NOT_FULL list
pub const FSEG_FREE: usize = 12; // 16 bytes - free extents
pub const FSEG_NOT_FULL: usize = 28; // 16 bytes - partially used extents
pub const FSEG_FULL: usize = 44; // 16 bytes - full extents
pub const FSEG_MAGIC_N: usize = 60; // 4 bytes - magic number
pub const FSEG_FRAG_ARR: usize = 64; // 32 x 4 bytes - fragment pages
pub const FSEG_FRAG_ARR_N_SLOTS: usize = 32;
pub const FSEG_FRAG_SLOT_SIZE: usize = 4;
pub const FSEG_INODE_SIZE: usize = FSEG_FRAG_ARR + FSEG_FRAG_ARR_N_SLOTS * FSEG_FRAG_SLOT_SIZE; // 192
pub const FSEG_MAGIC_N_VALUE: u32 = 97937874;
pub const FSP_SEG_INODES_PER_PAGE: usize =
    (PAGE_SIZE - FSEG_ARR_OFFSET - SIZE_FIL_TRAILER) / FSEG_INODE_SIZE; // 85

// FSEG header (10 bytes, points at a segment inode)
pub const FSEG_HDR_SPACE: usize = 0; // 4 bytes
pub const FSEG_HDR_PAGE_NO: usize = 4; // 4 bytes
pub const FSEG_HDR_OFFSET: usize = 8; // 2 bytes
pub const FSEG_HEADER_SIZE: usize = 10;

// Page Header (INDEX page specific, starts at FIL_PAGE_DATA = offset 38)
pub const PAGE_HEADER: usize = FIL_PAGE_DATA;
pub const PAGE_N_DIR_SLOTS: usize = 0; // 2 bytes - number of directory slots
pub const PAGE_HEAP_TOP: usize = 2; // 2 bytes - pointer to record heap top
pub const PAGE_N_HEAP: usize = 4; // 2 bytes - records in heap (bit 15 = compact flag)
pub const PAGE_FREE: usize = 6; // 2 bytes - start of free record list
pub const PAGE_GARBAGE: usize = 8; // 2 bytes - bytes in deleted records
pub const PAGE_LAST_INSERT: usize = 10; // 2 bytes - last inserted record
pub const PAGE_DIRECTION: usize = 12; // 2 bytes - last insert direction
pub const PAGE_N_DIRECTION: usize = 14; // 2 bytes - consecutive inserts in same direction
pub const PAGE_N_RECS: usize = 16; // 2 bytes - number of user records
pub const PAGE_MAX_TRX_ID: usize = 18; // 8 bytes - max trx id (secondary indexes only)
pub const PAGE_LEVEL: usize = 26; // 2 bytes - level in B+tree (0 = leaf)
pub const PAGE_INDEX_ID: usize = 28; // 8 bytes - index id
pub const INDEX_HEADER_SIZE: usize = 36;
pub const PAGE_BTR_SEG_LEAF: usize = 36; // 10 bytes - leaf segment header
pub const PAGE_BTR_SEG_TOP: usize = 46; // 10 bytes - non-leaf segment header

// System records on compact pages
pub const PAGE_DATA: usize = PAGE_HEADER + INDEX_HEADER_SIZE + 2 * FSEG_HEADER_SIZE; // 94
pub const REC_N_NEW_EXTRA_BYTES: usize = 5;
pub const PAGE_NEW_INFIMUM: usize = PAGE_DATA + REC_N_NEW_EXTRA_BYTES; // 99
pub const PAGE_NEW_SUPREMUM: usize = PAGE_DATA + 2 * REC_N_NEW_EXTRA_BYTES + 8; // 112
pub const PAGE_NEW_SUPREMUM_END: usize = PAGE_NEW_SUPREMUM + 8; // 120

// Record header, as negative offsets from the record origin
pub const REC_NEW_INFO_BITS: usize = 5; // info bits (upper nibble)
pub const REC_NEW_N_OWNED: usize = 5; // n_owned (lower nibble)
pub const REC_NEW_HEAP_NO: usize = 4; // 13 bits, spans bytes -4/-3
pub const REC_NEW_STATUS: usize = 3; // 3 low bits of byte -3
pub const REC_NEXT: usize = 2; // 2 bytes - relative next pointer
pub const REC_INFO_BITS_MASK: u8 = 0xF0;
pub const REC_N_OWNED_MASK: u8 = 0x0F;
pub const REC_HEAP_NO_MASK: u16 = 0xFFF8;
pub const REC_HEAP_NO_SHIFT: u32 = 3;
pub const REC_NEW_STATUS_MASK: u8 = 0x07;
pub const REC_INFO_MIN_REC_FLAG: u8 = 0x10;
pub const REC_INFO_DELETED_FLAG: u8 = 0x20;

// Record status values
pub const REC_STATUS_ORDINARY: u8 = 0;
pub const REC_STATUS_NODE_PTR: u8 = 1;
pub const REC_STATUS_INFIMUM: u8 = 2;
pub const REC_STATUS_SUPREMUM: u8 = 3;

// Page directory (grows downward from the FIL trailer)
pub const PAGE_DIR: usize = SIZE_FIL_TRAILER;
pub const PAGE_DIR_SLOT_SIZE: usize = 2;

// Node pointer child page number size
pub const REC_NODE_PTR_SIZE: usize = 4;

// Insert direction values
pub const PAGE_LEFT: u16 = 1;
pub const PAGE_RIGHT: u16 = 2;
pub const PAGE_SAME_REC: u16 = 3;
pub const PAGE_SAME_PAGE: u16 = 4;
pub const PAGE_NO_DIRECTION: u16 = 5;

// Data dictionary header (system tablespace, page 7)
pub const DICT_HDR_SPACE: u32 = 0;
pub const DICT_HDR_PAGE_NO: u32 = 7;
pub const DICT_HDR: usize = FIL_PAGE_DATA;
pub const DICT_HDR_ROW_ID: usize = 0; // 8 bytes
pub const DICT_HDR_TABLE_ID: usize = 8; // 8 bytes
pub const DICT_HDR_INDEX_ID: usize = 16; // 8 bytes
pub const DICT_HDR_MAX_SPACE_ID: usize = 24; // 4 bytes
pub const DICT_HDR_MIX_ID_LOW: usize = 28; // 4 bytes
pub const DICT_HDR_TABLES: usize = 32; // 4 bytes - root of SYS_TABLES clustered index
pub const DICT_HDR_TABLE_IDS: usize = 36; // 4 bytes - root of SYS_TABLE_IDS
pub const DICT_HDR_COLUMNS: usize = 40; // 4 bytes - root of SYS_COLUMNS
pub const DICT_HDR_INDEXES: usize = 44; // 4 bytes - root of SYS_INDEXES
pub const DICT_HDR_FIELDS: usize = 48; // 4 bytes - root of SYS_FIELDS
pub const DICT_HDR_FSEG_HEADER: usize = 56; // 10 bytes - segment of the header page
