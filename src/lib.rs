//! Read-only InnoDB tablespace navigation.
//!
//! The `ibd-nav` crate (library name `ibd`) reads MySQL/InnoDB tablespace
//! files (`.ibd`) directly, without a running server, and rebuilds the
//! structures needed to locate and iterate table rows: file-space headers,
//! extent and segment bookkeeping, and B+Tree index pages.
//!
//! # Library API
//!
//! ```toml
//! [dependencies]
//! ibd = { package = "ibd-nav", version = "0.3" }
//! ```
//!
//! ## Quick example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ibd::buf::{BufferPool, BufferPoolConfig, FetchMode};
//! use ibd::innodb::page::{FilHeader, PageId};
//! use ibd::innodb::tablespace::{FileSpaceReader, PageReader};
//!
//! let pool = BufferPool::new(BufferPoolConfig::default().with_frames(256)).unwrap();
//! let reader = FileSpaceReader::open("table.ibd").unwrap();
//! let space_id = reader.space_id();
//! pool.add_space(Arc::new(reader));
//!
//! let page = pool.get_page(PageId::new(space_id, 0), FetchMode::Normal).unwrap();
//! let header = FilHeader::parse(&page).unwrap();
//! println!("Page type: {}", header.page_type);
//! ```
//!
//! ## Key entry points
//!
//! | Type / Function | Purpose |
//! |-----------------|---------|
//! | [`BufferPool`](buf::BufferPool) | Fixed-capacity page cache with InnoDB's LRU/old-sublist policy |
//! | [`FileSpaceReader`](innodb::tablespace::FileSpaceReader) | One tablespace file, page number to 16 KiB of bytes |
//! | [`Page`](innodb::page::Page) | Page buffer decoded by FIL page type |
//! | [`XdesListIter`](innodb::flst::XdesListIter) | Walk an on-disk extent descriptor list |
//! | [`InodePageListIter`](innodb::flst::InodePageListIter) | Walk an on-disk segment inode page list |
//! | [`Index`](innodb::btree::Index) | B+Tree cursor and comparator-driven search |
//! | [`SpaceSummary`](innodb::space::SpaceSummary) | FSP header, extent lists and segments of one space |
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`innodb::constants`] | InnoDB page/file structure constants |
//! | [`innodb::mach`] | Bounds-checked big-endian field readers |
//! | [`innodb::page`] | FIL header/trailer, FSP header, page identity, page sum type |
//! | [`innodb::page_types`] | Page type enum with names |
//! | [`innodb::flst`] | File list (FLST) nodes and list navigation |
//! | [`innodb::xdes`] | Extent descriptors |
//! | [`innodb::inode`] | Segment inode entries and INODE pages |
//! | [`innodb::index`] | INDEX page header, FSEG headers, page directory |
//! | [`innodb::record`] | Compact record headers and in-page record chains |
//! | [`innodb::btree`] | B+Tree cursor and search |
//! | [`innodb::dict`] | Data dictionary header page |
//! | [`innodb::space`] | Space-wide extent and segment summary |
//! | [`innodb::tablespace`] | Page readers for files and in-memory images |
//! | [`buf`] | Buffer pool |
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli` | on | Builds the `ibdnav` binary (clap, colored output, mmap readers). |

pub mod buf;
#[cfg(feature = "cli")]
pub mod cli;
pub mod innodb;

use thiserror::Error;

use crate::innodb::page::PageId;

/// Errors returned by `ibd` operations.
#[derive(Error, Debug)]
pub enum IdbError {
    /// An I/O error occurred (file open, read, seek, or short read).
    #[error("I/O error: {0}")]
    Io(String),

    /// A parse error occurred (malformed binary data or unexpected values).
    #[error("Parse error: {0}")]
    Parse(String),

    /// An invalid argument was supplied (bad option, bad configuration, etc.).
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// No page reader is registered for the requested space.
    #[error("No reader registered for space {0}")]
    UnknownSpace(u64),

    /// No free frame could be obtained from the buffer pool.
    #[error("Buffer pool exhausted: no free frame after {attempts} attempts")]
    PoolExhausted {
        /// Number of free-frame attempts made before giving up.
        attempts: u32,
    },

    /// The frame holding this page is fixed and cannot be freed.
    #[error("Page {0} is fixed and cannot be freed")]
    PageFixed(PageId),
}
