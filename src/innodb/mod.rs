//! InnoDB binary format parsing and navigation.
//!
//! This module contains the codec for the on-disk structures of MySQL's
//! InnoDB storage engine (FIL/FSP headers, extent descriptors, segment
//! inodes, index page headers and record headers) and the navigators built
//! on top of it: file list (FLST) traversal, in-page record chains and the
//! B+Tree cursor.
//!
//! Codec types decode field by field from a borrowed page buffer and never
//! panic on malformed input. Navigators fetch pages through anything that
//! maps a [`page::PageId`] to page bytes, normally the
//! [`BufferPool`](crate::buf::BufferPool).

pub mod btree;
pub mod constants;
pub mod dict;
pub mod flst;
pub mod index;
pub mod inode;
pub mod mach;
pub mod page;
pub mod page_types;
pub mod record;
pub mod space;
pub mod tablespace;
pub mod xdes;
