//! Tablespace page readers.
//!
//! [`PageReader`] is the only I/O interface the buffer pool uses: one
//! reader per tablespace turns a page number into 16 KiB of bytes.
//! [`FileSpaceReader`] implements it for `.ibd` files (buffered or
//! memory-mapped) and for in-memory tablespace images.
//!
//! The FSP header of page 0 is parsed when a reader is opened, giving the
//! space ID the reader is registered under and the tablespace size.

use std::io::{Cursor, Read, Seek, SeekFrom};

use parking_lot::Mutex;

use crate::innodb::constants::*;
use crate::innodb::page::FspHeader;
use crate::IdbError;

/// Supplies the pages of one tablespace to the buffer pool.
///
/// Implementations must be shareable across the pool's worker threads.
pub trait PageReader: Send + Sync {
    /// Space ID of the tablespace this reader serves.
    fn space_id(&self) -> u64;

    /// Read page `page_no` into `out`.
    ///
    /// Fails with [`IdbError::Io`] if the page lies beyond the end of the
    /// tablespace or cannot be read in full.
    fn read_page(&self, page_no: u32, out: &mut [u8; PAGE_SIZE]) -> Result<(), IdbError>;

    /// Number of pages in the tablespace.
    fn page_count(&self) -> u64;
}

/// Supertrait combining `Read + Seek` for type-erased readers.
trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// A memory-mapped file reader implementing `Read` and `Seek`.
///
/// Wraps a `memmap2::Mmap` with a cursor position so it can stand in for a
/// `File` behind `Box<dyn ReadSeek>`. The data is not copied; it stays
/// backed by the OS page cache.
#[cfg(feature = "cli")]
struct MmapReader {
    mmap: memmap2::Mmap,
    position: u64,
}

#[cfg(feature = "cli")]
impl Read for MmapReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let len = self.mmap.len() as u64;
        if self.position >= len {
            return Ok(0);
        }
        let start = self.position as usize;
        let to_read = buf.len().min(self.mmap.len() - start);
        buf[..to_read].copy_from_slice(&self.mmap[start..start + to_read]);
        self.position += to_read as u64;
        Ok(to_read)
    }
}

#[cfg(feature = "cli")]
impl Seek for MmapReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let len = self.mmap.len() as i64;
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => len + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };
        if new_pos < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek to a negative position",
            ));
        }
        self.position = new_pos as u64;
        Ok(self.position)
    }
}

/// One InnoDB tablespace file (.ibd) or in-memory tablespace image.
///
/// Reads are serialized through an internal lock, so a single reader can be
/// shared by every thread of the pool.
pub struct FileSpaceReader {
    reader: Mutex<Box<dyn ReadSeek>>,
    file_size: u64,
    page_count: u64,
    fsp_header: FspHeader,
}

impl FileSpaceReader {
    /// Open a tablespace file.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, IdbError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| IdbError::Io(format!("Cannot open {}: {}", path.display(), e)))?;

        let file_size = file
            .metadata()
            .map_err(|e| IdbError::Io(format!("Cannot stat {}: {}", path.display(), e)))?
            .len();

        Self::init(Box::new(file), file_size)
    }

    /// Open a tablespace file using memory-mapped I/O.
    ///
    /// # Safety
    ///
    /// The underlying `mmap` call is `unsafe` because the mapped file must not
    /// be modified by another process while the mapping is active. For
    /// read-only inspection this holds as long as MySQL is not writing the
    /// file at the same time.
    #[cfg(feature = "cli")]
    pub fn open_mmap<P: AsRef<std::path::Path>>(path: P) -> Result<Self, IdbError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| IdbError::Io(format!("Cannot open {}: {}", path.display(), e)))?;

        let file_size = file
            .metadata()
            .map_err(|e| IdbError::Io(format!("Cannot stat {}: {}", path.display(), e)))?
            .len();

        let mmap = unsafe {
            memmap2::Mmap::map(&file)
                .map_err(|e| IdbError::Io(format!("Cannot mmap {}: {}", path.display(), e)))?
        };

        Self::init(Box::new(MmapReader { mmap, position: 0 }), file_size)
    }

    /// Create a reader over an in-memory tablespace image.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibd::innodb::constants::*;
    /// use ibd::innodb::tablespace::{FileSpaceReader, PageReader};
    /// use byteorder::{BigEndian, ByteOrder};
    ///
    /// let mut image = vec![0u8; 2 * PAGE_SIZE];
    /// BigEndian::write_u32(&mut image[FSP_HEADER_OFFSET + FSP_SPACE_ID..], 42);
    /// BigEndian::write_u32(&mut image[FSP_HEADER_OFFSET + FSP_SIZE..], 2);
    ///
    /// let reader = FileSpaceReader::from_bytes(image).unwrap();
    /// assert_eq!(reader.space_id(), 42);
    /// assert_eq!(reader.page_count(), 2);
    ///
    /// let mut page = [0u8; PAGE_SIZE];
    /// assert!(reader.read_page(1, &mut page).is_ok());
    /// assert!(reader.read_page(2, &mut page).is_err());
    /// ```
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, IdbError> {
        let file_size = data.len() as u64;
        Self::init(Box::new(Cursor::new(data)), file_size)
    }

    fn init(mut reader: Box<dyn ReadSeek>, file_size: u64) -> Result<Self, IdbError> {
        if file_size < PAGE_SIZE as u64 {
            return Err(IdbError::Parse(format!(
                "File too small to be a valid tablespace: {} bytes",
                file_size
            )));
        }

        let mut buf = vec![0u8; PAGE_SIZE];
        reader
            .read_exact(&mut buf)
            .map_err(|e| IdbError::Io(format!("Cannot read page 0: {}", e)))?;

        let fsp_header = FspHeader::parse(&buf)
            .ok_or_else(|| IdbError::Parse("Cannot parse FSP header on page 0".to_string()))?;

        Ok(FileSpaceReader {
            reader: Mutex::new(reader),
            file_size,
            page_count: file_size / PAGE_SIZE as u64,
            fsp_header,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// The FSP header read from page 0 at open time.
    pub fn fsp_header(&self) -> &FspHeader {
        &self.fsp_header
    }
}

impl PageReader for FileSpaceReader {
    fn space_id(&self) -> u64 {
        self.fsp_header.space_id as u64
    }

    /// Number of whole pages in the file.
    fn page_count(&self) -> u64 {
        self.page_count
    }

    fn read_page(&self, page_no: u32, out: &mut [u8; PAGE_SIZE]) -> Result<(), IdbError> {
        if page_no as u64 >= self.page_count {
            return Err(IdbError::Io(format!(
                "Page {} out of range (tablespace has {} pages)",
                page_no, self.page_count
            )));
        }

        let offset = page_no as u64 * PAGE_SIZE as u64;
        let mut reader = self.reader.lock();
        reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| IdbError::Io(format!("Cannot seek to page {}: {}", page_no, e)))?;
        reader
            .read_exact(out)
            .map_err(|e| IdbError::Io(format!("Cannot read page {}: {}", page_no, e)))?;
        Ok(())
    }
}
