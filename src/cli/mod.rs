//! CLI subcommand implementations for the `ibdnav` binary.
//!
//! The `ibdnav` binary inspects one tablespace file at a time through a
//! [`BufferPool`]. CLI argument parsing uses clap derive macros, with the
//! top-level [`app::Cli`] struct and [`app::Commands`] enum defined in
//! [`app`] and shared between `main.rs` and `build.rs` (for man page
//! generation) via `include!()`.
//!
//! Each subcommand module follows the same pattern: an `Options` struct
//! holding the parsed arguments and a
//! `pub fn execute(opts, writer) -> Result<(), IdbError>` entry point. The
//! `writer: &mut dyn Write` parameter allows output to be captured in tests
//! or redirected to a file via the global `--output` flag.
//!
//! # Subcommands
//!
//! | Command | Module | Purpose |
//! |---------|--------|---------|
//! | `ibdnav space` | [`space`] | FSP header, extent lists, inode pages and segments |
//! | `ibdnav page` | [`page`] | One page decoded by type, with its allocation state |
//! | `ibdnav records` | [`records`] | Record chain and page directory of one index page |
//! | `ibdnav scan` | [`scan`] | Full or key-prefix scan of a B+Tree from its root |
//!
//! Every subcommand takes `--json`. The global `--frames` flag sizes the
//! buffer pool and `--mmap` memory-maps the file. The `wprintln!` and
//! `wprint!` macros wrap `writeln!`/`write!` to convert `io::Error` into
//! `IdbError`.

pub mod app;
pub mod page;
pub mod records;
pub mod scan;
pub mod space;

/// Write a line to the given writer, converting io::Error to IdbError.
macro_rules! wprintln {
    ($w:expr) => {
        writeln!($w).map_err(|e| $crate::IdbError::Io(e.to_string()))
    };
    ($w:expr, $($arg:tt)*) => {
        writeln!($w, $($arg)*).map_err(|e| $crate::IdbError::Io(e.to_string()))
    };
}

/// Write (without newline) to the given writer, converting io::Error to IdbError.
macro_rules! wprint {
    ($w:expr, $($arg:tt)*) => {
        write!($w, $($arg)*).map_err(|e| $crate::IdbError::Io(e.to_string()))
    };
}

pub(crate) use wprint;
pub(crate) use wprintln;

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::buf::{BufferPool, BufferPoolConfig};
use crate::innodb::tablespace::{FileSpaceReader, PageReader};
use crate::IdbError;

/// Open a tablespace file and register it with a new pool of `frames`
/// frames. Returns the pool and the file's space ID.
pub(crate) fn open_space(
    path: &str,
    frames: usize,
    use_mmap: bool,
) -> Result<(BufferPool, u64), IdbError> {
    let reader = if use_mmap {
        FileSpaceReader::open_mmap(path)?
    } else {
        FileSpaceReader::open(path)?
    };
    let space_id = reader.space_id();
    let pool = BufferPool::new(BufferPoolConfig::default().with_frames(frames))?;
    pool.add_space(Arc::new(reader));
    Ok((pool, space_id))
}

/// Pretty-printed JSON of `value`.
pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, IdbError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| IdbError::Parse(format!("JSON serialization error: {}", e)))
}

/// Create a spinner counting pages of unknown total.
pub(crate) fn create_spinner(unit: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template(&format!("{{spinner:.green}} {{pos}} {} ({{elapsed}})", unit))
    {
        pb.set_style(style);
    }
    pb
}
