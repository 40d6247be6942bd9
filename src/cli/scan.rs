use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::buf::{FetchMode, PoolStats};
use crate::cli::space::print_pool_stats;
use crate::cli::{create_spinner, open_space, to_json, wprintln};
use crate::innodb::btree::{search, Compare, Index, NodePtrFormat};
use crate::innodb::page::PageId;
use crate::innodb::record::Record;
use crate::IdbError;

/// Options for the scan subcommand.
pub struct ScanOptions {
    pub file: String,
    pub root: u64,
    pub key_len: usize,
    pub key: Option<String>,
    pub stats: bool,
    pub json: bool,
    pub frames: usize,
    pub mmap: bool,
}

#[derive(Serialize, Default)]
struct ScanResult {
    root: u64,
    matched: usize,
    delete_marked: usize,
    leaf_pages: usize,
    first_leaf: Option<u64>,
    last_leaf: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pool: Option<PoolStats>,
}

/// Parse a hex string such as `8000002a` into bytes.
fn parse_hex_key(s: &str) -> Result<Vec<u8>, IdbError> {
    let s = s.trim_start_matches("0x");
    if s.is_empty() || !s.is_ascii() || s.len() % 2 != 0 {
        return Err(IdbError::Argument(format!(
            "key must be an even number of hex digits: {:?}",
            s
        )));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| IdbError::Argument(format!("invalid hex in key: {:?}", s)))
        })
        .collect()
}

/// Compare the leading bytes of a record with `key`.
///
/// InnoDB stores integer keys big-endian with the sign bit flipped, so a
/// byte-wise comparison follows key order for them.
fn compare_prefix(page: &[u8], rec: &Record, key: &[u8]) -> Compare {
    let Some(prefix) = page.get(rec.offset..rec.offset + key.len()) else {
        return Compare::NeqBreak;
    };
    match prefix.cmp(key) {
        Ordering::Less => Compare::NeqContinue,
        Ordering::Equal => Compare::EqContinue,
        Ordering::Greater => Compare::NeqBreak,
    }
}

/// Scan a B+Tree from its root page through the buffer pool.
///
/// Descends to the leftmost leaf (or, with `--key`, to the first leaf that
/// may hold the key prefix) and follows the leaf level to the right,
/// counting matching records. Pages are fetched in scan mode so a full scan
/// does not push other pages out of the young LRU sublist.
pub fn execute(opts: &ScanOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let key = opts.key.as_deref().map(parse_hex_key).transpose()?;
    let (pool, space_id) = open_space(&opts.file, opts.frames, opts.mmap)?;
    let index = Index::new(
        PageId::new(space_id, opts.root),
        1,
        NodePtrFormat::Fixed(opts.key_len),
    );

    let mut result = ScanResult {
        root: opts.root,
        ..Default::default()
    };
    let mut leaves = BTreeSet::new();
    let pb = (!opts.json).then(|| create_spinner("records"));

    let compare = |page: &[u8], rec: &Record| match &key {
        Some(key) => compare_prefix(page, rec, key),
        None => Compare::EqContinue,
    };
    let matched = search(&pool, &index, FetchMode::Scan, compare, |_, rec| {
        if let Some(pb) = &pb {
            pb.inc(1);
        }
        if rec.header.delete_mark {
            result.delete_marked += 1;
        }
        let leaf = rec.page_id.page_no;
        if leaves.insert(leaf) {
            result.first_leaf.get_or_insert(leaf);
            result.last_leaf = Some(leaf);
        }
    })?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    result.matched = matched;
    result.leaf_pages = leaves.len();
    result.pool = opts.stats.then(|| pool.stats());

    if opts.json {
        wprintln!(writer, "{}", to_json(&result)?)?;
        return Ok(());
    }

    wprintln!(
        writer,
        "{}",
        format!("Index rooted at page {}", PageId::new(space_id, opts.root)).bold()
    )?;
    let what = if key.is_some() { "Matching records" } else { "Records" };
    wprintln!(writer, "  {}: {}", what, result.matched.to_string().green())?;
    if result.delete_marked > 0 {
        wprintln!(
            writer,
            "  Delete-marked:    {}",
            result.delete_marked.to_string().yellow()
        )?;
    }
    wprintln!(writer, "  Leaf pages:       {}", result.leaf_pages)?;
    if let (Some(first), Some(last)) = (result.first_leaf, result.last_leaf) {
        wprintln!(writer, "  First/last leaf:  {} / {}", first, last)?;
    }
    if let Some(stats) = &result.pool {
        wprintln!(writer)?;
        print_pool_stats(writer, stats)?;
    }
    Ok(())
}
