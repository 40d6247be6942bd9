use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::buf::PoolStats;
use crate::cli::{open_space, to_json, wprintln};
use crate::innodb::dict::DictHeader;
use crate::innodb::flst::ListBaseNode;
use crate::innodb::space::{ExtentList, InodeList, SpaceSummary};
use crate::IdbError;

/// Options for the space subcommand.
pub struct SpaceOptions {
    pub file: String,
    pub verbose: bool,
    pub stats: bool,
    pub json: bool,
    pub frames: usize,
    pub mmap: bool,
}

#[derive(Serialize)]
struct SpaceJson<'a> {
    file: &'a str,
    summary: &'a SpaceSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    dictionary: Option<&'a DictHeader>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pool: Option<PoolStats>,
}

/// Summarize the allocation structures of a tablespace.
///
/// Reads the FSP header of page 0 and walks the three FSP extent lists
/// (`FREE`, `FREE_FRAG`, `FULL_FRAG`) and both segment inode page lists
/// through the buffer pool. A list that ends before its declared length
/// is reported as truncated rather than failing the command. For the
/// system tablespace the data dictionary header is shown as well.
pub fn execute(opts: &SpaceOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let (pool, space_id) = open_space(&opts.file, opts.frames, opts.mmap)?;
    let summary = SpaceSummary::collect(&pool, space_id)?;
    let dictionary = if space_id == DictHeader::PAGE_ID.space_id {
        DictHeader::fetch(&pool)
            .map_err(|e| log::warn!("cannot read the dictionary header: {}", e))
            .ok()
    } else {
        None
    };

    if opts.json {
        let out = SpaceJson {
            file: &opts.file,
            summary: &summary,
            dictionary: dictionary.as_ref(),
            pool: opts.stats.then(|| pool.stats()),
        };
        wprintln!(writer, "{}", to_json(&out)?)?;
        return Ok(());
    }

    let fsp = &summary.fsp;
    wprintln!(writer, "{}", format!("Space {} ({})", space_id, opts.file).bold())?;
    wprintln!(writer, "  Size:             {} pages", fsp.size)?;
    wprintln!(writer, "  Free limit:       {}", fsp.free_limit)?;
    wprintln!(writer, "  Flags:            0x{:08x}", fsp.flags)?;
    wprintln!(writer, "  Frag pages used:  {}", fsp.frag_n_used)?;
    wprintln!(writer, "  Next segment id:  {}", fsp.next_unused_seg_id)?;
    wprintln!(writer)?;

    wprintln!(writer, "{}", "Extent lists".bold())?;
    for list in &summary.extent_lists {
        print_extent_list(writer, list, opts.verbose)?;
    }
    wprintln!(writer)?;

    wprintln!(writer, "{}", "Inode page lists".bold())?;
    for list in &summary.inode_lists {
        print_inode_list(writer, list, opts.verbose)?;
    }

    if let Some(dict) = &dictionary {
        wprintln!(writer)?;
        print_dictionary(writer, dict)?;
    }

    if summary.truncated() {
        wprintln!(writer)?;
        wprintln!(
            writer,
            "{}",
            "Some lists end before their declared length; the tablespace may be truncated.".yellow()
        )?;
    }

    if opts.stats {
        wprintln!(writer)?;
        print_pool_stats(writer, &pool.stats())?;
    }
    Ok(())
}

fn list_line(name: &str, base_len: u32, walked: usize, truncated: bool) -> String {
    let status = if truncated {
        format!("{} of {} reached", walked, base_len).yellow().to_string()
    } else {
        format!("{}", walked)
    };
    format!("  {:22} {}", name, status)
}

fn print_extent_list(writer: &mut dyn Write, list: &ExtentList, verbose: bool) -> Result<(), IdbError> {
    wprintln!(
        writer,
        "{}",
        list_line(list.name, list.length, list.extents.len(), list.truncated)
    )?;
    if verbose {
        for ext in &list.extents {
            wprintln!(
                writer,
                "    extent @ page {:<8} {:10} seg {:<6} {:>2} free  (node {})",
                ext.first_page,
                ext.state,
                ext.seg_id,
                ext.free_pages,
                ext.addr
            )?;
        }
    }
    Ok(())
}

fn print_inode_list(writer: &mut dyn Write, list: &InodeList, verbose: bool) -> Result<(), IdbError> {
    wprintln!(
        writer,
        "{}",
        list_line(list.name, list.length, list.pages.len(), list.truncated)
    )?;
    for page in &list.pages {
        wprintln!(
            writer,
            "    INODE page {}: {} segments",
            page.page_no,
            page.segments.len()
        )?;
        if !verbose {
            continue;
        }
        for seg in &page.segments {
            let frags: Vec<String> = seg.fragment_pages().map(|p| p.to_string()).collect();
            wprintln!(
                writer,
                "      slot {:<2} seg {:<6} used {:<6} {} {} {} frag [{}]",
                seg.slot,
                seg.seg_id,
                seg.used_pages(),
                base_summary("free", &seg.free),
                base_summary("not_full", &seg.not_full),
                base_summary("full", &seg.full),
                frags.join(", ")
            )?;
        }
    }
    Ok(())
}

fn print_dictionary(writer: &mut dyn Write, dict: &DictHeader) -> Result<(), IdbError> {
    wprintln!(writer, "{}", "Data dictionary header".bold())?;
    wprintln!(
        writer,
        "  Next ids:  row {}  table {}  index {}",
        dict.row_id,
        dict.table_id,
        dict.index_id
    )?;
    wprintln!(writer, "  Max space: {}", dict.max_space_id)?;
    for (name, root) in dict.system_roots() {
        wprintln!(writer, "  {:14} root page {}", name, root.page_no)?;
    }
    Ok(())
}

fn base_summary(name: &str, base: &ListBaseNode) -> String {
    format!("{}={}", name, base.length)
}

pub(crate) fn print_pool_stats(writer: &mut dyn Write, stats: &PoolStats) -> Result<(), IdbError> {
    wprintln!(writer, "{}", "Buffer pool".bold())?;
    wprintln!(
        writer,
        "  Frames: {} total, {} free, {} on LRU ({} old)",
        stats.total,
        stats.free,
        stats.lru,
        stats.old
    )?;
    wprintln!(
        writer,
        "  Hits: {}  Misses: {}  Evictions: {}",
        stats.hits,
        stats.misses,
        stats.evictions
    )?;
    Ok(())
}
