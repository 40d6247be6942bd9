use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::buf::FetchMode;
use crate::cli::{open_space, to_json, wprintln};
use crate::innodb::index::FsegHeader;
use crate::innodb::page::{FilHeader, Page, PageId};
use crate::innodb::space::PageAllocation;
use crate::innodb::xdes::XdesEntry;
use crate::IdbError;

/// Options for the page subcommand.
pub struct PageOptions {
    pub file: String,
    pub page: u64,
    pub json: bool,
    pub frames: usize,
    pub mmap: bool,
}

#[derive(Serialize)]
struct PageJson {
    page: Page,
    #[serde(skip_serializing_if = "Option::is_none")]
    allocation: Option<PageAllocation>,
}

/// Decode one page according to the page type in its FIL header.
///
/// FSP header and XDES pages show their initialized extent descriptors,
/// INODE pages their segment entries, and INDEX pages their index header,
/// segment headers and infimum/supremum records. The page's allocation
/// state is read from the extent descriptor that covers it.
pub fn execute(opts: &PageOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let (pool, space_id) = open_space(&opts.file, opts.frames, opts.mmap)?;
    let page_id = PageId::new(space_id, opts.page);

    let page = {
        let guard = pool.get_page(page_id, FetchMode::Normal)?;
        Page::parse(&guard)
            .ok_or_else(|| IdbError::Parse(format!("cannot parse FIL header of page {}", page_id)))?
    };
    let allocation = PageAllocation::lookup(&pool, page_id).ok();

    if opts.json {
        let out = PageJson { page, allocation };
        wprintln!(writer, "{}", to_json(&out)?)?;
        return Ok(());
    }

    print_fil(writer, page_id, page.fil())?;
    if let Some(alloc) = &allocation {
        let state = if alloc.free {
            "free".green()
        } else {
            "used".normal()
        };
        wprintln!(
            writer,
            "  Allocation:  {} (extent {} on page {}, state {}, segment {})",
            state,
            alloc.location.entry_index,
            alloc.location.descriptor_page,
            alloc.extent_state,
            alloc.seg_id
        )?;
    }
    wprintln!(writer)?;

    match &page {
        Page::FspHdr { fsp, extents, .. } => {
            wprintln!(writer, "{}", "FSP Header".bold())?;
            wprintln!(writer, "  Space ID:    {}", fsp.space_id)?;
            wprintln!(writer, "  Size:        {} pages", fsp.size)?;
            wprintln!(writer, "  Free limit:  {}", fsp.free_limit)?;
            wprintln!(writer, "  Flags:       0x{:08x}", fsp.flags)?;
            wprintln!(writer)?;
            print_extents(writer, extents)?;
        }
        Page::Xdes { extents, .. } => print_extents(writer, extents)?,
        Page::Inode { inode, .. } => {
            wprintln!(
                writer,
                "{}",
                format!("Segment inodes ({} valid)", inode.entries.len()).bold()
            )?;
            wprintln!(
                writer,
                "  List node:   prev {}  next {}",
                inode.list_node.prev,
                inode.list_node.next
            )?;
            for entry in &inode.entries {
                wprintln!(
                    writer,
                    "  slot {:<2} seg {:<6} used pages {:<6} fragments {}",
                    entry.slot,
                    entry.seg_id,
                    entry.used_pages(),
                    entry.fragment_pages().count()
                )?;
            }
        }
        Page::Index {
            index,
            leaf_segment,
            internal_segment,
            system_records,
            ..
        } => {
            wprintln!(writer, "{}", "Index Header".bold())?;
            wprintln!(writer, "  Index ID:    {}", index.index_id)?;
            wprintln!(
                writer,
                "  Level:       {}{}",
                index.level,
                if index.is_leaf() { " (leaf)" } else { "" }
            )?;
            wprintln!(writer, "  Records:     {}", index.n_recs)?;
            wprintln!(writer, "  Heap:        {} records, top {}", index.n_heap(), index.heap_top)?;
            wprintln!(writer, "  Dir slots:   {}", index.n_dir_slots)?;
            wprintln!(writer, "  Garbage:     {} bytes", index.garbage)?;
            wprintln!(
                writer,
                "  Direction:   {} ({} inserts)",
                index.direction_name(),
                index.n_direction
            )?;
            wprintln!(
                writer,
                "  Format:      {}",
                if index.is_compact() { "compact" } else { "redundant" }
            )?;
            print_fseg(writer, "Leaf segment", leaf_segment.as_ref())?;
            print_fseg(writer, "Top segment", internal_segment.as_ref())?;
            if let Some(sys) = system_records {
                if !(sys.infimum_tag_ok && sys.supremum_tag_ok) {
                    wprintln!(
                        writer,
                        "  {}",
                        "infimum/supremum tags do not match".yellow()
                    )?;
                }
            }
        }
        Page::Other { .. } => {}
    }
    Ok(())
}

fn print_fil(writer: &mut dyn Write, page_id: PageId, fil: &FilHeader) -> Result<(), IdbError> {
    wprintln!(
        writer,
        "{}",
        format!("Page {} ({})", page_id, fil.page_type.name()).bold()
    )?;
    wprintln!(writer, "  Page number: {}", fil.page_number)?;
    wprintln!(
        writer,
        "  Prev/next:   {} / {}",
        if fil.has_prev() { fil.prev_page.to_string() } else { "-".to_string() },
        if fil.has_next() { fil.next_page.to_string() } else { "-".to_string() }
    )?;
    wprintln!(writer, "  LSN:         {}", fil.lsn)?;
    wprintln!(writer, "  Space ID:    {}", fil.space_id)?;
    wprintln!(writer, "  Checksum:    0x{:08x}", fil.checksum)?;
    Ok(())
}

fn print_extents(writer: &mut dyn Write, extents: &[XdesEntry]) -> Result<(), IdbError> {
    wprintln!(
        writer,
        "{}",
        format!("Extent descriptors ({} initialized)", extents.len()).bold()
    )?;
    for (i, xdes) in extents.iter().enumerate() {
        wprintln!(
            writer,
            "  [{:>3}] {:10} seg {:<6} {:>2} free pages",
            i,
            xdes.state_name(),
            xdes.seg_id,
            xdes.free_page_count()
        )?;
    }
    Ok(())
}

fn print_fseg(writer: &mut dyn Write, label: &str, fseg: Option<&FsegHeader>) -> Result<(), IdbError> {
    match fseg.filter(|f| f.is_set()) {
        Some(f) => wprintln!(
            writer,
            "  {}: inode at page {} offset {}",
            label,
            f.page_no,
            f.offset
        ),
        None => wprintln!(writer, "  {}: -", label),
    }
}
