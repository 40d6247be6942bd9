use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::buf::FetchMode;
use crate::cli::{open_space, to_json, wprint, wprintln};
use crate::innodb::index::{dir_slots, DirSlot, IndexHeader};
use crate::innodb::page::{FilHeader, PageId};
use crate::innodb::record::{RecordChain, RecordInfo};
use crate::IdbError;

/// Options for the records subcommand.
pub struct RecordsOptions {
    pub file: String,
    pub page: u64,
    pub dir: bool,
    pub json: bool,
    pub frames: usize,
    pub mmap: bool,
}

#[derive(Serialize)]
struct RecordsJson {
    page_id: PageId,
    index: IndexHeader,
    records: Vec<RecordInfo>,
    reached_supremum: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    directory: Option<Vec<DirSlot>>,
}

/// Walk the record chain of one compact INDEX page.
///
/// Follows next-record pointers from the infimum to the supremum and lists
/// every user record with its decoded header. A chain that breaks before
/// the supremum is reported, not treated as an error. With `--dir` the page
/// directory slots and their owner records are listed too.
pub fn execute(opts: &RecordsOptions, writer: &mut dyn Write) -> Result<(), IdbError> {
    let (pool, space_id) = open_space(&opts.file, opts.frames, opts.mmap)?;
    let page_id = PageId::new(space_id, opts.page);
    let page = pool.get_page(page_id, FetchMode::Normal)?;

    let fil = FilHeader::parse(&page)
        .ok_or_else(|| IdbError::Parse(format!("cannot parse FIL header of page {}", page_id)))?;
    if !fil.page_type.is_index() {
        return Err(IdbError::Argument(format!(
            "page {} is {}, not an index page",
            page_id,
            fil.page_type.name()
        )));
    }
    let index = IndexHeader::parse(&page)
        .ok_or_else(|| IdbError::Parse(format!("cannot parse index header of page {}", page_id)))?;
    if !index.is_compact() {
        return Err(IdbError::Argument(format!(
            "page {} uses the redundant row format",
            page_id
        )));
    }

    let mut chain = RecordChain::new(&page);
    let records: Vec<RecordInfo> = chain.by_ref().collect();
    let reached_supremum = chain.reached_supremum();
    let directory = opts.dir.then(|| dir_slots(&page));

    if opts.json {
        let out = RecordsJson {
            page_id,
            index,
            records,
            reached_supremum,
            directory,
        };
        wprintln!(writer, "{}", to_json(&out)?)?;
        return Ok(());
    }

    wprintln!(
        writer,
        "{}",
        format!(
            "Page {}: level {}, {} records in header, {} walked",
            page_id,
            index.level,
            index.n_recs,
            records.len()
        )
        .bold()
    )?;
    wprintln!(
        writer,
        "  {:>6}  {:>7}  {:20}  {:>7}  {:>6}",
        "offset",
        "heap_no",
        "type",
        "n_owned",
        "next"
    )?;
    for rec in &records {
        let h = &rec.header;
        wprint!(
            writer,
            "  {:>6}  {:>7}  {:20}  {:>7}  {:>6}",
            rec.offset,
            h.heap_no,
            h.rec_type.name(),
            h.n_owned,
            h.next(rec.offset).map_or("-".to_string(), |n| n.to_string())
        )?;
        if h.delete_mark {
            wprint!(writer, "  {}", "deleted".red())?;
        }
        if h.min_rec {
            wprint!(writer, "  min_rec")?;
        }
        wprintln!(writer)?;
    }
    if !reached_supremum {
        wprintln!(
            writer,
            "{}",
            "Record chain ends before the supremum.".yellow()
        )?;
    }

    if let Some(slots) = directory {
        wprintln!(writer)?;
        wprintln!(writer, "{}", format!("Page directory ({} slots)", slots.len()).bold())?;
        for slot in &slots {
            wprintln!(
                writer,
                "  slot {:<4} owner {:>6}  owns {}",
                slot.slot,
                slot.owner_offset,
                slot.n_owned
            )?;
        }
    }
    Ok(())
}
