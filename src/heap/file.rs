//! Heap file operations: insert, delete, full scans.

use crate::error::{Result, StorageError};
use crate::heap::page::{HeapPage, HeapPageMut, HEAP_HEADER_SIZE, SLOT_SIZE};
use crate::pf::PagedFiles;
use crate::types::ids::{FileId, PageId, RecId, ScanId};
use crate::types::{ScanTable, MAX_SCANS, PAGE_SIZE};
use log::trace;

/// Insert a record, returning its identifier.
///
/// Pages are probed in file order for the first with room for the record
/// and one slot; each probed page is unpinned before moving on and the
/// chosen page is re-pinned for the mutation. If no page fits, a fresh page
/// is allocated and initialized.
pub fn insert(pf: &mut PagedFiles, file: FileId, record: &[u8]) -> Result<RecId> {
    if record.is_empty() || record.len() + SLOT_SIZE > PAGE_SIZE - HEAP_HEADER_SIZE {
        return Err(StorageError::invalid_operation(format!(
            "record length {} not storable on one page",
            record.len()
        )));
    }

    let mut chosen = None;
    let mut prev = None;
    while let Some(page) = pf.next_page(file, prev)? {
        let fits = HeapPage::new(pf.page(file, page)?).fits(record.len());
        pf.unfix_page(file, page, false)?;
        if fits {
            chosen = Some(page);
            break;
        }
        prev = Some(page);
    }

    let page = match chosen {
        Some(page) => {
            pf.get_page(file, page)?;
            page
        }
        None => {
            let page = pf.alloc_page(file)?;
            HeapPageMut::init(pf.page_mut(file, page)?);
            trace!("heap file {} grew to page {}", file, page);
            page
        }
    };

    let slot = HeapPageMut::new(pf.page_mut(file, page)?).append(record)?;
    pf.unfix_page(file, page, true)?;
    Ok(RecId::new(page, slot))
}

/// Tombstone the record named by `rid`.
///
/// The slot index stays allocated and the record bytes are not reclaimed,
/// so other records' identifiers are unaffected.
pub fn delete(pf: &mut PagedFiles, file: FileId, rid: RecId) -> Result<()> {
    pf.get_page(file, rid.page)?;

    let in_bounds = {
        let page = HeapPage::new(pf.page(file, rid.page)?);
        (rid.slot as usize) < page.num_slots()
    };
    if !in_bounds {
        pf.unfix_page(file, rid.page, false)?;
        return Err(StorageError::InvalidRecord(rid));
    }

    HeapPageMut::new(pf.page_mut(file, rid.page)?).tombstone(rid.slot as usize)?;
    pf.unfix_page(file, rid.page, true)?;
    Ok(())
}

/// Position of an open heap scan.
///
/// `At` holds its page pinned between `next` calls; `End` is sticky.
enum HeapCursor {
    Start,
    At { page: PageId, next_slot: usize },
    End,
}

struct HeapScan {
    file: FileId,
    cursor: HeapCursor,
}

/// Table of open heap scans
pub struct HeapScans {
    table: ScanTable<HeapScan>,
}

impl HeapScans {
    /// Create the scan table with all descriptors free
    pub fn new() -> Self {
        Self {
            table: ScanTable::new(MAX_SCANS),
        }
    }

    /// Open a scan over every live record of `file`
    pub fn open(&mut self, file: FileId) -> Result<ScanId> {
        self.table.open(HeapScan {
            file,
            cursor: HeapCursor::Start,
        })
    }

    /// Return the next live record and its identifier, or `Ok(None)` once
    /// the file is exhausted. Tombstoned slots are skipped.
    pub fn next(&mut self, pf: &mut PagedFiles, id: ScanId) -> Result<Option<(Vec<u8>, RecId)>> {
        let scan = self.table.get_mut(id)?;
        let file = scan.file;

        let (mut page, mut next_slot) = match scan.cursor {
            HeapCursor::Start => match pf.next_page(file, None)? {
                Some(page) => (page, 0),
                None => {
                    scan.cursor = HeapCursor::End;
                    return Ok(None);
                }
            },
            HeapCursor::At { page, next_slot } => (page, next_slot),
            HeapCursor::End => return Ok(None),
        };

        loop {
            let view = HeapPage::new(pf.page(file, page)?);
            if next_slot < view.num_slots() {
                let found = view.record(next_slot)?.map(|bytes| bytes.to_vec());
                let slot = next_slot;
                next_slot += 1;
                if let Some(bytes) = found {
                    scan.cursor = HeapCursor::At { page, next_slot };
                    return Ok(Some((bytes, RecId::new(page, slot as u32))));
                }
                continue;
            }

            // Page exhausted: hand the pin over to the next page
            pf.unfix_page(file, page, false)?;
            match pf.next_page(file, Some(page))? {
                Some(next) => {
                    page = next;
                    next_slot = 0;
                }
                None => {
                    scan.cursor = HeapCursor::End;
                    return Ok(None);
                }
            }
        }
    }

    /// Close a scan, releasing its pinned page if it holds one
    pub fn close(&mut self, pf: &mut PagedFiles, id: ScanId) -> Result<()> {
        let scan = self.table.close(id)?;
        if let HeapCursor::At { page, .. } = scan.cursor {
            pf.unfix_page(scan.file, page, false)?;
        }
        Ok(())
    }
}

impl Default for HeapScans {
    fn default() -> Self {
        Self::new()
    }
}
