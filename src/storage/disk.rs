//! Positioned page I/O on a single database file.
//!
//! A `DiskFile` reads and writes whole pages at page-aligned offsets. The
//! page count is derived from the file length, so page numbering is dense
//! from 0 and reopening a file reproduces the same iteration sequence.

use crate::error::{Result, StorageError};
use crate::types::ids::{FileId, PageId};
use crate::types::PAGE_SIZE;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// An open database file supporting page-granular reads and writes
pub struct DiskFile {
    file: File,
    page_count: u32,
    /// Identity of this file in the open-file table, for error reporting
    id: FileId,
}

impl DiskFile {
    /// Open an existing file for page I/O
    pub fn open(path: &Path, id: FileId) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let len = file.metadata()?.len();
        if len % PAGE_SIZE as u64 != 0 {
            return Err(StorageError::corruption(format!(
                "file length {} is not a multiple of the page size",
                len
            )));
        }

        Ok(Self {
            file,
            page_count: (len / PAGE_SIZE as u64) as u32,
            id,
        })
    }

    /// Number of pages currently allocated in this file
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Read one page from disk into `buf`
    pub fn read_page(&mut self, page: PageId, buf: &mut [u8]) -> Result<()> {
        if page.value() >= self.page_count {
            return Err(StorageError::PageNotFound {
                file: self.id,
                page,
            });
        }

        self.file
            .seek(SeekFrom::Start(page.file_offset(PAGE_SIZE)))?;
        self.file.read_exact(&mut buf[..PAGE_SIZE])?;
        Ok(())
    }

    /// Write one page to disk
    pub fn write_page(&mut self, page: PageId, buf: &[u8]) -> Result<()> {
        if page.value() >= self.page_count {
            return Err(StorageError::PageNotFound {
                file: self.id,
                page,
            });
        }
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::invalid_operation(format!(
                "page data must be {} bytes, got {}",
                PAGE_SIZE,
                buf.len()
            )));
        }

        self.file
            .seek(SeekFrom::Start(page.file_offset(PAGE_SIZE)))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    /// Extend the file by one zeroed page and return its number
    pub fn alloc_page(&mut self) -> Result<PageId> {
        let page = PageId::new(self.page_count);
        self.page_count += 1;
        self.file
            .set_len(self.page_count as u64 * PAGE_SIZE as u64)?;
        Ok(page)
    }

    /// Sync file contents to stable storage
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
