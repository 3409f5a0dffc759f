//! # relstore
//!
//! A single-node, disk-backed storage core for relational data, composed of
//! three cooperating layers:
//!
//! - **Paged files** (`pf`, `storage`, `buffer`): fixed 4 KiB pages served
//!   through a pinning buffer pool with an LRU or MRU replacement policy
//!   and I/O statistics.
//! - **Heap files** (`heap`): variable-length records on slotted pages with
//!   tombstone deletion and stable record identifiers.
//! - **Access method** (`index`): a disk-resident B+-tree secondary index
//!   mapping attribute values to record identifiers, with duplicate keys
//!   ordered by RecId and linked leaves for range scans.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relstore::{AttrType, CompOp, Config, Engine, KeyDesc};
//!
//! let mut engine = Engine::new(Config::new().buffer_capacity(128));
//!
//! engine.create_file("emp.hf".as_ref())?;
//! let heap = engine.open_file("emp.hf".as_ref())?;
//! let rid = engine.insert_record(heap, b"ada;1815")?;
//!
//! let desc = KeyDesc::new(AttrType::Int, 4)?;
//! engine.create_index("emp.hf".as_ref(), 0, desc)?;
//! let index = engine.open_file("emp.hf.0".as_ref())?;
//! engine.insert_entry(index, desc, &1815i32.to_le_bytes(), rid)?;
//!
//! let scan = engine.open_index_scan(index, desc, CompOp::Eq, Some(&1815i32.to_le_bytes()))?;
//! while let Some(found) = engine.next_entry(scan)? {
//!     assert_eq!(found, rid);
//! }
//! engine.close_index_scan(scan)?;
//! ```

pub mod buffer;
pub mod error;
pub mod heap;
pub mod index;
pub mod pf;
pub mod storage;
pub mod types;

pub use buffer::{IoStats, ReplacementPolicy};
pub use error::{Result, StorageError};
pub use index::{AttrType, CompOp, IndexTreeNode, KeyDesc};
pub use pf::PagedFiles;
pub use types::ids::{FileId, PageId, RecId, ScanId};
pub use types::{MAX_ATTR_LENGTH, MAX_FNAME_LENGTH, MAX_SCANS, PAGE_SIZE};

use heap::HeapScans;
use index::IndexScans;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Number of frames in the buffer pool (default: 64)
    pub buffer_capacity: usize,
    /// Frame replacement policy (default: LRU)
    pub policy: ReplacementPolicy,
}

impl Config {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self {
            buffer_capacity: 64,
            policy: ReplacementPolicy::Lru,
        }
    }

    /// Set the buffer pool capacity in frames
    pub fn buffer_capacity(mut self, frames: usize) -> Self {
        self.buffer_capacity = frames;
        self
    }

    /// Set the frame replacement policy
    pub fn policy(mut self, policy: ReplacementPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// The storage engine context.
///
/// Owns every piece of otherwise-global state — the buffer pool, the open
/// file table and both scan tables — and exposes the public operations of
/// all three layers. The engine is single-threaded; operations take
/// `&mut self` and run to completion.
pub struct Engine {
    pf: PagedFiles,
    heap_scans: HeapScans,
    index_scans: IndexScans,
}

impl Engine {
    /// Construct an engine with its own buffer pool, file table and scan
    /// tables
    pub fn new(config: Config) -> Self {
        Self {
            pf: PagedFiles::new(config.buffer_capacity, config.policy),
            heap_scans: HeapScans::new(),
            index_scans: IndexScans::new(),
        }
    }

    // --- Paged-file operations ---

    /// Create a new, empty paged file
    pub fn create_file(&self, path: &Path) -> Result<()> {
        self.pf.create_file(path)
    }

    /// Remove a paged file from disk; fails while the file is open
    pub fn destroy_file(&self, path: &Path) -> Result<()> {
        self.pf.destroy_file(path)
    }

    /// Open a paged file
    pub fn open_file(&mut self, path: &Path) -> Result<FileId> {
        self.pf.open_file(path)
    }

    /// Close a paged file, flushing its dirty pages; fails while any page
    /// of the file is pinned (e.g. by an open heap scan)
    pub fn close_file(&mut self, file: FileId) -> Result<()> {
        self.pf.close_file(file)
    }

    /// Extend a file by one pinned, zeroed page
    pub fn alloc_page(&mut self, file: FileId) -> Result<PageId> {
        self.pf.alloc_page(file)
    }

    /// Pin an existing page
    pub fn get_page(&mut self, file: FileId, page: PageId) -> Result<()> {
        self.pf.get_page(file, page)
    }

    /// Pin the page after `prev`, or the first page for `None`;
    /// `Ok(None)` past the last page
    pub fn next_page(&mut self, file: FileId, prev: Option<PageId>) -> Result<Option<PageId>> {
        self.pf.next_page(file, prev)
    }

    /// Unpin a page, optionally flagging it dirty
    pub fn unfix_page(&mut self, file: FileId, page: PageId, dirty: bool) -> Result<()> {
        self.pf.unfix_page(file, page, dirty)
    }

    /// Mark an already-pinned page dirty and most recently used
    pub fn mark_used(&mut self, file: FileId, page: PageId) -> Result<()> {
        self.pf.mark_used(file, page)
    }

    /// Borrow the bytes of a pinned page
    pub fn page(&self, file: FileId, page: PageId) -> Result<&[u8]> {
        self.pf.page(file, page)
    }

    /// Mutably borrow the bytes of a pinned page
    pub fn page_mut(&mut self, file: FileId, page: PageId) -> Result<&mut [u8]> {
        self.pf.page_mut(file, page)
    }

    /// Number of pages allocated in a file
    pub fn page_count(&mut self, file: FileId) -> Result<u32> {
        self.pf.page_count(file)
    }

    /// Buffer pool I/O statistics
    pub fn io_stats(&self) -> IoStats {
        self.pf.stats()
    }

    // --- Heap file operations ---

    /// Insert a record into a heap file, returning its identifier
    pub fn insert_record(&mut self, file: FileId, record: &[u8]) -> Result<RecId> {
        heap::insert(&mut self.pf, file, record)
    }

    /// Delete the record named by `rid` from a heap file
    pub fn delete_record(&mut self, file: FileId, rid: RecId) -> Result<()> {
        heap::delete(&mut self.pf, file, rid)
    }

    /// Open a scan over every live record of a heap file
    pub fn open_scan(&mut self, file: FileId) -> Result<ScanId> {
        self.heap_scans.open(file)
    }

    /// Next live record of a heap scan, or `Ok(None)` at the end
    pub fn next_record(&mut self, scan: ScanId) -> Result<Option<(Vec<u8>, RecId)>> {
        self.heap_scans.next(&mut self.pf, scan)
    }

    /// Close a heap scan, releasing its pinned page
    pub fn close_scan(&mut self, scan: ScanId) -> Result<()> {
        self.heap_scans.close(&mut self.pf, scan)
    }

    // --- Index operations ---

    /// Create index number `index_no` on `data_file`; the index file is
    /// named `"<data_file>.<index_no>"`
    pub fn create_index(&mut self, data_file: &Path, index_no: u32, desc: KeyDesc) -> Result<()> {
        index::create_index(&mut self.pf, data_file, index_no, desc)
    }

    /// Remove an index file from disk
    pub fn destroy_index(&mut self, data_file: &Path, index_no: u32) -> Result<()> {
        index::destroy_index(&mut self.pf, data_file, index_no)
    }

    /// Insert the entry `(key, rid)` into an open index file
    pub fn insert_entry(
        &mut self,
        file: FileId,
        desc: KeyDesc,
        key: &[u8],
        rid: RecId,
    ) -> Result<()> {
        index::insert_entry(&mut self.pf, file, desc, key, rid)
    }

    /// Delete the entry `(key, rid)` from an open index file
    pub fn delete_entry(
        &mut self,
        file: FileId,
        desc: KeyDesc,
        key: &[u8],
        rid: RecId,
    ) -> Result<()> {
        index::delete_entry(&mut self.pf, file, desc, key, rid)
    }

    /// Open an index scan for entries satisfying `op` against `value`
    /// (`value` is ignored for `CompOp::All`)
    pub fn open_index_scan(
        &mut self,
        file: FileId,
        desc: KeyDesc,
        op: CompOp,
        value: Option<&[u8]>,
    ) -> Result<ScanId> {
        self.index_scans.open(&mut self.pf, file, desc, op, value)
    }

    /// Next matching record identifier of an index scan, or `Ok(None)`
    /// once exhausted
    pub fn next_entry(&mut self, scan: ScanId) -> Result<Option<RecId>> {
        self.index_scans.next(&mut self.pf, scan)
    }

    /// Close an index scan
    pub fn close_index_scan(&mut self, scan: ScanId) -> Result<()> {
        self.index_scans.close(scan)
    }

    /// Export the structure of an open index file for inspection
    pub fn dump_index(&mut self, file: FileId) -> Result<IndexTreeNode> {
        index::dump_index(&mut self.pf, file)
    }
}
