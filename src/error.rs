//! Error types for the storage engine.

use crate::types::ids::{FileId, PageId, RecId, ScanId};
use thiserror::Error;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in the storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error from the underlying file system
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page lies past the end of the file
    #[error("Page {page} not found in file {file}")]
    PageNotFound { file: FileId, page: PageId },

    /// `get` was issued for a page the caller already holds pinned
    #[error("Page {page} of file {file} is already fixed in the buffer")]
    PageFixed { file: FileId, page: PageId },

    /// `alloc` was issued for a page that is already resident
    #[error("Page {page} of file {file} is already in the buffer")]
    PageInBuffer { file: FileId, page: PageId },

    /// `unfix` was issued for a page the buffer does not hold
    #[error("Page {page} of file {file} is not in the buffer")]
    PageNotInBuffer { file: FileId, page: PageId },

    /// The page is resident but not pinned
    #[error("Page {page} of file {file} is not fixed")]
    PageNotFixed { file: FileId, page: PageId },

    /// Every frame is pinned; no eviction victim exists
    #[error("Buffer pool exhausted: all frames are fixed")]
    BufferPoolExhausted,

    /// The file id does not name an open file
    #[error("File {0} is not open")]
    FileNotOpen(FileId),

    /// Record identifier does not resolve to a slot
    #[error("Invalid record {0}")]
    InvalidRecord(RecId),

    /// Bad or closed scan descriptor
    #[error("Invalid scan descriptor {0}")]
    InvalidScan(ScanId),

    /// No free slot in the scan table
    #[error("Scan table full")]
    ScanTableFull,

    /// Unsupported attribute type tag
    #[error("Invalid attribute type {0:?}")]
    InvalidAttrType(char),

    /// Attribute length out of range for the attribute type
    #[error("Invalid attribute length {0}")]
    InvalidAttrLength(usize),

    /// Key or (key, record) pair not present on delete
    #[error("Key not found")]
    KeyNotFound,

    /// Data corruption detected (e.g., checksum mismatch)
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Invalid operation for the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl StorageError {
    /// Create a corruption error with a message
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create an invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }
}
