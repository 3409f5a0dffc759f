//! Common types used throughout the storage engine.

pub mod ids;

use crate::error::{Result, StorageError};
use ids::ScanId;

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of concurrently open scans per layer (heap and index each)
pub const MAX_SCANS: usize = 20;

/// Maximum length of a file name accepted by the file layer
pub const MAX_FNAME_LENGTH: usize = 80;

/// Maximum length in bytes of an indexed attribute
pub const MAX_ATTR_LENGTH: usize = 256;

/// A raw page buffer
#[derive(Clone)]
pub struct PageBuf {
    data: [u8; PAGE_SIZE],
}

impl PageBuf {
    /// Create a new zeroed page buffer
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Get a reference to the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the raw bytes
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Default for PageBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for PageBuf {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl std::ops::DerefMut for PageBuf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

/// A fixed-capacity table of open scan descriptors.
///
/// Scan ids are slot indices; a closed slot rejects further use until it is
/// handed out again by `open`.
pub struct ScanTable<S> {
    slots: Vec<Option<S>>,
}

impl<S> ScanTable<S> {
    /// Create a table with `capacity` descriptor slots, all free
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    /// Claim a free slot for `scan`, returning its descriptor
    pub fn open(&mut self, scan: S) -> Result<ScanId> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(scan);
                return Ok(ScanId::new(i));
            }
        }
        Err(StorageError::ScanTableFull)
    }

    /// Borrow an open scan mutably
    pub fn get_mut(&mut self, id: ScanId) -> Result<&mut S> {
        self.slots
            .get_mut(id.value())
            .and_then(|slot| slot.as_mut())
            .ok_or(StorageError::InvalidScan(id))
    }

    /// Release a scan slot, returning its state for teardown
    pub fn close(&mut self, id: ScanId) -> Result<S> {
        self.slots
            .get_mut(id.value())
            .and_then(|slot| slot.take())
            .ok_or(StorageError::InvalidScan(id))
    }
}
