//! Slotted heap-page layout.
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │ Header: num_slots | free_space_offset | reserved │
//! ├──────────────────────────────────────────────────┤
//! │ Slot directory: (offset, length) pairs   →       │
//! ├──────────────────────────────────────────────────┤
//! │                  Free Space                      │
//! ├──────────────────────────────────────────────────┤
//! │ Record data               ← grows from page end  │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! All header and slot fields are little-endian 32-bit integers. A slot
//! length of -1 marks a tombstone; tombstoned slot indices are never reused.

use crate::error::{Result, StorageError};
use crate::types::PAGE_SIZE;

/// Heap page header size: num_slots, free_space_offset, reserved next-page
pub const HEAP_HEADER_SIZE: usize = 12;

/// Slot directory entry size: record offset and length
pub const SLOT_SIZE: usize = 8;

const TOMBSTONE: i32 = -1;

/// Decoded state of one slot directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Slot points at a live record
    Live { offset: usize, len: usize },
    /// Slot was deleted; its index stays allocated
    Tombstone,
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn read_i32(data: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn write_u32(data: &mut [u8], at: usize, value: u32) {
    data[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_i32(data: &mut [u8], at: usize, value: i32) {
    data[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Read-only view over a slotted heap page
pub struct HeapPage<'a> {
    data: &'a [u8],
}

impl<'a> HeapPage<'a> {
    /// Wrap a pinned page's bytes
    pub fn new(data: &'a [u8]) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Number of slots in the directory, live and tombstoned
    pub fn num_slots(&self) -> usize {
        read_u32(self.data, 0) as usize
    }

    /// Offset where the record data region begins
    pub fn free_space_offset(&self) -> usize {
        read_u32(self.data, 4) as usize
    }

    /// Bytes available for one more record plus its slot
    pub fn free_space(&self) -> usize {
        self.free_space_offset()
            .saturating_sub(HEAP_HEADER_SIZE + self.num_slots() * SLOT_SIZE)
    }

    /// Whether a record of `len` bytes fits on this page
    pub fn fits(&self, len: usize) -> bool {
        self.free_space() >= len + SLOT_SIZE
    }

    /// Decode the slot directory entry at `slot`
    pub fn slot(&self, slot: usize) -> Result<SlotState> {
        if slot >= self.num_slots() {
            return Err(StorageError::invalid_operation(format!(
                "slot {} out of bounds (count: {})",
                slot,
                self.num_slots()
            )));
        }
        let at = HEAP_HEADER_SIZE + slot * SLOT_SIZE;
        let len = read_i32(self.data, at + 4);
        if len == TOMBSTONE {
            Ok(SlotState::Tombstone)
        } else {
            Ok(SlotState::Live {
                offset: read_u32(self.data, at) as usize,
                len: len as usize,
            })
        }
    }

    /// Borrow the bytes of a live record, `None` for a tombstone
    pub fn record(&self, slot: usize) -> Result<Option<&'a [u8]>> {
        match self.slot(slot)? {
            SlotState::Live { offset, len } => Ok(Some(&self.data[offset..offset + len])),
            SlotState::Tombstone => Ok(None),
        }
    }
}

/// Mutable view over a slotted heap page
pub struct HeapPageMut<'a> {
    data: &'a mut [u8],
}

impl<'a> HeapPageMut<'a> {
    /// Wrap a pinned page's bytes
    pub fn new(data: &'a mut [u8]) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Format a freshly allocated page as an empty slotted page
    pub fn init(data: &'a mut [u8]) -> Self {
        write_u32(data, 0, 0);
        write_u32(data, 4, PAGE_SIZE as u32);
        write_u32(data, 8, 0);
        Self { data }
    }

    fn view(&self) -> HeapPage<'_> {
        HeapPage::new(&*self.data)
    }

    /// Append a record, returning its slot index.
    ///
    /// The caller has already checked `fits`; a record that does not fit is
    /// an invalid operation.
    pub fn append(&mut self, record: &[u8]) -> Result<u32> {
        let num_slots = self.view().num_slots();
        let free_offset = self.view().free_space_offset();

        if !self.view().fits(record.len()) {
            return Err(StorageError::invalid_operation(format!(
                "record of {} bytes does not fit ({} free)",
                record.len(),
                self.view().free_space()
            )));
        }

        let offset = free_offset - record.len();
        self.data[offset..offset + record.len()].copy_from_slice(record);

        let at = HEAP_HEADER_SIZE + num_slots * SLOT_SIZE;
        write_u32(self.data, at, offset as u32);
        write_i32(self.data, at + 4, record.len() as i32);

        write_u32(self.data, 0, (num_slots + 1) as u32);
        write_u32(self.data, 4, offset as u32);
        Ok(num_slots as u32)
    }

    /// Tombstone the record at `slot`. The space is not reclaimed and the
    /// slot index is never reused.
    pub fn tombstone(&mut self, slot: usize) -> Result<()> {
        if slot >= self.view().num_slots() {
            return Err(StorageError::invalid_operation(format!(
                "slot {} out of bounds",
                slot
            )));
        }
        let at = HEAP_HEADER_SIZE + slot * SLOT_SIZE;
        write_i32(self.data, at + 4, TOMBSTONE);
        Ok(())
    }
}
