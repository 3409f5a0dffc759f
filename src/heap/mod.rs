//! Heap file layer: slotted pages of variable-length records.
//!
//! Records are addressed by `RecId` (page, slot). Deletion tombstones the
//! slot without reclaiming space, so a `RecId` stays valid for the lifetime
//! of its record.

mod file;
mod page;

pub use file::{delete, insert, HeapScans};
pub use page::{HeapPage, HeapPageMut, SlotState, HEAP_HEADER_SIZE, SLOT_SIZE};
