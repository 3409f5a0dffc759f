//! Access method layer: a disk-resident B+-tree secondary index.
//!
//! An index file maps fixed-length attribute values to record identifiers.
//! Duplicate keys are allowed; entries are totally ordered by (key, RecId).
//! Leaves are singly linked in key order to support range scans.

mod key;
mod page;
mod scan;
mod tree;

pub use key::{AttrType, CompOp, KeyDesc};
pub use scan::IndexScans;
pub use tree::{
    create_index, delete_entry, destroy_index, dump_index, index_file_name, insert_entry,
    IndexTreeNode,
};
