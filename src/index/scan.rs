//! Index range scans.
//!
//! A scan positions itself once at open time, then walks the linked leaf
//! chain. No pin is held between `next` calls; each call re-pins the
//! current leaf, so a scan costs one buffer access per returned entry.

use crate::error::{Result, StorageError};
use crate::index::key::{CompOp, KeyDesc};
use crate::index::page::LeafPage;
use crate::index::tree::{check_attr, descend_to_leaf, read_descriptor};
use crate::pf::PagedFiles;
use crate::types::ids::{FileId, PageId, RecId, ScanId};
use crate::types::{ScanTable, MAX_SCANS};

/// Position of an open index scan
enum IndexCursor {
    At { leaf: PageId, index: usize },
    End,
}

/// State of one open index scan
struct IndexScan {
    file: FileId,
    desc: KeyDesc,
    op: CompOp,
    /// Reference value; `None` only for `CompOp::All`
    value: Option<Vec<u8>>,
    cursor: IndexCursor,
}

/// Table of open index scans
pub struct IndexScans {
    table: ScanTable<IndexScan>,
}

impl IndexScans {
    /// Create the scan table with all descriptors free
    pub fn new() -> Self {
        Self {
            table: ScanTable::new(MAX_SCANS),
        }
    }

    /// Open a scan over `file` for entries satisfying `op` against `value`.
    ///
    /// `value` is ignored for `CompOp::All` and required otherwise.
    /// Equality-like operators position by descending the tree; the rest
    /// start from the leftmost leaf.
    pub fn open(
        &mut self,
        pf: &mut PagedFiles,
        file: FileId,
        desc: KeyDesc,
        op: CompOp,
        value: Option<&[u8]>,
    ) -> Result<ScanId> {
        let descriptor = read_descriptor(pf, file)?;
        check_attr(&descriptor, &desc)?;

        let value = match op {
            CompOp::All => None,
            _ => {
                let value = value.ok_or_else(|| {
                    StorageError::invalid_operation("scan operator requires a value")
                })?;
                desc.check_key(value)?;
                Some(value.to_vec())
            }
        };

        let cursor = match (op, value.as_deref()) {
            (CompOp::Eq | CompOp::Ge | CompOp::Gt, Some(value)) => {
                let leaf =
                    descend_to_leaf(pf, file, &desc, descriptor.root, value, false, None)?;
                let index = {
                    let view = LeafPage::new(pf.page(file, leaf)?)?;
                    view.search_key(&desc, value, op == CompOp::Gt)
                };
                pf.unfix_page(file, leaf, false)?;
                IndexCursor::At { leaf, index }
            }
            _ => IndexCursor::At {
                leaf: descriptor.leftmost,
                index: 0,
            },
        };

        self.table.open(IndexScan {
            file,
            desc,
            op,
            value,
            cursor,
        })
    }

    /// Return the next matching record identifier, or `Ok(None)` once the
    /// scan is exhausted.
    pub fn next(&mut self, pf: &mut PagedFiles, id: ScanId) -> Result<Option<RecId>> {
        let scan = self.table.get_mut(id)?;
        let file = scan.file;

        loop {
            let (leaf, index) = match scan.cursor {
                IndexCursor::At { leaf, index } => (leaf, index),
                IndexCursor::End => return Ok(None),
            };

            pf.get_page(file, leaf)?;
            let view = LeafPage::new(pf.page(file, leaf)?)?;

            if index >= view.num_keys() {
                // Leaf exhausted (possibly emptied by deletes); follow the chain
                let next = view.next_leaf();
                pf.unfix_page(file, leaf, false)?;
                if !next.is_valid() {
                    scan.cursor = IndexCursor::End;
                    return Ok(None);
                }
                scan.cursor = IndexCursor::At {
                    leaf: next,
                    index: 0,
                };
                continue;
            }

            let matched = match &scan.value {
                None => true,
                Some(value) => scan.op.matches(scan.desc.compare(view.key(index), value)),
            };
            let rid = view.rid(index);
            pf.unfix_page(file, leaf, false)?;

            if matched {
                scan.cursor = IndexCursor::At {
                    leaf,
                    index: index + 1,
                };
                return Ok(Some(rid));
            }
            if scan.op.stops_on_mismatch() {
                scan.cursor = IndexCursor::End;
                return Ok(None);
            }
            scan.cursor = IndexCursor::At {
                leaf,
                index: index + 1,
            };
        }
    }

    /// Close a scan, releasing its descriptor slot. No pins are held
    /// between calls, so there is nothing else to release.
    pub fn close(&mut self, id: ScanId) -> Result<()> {
        self.table.close(id).map(|_| ())
    }
}

impl Default for IndexScans {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ReplacementPolicy;
    use crate::index::key::AttrType;
    use crate::index::tree::{create_index, index_file_name, insert_entry};
    use tempfile::tempdir;

    fn int_desc() -> KeyDesc {
        KeyDesc::new(AttrType::Int, 4).unwrap()
    }

    fn key(v: i32) -> [u8; 4] {
        v.to_le_bytes()
    }

    fn rid(slot: u32) -> RecId {
        RecId::new(PageId::new(0), slot)
    }

    fn setup_with_keys(values: &[i32]) -> (tempfile::TempDir, PagedFiles, FileId, IndexScans) {
        let dir = tempdir().unwrap();
        let data = dir.path().join("emp.hf");
        let mut pf = PagedFiles::new(16, ReplacementPolicy::Lru);
        create_index(&mut pf, &data, 0, int_desc()).unwrap();
        let file = pf.open_file(&index_file_name(&data, 0)).unwrap();
        for (i, v) in values.iter().enumerate() {
            insert_entry(&mut pf, file, int_desc(), &key(*v), rid(i as u32)).unwrap();
        }
        (dir, pf, file, IndexScans::new())
    }

    fn drain(
        pf: &mut PagedFiles,
        scans: &mut IndexScans,
        file: FileId,
        op: CompOp,
        value: Option<i32>,
    ) -> Vec<RecId> {
        let bytes = value.map(|v| key(v));
        let id = scans
            .open(pf, file, int_desc(), op, bytes.as_ref().map(|b| &b[..]))
            .unwrap();
        let mut out = Vec::new();
        while let Some(rid) = scans.next(pf, id).unwrap() {
            out.push(rid);
        }
        scans.close(id).unwrap();
        out
    }

    #[test]
    fn test_eq_scan() {
        let (_dir, mut pf, file, mut scans) = setup_with_keys(&[10, 20, 20, 30]);

        let hits = drain(&mut pf, &mut scans, file, CompOp::Eq, Some(20));
        assert_eq!(hits, vec![rid(1), rid(2)]);

        let miss = drain(&mut pf, &mut scans, file, CompOp::Eq, Some(25));
        assert!(miss.is_empty());
    }

    #[test]
    fn test_ordered_operators() {
        let (_dir, mut pf, file, mut scans) = setup_with_keys(&[1, 2, 3, 4, 5]);

        assert_eq!(
            drain(&mut pf, &mut scans, file, CompOp::Lt, Some(3)),
            vec![rid(0), rid(1)]
        );
        assert_eq!(
            drain(&mut pf, &mut scans, file, CompOp::Le, Some(3)),
            vec![rid(0), rid(1), rid(2)]
        );
        assert_eq!(
            drain(&mut pf, &mut scans, file, CompOp::Gt, Some(3)),
            vec![rid(3), rid(4)]
        );
        assert_eq!(
            drain(&mut pf, &mut scans, file, CompOp::Ge, Some(3)),
            vec![rid(2), rid(3), rid(4)]
        );
        assert_eq!(
            drain(&mut pf, &mut scans, file, CompOp::Ne, Some(3)),
            vec![rid(0), rid(1), rid(3), rid(4)]
        );
        assert_eq!(
            drain(&mut pf, &mut scans, file, CompOp::All, None).len(),
            5
        );
    }

    #[test]
    fn test_all_on_empty_index() {
        let (_dir, mut pf, file, mut scans) = setup_with_keys(&[]);
        assert!(drain(&mut pf, &mut scans, file, CompOp::All, None).is_empty());
    }

    #[test]
    fn test_missing_value_rejected() {
        let (_dir, mut pf, file, mut scans) = setup_with_keys(&[1]);
        assert!(scans
            .open(&mut pf, file, int_desc(), CompOp::Eq, None)
            .is_err());
    }

    #[test]
    fn test_scan_exhaustion_is_sticky() {
        let (_dir, mut pf, file, mut scans) = setup_with_keys(&[7]);

        let id = scans
            .open(&mut pf, file, int_desc(), CompOp::Eq, Some(&key(7)))
            .unwrap();
        assert_eq!(scans.next(&mut pf, id).unwrap(), Some(rid(0)));
        assert_eq!(scans.next(&mut pf, id).unwrap(), None);
        assert_eq!(scans.next(&mut pf, id).unwrap(), None);
        scans.close(id).unwrap();

        assert!(matches!(
            scans.next(&mut pf, id),
            Err(StorageError::InvalidScan(_))
        ));
    }

    #[test]
    fn test_eq_scan_crosses_leaves() {
        // Enough duplicates of one key to span several leaves
        let dir = tempdir().unwrap();
        let data = dir.path().join("dup.hf");
        let desc = KeyDesc::new(AttrType::Str, 200).unwrap();
        let mut pf = PagedFiles::new(16, ReplacementPolicy::Lru);
        create_index(&mut pf, &data, 0, desc).unwrap();
        let file = pf.open_file(&index_file_name(&data, 0)).unwrap();

        let mut dup = b"needle".to_vec();
        dup.resize(200, 0);
        let mut other = b"aaaaaa".to_vec();
        other.resize(200, 0);

        for slot in 0..50u32 {
            insert_entry(&mut pf, file, desc, &dup, rid(slot)).unwrap();
        }
        insert_entry(&mut pf, file, desc, &other, rid(999)).unwrap();

        let mut scans = IndexScans::new();
        let id = scans.open(&mut pf, file, desc, CompOp::Eq, Some(&dup)).unwrap();
        let mut hits = Vec::new();
        while let Some(r) = scans.next(&mut pf, id).unwrap() {
            hits.push(r);
        }
        scans.close(id).unwrap();

        let expected: Vec<RecId> = (0..50).map(rid).collect();
        assert_eq!(hits, expected);
    }

    #[test]
    fn test_no_pins_between_calls() {
        let (_dir, mut pf, file, mut scans) = setup_with_keys(&[1, 2, 3]);

        let id = scans
            .open(&mut pf, file, int_desc(), CompOp::Ge, Some(&key(1)))
            .unwrap();
        assert!(scans.next(&mut pf, id).unwrap().is_some());

        // Closing the file succeeds mid-scan because nothing stays pinned
        pf.close_file(file).unwrap();
    }
}
