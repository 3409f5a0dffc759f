//! B+-tree maintenance: index creation, entry insertion and deletion.
//!
//! The tree is descended one pinned page at a time: a node is read, the
//! child chosen, and the node unpinned before the child is pinned. Splits
//! therefore re-pin parents on the way back up, guided by the page numbers
//! recorded during the descent.

use crate::error::{Result, StorageError};
use crate::index::key::KeyDesc;
use crate::index::page::{
    self, InternalPage, InternalPageMut, LeafPage, LeafPageMut, PageKind, RootDescriptor,
};
use crate::pf::PagedFiles;
use crate::types::ids::{FileId, PageId, RecId};
use log::debug;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// On-disk name of index number `index_no` of `data_file`
pub fn index_file_name(data_file: &Path, index_no: u32) -> PathBuf {
    let mut name = data_file.as_os_str().to_os_string();
    name.push(format!(".{}", index_no));
    PathBuf::from(name)
}

/// Create an empty index on `data_file`.
///
/// The index file starts with the root descriptor on page 0 and a single
/// empty leaf on page 1 that is both root and leftmost leaf.
pub fn create_index(
    pf: &mut PagedFiles,
    data_file: &Path,
    index_no: u32,
    desc: KeyDesc,
) -> Result<()> {
    let path = index_file_name(data_file, index_no);
    pf.create_file(&path)?;
    let file = pf.open_file(&path)?;

    let descriptor_page = pf.alloc_page(file)?;
    let descriptor = RootDescriptor {
        root: PageId::new(1),
        leftmost: PageId::new(1),
        desc,
    };
    descriptor.write(pf.page_mut(file, descriptor_page)?);
    pf.unfix_page(file, descriptor_page, true)?;

    let leaf_page = pf.alloc_page(file)?;
    LeafPageMut::init(pf.page_mut(file, leaf_page)?, &desc);
    pf.unfix_page(file, leaf_page, true)?;

    pf.close_file(file)?;
    debug!("created index {:?}", path);
    Ok(())
}

/// Remove an index file from disk
pub fn destroy_index(pf: &mut PagedFiles, data_file: &Path, index_no: u32) -> Result<()> {
    pf.destroy_file(&index_file_name(data_file, index_no))
}

/// Read and verify the root descriptor of an open index file
pub(crate) fn read_descriptor(pf: &mut PagedFiles, file: FileId) -> Result<RootDescriptor> {
    pf.get_page(file, PageId::new(0))?;
    let descriptor = RootDescriptor::read(pf.page(file, PageId::new(0))?);
    pf.unfix_page(file, PageId::new(0), false)?;
    descriptor
}

fn write_descriptor(
    pf: &mut PagedFiles,
    file: FileId,
    descriptor: &RootDescriptor,
) -> Result<()> {
    pf.get_page(file, PageId::new(0))?;
    descriptor.write(pf.page_mut(file, PageId::new(0))?);
    pf.unfix_page(file, PageId::new(0), true)
}

/// Check the caller's attribute arguments against the index's descriptor
pub(crate) fn check_attr(descriptor: &RootDescriptor, desc: &KeyDesc) -> Result<()> {
    if desc.attr_type() != descriptor.desc.attr_type() {
        return Err(StorageError::InvalidAttrType(desc.attr_type().tag()));
    }
    if desc.attr_len() != descriptor.desc.attr_len() {
        return Err(StorageError::InvalidAttrLength(desc.attr_len()));
    }
    Ok(())
}

/// Descend from `root` to the leaf that covers `key`, recording internal
/// page numbers in `path` when provided. Each node is unpinned before its
/// child is pinned; the returned leaf is left pinned.
pub(crate) fn descend_to_leaf(
    pf: &mut PagedFiles,
    file: FileId,
    desc: &KeyDesc,
    root: PageId,
    key: &[u8],
    right_on_equal: bool,
    mut path: Option<&mut Vec<PageId>>,
) -> Result<PageId> {
    let mut current = root;
    loop {
        pf.get_page(file, current)?;
        match page::page_kind(pf.page(file, current)?)? {
            PageKind::Leaf => return Ok(current),
            PageKind::Internal => {
                let next = {
                    let node = InternalPage::new(pf.page(file, current)?)?;
                    node.child(node.find_child(desc, key, right_on_equal))
                };
                pf.unfix_page(file, current, false)?;
                if let Some(path) = path.as_mut() {
                    path.push(current);
                }
                current = next;
            }
        }
    }
}

/// Insert the entry `(key, rid)`.
///
/// Duplicate keys are allowed; entries are kept in (key, RecId) order, so
/// every pair is unique. A full leaf splits, propagating a separator
/// upward; if the root splits, a new root is allocated and the descriptor
/// updated.
pub fn insert_entry(
    pf: &mut PagedFiles,
    file: FileId,
    desc: KeyDesc,
    key: &[u8],
    rid: RecId,
) -> Result<()> {
    let mut descriptor = read_descriptor(pf, file)?;
    check_attr(&descriptor, &desc)?;
    desc.check_key(key)?;

    let mut path = Vec::new();
    let leaf = descend_to_leaf(pf, file, &desc, descriptor.root, key, true, Some(&mut path))?;

    // Leaf is pinned. In-place insert if it has room.
    let (fits, pos) = {
        let view = LeafPage::new(pf.page(file, leaf)?)?;
        (
            view.num_keys() < view.max_keys(),
            view.search_entry(&desc, key, rid),
        )
    };
    if fits {
        LeafPageMut::new(pf.page_mut(file, leaf)?)?.insert_at(pos, key, rid);
        return pf.unfix_page(file, leaf, true);
    }

    // Split the leaf: the upper half moves to a fresh page that takes over
    // the old next-leaf link.
    let (mut separator, mut new_page) = split_leaf(pf, file, &desc, leaf, pos, key, rid)?;

    // Propagate the separator toward the root.
    while let Some(parent) = path.pop() {
        pf.get_page(file, parent)?;
        let (fits, at) = {
            let node = InternalPage::new(pf.page(file, parent)?)?;
            (
                node.num_keys() < node.max_keys(),
                node.find_child(&desc, &separator, true),
            )
        };
        if fits {
            InternalPageMut::new(pf.page_mut(file, parent)?)?.insert_at(
                at,
                &separator,
                new_page,
            );
            return pf.unfix_page(file, parent, true);
        }

        let (promoted, new_node) =
            split_internal(pf, file, &desc, parent, at, &separator, new_page)?;
        separator = promoted;
        new_page = new_node;
    }

    // The root itself split: grow the tree by one level.
    let new_root = pf.alloc_page(file)?;
    {
        let mut node = InternalPageMut::init(pf.page_mut(file, new_root)?, &desc, descriptor.root);
        node.insert_at(0, &separator, new_page);
    }
    pf.unfix_page(file, new_root, true)?;

    descriptor.root = new_root;
    write_descriptor(pf, file, &descriptor)?;
    debug!("index file {} root grew to page {}", file, new_root);
    Ok(())
}

/// Split the pinned leaf, inserting the pending entry at `pos` on the
/// correct side. Returns the separator (smallest key of the new leaf) and
/// the new leaf's page number; both pages end up unpinned dirty.
fn split_leaf(
    pf: &mut PagedFiles,
    file: FileId,
    desc: &KeyDesc,
    leaf: PageId,
    pos: usize,
    key: &[u8],
    rid: RecId,
) -> Result<(Vec<u8>, PageId)> {
    let (mut entries, old_next) = {
        let view = LeafPage::new(pf.page(file, leaf)?)?;
        let entries: Vec<(Vec<u8>, RecId)> = (0..view.num_keys())
            .map(|i| (view.key(i).to_vec(), view.rid(i)))
            .collect();
        (entries, view.next_leaf())
    };
    entries.insert(pos, (key.to_vec(), rid));

    let mid = entries.len() / 2;
    let separator = entries[mid].0.clone();

    let new_page = pf.alloc_page(file)?;
    {
        let mut new_leaf = LeafPageMut::init(pf.page_mut(file, new_page)?, desc);
        for (i, (k, r)) in entries[mid..].iter().enumerate() {
            new_leaf.insert_at(i, k, *r);
        }
        new_leaf.set_next_leaf(old_next);
    }
    pf.unfix_page(file, new_page, true)?;

    {
        let mut old_leaf = LeafPageMut::init(pf.page_mut(file, leaf)?, desc);
        for (i, (k, r)) in entries[..mid].iter().enumerate() {
            old_leaf.insert_at(i, k, *r);
        }
        old_leaf.set_next_leaf(new_page);
    }
    pf.unfix_page(file, leaf, true)?;

    debug!(
        "split leaf {} of index file {}: {} entries moved to page {}",
        leaf,
        file,
        entries.len() - mid,
        new_page
    );
    Ok((separator, new_page))
}

/// Split the pinned internal node around its middle key, which is promoted
/// (it lands in neither half). The pending separator is inserted at `at`
/// before the split point is chosen.
fn split_internal(
    pf: &mut PagedFiles,
    file: FileId,
    desc: &KeyDesc,
    node_page: PageId,
    at: usize,
    separator: &[u8],
    new_child: PageId,
) -> Result<(Vec<u8>, PageId)> {
    let (mut keys, mut children) = {
        let node = InternalPage::new(pf.page(file, node_page)?)?;
        let keys: Vec<Vec<u8>> = (0..node.num_keys()).map(|i| node.key(i).to_vec()).collect();
        let children: Vec<PageId> = (0..=node.num_keys()).map(|i| node.child(i)).collect();
        (keys, children)
    };
    keys.insert(at, separator.to_vec());
    children.insert(at + 1, new_child);

    let mid = keys.len() / 2;
    let promoted = keys[mid].clone();

    let new_page = pf.alloc_page(file)?;
    {
        let mut right = InternalPageMut::init(pf.page_mut(file, new_page)?, desc, children[mid + 1]);
        right.rebuild(&keys[mid + 1..], &children[mid + 1..]);
    }
    pf.unfix_page(file, new_page, true)?;

    InternalPageMut::new(pf.page_mut(file, node_page)?)?.rebuild(&keys[..mid], &children[..=mid]);
    pf.unfix_page(file, node_page, true)?;

    debug!(
        "split internal node {} of index file {}: promoted separator to parent",
        node_page, file
    );
    Ok((promoted, new_page))
}

/// Delete the entry `(key, rid)`.
///
/// The leftmost leaf that can hold `key` is located, then the leaf chain is
/// walked forward while keys still match, so the exact pair is found even
/// when duplicates span leaves. Removal compacts the leaf in place; leaves
/// are never merged and an emptied leaf stays linked.
pub fn delete_entry(
    pf: &mut PagedFiles,
    file: FileId,
    desc: KeyDesc,
    key: &[u8],
    rid: RecId,
) -> Result<()> {
    let descriptor = read_descriptor(pf, file)?;
    check_attr(&descriptor, &desc)?;
    desc.check_key(key)?;

    let mut leaf = descend_to_leaf(pf, file, &desc, descriptor.root, key, false, None)?;

    // Leaf is pinned on loop entry.
    loop {
        let view = LeafPage::new(pf.page(file, leaf)?)?;
        let n = view.num_keys();
        let mut index = view.search_key(&desc, key, false);

        while index < n {
            if desc.compare(view.key(index), key) != std::cmp::Ordering::Equal {
                pf.unfix_page(file, leaf, false)?;
                return Err(StorageError::KeyNotFound);
            }
            if view.rid(index) == rid {
                LeafPageMut::new(pf.page_mut(file, leaf)?)?.remove_at(index);
                return pf.unfix_page(file, leaf, true);
            }
            index += 1;
        }

        // Matching keys may continue on the next leaf.
        let next = view.next_leaf();
        pf.unfix_page(file, leaf, false)?;
        if !next.is_valid() {
            return Err(StorageError::KeyNotFound);
        }
        leaf = next;
        pf.get_page(file, leaf)?;
    }
}

/// One node of an exported index tree
#[derive(Debug, Clone, Serialize)]
pub struct IndexTreeNode {
    /// Page number of this node
    pub page: u32,
    /// Whether the node is a leaf
    pub is_leaf: bool,
    /// Keys stored in this node (entry keys for leaves, separators for
    /// internal nodes)
    pub keys: Vec<Vec<u8>>,
    /// Record identifiers, parallel to `keys` (leaves only)
    pub rids: Vec<RecId>,
    /// Child nodes (internal nodes only)
    pub children: Vec<IndexTreeNode>,
}

/// Export the tree structure rooted at the descriptor, for inspection and
/// debugging
pub fn dump_index(pf: &mut PagedFiles, file: FileId) -> Result<IndexTreeNode> {
    let descriptor = read_descriptor(pf, file)?;
    dump_node(pf, file, descriptor.root)
}

fn dump_node(pf: &mut PagedFiles, file: FileId, page: PageId) -> Result<IndexTreeNode> {
    pf.get_page(file, page)?;
    let kind = page::page_kind(pf.page(file, page)?)?;

    match kind {
        PageKind::Leaf => {
            let view = LeafPage::new(pf.page(file, page)?)?;
            let keys = (0..view.num_keys()).map(|i| view.key(i).to_vec()).collect();
            let rids = (0..view.num_keys()).map(|i| view.rid(i)).collect();
            pf.unfix_page(file, page, false)?;
            Ok(IndexTreeNode {
                page: page.value(),
                is_leaf: true,
                keys,
                rids,
                children: Vec::new(),
            })
        }
        PageKind::Internal => {
            let (keys, child_pages) = {
                let node = InternalPage::new(pf.page(file, page)?)?;
                let keys: Vec<Vec<u8>> =
                    (0..node.num_keys()).map(|i| node.key(i).to_vec()).collect();
                let child_pages: Vec<PageId> =
                    (0..=node.num_keys()).map(|i| node.child(i)).collect();
                (keys, child_pages)
            };
            pf.unfix_page(file, page, false)?;

            let mut children = Vec::with_capacity(child_pages.len());
            for child in child_pages {
                children.push(dump_node(pf, file, child)?);
            }
            Ok(IndexTreeNode {
                page: page.value(),
                is_leaf: false,
                keys,
                rids: Vec::new(),
                children,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ReplacementPolicy;
    use crate::index::key::AttrType;
    use crate::index::page::leaf_capacity;
    use tempfile::tempdir;

    fn int_desc() -> KeyDesc {
        KeyDesc::new(AttrType::Int, 4).unwrap()
    }

    fn key(v: i32) -> [u8; 4] {
        v.to_le_bytes()
    }

    fn rid(page: u32, slot: u32) -> RecId {
        RecId::new(PageId::new(page), slot)
    }

    fn setup() -> (tempfile::TempDir, PagedFiles, FileId) {
        let dir = tempdir().unwrap();
        let data = dir.path().join("student.hf");
        let mut pf = PagedFiles::new(16, ReplacementPolicy::Lru);
        create_index(&mut pf, &data, 1, int_desc()).unwrap();
        let file = pf.open_file(&index_file_name(&data, 1)).unwrap();
        (dir, pf, file)
    }

    fn leaf_keys(node: &IndexTreeNode) -> Vec<i32> {
        assert!(node.is_leaf);
        node.keys
            .iter()
            .map(|k| i32::from_le_bytes([k[0], k[1], k[2], k[3]]))
            .collect()
    }

    #[test]
    fn test_create_initializes_empty_leaf_root() -> Result<()> {
        let (_dir, mut pf, file) = setup();

        let descriptor = read_descriptor(&mut pf, file)?;
        assert_eq!(descriptor.root, PageId::new(1));
        assert_eq!(descriptor.leftmost, PageId::new(1));
        assert_eq!(descriptor.desc, int_desc());

        let tree = dump_index(&mut pf, file)?;
        assert!(tree.is_leaf);
        assert!(tree.keys.is_empty());
        Ok(())
    }

    #[test]
    fn test_index_file_naming() {
        let name = index_file_name(Path::new("student.hf"), 3);
        assert_eq!(name, Path::new("student.hf.3"));
    }

    #[test]
    fn test_attr_mismatch_rejected() {
        let (_dir, mut pf, file) = setup();

        let float_desc = KeyDesc::new(AttrType::Float, 4).unwrap();
        assert!(matches!(
            insert_entry(&mut pf, file, float_desc, &key(1), rid(0, 0)),
            Err(StorageError::InvalidAttrType('f'))
        ));

        let str_desc = KeyDesc::new(AttrType::Str, 8).unwrap();
        assert!(matches!(
            insert_entry(&mut pf, file, str_desc, &[0u8; 8], rid(0, 0)),
            Err(StorageError::InvalidAttrType('c'))
        ));
    }

    #[test]
    fn test_root_leaf_split_grows_tree() -> Result<()> {
        let (_dir, mut pf, file) = setup();
        let desc = int_desc();
        let capacity = leaf_capacity(4) as i32;

        // Fill the root leaf exactly
        for v in 1..=capacity {
            insert_entry(&mut pf, file, desc, &key(v), rid(0, v as u32))?;
        }
        let tree = dump_index(&mut pf, file)?;
        assert!(tree.is_leaf);
        assert_eq!(tree.keys.len(), capacity as usize);

        // One more entry splits the root and grows a level
        insert_entry(&mut pf, file, desc, &key(capacity + 1), rid(0, 0))?;

        let tree = dump_index(&mut pf, file)?;
        assert!(!tree.is_leaf);
        assert_eq!(tree.keys.len(), 1);
        assert_eq!(tree.children.len(), 2);

        // The separator equals the first key of the right leaf
        assert_eq!(tree.keys[0], tree.children[1].keys[0]);

        // The left child is the original leaf, still the leftmost
        let descriptor = read_descriptor(&mut pf, file)?;
        assert_eq!(descriptor.leftmost, PageId::new(1));
        assert_eq!(tree.children[0].page, 1);

        // No entry was lost or duplicated
        let left = leaf_keys(&tree.children[0]);
        let right = leaf_keys(&tree.children[1]);
        let all: Vec<i32> = left.iter().chain(right.iter()).copied().collect();
        assert_eq!(all, (1..=capacity + 1).collect::<Vec<_>>());

        // All pins released: the file closes cleanly
        pf.close_file(file)?;
        Ok(())
    }

    #[test]
    fn test_separator_property_after_many_splits() -> Result<()> {
        let (_dir, mut pf, file) = setup();
        let desc = int_desc();
        let capacity = leaf_capacity(4) as i32;

        for v in 1..=capacity * 4 {
            insert_entry(&mut pf, file, desc, &key(v), rid(0, v as u32))?;
        }

        fn check(node: &IndexTreeNode, desc: &KeyDesc, low: Option<&[u8]>, high: Option<&[u8]>) {
            for k in &node.keys {
                if let Some(low) = low {
                    assert_ne!(desc.compare(k, low), std::cmp::Ordering::Less);
                }
                if let Some(high) = high {
                    assert_eq!(desc.compare(k, high), std::cmp::Ordering::Less);
                }
            }
            if !node.is_leaf {
                for (i, child) in node.children.iter().enumerate() {
                    let child_low = if i == 0 { low } else { Some(&node.keys[i - 1][..]) };
                    let child_high = if i == node.keys.len() {
                        high
                    } else {
                        Some(&node.keys[i][..])
                    };
                    check(child, desc, child_low, child_high);
                }
            }
        }
        check(&dump_index(&mut pf, file)?, &desc, None, None);
        Ok(())
    }

    fn wide_key(v: u32) -> Vec<u8> {
        // 200-byte keys keep node fanout small, so internal splits and a
        // three-level tree are reached with few inserts
        let mut key = format!("{:08}", v).into_bytes();
        key.resize(200, 0);
        key
    }

    #[test]
    fn test_internal_splits_with_wide_keys() -> Result<()> {
        let dir = tempdir().unwrap();
        let data = dir.path().join("wide.hf");
        let desc = KeyDesc::new(AttrType::Str, 200).unwrap();
        let mut pf = PagedFiles::new(16, ReplacementPolicy::Lru);
        create_index(&mut pf, &data, 0, desc).unwrap();
        let file = pf.open_file(&index_file_name(&data, 0)).unwrap();

        let total = 600u32;
        for v in 0..total {
            insert_entry(&mut pf, file, desc, &wide_key(v), rid(v, 0))?;
        }

        let tree = dump_index(&mut pf, file)?;
        assert!(!tree.is_leaf);
        assert!(
            tree.children.iter().any(|c| !c.is_leaf),
            "expected a tree of height three"
        );

        // In-order leaf traversal yields every key, strictly ascending
        fn collect(node: &IndexTreeNode, out: &mut Vec<Vec<u8>>) {
            if node.is_leaf {
                out.extend(node.keys.iter().cloned());
            } else {
                for child in &node.children {
                    collect(child, out);
                }
            }
        }
        let mut keys = Vec::new();
        collect(&tree, &mut keys);
        assert_eq!(keys.len(), total as usize);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(keys[0], wide_key(0));
        assert_eq!(keys[total as usize - 1], wide_key(total - 1));

        pf.close_file(file)?;
        Ok(())
    }

    #[test]
    fn test_delete_duplicate_spanning_leaves() -> Result<()> {
        let dir = tempdir().unwrap();
        let data = dir.path().join("dups.hf");
        let desc = KeyDesc::new(AttrType::Str, 200).unwrap();
        let mut pf = PagedFiles::new(16, ReplacementPolicy::Lru);
        create_index(&mut pf, &data, 0, desc).unwrap();
        let file = pf.open_file(&index_file_name(&data, 0)).unwrap();

        // More duplicates of one key than a leaf can hold
        let dup = wide_key(7);
        for slot in 0..40 {
            insert_entry(&mut pf, file, desc, &dup, rid(0, slot))?;
        }

        // The victim lives past the first leaf of the run
        delete_entry(&mut pf, file, desc, &dup, rid(0, 33))?;
        assert!(matches!(
            delete_entry(&mut pf, file, desc, &dup, rid(0, 33)),
            Err(StorageError::KeyNotFound)
        ));

        // The other 39 pairs survive in RecId order
        fn collect_rids(node: &IndexTreeNode, out: &mut Vec<RecId>) {
            if node.is_leaf {
                out.extend(node.rids.iter().copied());
            } else {
                for child in &node.children {
                    collect_rids(child, out);
                }
            }
        }
        let mut rids = Vec::new();
        collect_rids(&dump_index(&mut pf, file)?, &mut rids);
        let expected: Vec<RecId> = (0..40).filter(|s| *s != 33).map(|s| rid(0, s)).collect();
        assert_eq!(rids, expected);
        Ok(())
    }

    #[test]
    fn test_delete_missing_key() -> Result<()> {
        let (_dir, mut pf, file) = setup();
        let desc = int_desc();

        insert_entry(&mut pf, file, desc, &key(5), rid(0, 0))?;
        assert!(matches!(
            delete_entry(&mut pf, file, desc, &key(6), rid(0, 0)),
            Err(StorageError::KeyNotFound)
        ));
        // Same key, different record
        assert!(matches!(
            delete_entry(&mut pf, file, desc, &key(5), rid(0, 1)),
            Err(StorageError::KeyNotFound)
        ));
        // The exact pair is removable exactly once
        delete_entry(&mut pf, file, desc, &key(5), rid(0, 0))?;
        assert!(matches!(
            delete_entry(&mut pf, file, desc, &key(5), rid(0, 0)),
            Err(StorageError::KeyNotFound)
        ));
        Ok(())
    }

    #[test]
    fn test_destroy_index_removes_file() -> Result<()> {
        let dir = tempdir().unwrap();
        let data = dir.path().join("student.hf");
        let mut pf = PagedFiles::new(8, ReplacementPolicy::Lru);

        create_index(&mut pf, &data, 2, int_desc())?;
        let path = index_file_name(&data, 2);
        assert!(path.exists());

        destroy_index(&mut pf, &data, 2)?;
        assert!(!path.exists());
        Ok(())
    }
}
