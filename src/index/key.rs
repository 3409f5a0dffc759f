//! Indexed attribute types, key comparison and scan operators.

use crate::error::{Result, StorageError};
use crate::types::ids::RecId;
use crate::types::MAX_ATTR_LENGTH;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Type of the indexed attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrType {
    /// Signed 32-bit integer, little-endian, compared numerically
    Int,
    /// IEEE-754 single float, little-endian, compared numerically
    Float,
    /// Fixed-length byte string, compared lexicographically
    Str,
}

impl AttrType {
    /// Convert from the external type tag ('i', 'f' or 'c')
    pub fn from_tag(tag: char) -> Result<Self> {
        match tag {
            'i' => Ok(Self::Int),
            'f' => Ok(Self::Float),
            'c' => Ok(Self::Str),
            other => Err(StorageError::InvalidAttrType(other)),
        }
    }

    /// The external type tag of this attribute type
    pub fn tag(self) -> char {
        match self {
            Self::Int => 'i',
            Self::Float => 'f',
            Self::Str => 'c',
        }
    }
}

/// Validated (type, length) descriptor of an indexed attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDesc {
    attr_type: AttrType,
    attr_len: u16,
}

impl KeyDesc {
    /// Create a descriptor, validating the length against the type:
    /// integers and floats are exactly 4 bytes, strings 1..=256
    pub fn new(attr_type: AttrType, attr_len: usize) -> Result<Self> {
        let valid = match attr_type {
            AttrType::Int | AttrType::Float => attr_len == 4,
            AttrType::Str => (1..=MAX_ATTR_LENGTH).contains(&attr_len),
        };
        if !valid {
            return Err(StorageError::InvalidAttrLength(attr_len));
        }
        Ok(Self {
            attr_type,
            attr_len: attr_len as u16,
        })
    }

    pub fn attr_type(&self) -> AttrType {
        self.attr_type
    }

    /// Key length in bytes
    pub fn attr_len(&self) -> usize {
        self.attr_len as usize
    }

    /// Compare two keys of this attribute type.
    ///
    /// Both slices must be `attr_len` bytes; page views guarantee this.
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self.attr_type {
            AttrType::Int => {
                let x = i32::from_le_bytes([a[0], a[1], a[2], a[3]]);
                let y = i32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                x.cmp(&y)
            }
            AttrType::Float => {
                let x = f32::from_le_bytes([a[0], a[1], a[2], a[3]]);
                let y = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                x.total_cmp(&y)
            }
            AttrType::Str => a.cmp(b),
        }
    }

    /// Compare two (key, RecId) entries: key first, RecId as tie-break
    pub fn compare_entries(&self, a: (&[u8], RecId), b: (&[u8], RecId)) -> Ordering {
        self.compare(a.0, b.0).then_with(|| a.1.cmp(&b.1))
    }

    /// Check a caller-supplied key against the descriptor length
    pub fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.attr_len() {
            return Err(StorageError::InvalidAttrLength(key.len()));
        }
        Ok(())
    }
}

/// Comparison operator for index scans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompOp {
    /// Every entry matches
    All,
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    Ne,
}

impl CompOp {
    /// Whether an entry whose key compares `ord` against the reference
    /// value satisfies this operator
    pub fn matches(self, ord: Ordering) -> bool {
        match self {
            Self::All => true,
            Self::Eq => ord == Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::Gt => ord == Ordering::Greater,
            Self::Le => ord != Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
            Self::Ne => ord != Ordering::Equal,
        }
    }

    /// Whether a non-matching entry ends the scan. Keys arrive in ascending
    /// order, so once these predicates go false they stay false; `Ne` skips
    /// the mismatch and continues.
    pub fn stops_on_mismatch(self) -> bool {
        matches!(self, Self::Eq | Self::Lt | Self::Le | Self::Ge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ids::PageId;

    #[test]
    fn test_attr_type_tags() {
        assert_eq!(AttrType::from_tag('i').unwrap(), AttrType::Int);
        assert_eq!(AttrType::from_tag('f').unwrap(), AttrType::Float);
        assert_eq!(AttrType::from_tag('c').unwrap(), AttrType::Str);
        assert!(matches!(
            AttrType::from_tag('x'),
            Err(StorageError::InvalidAttrType('x'))
        ));
        assert_eq!(AttrType::Int.tag(), 'i');
    }

    #[test]
    fn test_key_desc_validation() {
        assert!(KeyDesc::new(AttrType::Int, 4).is_ok());
        assert!(KeyDesc::new(AttrType::Int, 8).is_err());
        assert!(KeyDesc::new(AttrType::Float, 2).is_err());
        assert!(KeyDesc::new(AttrType::Str, 1).is_ok());
        assert!(KeyDesc::new(AttrType::Str, 256).is_ok());
        assert!(KeyDesc::new(AttrType::Str, 0).is_err());
        assert!(KeyDesc::new(AttrType::Str, 257).is_err());
    }

    #[test]
    fn test_int_compare_is_signed() {
        let desc = KeyDesc::new(AttrType::Int, 4).unwrap();
        let neg = (-5i32).to_le_bytes();
        let pos = 3i32.to_le_bytes();
        assert_eq!(desc.compare(&neg, &pos), Ordering::Less);
        assert_eq!(desc.compare(&pos, &pos), Ordering::Equal);
    }

    #[test]
    fn test_float_compare() {
        let desc = KeyDesc::new(AttrType::Float, 4).unwrap();
        let a = 1.5f32.to_le_bytes();
        let b = 2.25f32.to_le_bytes();
        assert_eq!(desc.compare(&a, &b), Ordering::Less);
        assert_eq!(desc.compare(&b, &a), Ordering::Greater);
    }

    #[test]
    fn test_str_compare_is_bytewise() {
        let desc = KeyDesc::new(AttrType::Str, 3).unwrap();
        assert_eq!(desc.compare(b"abc", b"abd"), Ordering::Less);
        assert_eq!(desc.compare(b"ab\xff", b"abz"), Ordering::Greater);
    }

    #[test]
    fn test_entry_tie_break() {
        let desc = KeyDesc::new(AttrType::Int, 4).unwrap();
        let key = 42i32.to_le_bytes();
        let small = RecId::new(PageId::new(0), 9);
        let big = RecId::new(PageId::new(1), 0);
        assert_eq!(
            desc.compare_entries((&key, small), (&key, big)),
            Ordering::Less
        );
    }

    #[test]
    fn test_op_matching() {
        assert!(CompOp::All.matches(Ordering::Greater));
        assert!(CompOp::Eq.matches(Ordering::Equal));
        assert!(!CompOp::Eq.matches(Ordering::Less));
        assert!(CompOp::Le.matches(Ordering::Equal));
        assert!(CompOp::Ne.matches(Ordering::Less));
        assert!(!CompOp::Ne.matches(Ordering::Equal));

        assert!(CompOp::Eq.stops_on_mismatch());
        assert!(!CompOp::Ne.stops_on_mismatch());
        assert!(!CompOp::All.stops_on_mismatch());
        assert!(!CompOp::Gt.stops_on_mismatch());
    }
}
