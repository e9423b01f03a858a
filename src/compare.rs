//! # Key Comparison Capability
//!
//! Key ordering is not hardcoded: the indexed datatype supplies it. The
//! checker consumes a [`KeyComparator`] and compares whole entries through
//! the provided [`KeyComparator::compare_entries`], which folds the null
//! category into the ordering:
//!
//! - entries of different categories order by category alone, with
//!   [`Category::Normal`] first, so every ordinary key sorts before every
//!   null/empty marker;
//! - two normal entries delegate to [`KeyComparator::compare_keys`] under
//!   the entry's attribute number;
//! - two entries of the same non-normal category are equal (their key bytes
//!   are empty placeholders).
//!
//! [`BytewiseComparator`] orders keys by raw bytes and serves any key
//! encoding whose byte order equals its logical order (big-endian integers,
//! ASCII strings).

use std::cmp::Ordering;

/// The four-valued tag accompanying every entry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Category {
    Normal = 0,
    NullKey = 1,
    NullItem = 2,
    EmptyItem = 3,
}

impl Category {
    /// Decodes the on-disk tag byte. Unknown values are left to the caller
    /// to report with a location.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Category::Normal),
            1 => Some(Category::NullKey),
            2 => Some(Category::NullItem),
            3 => Some(Category::EmptyItem),
            _ => None,
        }
    }
}

/// Datatype-supplied ordering over entry keys.
pub trait KeyComparator {
    /// Total order over two normal keys of the same indexed attribute.
    fn compare_keys(&self, attnum: u16, a: &[u8], b: &[u8]) -> Ordering;

    /// Total order over whole entries, categories included.
    fn compare_entries(
        &self,
        attnum: u16,
        a: &[u8],
        cat_a: Category,
        b: &[u8],
        cat_b: Category,
    ) -> Ordering {
        match cat_a.cmp(&cat_b) {
            Ordering::Equal if cat_a == Category::Normal => self.compare_keys(attnum, a, b),
            Ordering::Equal => Ordering::Equal,
            unequal => unequal,
        }
    }
}

/// Raw byte order, attribute-independent.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    fn compare_keys(&self, _attnum: u16, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}
