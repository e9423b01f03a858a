//! Opaque trailer: the per-page metadata the tree code owns.
//!
//! The trailer sits in the special space at the end of every page and
//! carries the right-sibling link, the data-page item count and the flag
//! bits that drive page classification.

use eyre::Result;
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{BlockNumber, OPAQUE_SIZE, SPECIAL_OFFSET};
use crate::le_getters;

/// Page flag bits.
pub mod flags {
    /// Leaf page (entry leaf or posting-tree leaf).
    pub const LEAF: u16 = 0x01;
    /// Page was deleted and awaits recycling.
    pub const DELETED: u16 = 0x02;
    /// Posting-tree page: holds only item pointers, no keys.
    pub const DATA: u16 = 0x04;
    /// Data-leaf payload is a compressed posting list.
    pub const COMPRESSED: u16 = 0x08;
    /// No right sibling on this level.
    pub const RIGHTMOST: u16 = 0x10;
    /// The index metapage.
    pub const META: u16 = 0x20;
}

/// The classified kind of a page, as consumed by the walkers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Meta,
    EntryInternal,
    EntryLeaf,
    DataInternal,
    DataLeaf,
    DeletedLeaf,
}

impl PageKind {
    #[inline]
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            PageKind::EntryLeaf | PageKind::DataLeaf | PageKind::DeletedLeaf
        )
    }

    #[inline]
    pub fn is_data(self) -> bool {
        matches!(self, PageKind::DataInternal | PageKind::DataLeaf)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct PageOpaque {
    rightlink: U32,
    maxoff: U16,
    flags: U16,
}

const _: () = assert!(std::mem::size_of::<PageOpaque>() == OPAQUE_SIZE);

impl PageOpaque {
    le_getters! {
        rightlink: u32,
        maxoff: u16,
        flags: u16,
    }

    pub fn new(rightlink: BlockNumber, maxoff: u16, flags: u16) -> Self {
        Self {
            rightlink: U32::new(rightlink),
            maxoff: U16::new(maxoff),
            flags: U16::new(flags),
        }
    }

    pub fn read(page: &[u8]) -> Result<&Self> {
        eyre::ensure!(
            page.len() >= SPECIAL_OFFSET + OPAQUE_SIZE,
            "buffer too small for PageOpaque: {}",
            page.len()
        );
        Self::ref_from_bytes(&page[SPECIAL_OFFSET..SPECIAL_OFFSET + OPAQUE_SIZE])
            .map_err(|e| eyre::eyre!("failed to read PageOpaque: {e:?}"))
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.flags() & flags::LEAF != 0
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.flags() & flags::DELETED != 0
    }

    #[inline]
    pub fn is_data(&self) -> bool {
        self.flags() & flags::DATA != 0
    }

    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.flags() & flags::COMPRESSED != 0
    }

    #[inline]
    pub fn is_rightmost(&self) -> bool {
        self.flags() & flags::RIGHTMOST != 0
    }

    #[inline]
    pub fn is_meta(&self) -> bool {
        self.flags() & flags::META != 0
    }
}
