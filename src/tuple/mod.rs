//! # On-Disk Tuple Shapes
//!
//! The index stores two record shapes the checker must decode:
//!
//! **Entry tuples** live on entry pages. Each carries the indexed attribute
//! number, a key with its null category, and one of two payloads: an inline
//! posting list (raw or varbyte-compressed) or the root block of a posting
//! tree when the list outgrew the page. The 6-byte link slot at the front of
//! the tuple is overloaded exactly like the heap-pointer slot it descends
//! from: internal tuples store their downlink block there, posting-tree
//! tuples store the tree root, plain leaf tuples leave it invalid.
//!
//! ```text
//! Offset  Size  Field      Notes
//! ------  ----  ---------  -----------------------------------------
//! 0       4     link_blk   downlink / posting-tree root / invalid
//! 4       2     link_off   reserved, 0
//! 6       2     size       declared total size, 8-byte aligned
//! 8       2     attnum     indexed attribute ordinal (1-based)
//! 10      2     key_len    key bytes following the header
//! 12      2     n_items    inline posting count (0 for tree refs)
//! 14      1     category   0 normal, 1 null-key, 2 null-item, 3 empty
//! 15      1     flags      0x01 posting-tree ref, 0x02 compressed
//! 16      ...   key bytes, then the inline payload
//! ```
//!
//! **Posting items** live on internal data pages: an item-pointer high key
//! plus the child block it bounds. A (0, 0) key is the right-most sentinel;
//! it bounds nothing and never participates in comparisons.
//!
//! All reads go through a validated item id (entry pages) or an explicit
//! bounds check (data pages); a tuple is rejected before any byte past its
//! declared extent is touched. The tuple-size rule (the item id's aligned
//! length must equal the tuple's aligned declared size) is enforced here so
//! every caller gets it for free.

pub mod posting;

use eyre::Result;
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::compare::Category;
use crate::error::Location;
use crate::page::{
    align_tuple, item_id_careful, BlockNumber, OffsetNumber, INVALID_BLOCK, PAGE_HEADER_SIZE,
    SPECIAL_OFFSET,
};
use crate::{bail_corrupted, ensure_sound, le_getters};

/// Size of the fixed entry-tuple header.
pub const ENTRY_TUPLE_HEADER_SIZE: usize = 16;

const _: () = assert!(ENTRY_TUPLE_HEADER_SIZE == crate::page::MIN_ENTRY_TUPLE_SIZE);

/// Size of one item pointer on disk.
pub const ITEM_POINTER_SIZE: usize = std::mem::size_of::<ItemPointerData>();

/// Size of one posting item on an internal data page.
pub const POSTING_ITEM_SIZE: usize = std::mem::size_of::<PostingItemData>();

/// Entry-tuple flag bits.
pub mod entry_flags {
    /// Payload is the root block of a posting tree.
    pub const POSTING_TREE: u8 = 0x01;
    /// Inline posting list is varbyte-compressed.
    pub const COMPRESSED: u8 = 0x02;
}

/// A heap row address: (block, offset), ordered lexicographically.
/// Offset 0 is reserved and marks an invalid pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemPointer {
    pub block: u32,
    pub offset: u16,
}

impl ItemPointer {
    pub const fn new(block: u32, offset: u16) -> Self {
        Self { block, offset }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.offset != 0
    }

    /// Packs the pointer into the integer the varbyte codec works over.
    #[inline]
    pub fn to_u64(self) -> u64 {
        ((self.block as u64) << 16) | self.offset as u64
    }

    #[inline]
    pub fn from_u64(v: u64) -> Self {
        Self {
            block: (v >> 16) as u32,
            offset: (v & 0xFFFF) as u16,
        }
    }
}

impl std::fmt::Display for ItemPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.block, self.offset)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct ItemPointerData {
    block: U32,
    offset: U16,
}

impl ItemPointerData {
    le_getters! {
        block: u32,
        offset: u16,
    }

    pub fn new(ptr: ItemPointer) -> Self {
        Self {
            block: U32::new(ptr.block),
            offset: U16::new(ptr.offset),
        }
    }

    #[inline]
    pub fn get(&self) -> ItemPointer {
        ItemPointer::new(self.block(), self.offset())
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct PostingItemData {
    key_block: U32,
    key_offset: U16,
    child: U32,
}

impl PostingItemData {
    le_getters! {
        key_block: u32,
        key_offset: u16,
        child: u32,
    }

    pub fn new(key: ItemPointer, child: BlockNumber) -> Self {
        Self {
            key_block: U32::new(key.block),
            key_offset: U16::new(key.offset),
            child: U32::new(child),
        }
    }

    #[inline]
    pub fn key(&self) -> ItemPointer {
        ItemPointer::new(self.key_block(), self.key_offset())
    }
}

/// A posting item copied out of an internal data page.
#[derive(Debug, Clone, Copy)]
pub struct PostingItem {
    pub key: ItemPointer,
    pub child: BlockNumber,
}

impl PostingItem {
    /// Sentinel keys bound the right-most subtree and carry no ordering
    /// information.
    #[inline]
    pub fn key_is_sentinel(&self) -> bool {
        self.key.block == 0 || self.key.offset == 0
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct EntryTupleHeader {
    link_blk: U32,
    link_off: U16,
    size: U16,
    attnum: U16,
    key_len: U16,
    n_items: U16,
    category: u8,
    flags: u8,
}

const _: () = assert!(std::mem::size_of::<EntryTupleHeader>() == ENTRY_TUPLE_HEADER_SIZE);

impl EntryTupleHeader {
    le_getters! {
        link_blk: u32,
        link_off: u16,
        size: u16,
        attnum: u16,
        key_len: u16,
        n_items: u16,
    }

    #[inline]
    pub fn category_byte(&self) -> u8 {
        self.category
    }

    #[inline]
    pub fn flag_bits(&self) -> u8 {
        self.flags
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        link_blk: BlockNumber,
        link_off: u16,
        size: u16,
        attnum: u16,
        key_len: u16,
        n_items: u16,
        category: Category,
        flags: u8,
    ) -> Self {
        Self {
            link_blk: U32::new(link_blk),
            link_off: U16::new(link_off),
            size: U16::new(size),
            attnum: U16::new(attnum),
            key_len: U16::new(key_len),
            n_items: U16::new(n_items),
            category: category as u8,
            flags,
        }
    }
}

/// The payload half of a decoded entry tuple.
#[derive(Debug, Clone, Copy)]
pub enum EntryPayload<'a> {
    /// The key's posting list lives in a separate tree rooted here.
    PostingTreeRef { root: BlockNumber },
    /// The posting list is stored inside the tuple.
    Inline {
        n_items: u16,
        compressed: bool,
        bytes: &'a [u8],
    },
}

/// A decoded, bounds-checked view of one entry tuple.
#[derive(Debug, Clone, Copy)]
pub struct EntryTuple<'a> {
    pub attnum: u16,
    pub category: Category,
    pub key: &'a [u8],
    pub payload: EntryPayload<'a>,
    /// Raw link slot: the downlink block on internal pages.
    pub link_block: BlockNumber,
}

impl<'a> EntryTuple<'a> {
    /// The child block this tuple points at, when it is an internal
    /// (downlink-bearing) tuple.
    #[inline]
    pub fn downlink(&self) -> BlockNumber {
        self.link_block
    }
}

/// Decodes the entry tuple at 1-based `off`, validating the item id, the
/// declared tuple size and every interior bound before returning slices.
pub fn read_entry_tuple<'a>(
    index: &str,
    blkno: BlockNumber,
    page: &'a [u8],
    off: OffsetNumber,
) -> Result<EntryTuple<'a>> {
    let loc = Location::tuple(blkno, off);
    let iid = item_id_careful(index, blkno, page, off)?;

    let start = iid.offset() as usize;
    let raw = &page[start..start + iid.length() as usize];
    ensure_sound!(
        raw.len() >= ENTRY_TUPLE_HEADER_SIZE,
        index,
        loc,
        "tuple is {} bytes, smaller than its header",
        raw.len()
    );

    let header = EntryTupleHeader::ref_from_bytes(&raw[..ENTRY_TUPLE_HEADER_SIZE])
        .map_err(|e| eyre::eyre!("failed to read entry tuple header: {e:?}"))?;

    ensure_sound!(
        align_tuple(iid.length() as usize) == align_tuple(header.size() as usize),
        index,
        loc,
        "inconsistent tuple sizes: item id declares {}, tuple declares {}",
        iid.length(),
        header.size()
    );

    let body_len = (header.size() as usize).min(raw.len());
    let key_end = ENTRY_TUPLE_HEADER_SIZE + header.key_len() as usize;
    ensure_sound!(
        key_end <= body_len,
        index,
        loc,
        "key of {} bytes overruns a {}-byte tuple",
        header.key_len(),
        header.size()
    );
    let key = &raw[ENTRY_TUPLE_HEADER_SIZE..key_end];

    let Some(category) = Category::from_byte(header.category_byte()) else {
        bail_corrupted!(index, loc, "invalid null category {}", header.category_byte());
    };

    let payload = if header.flag_bits() & entry_flags::POSTING_TREE != 0 {
        ensure_sound!(
            header.n_items() == 0,
            index,
            loc,
            "posting-tree tuple declares {} inline items",
            header.n_items()
        );
        let root = header.link_blk();
        ensure_sound!(
            root != INVALID_BLOCK && root != crate::page::META_BLKNO,
            index,
            loc,
            "invalid posting tree root {root}"
        );
        EntryPayload::PostingTreeRef { root }
    } else {
        let compressed = header.flag_bits() & entry_flags::COMPRESSED != 0;
        if !compressed {
            ensure_sound!(
                key_end + header.n_items() as usize * ITEM_POINTER_SIZE <= body_len,
                index,
                loc,
                "{} inline item pointers overrun a {}-byte tuple",
                header.n_items(),
                header.size()
            );
        }
        EntryPayload::Inline {
            n_items: header.n_items(),
            compressed,
            bytes: &raw[key_end..body_len],
        }
    };

    Ok(EntryTuple {
        attnum: header.attnum(),
        category,
        key,
        payload,
        link_block: header.link_blk(),
    })
}

/// Reads the posting item at 1-based `off` from an internal data page.
pub fn read_posting_item(
    index: &str,
    blkno: BlockNumber,
    page: &[u8],
    off: OffsetNumber,
    maxoff: u16,
) -> Result<PostingItem> {
    let loc = Location::tuple(blkno, off);
    ensure_sound!(
        off >= 1 && off <= maxoff,
        index,
        loc,
        "posting item offset out of range (page holds {maxoff} items)"
    );
    let pos = PAGE_HEADER_SIZE + POSTING_ITEM_SIZE * (off - 1) as usize;
    ensure_sound!(
        pos + POSTING_ITEM_SIZE <= SPECIAL_OFFSET,
        index,
        loc,
        "posting item overruns the data space"
    );
    let item = PostingItemData::ref_from_bytes(&page[pos..pos + POSTING_ITEM_SIZE])
        .map_err(|e| eyre::eyre!("failed to read posting item: {e:?}"))?;
    Ok(PostingItem {
        key: item.key(),
        child: item.child(),
    })
}
