//! # Page Layout and Sanity Checks
//!
//! Every page in the index fork is 8 KiB and carries a 20-byte header at the
//! front and an 8-byte opaque trailer at the back:
//!
//! ```text
//! Offset  Size  Field      Description
//! ------  ----  ---------  -------------------------------------------
//! 0       8     lsn        Log sequence number of the last change
//! 8       4     checksum   CRC32 of the page (0 = not checksummed)
//! 12      2     lower      End of the item-id array (entry pages)
//! 14      2     upper      Start of the tuple area (entry pages)
//! 16      2     special    Offset of the opaque trailer (fixed, 8184)
//! 18      2     version    Page layout version (currently 2)
//! ...                      item ids / tuples / data payload
//! 8184    8     opaque     rightlink, maxoff, flag bits
//! ```
//!
//! Entry pages use a slotted layout: 4-byte item ids grow from byte 20 to
//! `lower`, tuple bodies grow down from `special` to `upper`. Data pages
//! (posting-tree pages) store a dense payload starting at byte 20 and count
//! items in the trailer's `maxoff`.
//!
//! [`inspect_page`] is the page classifier and sanity checker: it validates
//! the generic header (bounds, version, checksum), rejects impossible flag
//! combinations, enforces the deleted-page and density invariants, and
//! returns the page's [`PageKind`](opaque::PageKind) with the handful of
//! facts the walkers need. It is pure: it borrows the page bytes for the
//! duration of the call and holds nothing afterwards.
//!
//! Item ids are never trusted: [`item_id_careful`] validates offset, length
//! and bounds before any tuple byte is dereferenced, so a corrupt line
//! pointer surfaces as a structural-corruption error instead of a wild read.

pub mod meta;
pub mod opaque;

use eyre::Result;
use zerocopy::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::Location;
use crate::{ensure_sound, le_getters};

use opaque::{PageKind, PageOpaque};

/// Size of a single page in bytes.
pub const PAGE_SIZE: usize = 8192;

/// Size of the page header at offset 0.
pub const PAGE_HEADER_SIZE: usize = 20;

/// Size of the opaque trailer.
pub const OPAQUE_SIZE: usize = 8;

/// Fixed offset of the opaque trailer.
pub const SPECIAL_OFFSET: usize = PAGE_SIZE - OPAQUE_SIZE;

/// Current page layout version (2 = compressed posting lists supported).
pub const PAGE_LAYOUT_VERSION: u16 = 2;

/// Tuple bodies and declared tuple sizes are aligned to this many bytes.
pub const TUPLE_ALIGNMENT: usize = 8;

/// Size of one item id in the entry-page slot array.
pub const ITEM_ID_SIZE: usize = std::mem::size_of::<ItemIdData>();

/// A page address within the index main fork.
pub type BlockNumber = u32;

/// A 1-based tuple position within a page. 0 is invalid.
pub type OffsetNumber = u16;

/// "No such block."
pub const INVALID_BLOCK: BlockNumber = u32::MAX;

/// The metapage lives in the first block of the fork.
pub const META_BLKNO: BlockNumber = 0;

/// The entry tree is always rooted here.
pub const ROOT_BLKNO: BlockNumber = 1;

/// First valid tuple offset on a page.
pub const FIRST_OFFSET: OffsetNumber = 1;

/// Smallest possible entry tuple: a bare tuple header.
pub const MIN_ENTRY_TUPLE_SIZE: usize = 16;

/// Upper bound on live tuples on an entry page: every tuple costs at least
/// an item id plus a minimal tuple body.
pub const MAX_ENTRY_TUPLES_PER_PAGE: usize =
    (SPECIAL_OFFSET - PAGE_HEADER_SIZE) / (ITEM_ID_SIZE + MIN_ENTRY_TUPLE_SIZE);

/// Upper bound on items on a data page: the densest payload is a packed
/// item-pointer array.
pub const MAX_DATA_ITEMS_PER_PAGE: usize = (SPECIAL_OFFSET - PAGE_HEADER_SIZE) / 6;

/// Rounds `len` up to the tuple alignment boundary.
#[inline]
pub const fn align_tuple(len: usize) -> usize {
    (len + TUPLE_ALIGNMENT - 1) & !(TUPLE_ALIGNMENT - 1)
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct PageHeader {
    lsn: U64,
    checksum: U32,
    lower: U16,
    upper: U16,
    special: U16,
    version: U16,
}

impl PageHeader {
    le_getters! {
        lsn: u64,
        checksum: u32,
        lower: u16,
        upper: u16,
        special: u16,
        version: u16,
    }

    pub fn new(lsn: u64, checksum: u32, lower: u16, upper: u16) -> Self {
        Self {
            lsn: U64::new(lsn),
            checksum: U32::new(checksum),
            lower: U16::new(lower),
            upper: U16::new(upper),
            special: U16::new(SPECIAL_OFFSET as u16),
            version: U16::new(PAGE_LAYOUT_VERSION),
        }
    }

    pub fn read(page: &[u8]) -> Result<&Self> {
        eyre::ensure!(
            page.len() >= PAGE_HEADER_SIZE,
            "buffer too small for PageHeader: {} < {}",
            page.len(),
            PAGE_HEADER_SIZE
        );
        Self::ref_from_bytes(&page[..PAGE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read PageHeader: {e:?}"))
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct ItemIdData {
    offset: U16,
    length: U16,
}

impl ItemIdData {
    le_getters! {
        offset: u16,
        length: u16,
    }

    pub fn new(offset: u16, length: u16) -> Self {
        Self {
            offset: U16::new(offset),
            length: U16::new(length),
        }
    }
}

const _: () = assert!(std::mem::size_of::<PageHeader>() == PAGE_HEADER_SIZE);
const _: () = assert!(std::mem::size_of::<ItemIdData>() == ITEM_ID_SIZE);

/// CRC32 of the page image with the checksum field itself zeroed.
pub fn compute_checksum(page: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&page[..8]);
    hasher.update(&[0u8; 4]);
    hasher.update(&page[12..]);
    hasher.finalize()
}

/// What the classifier learned about a page. All copied out; nothing
/// borrows the page buffer.
#[derive(Debug, Clone, Copy)]
pub struct PageInfo {
    pub kind: PageKind,
    pub lsn: u64,
    pub rightlink: BlockNumber,
    pub rightmost: bool,
    pub compressed: bool,
    /// Live item count: slot count for entry pages, `maxoff` for data
    /// pages, 0 for deleted and meta pages.
    pub live_items: u16,
}

/// Page classifier and sanity checker.
///
/// Validates the generic page header, the checksum if one is set, the flag
/// combination, the deleted-page rules and the per-page density bound, then
/// classifies the page.
pub fn inspect_page(index: &str, blkno: BlockNumber, page: &[u8]) -> Result<PageInfo> {
    let loc = Location::page(blkno);

    ensure_sound!(
        page.len() == PAGE_SIZE,
        index,
        loc,
        "page has {} bytes, expected {PAGE_SIZE}",
        page.len()
    );

    let header = PageHeader::read(page)?;
    ensure_sound!(
        header.version() == PAGE_LAYOUT_VERSION,
        index,
        loc,
        "unexpected page layout version {}",
        header.version()
    );
    ensure_sound!(
        header.special() as usize == SPECIAL_OFFSET,
        index,
        loc,
        "special space at {}, expected {SPECIAL_OFFSET}",
        header.special()
    );
    ensure_sound!(
        header.lower() as usize >= PAGE_HEADER_SIZE
            && header.lower() <= header.upper()
            && header.upper() <= header.special(),
        index,
        loc,
        "invalid page bounds (lower {}, upper {}, special {})",
        header.lower(),
        header.upper(),
        header.special()
    );
    if header.checksum() != 0 {
        let actual = compute_checksum(page);
        ensure_sound!(
            header.checksum() == actual,
            index,
            loc,
            "checksum mismatch: page carries {:#010x}, computed {actual:#010x}",
            header.checksum()
        );
    }

    let opaque = PageOpaque::read(page)?;
    ensure_sound!(
        opaque.is_rightmost() == (opaque.rightlink() == INVALID_BLOCK),
        index,
        loc,
        "right-most flag disagrees with right sibling link {}",
        opaque.rightlink()
    );
    if opaque.is_meta() {
        ensure_sound!(
            blkno == META_BLKNO,
            index,
            loc,
            "meta flag outside the metapage"
        );
        ensure_sound!(
            opaque.flags() == opaque::flags::META | opaque::flags::RIGHTMOST,
            index,
            loc,
            "meta flag combined with tree flags {:#06x}",
            opaque.flags()
        );
        return Ok(PageInfo {
            kind: PageKind::Meta,
            lsn: header.lsn(),
            rightlink: opaque.rightlink(),
            rightmost: true,
            compressed: false,
            live_items: 0,
        });
    }

    let live_items = if opaque.is_data() {
        opaque.maxoff()
    } else {
        entry_item_count(index, blkno, header)?
    };

    if opaque.is_deleted() {
        ensure_sound!(opaque.is_leaf(), index, loc, "deleted internal page");
        ensure_sound!(
            live_items == 0,
            index,
            loc,
            "deleted page with {live_items} live tuples"
        );
    } else {
        let max = if opaque.is_data() {
            MAX_DATA_ITEMS_PER_PAGE
        } else {
            MAX_ENTRY_TUPLES_PER_PAGE
        };
        ensure_sound!(
            live_items as usize <= max,
            index,
            loc,
            "page holds {live_items} tuples, more than the maximum {max}"
        );
    }

    let kind = match (opaque.is_deleted(), opaque.is_data(), opaque.is_leaf()) {
        (true, _, _) => PageKind::DeletedLeaf,
        (false, true, true) => PageKind::DataLeaf,
        (false, true, false) => PageKind::DataInternal,
        (false, false, true) => PageKind::EntryLeaf,
        (false, false, false) => PageKind::EntryInternal,
    };

    Ok(PageInfo {
        kind,
        lsn: header.lsn(),
        rightlink: opaque.rightlink(),
        rightmost: opaque.is_rightmost(),
        compressed: opaque.is_compressed(),
        live_items: if opaque.is_deleted() { 0 } else { live_items },
    })
}

/// Number of item-id slots on an entry page, derived from `lower`.
pub fn entry_item_count(index: &str, blkno: BlockNumber, header: &PageHeader) -> Result<u16> {
    ensure_sound!(
        header.lower() as usize >= PAGE_HEADER_SIZE,
        index,
        Location::page(blkno),
        "item-id array ends at {} inside the page header",
        header.lower()
    );
    let slot_bytes = header.lower() as usize - PAGE_HEADER_SIZE;
    ensure_sound!(
        slot_bytes % ITEM_ID_SIZE == 0,
        index,
        Location::page(blkno),
        "item-id array is {slot_bytes} bytes, not a multiple of {ITEM_ID_SIZE}"
    );
    Ok((slot_bytes / ITEM_ID_SIZE) as u16)
}

/// Fetches and validates the item id at 1-based `off`.
///
/// A corrupt line pointer must not send a tuple read past the tuple space,
/// so offset, length and bounds are all checked before the tuple bytes are
/// touched.
pub fn item_id_careful<'a>(
    index: &str,
    blkno: BlockNumber,
    page: &'a [u8],
    off: OffsetNumber,
) -> Result<&'a ItemIdData> {
    let loc = Location::tuple(blkno, off);
    let header = PageHeader::read(page)?;
    let count = entry_item_count(index, blkno, header)?;
    ensure_sound!(
        off >= FIRST_OFFSET && off <= count,
        index,
        loc,
        "item offset out of range (page holds {count} tuples)"
    );

    let pos = PAGE_HEADER_SIZE + ITEM_ID_SIZE * (off - 1) as usize;
    let iid = ItemIdData::ref_from_bytes(&page[pos..pos + ITEM_ID_SIZE])
        .map_err(|e| eyre::eyre!("failed to read item id: {e:?}"))?;

    ensure_sound!(
        iid.length() != 0,
        index,
        loc,
        "item id has no storage (lp_off={}, lp_len=0)",
        iid.offset()
    );
    ensure_sound!(
        iid.offset() as usize >= PAGE_HEADER_SIZE
            && iid.offset() as usize + iid.length() as usize <= SPECIAL_OFFSET,
        index,
        loc,
        "item id points outside the tuple space (lp_off={}, lp_len={})",
        iid.offset(),
        iid.length()
    );
    Ok(iid)
}
