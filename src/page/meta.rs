//! Metapage layout.
//!
//! Block 0 of the fork identifies the index (magic + version), tracks the
//! pending-list state and carries page statistics. The checker consults it
//! for eligibility and for the pending-list precondition; the statistics are
//! informational.

use eyre::Result;
use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{BlockNumber, INVALID_BLOCK, PAGE_HEADER_SIZE, PAGE_SIZE};
use crate::le_getters;

/// "GIN1": identifies the fork as a generalized inverted index.
pub const META_MAGIC: u32 = 0x4749_4E31;

/// Current metapage format version.
pub const META_VERSION: u32 = 2;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct MetaPage {
    magic: U32,
    version: U32,
    pending_head: U32,
    pending_tail: U32,
    n_pending_pages: U32,
    n_pending_tuples: U64,
    n_total_pages: U32,
    n_entry_pages: U32,
    n_data_pages: U32,
    n_entries: U64,
}

impl MetaPage {
    le_getters! {
        magic: u32,
        version: u32,
        pending_head: u32,
        pending_tail: u32,
        n_pending_pages: u32,
        n_pending_tuples: u64,
        n_total_pages: u32,
        n_entry_pages: u32,
        n_data_pages: u32,
        n_entries: u64,
    }

    /// A metapage for an index with an empty pending list.
    pub fn new(n_total_pages: u32, n_entry_pages: u32, n_data_pages: u32, n_entries: u64) -> Self {
        Self {
            magic: U32::new(META_MAGIC),
            version: U32::new(META_VERSION),
            pending_head: U32::new(INVALID_BLOCK),
            pending_tail: U32::new(INVALID_BLOCK),
            n_pending_pages: U32::new(0),
            n_pending_tuples: U64::new(0),
            n_total_pages: U32::new(n_total_pages),
            n_entry_pages: U32::new(n_entry_pages),
            n_data_pages: U32::new(n_data_pages),
            n_entries: U64::new(n_entries),
        }
    }

    pub fn with_pending(mut self, head: BlockNumber, n_pages: u32, n_tuples: u64) -> Self {
        self.pending_head = U32::new(head);
        self.pending_tail = U32::new(head);
        self.n_pending_pages = U32::new(n_pages);
        self.n_pending_tuples = U64::new(n_tuples);
        self
    }

    pub fn read(page: &[u8]) -> Result<&Self> {
        eyre::ensure!(
            page.len() == PAGE_SIZE,
            "buffer too small for MetaPage: {}",
            page.len()
        );
        let end = PAGE_HEADER_SIZE + std::mem::size_of::<Self>();
        Self::ref_from_bytes(&page[PAGE_HEADER_SIZE..end])
            .map_err(|e| eyre::eyre!("failed to read MetaPage: {e:?}"))
    }

    pub fn pending_is_empty(&self) -> bool {
        self.pending_head() == INVALID_BLOCK && self.n_pending_pages() == 0
    }
}
