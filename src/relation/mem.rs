//! In-memory index relation with pin accounting.
//!
//! Pages live in a plain vector; reads hand out borrows, so the pages
//! cannot move or change while any [`PageRef`] is alive. On top of that the
//! relation keeps a pin stack guarded by a `parking_lot::Mutex`: every
//! `read_block` pushes, every guard drop pops, and a pop that is not the
//! top of the stack flags a release-order violation. Tests call
//! [`MemRelation::assert_all_released`] after a walk to prove the traversal
//! holds pages only for the duration of their own visit.
//!
//! The eligibility predicates are settable so the unsupported-target paths
//! can be exercised without a real catalog.

use eyre::Result;
use parking_lot::Mutex;

use super::{IndexRelation, PageRef};
use crate::error::CheckError;
use crate::page::{BlockNumber, PageHeader, PAGE_SIZE};

#[derive(Default, Debug)]
struct PinState {
    stack: Vec<BlockNumber>,
    out_of_order_release: bool,
}

#[derive(Debug)]
pub struct MemRelation {
    name: String,
    pages: Vec<[u8; PAGE_SIZE]>,
    pins: Mutex<PinState>,
    gin: bool,
    valid: bool,
    other_session_temp: bool,
}

impl MemRelation {
    pub fn new(name: impl Into<String>, pages: Vec<[u8; PAGE_SIZE]>) -> Self {
        Self {
            name: name.into(),
            pages,
            pins: Mutex::new(PinState::default()),
            gin: true,
            valid: true,
            other_session_temp: false,
        }
    }

    pub fn not_gin(mut self) -> Self {
        self.gin = false;
        self
    }

    pub fn marked_invalid(mut self) -> Self {
        self.valid = false;
        self
    }

    pub fn other_session_temp(mut self) -> Self {
        self.other_session_temp = true;
        self
    }

    /// Mutable page access for corruption surgery. Requires exclusive
    /// access, so no guard can be alive.
    pub fn page_mut(&mut self, blkno: BlockNumber) -> &mut [u8; PAGE_SIZE] {
        &mut self.pages[blkno as usize]
    }

    /// Panics unless every pin was released, in acquisition order.
    pub fn assert_all_released(&self) {
        let pins = self.pins.lock();
        assert!(
            pins.stack.is_empty(),
            "leaked page pins: {:?}",
            pins.stack
        );
        assert!(!pins.out_of_order_release, "pages released out of LIFO order");
    }

    fn unpin(&self, blkno: BlockNumber) {
        let mut pins = self.pins.lock();
        if pins.stack.last() == Some(&blkno) {
            pins.stack.pop();
        } else if let Some(at) = pins.stack.iter().rposition(|&b| b == blkno) {
            pins.stack.remove(at);
            pins.out_of_order_release = true;
        }
    }
}

impl IndexRelation for MemRelation {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_gin(&self) -> bool {
        self.gin
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn is_other_session_temp(&self) -> bool {
        self.other_session_temp
    }

    fn block_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn read_block(&self, blkno: BlockNumber) -> Result<PageRef<'_>> {
        let Some(bytes) = self.pages.get(blkno as usize) else {
            return Err(CheckError::io(
                &self.name,
                blkno,
                format!("block is past the end of the fork ({} blocks)", self.pages.len()),
            )
            .into());
        };
        self.pins.lock().stack.push(blkno);
        let lsn = PageHeader::read(bytes)?.lsn();
        Ok(PageRef::new(bytes, lsn, Some(MemPin { rel: self, blkno })))
    }
}

/// Pin token carried by a [`PageRef`] from a [`MemRelation`].
#[derive(Debug)]
pub struct MemPin<'a> {
    rel: &'a MemRelation,
    blkno: BlockNumber,
}

impl Drop for MemPin<'_> {
    fn drop(&mut self) {
        self.rel.unpin(self.blkno);
    }
}
