//! # Posting-Tree Walker
//!
//! A posting tree stores one key's posting list across data pages. This
//! walker is invoked with the tree's root block (taken from an entry-leaf
//! tuple) and runs its own depth-first traversal: a LIFO stack of frames,
//! its own leaf depth, one page held at a time.
//!
//! Data pages carry only item pointers, so the checks are simpler than the
//! entry tree's: every page must be a data page, leaves sit at one depth,
//! internals are never empty, and leaf payloads decode to strictly
//! ascending item pointers ending in a valid heap pointer. Posting items
//! whose key is the (0, 0) sentinel bound the right-most subtree; the
//! subtree is walked like any other, but the sentinel carries no ordering
//! information, so such a frame has no parent key to compare against.

use eyre::Result;
use tracing::debug;

use crate::error::{CheckError, Location};
use crate::page::opaque::PageKind;
use crate::page::{inspect_page, BlockNumber, FIRST_OFFSET, INVALID_BLOCK, META_BLKNO};
use crate::relation::IndexRelation;
use crate::tuple::posting::read_posting_leaf;
use crate::tuple::{read_posting_item, ItemPointer};
use crate::{bail_corrupted, ensure_sound};

use super::CancelToken;

/// One pending data-page visit. The parent item's key rides along for
/// traversal context; sentinel-keyed parents carry `None`.
struct DataFrame {
    depth: u32,
    parent_blk: BlockNumber,
    parent_key: Option<ItemPointer>,
    blkno: BlockNumber,
}

pub(crate) struct PostingTreeWalker<'w, R> {
    rel: &'w R,
    cancel: &'w CancelToken,
    stack: Vec<DataFrame>,
    leaf_depth: Option<u32>,
}

impl<'w, R: IndexRelation> PostingTreeWalker<'w, R> {
    pub(crate) fn new(rel: &'w R, cancel: &'w CancelToken) -> Self {
        Self {
            rel,
            cancel,
            stack: Vec::new(),
            leaf_depth: None,
        }
    }

    pub(crate) fn run(mut self, root: BlockNumber) -> Result<()> {
        self.stack.push(DataFrame {
            depth: 0,
            parent_blk: INVALID_BLOCK,
            parent_key: None,
            blkno: root,
        });

        while let Some(frame) = self.stack.pop() {
            if self.cancel.is_cancelled() {
                return Err(CheckError::cancelled(self.rel.name()).into());
            }
            self.visit_page(frame)?;
        }
        Ok(())
    }

    fn visit_page(&mut self, frame: DataFrame) -> Result<()> {
        let index = self.rel.name();
        let loc = Location::page(frame.blkno);
        let page = self.rel.read_block(frame.blkno)?;
        let info = inspect_page(index, frame.blkno, &page)?;

        debug!(
            block = frame.blkno,
            depth = frame.depth,
            kind = ?info.kind,
            parent = frame.parent_blk,
            parent_key = ?frame.parent_key,
            "visiting posting-tree page"
        );

        match info.kind {
            PageKind::DataLeaf | PageKind::DataInternal => {}
            // The sanity pass already required it empty; nothing to scan.
            PageKind::DeletedLeaf => return Ok(()),
            PageKind::Meta | PageKind::EntryLeaf | PageKind::EntryInternal => {
                bail_corrupted!(index, loc, "posting tree contains a non-data page")
            }
        }

        if info.kind == PageKind::DataLeaf {
            match self.leaf_depth {
                None => self.leaf_depth = Some(frame.depth),
                Some(depth) => ensure_sound!(
                    frame.depth == depth,
                    index,
                    loc,
                    "posting tree traversal encountered a leaf page unexpectedly"
                ),
            }

            let items = read_posting_leaf(index, frame.blkno, &page, &info)?;
            check_posting_items(index, loc, &items)?;
            return Ok(());
        }

        let nitems = info.live_items;
        ensure_sound!(nitems >= 1, index, loc, "internal page has no downlinks");
        if let Some(depth) = self.leaf_depth {
            ensure_sound!(
                frame.depth < depth,
                index,
                loc,
                "internal page at or below the leaf level"
            );
        }

        for off in FIRST_OFFSET..=nitems {
            let item = read_posting_item(index, frame.blkno, &page, off, nitems)?;
            ensure_sound!(
                item.child != INVALID_BLOCK && item.child != META_BLKNO,
                index,
                Location::tuple(frame.blkno, off),
                "invalid posting-tree downlink {}",
                item.child
            );
            self.stack.push(DataFrame {
                depth: frame.depth + 1,
                parent_blk: frame.blkno,
                parent_key: (!item.key_is_sentinel()).then_some(item.key),
                blkno: item.child,
            });
        }
        Ok(())
    }
}

/// The posting-payload rules shared by data leaves and inline lists:
/// strictly ascending item pointers, and a last pointer with a valid
/// (non-zero) heap offset. An empty list is legal and checks nothing.
pub(crate) fn check_posting_items(
    index: &str,
    loc: Location,
    items: &[ItemPointer],
) -> Result<()> {
    for pair in items.windows(2) {
        ensure_sound!(
            pair[0] < pair[1],
            index,
            loc,
            "item pointers out of order: {} then {}",
            pair[0],
            pair[1]
        );
    }
    if let Some(last) = items.last() {
        ensure_sound!(
            last.is_valid(),
            index,
            loc,
            "posting list contains invalid heap pointer {last}"
        );
    }
    Ok(())
}
