//! # Entry-Tree Walker
//!
//! Depth-first traversal of the entry tree from the fixed root, driven by an
//! explicit LIFO stack. Each frame names the page to visit, the depth it is
//! expected at, and a detached copy of the parent downlink tuple. Detached,
//! because the parent page is long released by the time the child is
//! visited, and no frame may point into buffer memory it does not hold.
//!
//! Per page, in order:
//!
//! 1. acquire + classify/sanity-check; deleted pages are done after that;
//! 2. queue the right sibling under the same parent when the page's maximum
//!    key no longer exceeds the parent key and the page has a right
//!    sibling, the signature of a split that happened after the parent was
//!    read;
//! 3. leaves must all sit at one depth, internals strictly above it and
//!    never empty;
//! 4. scan tuples in offset order: sizes consistent, keys strictly
//!    ascending under (attribute, key, category); for the page's last tuple
//!    the parent key must still cover it, and when it does not, the parent
//!    is re-read before judging, because the stale copy in the frame may
//!    predate a concurrent split (a vanished downlink is reported as an
//!    advisory, not an error);
//! 5. internal tuples push child frames; leaf tuples get their payload
//!    validated, inline posting lists immediately, posting trees after the
//!    page is released.
//!
//! The page is held from acquisition to the end of the scan and released
//! before any child or posting tree is entered, so the walker owns at most
//! one entry page at any instant (two, briefly, during a parent re-find).

use std::cmp::Ordering;

use bumpalo::Bump;
use eyre::Result;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::compare::{Category, KeyComparator};
use crate::error::{CheckError, Location};
use crate::page::opaque::PageKind;
use crate::page::{
    inspect_page, BlockNumber, OffsetNumber, FIRST_OFFSET, INVALID_BLOCK, META_BLKNO, ROOT_BLKNO,
};
use crate::relation::IndexRelation;
use crate::tuple::posting::read_inline_posting;
use crate::tuple::{read_entry_tuple, EntryPayload, EntryTuple};
use crate::{bail_corrupted, ensure_sound};

use super::posting::{check_posting_items, PostingTreeWalker};
use super::CancelToken;

/// One pending page visit. `parent_tuple` is an owned copy in the traversal
/// arena; it survives the parent page's release and dies with the frame.
struct Frame<'b> {
    depth: u32,
    parent_blk: BlockNumber,
    parent_lsn: u64,
    parent_tuple: Option<DetachedEntry<'b>>,
    blkno: BlockNumber,
}

/// The comparison-relevant half of an entry tuple, copied out of its page.
#[derive(Clone, Copy)]
struct DetachedEntry<'b> {
    attnum: u16,
    category: Category,
    key: &'b [u8],
}

pub(crate) struct EntryTreeWalker<'w, R, C> {
    rel: &'w R,
    comparator: &'w C,
    cancel: &'w CancelToken,
    arena: &'w Bump,
    stack: Vec<Frame<'w>>,
    leaf_depth: Option<u32>,
}

impl<'w, R, C> EntryTreeWalker<'w, R, C>
where
    R: IndexRelation,
    C: KeyComparator,
{
    pub(crate) fn new(
        rel: &'w R,
        comparator: &'w C,
        cancel: &'w CancelToken,
        arena: &'w Bump,
    ) -> Self {
        Self {
            rel,
            comparator,
            cancel,
            arena,
            stack: Vec::new(),
            leaf_depth: None,
        }
    }

    pub(crate) fn run(mut self) -> Result<()> {
        self.stack.push(Frame {
            depth: 0,
            parent_blk: INVALID_BLOCK,
            parent_lsn: 0,
            parent_tuple: None,
            blkno: ROOT_BLKNO,
        });

        while let Some(frame) = self.stack.pop() {
            if self.cancel.is_cancelled() {
                return Err(CheckError::cancelled(self.rel.name()).into());
            }
            self.visit_page(frame)?;
        }
        Ok(())
    }

    fn visit_page(&mut self, frame: Frame<'w>) -> Result<()> {
        let index = self.rel.name();
        let loc = Location::page(frame.blkno);
        let page = self.rel.read_block(frame.blkno)?;
        let info = inspect_page(index, frame.blkno, &page)?;

        debug!(
            block = frame.blkno,
            depth = frame.depth,
            kind = ?info.kind,
            parent = frame.parent_blk,
            parent_lsn = frame.parent_lsn,
            "visiting entry page"
        );

        match info.kind {
            PageKind::Meta => {
                bail_corrupted!(index, loc, "entry tree reached the metapage")
            }
            PageKind::DataInternal | PageKind::DataLeaf => {
                bail_corrupted!(index, loc, "entry tree reached a posting-tree page")
            }
            // Fully covered by the sanity pass; a deleted page is not a
            // live member of the tree.
            PageKind::DeletedLeaf => return Ok(()),
            PageKind::EntryLeaf | PageKind::EntryInternal => {}
        }
        let is_leaf = info.kind == PageKind::EntryLeaf;
        let nitems = info.live_items;

        // The child may have split since the parent was read, putting keys
        // the downlink still covers onto a right sibling whose downlink we
        // never saw. Queue the sibling through the same downlink.
        if let Some(parent) = frame.parent_tuple {
            if !info.rightmost && nitems >= FIRST_OFFSET {
                let page_max = read_entry_tuple(index, frame.blkno, &page, nitems)?;
                let ord = self.comparator.compare_entries(
                    parent.attnum,
                    page_max.key,
                    page_max.category,
                    parent.key,
                    parent.category,
                );
                if ord != Ordering::Greater {
                    debug!(
                        block = frame.blkno,
                        sibling = info.rightlink,
                        "page no longer fills its downlink bound; queueing right sibling"
                    );
                    self.stack.push(Frame {
                        depth: frame.depth,
                        parent_blk: frame.parent_blk,
                        parent_lsn: frame.parent_lsn,
                        parent_tuple: Some(parent),
                        blkno: info.rightlink,
                    });
                }
            }
        }

        // Every root-to-leaf path must have the same length.
        if is_leaf {
            match self.leaf_depth {
                None => self.leaf_depth = Some(frame.depth),
                Some(depth) => ensure_sound!(
                    frame.depth == depth,
                    index,
                    loc,
                    "traversal of internal pages encountered a leaf page unexpectedly"
                ),
            }
        } else {
            ensure_sound!(nitems >= 1, index, loc, "internal page has no downlinks");
            if let Some(depth) = self.leaf_depth {
                ensure_sound!(
                    frame.depth < depth,
                    index,
                    loc,
                    "internal page at or below the leaf level"
                );
            }
        }

        let mut prev: Option<EntryTuple<'_>> = None;
        let mut tree_roots: SmallVec<[(BlockNumber, OffsetNumber); 4]> = SmallVec::new();

        for off in FIRST_OFFSET..=nitems {
            let tloc = Location::tuple(frame.blkno, off);
            let tup = read_entry_tuple(index, frame.blkno, &page, off)?;

            if let Some(prev) = &prev {
                ensure_sound!(
                    self.entry_order(prev, &tup) == Ordering::Less,
                    index,
                    tloc,
                    "wrong tuple order"
                );
            }

            if let Some(parent) = frame.parent_tuple {
                if off == nitems {
                    self.check_parent_cover(&frame, parent, &tup, off)?;
                }
            }

            if !is_leaf {
                let child = tup.downlink();
                ensure_sound!(
                    child != INVALID_BLOCK && child != META_BLKNO,
                    index,
                    tloc,
                    "invalid downlink {child}"
                );
                self.stack.push(Frame {
                    depth: frame.depth + 1,
                    parent_blk: frame.blkno,
                    parent_lsn: page.lsn(),
                    parent_tuple: Some(self.detach(&tup)),
                    blkno: child,
                });
            } else {
                match tup.payload {
                    EntryPayload::PostingTreeRef { root } => tree_roots.push((root, off)),
                    EntryPayload::Inline { .. } => {
                        let items = read_inline_posting(index, frame.blkno, off, &tup.payload)?;
                        check_posting_items(index, tloc, &items)?;
                    }
                }
            }

            prev = Some(tup);
        }

        // Release the leaf before descending: a posting tree is walked with
        // no entry page held.
        drop(page);

        for (root, off) in tree_roots {
            debug!(
                root,
                entry_block = frame.blkno,
                entry_offset = off,
                "validating posting tree"
            );
            PostingTreeWalker::new(self.rel, self.cancel).run(root)?;
        }
        Ok(())
    }

    /// Strict page order: attribute number first, then the category-aware
    /// entry comparison under the current tuple's attribute.
    fn entry_order(&self, prev: &EntryTuple<'_>, cur: &EntryTuple<'_>) -> Ordering {
        prev.attnum.cmp(&cur.attnum).then_with(|| {
            self.comparator
                .compare_entries(cur.attnum, prev.key, prev.category, cur.key, cur.category)
        })
    }

    /// The page's last key must not exceed the parent downlink key. When it
    /// does, the frame's parent copy may predate a concurrent split of the
    /// parent, so the verdict is only final against a freshly re-found
    /// downlink.
    fn check_parent_cover(
        &self,
        frame: &Frame<'w>,
        parent: DetachedEntry<'w>,
        last: &EntryTuple<'_>,
        off: OffsetNumber,
    ) -> Result<()> {
        let index = self.rel.name();
        let ord = self.comparator.compare_entries(
            last.attnum,
            last.key,
            last.category,
            parent.key,
            parent.category,
        );
        if ord != Ordering::Greater {
            return Ok(());
        }

        match self.refind_parent(frame.parent_blk, frame.blkno)? {
            None => {
                warn!(
                    index,
                    child = frame.blkno,
                    parent = frame.parent_blk,
                    "unable to re-find parent tuple, assuming concurrent split"
                );
                Ok(())
            }
            Some(fresh) => {
                let ord = self.comparator.compare_entries(
                    last.attnum,
                    last.key,
                    last.category,
                    fresh.key,
                    fresh.category,
                );
                ensure_sound!(
                    ord != Ordering::Greater,
                    index,
                    Location::tuple(frame.blkno, off),
                    "last tuple exceeds the parent downlink bound"
                );
                Ok(())
            }
        }
    }

    /// Re-reads the parent page and looks for the downlink to `child_blk`.
    ///
    /// Returns a detached copy if found. A parent that is no longer an
    /// internal entry page, or no longer carries the downlink, yields
    /// `None`: the tree moved under us and the caller must not conclude
    /// corruption from its stale copy.
    fn refind_parent(
        &self,
        parent_blk: BlockNumber,
        child_blk: BlockNumber,
    ) -> Result<Option<DetachedEntry<'w>>> {
        let index = self.rel.name();
        let page = self.rel.read_block(parent_blk)?;
        let info = inspect_page(index, parent_blk, &page)?;
        if info.kind != PageKind::EntryInternal {
            return Ok(None);
        }

        for off in FIRST_OFFSET..=info.live_items {
            let tup = read_entry_tuple(index, parent_blk, &page, off)?;
            if tup.downlink() == child_blk {
                return Ok(Some(self.detach(&tup)));
            }
        }
        Ok(None)
    }

    fn detach(&self, tup: &EntryTuple<'_>) -> DetachedEntry<'w> {
        DetachedEntry {
            attnum: tup.attnum,
            category: tup.category,
            key: self.arena.alloc_slice_copy(tup.key),
        }
    }
}
