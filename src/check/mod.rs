//! # Index Verification
//!
//! [`check_index`] is the single callable operation: given a shared-locked
//! index relation, a key comparator and a cancellation token, it walks every
//! reachable page and returns `Ok(())` only if all structural invariants
//! hold. Any violation surfaces as a [`CheckError`](crate::error::CheckError)
//! naming the index and the offending block (and offset, when one exists).
//!
//! The walk is two coupled depth-first traversals, both driven by explicit
//! LIFO stacks rather than call-stack recursion so that a page can be
//! released before any of its children is visited:
//!
//! - the [entry-tree walker](entry) starts at the fixed root, checks
//!   intra-page key order, tuple sizing and the parent/child key covering
//!   invariant (reconciling discrepancies that a concurrent page split can
//!   explain), and dispatches each leaf payload;
//! - the [posting-tree walker](posting) runs once per oversized posting
//!   list, checking tree shape and the posting-leaf payload rules.
//!
//! The index is allowed to mutate underneath the walk: the walker holds at
//! most one page at a time, carries detached parent-tuple copies in its
//! stack frames (never a live reference into a parent buffer), queues the
//! right sibling when a child looks split, and re-reads the parent before
//! believing a covering violation. An error is only raised for
//! discrepancies no in-flight split can explain.
//!
//! Verification is read-only and leaves no state behind; the traversal
//! arena and all stacks die when `check_index` returns.

pub mod entry;
pub mod posting;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bumpalo::Bump;
use eyre::Result;
use tracing::{debug, warn};

use crate::compare::KeyComparator;
use crate::error::{CheckError, Location};
use crate::page::meta::{MetaPage, META_MAGIC, META_VERSION};
use crate::page::opaque::PageKind;
use crate::page::{inspect_page, META_BLKNO};
use crate::relation::IndexRelation;
use crate::{bail_corrupted, ensure_sound};

use entry::EntryTreeWalker;

/// Asynchronous cancellation signal from the host.
///
/// Checked at the top of every stack iteration in both walkers; once set,
/// the walk unwinds with the cancelled error kind, releasing every held
/// page on the way out.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Verifies the structural integrity of a GIN index.
///
/// On success there is no output. Errors carry one of the five stable
/// [`CheckError`](crate::error::CheckError) kinds; recover it from the
/// report with `downcast_ref::<CheckError>()`.
pub fn check_index<R, C>(rel: &R, comparator: &C, cancel: &CancelToken) -> Result<()>
where
    R: IndexRelation,
    C: KeyComparator,
{
    index_checkable(rel)?;

    // The pending list is not covered by this checker: entries parked there
    // are invisible to a tree walk, and a half-merged list must not turn
    // into false corruption reports. Require the caller to flush first.
    {
        let index = rel.name();
        let page = rel.read_block(META_BLKNO)?;
        let info = inspect_page(index, META_BLKNO, &page)?;
        let loc = Location::page(META_BLKNO);
        if info.kind != PageKind::Meta {
            bail_corrupted!(index, loc, "first block of the fork is not a metapage");
        }
        let meta = MetaPage::read(&page)?;
        ensure_sound!(
            meta.magic() == META_MAGIC,
            index,
            loc,
            "bad metapage magic {:#010x}",
            meta.magic()
        );
        ensure_sound!(
            meta.version() == META_VERSION,
            index,
            loc,
            "unsupported metapage version {}",
            meta.version()
        );
        if !meta.pending_is_empty() {
            warn!(
                index,
                pending_pages = meta.n_pending_pages(),
                pending_tuples = meta.n_pending_tuples(),
                "index has a non-empty pending list; flush it and re-run, skipping verification"
            );
            return Ok(());
        }
    }

    debug!(index = rel.name(), blocks = rel.block_count(), "verifying index");
    let arena = Bump::new();
    EntryTreeWalker::new(rel, comparator, cancel, &arena).run()
}

/// The eligibility gate: only live, valid GIN indexes of this session are
/// checkable.
fn index_checkable<R: IndexRelation>(rel: &R) -> Result<()> {
    if !rel.is_gin() {
        return Err(CheckError::unsupported(
            rel.name(),
            "only GIN indexes are supported as targets for this verification",
        )
        .into());
    }
    if rel.is_other_session_temp() {
        return Err(CheckError::unsupported(
            rel.name(),
            "cannot access temporary indexes of other sessions",
        )
        .into());
    }
    if !rel.is_valid() {
        return Err(CheckError::unsupported(rel.name(), "index is not valid").into());
    }
    Ok(())
}
