//! # gincheck: GIN Index Integrity Checker
//!
//! `gincheck` verifies the structural integrity of a disk-resident
//! generalized inverted index (GIN): a B+-tree of keys (the *entry tree*)
//! whose leaf payloads are sorted heap-pointer lists, stored inline when
//! small and in per-key auxiliary B+-trees (*posting trees*) when large.
//! The checker walks every reachable page of a live, shared-locked index
//! and reports the first violated invariant as a structured error; it never
//! modifies the index.
//!
//! ## What is checked
//!
//! - uniform leaf depth in the entry tree and in every posting tree;
//! - kind homogeneity (entry pages never point into posting trees and vice
//!   versa) and non-empty internal pages;
//! - strict intra-page order of entry keys under a caller-supplied,
//!   category-aware comparator, and strict order of posting-list item
//!   pointers;
//! - parent downlink keys covering their child pages, judged only after
//!   concurrent-split reconciliation (sibling queueing + downlink re-find);
//! - per-page sanity: header bounds, checksum, flag consistency, deleted
//!   pages empty, tuple-count ceiling, item-id/tuple size agreement;
//! - posting-list decoding: compressed streams must produce exactly the
//!   declared item count; the final heap pointer must be valid.
//!
//! ## Quick start
//!
//! ```ignore
//! use gincheck::{check_index, BytewiseComparator, CancelToken, FileRelation};
//!
//! let rel = FileRelation::open("idx_docs.gin")?;
//! check_index(&rel, &BytewiseComparator, &CancelToken::new())?;
//! ```
//!
//! Errors are `eyre::Report`s wrapping a [`CheckError`]; use
//! `report.downcast_ref::<CheckError>()` for the machine-readable kind.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ check::check_index  (eligibility, metapage)  │
//! ├──────────────────────┬───────────────────────┤
//! │ check::entry         │ check::posting        │
//! │ entry-tree walker    │ posting-tree walker   │
//! ├──────────────────────┴───────────────────────┤
//! │ tuple  (entry tuples, posting items, codec)  │
//! ├──────────────────────────────────────────────┤
//! │ page   (layout, classifier, sanity checks)   │
//! ├──────────────────────────────────────────────┤
//! │ relation (page access: mmap file, in-memory) │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The index is expected to be mutating while the walk runs: the host holds
//! only a shared relation-level lock. The traversal therefore never holds
//! more than one page, carries detached parent-tuple copies in its stack
//! frames, and treats a failed parent/child comparison as corruption only
//! when a re-read of the parent cannot explain it as an in-flight split.

pub mod check;
pub mod compare;
pub mod error;
pub mod macros;
pub mod page;
pub mod relation;
pub mod tuple;

pub use check::{check_index, CancelToken};
pub use compare::{BytewiseComparator, Category, KeyComparator};
pub use error::{CheckError, Location};
pub use page::{BlockNumber, OffsetNumber, PAGE_SIZE};
pub use relation::{FileRelation, IndexRelation, MemRelation, PageRef};
pub use tuple::ItemPointer;
