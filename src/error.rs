//! # Checker Error Kinds
//!
//! Every verdict the checker can reach is one of five stable kinds, modeled
//! as a [`CheckError`] enum. The rest of the crate plumbs `eyre::Result`, so
//! a caller that needs the machine-readable kind recovers it with
//! `report.downcast_ref::<CheckError>()`; the formatted message always names
//! the index and, where one is known, the offending block and offset.
//!
//! Offsets are 1-based as they are on disk; a [`Location`] with offset 0
//! refers to the page as a whole.

use thiserror::Error;

/// A page-level or tuple-level position inside the index, for error
/// messages. Offset 0 means "the whole page".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub block: u32,
    pub offset: u16,
}

impl Location {
    pub fn page(block: u32) -> Self {
        Self { block, offset: 0 }
    }

    pub fn tuple(block: u32, offset: u16) -> Self {
        Self { block, offset }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.offset == 0 {
            write!(f, "block {}", self.block)
        } else {
            write!(f, "block {}, offset {}", self.block, self.offset)
        }
    }
}

/// The stable error kinds surfaced by `check_index`.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The relation is not something this checker can verify.
    #[error("cannot check index \"{index}\": {reason}")]
    UnsupportedTarget { index: String, reason: String },

    /// A block could not be read from the main fork.
    #[error("could not read block {block} of index \"{index}\": {detail}")]
    Io {
        index: String,
        block: u32,
        detail: String,
    },

    /// A structural invariant does not hold.
    #[error("index \"{index}\" is corrupted: {detail} ({location})")]
    Corrupted {
        index: String,
        location: Location,
        detail: String,
    },

    /// A compressed posting list decoded to a different item count than its
    /// header declares.
    #[error(
        "index \"{index}\" has a corrupted posting list: \
         {declared} items declared, {decoded} decoded ({location})"
    )]
    DecodingMismatch {
        index: String,
        location: Location,
        declared: u32,
        decoded: u32,
    },

    /// The host asked us to stop.
    #[error("verification of index \"{index}\" was cancelled")]
    Cancelled { index: String },
}

impl CheckError {
    pub fn unsupported(index: &str, reason: impl Into<String>) -> Self {
        CheckError::UnsupportedTarget {
            index: index.into(),
            reason: reason.into(),
        }
    }

    pub fn io(index: &str, block: u32, detail: impl Into<String>) -> Self {
        CheckError::Io {
            index: index.into(),
            block,
            detail: detail.into(),
        }
    }

    pub fn corrupted(index: &str, location: Location, detail: impl Into<String>) -> Self {
        CheckError::Corrupted {
            index: index.into(),
            location,
            detail: detail.into(),
        }
    }

    pub fn decoding_mismatch(index: &str, location: Location, declared: u32, decoded: u32) -> Self {
        CheckError::DecodingMismatch {
            index: index.into(),
            location,
            declared,
            decoded,
        }
    }

    pub fn cancelled(index: &str) -> Self {
        CheckError::Cancelled {
            index: index.into(),
        }
    }
}
