//! # Posting-List Codec
//!
//! A posting list is a strictly ascending sequence of item pointers. On disk
//! it appears in two encodings:
//!
//! - **Raw**: a packed array of 6-byte item pointers. Used for small inline
//!   lists and for uncompressed data-leaf pages.
//! - **Compressed**: a 2-byte stream length followed by a varbyte-delta
//!   stream. Each pointer is packed into a u64 (`block << 16 | offset`); the
//!   first value is stored absolutely, every later value as the delta from
//!   its predecessor; each u64 is emitted 7 bits per byte, low group first,
//!   high bit meaning "more bytes follow". The item *count* is not part of
//!   the stream: it is declared by the surrounding container (the entry
//!   tuple header, or the data page trailer) and the decoder must produce
//!   exactly that many items, anything else being the decoding-mismatch
//!   error kind.
//!
//! Both directions of the codec live here: the checker only decodes, but
//! image-building tooling and the test suites need the canonical encoder to
//! produce bit-valid pages.

use eyre::Result;
use smallvec::SmallVec;

use crate::error::{CheckError, Location};
use crate::page::{BlockNumber, OffsetNumber, PageInfo, PAGE_HEADER_SIZE, SPECIAL_OFFSET};
use crate::tuple::{EntryPayload, ItemPointer, ItemPointerData, ITEM_POINTER_SIZE};
use crate::{bail_corrupted, ensure_sound};

use zerocopy::FromBytes;

/// Decoded posting lists; sized for the short inline case.
pub type PostingList = SmallVec<[ItemPointer; 32]>;

/// Encodes `items` (strictly ascending) into the compressed wire shape,
/// length prefix included.
pub fn encode_posting_list(items: &[ItemPointer]) -> Result<Vec<u8>> {
    let mut stream = Vec::with_capacity(items.len() * 2 + 2);
    stream.extend_from_slice(&[0, 0]);

    let mut prev: Option<u64> = None;
    for item in items {
        let packed = item.to_u64();
        let value = match prev {
            None => packed,
            Some(p) => {
                eyre::ensure!(
                    packed > p,
                    "posting list not strictly ascending: {item} after {}",
                    ItemPointer::from_u64(p)
                );
                packed - p
            }
        };
        encode_varbyte(value, &mut stream);
        prev = Some(packed);
    }

    let n_bytes = stream.len() - 2;
    eyre::ensure!(
        n_bytes <= u16::MAX as usize,
        "posting list stream of {n_bytes} bytes exceeds the length prefix"
    );
    stream[..2].copy_from_slice(&(n_bytes as u16).to_le_bytes());
    Ok(stream)
}

/// Decodes a compressed posting list and verifies the container-declared
/// count.
pub fn decode_posting_list(
    index: &str,
    loc: Location,
    declared: u16,
    payload: &[u8],
) -> Result<PostingList> {
    ensure_sound!(
        payload.len() >= 2,
        index,
        loc,
        "compressed posting list is missing its length prefix"
    );
    let n_bytes = u16::from_le_bytes([payload[0], payload[1]]) as usize;
    ensure_sound!(
        2 + n_bytes <= payload.len(),
        index,
        loc,
        "compressed posting list declares {n_bytes} stream bytes, {} available",
        payload.len() - 2
    );
    let stream = &payload[2..2 + n_bytes];

    let mut items = PostingList::new();
    let mut pos = 0usize;
    let mut prev: u64 = 0;
    while pos < stream.len() {
        let Some(value) = decode_varbyte(stream, &mut pos) else {
            bail_corrupted!(index, loc, "truncated varbyte in posting list");
        };
        let packed = if items.is_empty() {
            value
        } else {
            let Some(sum) = prev.checked_add(value) else {
                bail_corrupted!(index, loc, "item pointer delta overflows");
            };
            sum
        };
        items.push(ItemPointer::from_u64(packed));
        prev = packed;
    }

    if items.len() != declared as usize {
        return Err(CheckError::decoding_mismatch(
            index,
            loc,
            declared as u32,
            items.len() as u32,
        )
        .into());
    }
    Ok(items)
}

/// Reads a raw (uncompressed) item-pointer array.
fn read_raw_items(
    index: &str,
    loc: Location,
    n_items: u16,
    bytes: &[u8],
) -> Result<PostingList> {
    let need = n_items as usize * ITEM_POINTER_SIZE;
    ensure_sound!(
        need <= bytes.len(),
        index,
        loc,
        "{n_items} item pointers need {need} bytes, {} available",
        bytes.len()
    );
    let mut items = PostingList::with_capacity(n_items as usize);
    for i in 0..n_items as usize {
        let at = i * ITEM_POINTER_SIZE;
        let ptr = ItemPointerData::ref_from_bytes(&bytes[at..at + ITEM_POINTER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read item pointer: {e:?}"))?;
        items.push(ptr.get());
    }
    Ok(items)
}

/// Decodes the payload of a data-leaf page in either encoding.
pub fn read_posting_leaf(
    index: &str,
    blkno: BlockNumber,
    page: &[u8],
    info: &PageInfo,
) -> Result<PostingList> {
    let loc = Location::page(blkno);
    let body = &page[PAGE_HEADER_SIZE..SPECIAL_OFFSET];
    if info.compressed {
        decode_posting_list(index, loc, info.live_items, body)
    } else {
        read_raw_items(index, loc, info.live_items, body)
    }
}

/// Decodes an inline entry-tuple posting payload in either encoding.
pub fn read_inline_posting(
    index: &str,
    blkno: BlockNumber,
    off: OffsetNumber,
    payload: &EntryPayload<'_>,
) -> Result<PostingList> {
    let loc = Location::tuple(blkno, off);
    match *payload {
        EntryPayload::Inline {
            n_items,
            compressed: true,
            bytes,
        } => decode_posting_list(index, loc, n_items, bytes),
        EntryPayload::Inline {
            n_items,
            compressed: false,
            bytes,
        } => read_raw_items(index, loc, n_items, bytes),
        EntryPayload::PostingTreeRef { .. } => {
            eyre::bail!("posting-tree reference has no inline payload")
        }
    }
}

fn encode_varbyte(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn decode_varbyte(stream: &[u8], pos: &mut usize) -> Option<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *stream.get(*pos)?;
        *pos += 1;
        value |= ((byte & 0x7F) as u64).checked_shl(shift)?;
        if byte & 0x80 == 0 {
            return Some(value);
        }
        shift += 7;
        if shift > 63 {
            return None;
        }
    }
}
