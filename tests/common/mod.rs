//! Shared test fixture: builds bit-valid index images in memory and offers
//! page surgery for the corruption scenarios.
//!
//! The builder accepts (attribute, key, heap pointer) insertions, then lays
//! out a complete index the way the write path would: sorted entry leaves
//! linked left to right, internal levels up to the fixed root block,
//! posting lists inlined below a threshold and spilled into posting trees
//! above it, both posting encodings, a metapage, and a checksum on every
//! page. Surgery helpers patch raw bytes and re-checksum, so a test sees
//! exactly the damage it injected and nothing else.

#![allow(dead_code)]

use gincheck::compare::Category;
use gincheck::page::meta::MetaPage;
use gincheck::page::opaque::{flags, PageOpaque};
use gincheck::page::{
    align_tuple, compute_checksum, ItemIdData, PageHeader, BlockNumber, INVALID_BLOCK,
    ITEM_ID_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE, SPECIAL_OFFSET,
};
use gincheck::relation::{FileRelation, IndexRelation, MemRelation};
use gincheck::tuple::posting::encode_posting_list;
use gincheck::tuple::{
    entry_flags, EntryTupleHeader, ItemPointer, ItemPointerData, PostingItemData,
    ENTRY_TUPLE_HEADER_SIZE, ITEM_POINTER_SIZE, POSTING_ITEM_SIZE,
};
use gincheck::{check_index, BytewiseComparator, CancelToken, CheckError};

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use zerocopy::IntoBytes;

pub type PageBytes = [u8; PAGE_SIZE];

/// LSN stamped on every built page; the checker only reads it.
pub const BUILD_LSN: u64 = 0x01D0_0000;

/// Routes checker tracing into the test harness output. Safe to call from
/// every test; only the first call installs a subscriber.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_test_writer()
        .try_init();
}

/// Runs the checker with the stock comparator and a fresh token.
pub fn check(rel: &impl IndexRelation) -> eyre::Result<()> {
    check_index(rel, &BytewiseComparator, &CancelToken::new())
}

/// Extracts the typed error kind from a report.
pub fn kind(err: &eyre::Report) -> &CheckError {
    err.downcast_ref::<CheckError>()
        .expect("error should carry a CheckError kind")
}

// ---------------------------------------------------------------------------
// Tuple and page encoders
// ---------------------------------------------------------------------------

pub enum Payload<'a> {
    /// Internal tuple: the link slot is a downlink, no payload bytes.
    Downlink,
    /// Leaf tuple whose posting list lives in a tree; link slot = root.
    TreeRef,
    /// Leaf tuple with a raw inline posting list.
    InlineRaw(&'a [ItemPointer]),
    /// Leaf tuple with a compressed inline posting list.
    InlineCompressed(&'a [ItemPointer]),
}

/// Encodes one entry tuple, padded to its aligned declared size.
pub fn entry_tuple(
    link: BlockNumber,
    attnum: u16,
    category: Category,
    key: &[u8],
    payload: Payload<'_>,
) -> Vec<u8> {
    let (n_items, tuple_flags, body): (u16, u8, Vec<u8>) = match payload {
        Payload::Downlink => (0, 0, Vec::new()),
        Payload::TreeRef => (0, entry_flags::POSTING_TREE, Vec::new()),
        Payload::InlineRaw(items) => {
            let mut body = Vec::with_capacity(items.len() * ITEM_POINTER_SIZE);
            for item in items {
                body.extend_from_slice(ItemPointerData::new(*item).as_bytes());
            }
            (items.len() as u16, 0, body)
        }
        Payload::InlineCompressed(items) => {
            let body = encode_posting_list(items).expect("ascending posting list");
            (items.len() as u16, entry_flags::COMPRESSED, body)
        }
    };

    let size = align_tuple(ENTRY_TUPLE_HEADER_SIZE + key.len() + body.len());
    let header = EntryTupleHeader::new(
        link,
        0,
        size as u16,
        attnum,
        key.len() as u16,
        n_items,
        category,
        tuple_flags,
    );
    let mut out = Vec::with_capacity(size);
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(key);
    out.extend_from_slice(&body);
    out.resize(size, 0);
    out
}

/// Slotted entry-page writer: item ids grow down from the header, tuple
/// bodies grow up from the special space.
pub struct EntryPageWriter {
    bytes: Box<PageBytes>,
    lower: usize,
    upper: usize,
}

impl EntryPageWriter {
    pub fn new() -> Self {
        Self {
            bytes: Box::new([0u8; PAGE_SIZE]),
            lower: PAGE_HEADER_SIZE,
            upper: SPECIAL_OFFSET,
        }
    }

    pub fn fits(&self, tuple_len: usize) -> bool {
        self.upper - self.lower >= ITEM_ID_SIZE + align_tuple(tuple_len)
    }

    pub fn is_empty(&self) -> bool {
        self.lower == PAGE_HEADER_SIZE
    }

    pub fn push_tuple(&mut self, tuple: &[u8]) {
        assert!(self.fits(tuple.len()), "page overflow in test builder");
        let len = align_tuple(tuple.len());
        self.upper -= len;
        self.bytes[self.upper..self.upper + tuple.len()].copy_from_slice(tuple);
        let iid = ItemIdData::new(self.upper as u16, len as u16);
        self.bytes[self.lower..self.lower + ITEM_ID_SIZE].copy_from_slice(iid.as_bytes());
        self.lower += ITEM_ID_SIZE;
    }

    pub fn seal(mut self, rightlink: BlockNumber, leaf: bool, rightmost: bool) -> PageBytes {
        let mut page_flags = 0u16;
        if leaf {
            page_flags |= flags::LEAF;
        }
        if rightmost {
            page_flags |= flags::RIGHTMOST;
        }
        let link = if rightmost { INVALID_BLOCK } else { rightlink };
        let header = PageHeader::new(BUILD_LSN, 0, self.lower as u16, self.upper as u16);
        self.bytes[..PAGE_HEADER_SIZE].copy_from_slice(header.as_bytes());
        let opaque = PageOpaque::new(link, 0, page_flags);
        self.bytes[SPECIAL_OFFSET..].copy_from_slice(opaque.as_bytes());
        *self.bytes
    }
}

/// A whole entry page from a tuple list, for hand-built fixtures.
pub fn entry_page(
    tuples: &[Vec<u8>],
    rightlink: BlockNumber,
    leaf: bool,
    rightmost: bool,
) -> PageBytes {
    let mut writer = EntryPageWriter::new();
    for tuple in tuples {
        writer.push_tuple(tuple);
    }
    writer.seal(rightlink, leaf, rightmost)
}

/// A posting-tree leaf page in either encoding.
pub fn data_leaf_page(
    items: &[ItemPointer],
    compressed: bool,
    rightlink: BlockNumber,
    rightmost: bool,
) -> PageBytes {
    let mut bytes = [0u8; PAGE_SIZE];
    let body = if compressed {
        encode_posting_list(items).expect("ascending posting list")
    } else {
        let mut body = Vec::with_capacity(items.len() * ITEM_POINTER_SIZE);
        for item in items {
            body.extend_from_slice(ItemPointerData::new(*item).as_bytes());
        }
        body
    };
    assert!(PAGE_HEADER_SIZE + body.len() <= SPECIAL_OFFSET);
    bytes[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + body.len()].copy_from_slice(&body);

    let lower = (PAGE_HEADER_SIZE + body.len()) as u16;
    let header = PageHeader::new(BUILD_LSN, 0, lower, SPECIAL_OFFSET as u16);
    bytes[..PAGE_HEADER_SIZE].copy_from_slice(header.as_bytes());

    let mut page_flags = flags::DATA | flags::LEAF;
    if compressed {
        page_flags |= flags::COMPRESSED;
    }
    if rightmost {
        page_flags |= flags::RIGHTMOST;
    }
    let link = if rightmost { INVALID_BLOCK } else { rightlink };
    let opaque = PageOpaque::new(link, items.len() as u16, page_flags);
    bytes[SPECIAL_OFFSET..].copy_from_slice(opaque.as_bytes());
    bytes
}

/// A posting-tree internal page. With `sentinel_last`, the final item's key
/// is the (0, 0) right-most sentinel.
pub fn data_internal_page(
    children: &[(ItemPointer, BlockNumber)],
    sentinel_last: bool,
    rightlink: BlockNumber,
    rightmost: bool,
) -> PageBytes {
    let mut bytes = [0u8; PAGE_SIZE];
    let mut pos = PAGE_HEADER_SIZE;
    for (i, (max, child)) in children.iter().enumerate() {
        let key = if sentinel_last && i == children.len() - 1 {
            ItemPointer::new(0, 0)
        } else {
            *max
        };
        let item = PostingItemData::new(key, *child);
        bytes[pos..pos + POSTING_ITEM_SIZE].copy_from_slice(item.as_bytes());
        pos += POSTING_ITEM_SIZE;
    }
    assert!(pos <= SPECIAL_OFFSET);

    let header = PageHeader::new(BUILD_LSN, 0, pos as u16, SPECIAL_OFFSET as u16);
    bytes[..PAGE_HEADER_SIZE].copy_from_slice(header.as_bytes());

    let mut page_flags = flags::DATA;
    if rightmost {
        page_flags |= flags::RIGHTMOST;
    }
    let link = if rightmost { INVALID_BLOCK } else { rightlink };
    let opaque = PageOpaque::new(link, children.len() as u16, page_flags);
    bytes[SPECIAL_OFFSET..].copy_from_slice(opaque.as_bytes());
    bytes
}

/// The block-0 metapage.
pub fn meta_page(meta: MetaPage) -> PageBytes {
    let mut bytes = [0u8; PAGE_SIZE];
    let meta_end = PAGE_HEADER_SIZE + std::mem::size_of::<MetaPage>();
    bytes[PAGE_HEADER_SIZE..meta_end].copy_from_slice(meta.as_bytes());
    let header = PageHeader::new(BUILD_LSN, 0, meta_end as u16, SPECIAL_OFFSET as u16);
    bytes[..PAGE_HEADER_SIZE].copy_from_slice(header.as_bytes());
    let opaque = PageOpaque::new(INVALID_BLOCK, 0, flags::META | flags::RIGHTMOST);
    bytes[SPECIAL_OFFSET..].copy_from_slice(opaque.as_bytes());
    bytes
}

// ---------------------------------------------------------------------------
// Index builder
// ---------------------------------------------------------------------------

/// Builder-side entry identity; the derived order (attribute, category,
/// key bytes) matches what `BytewiseComparator` makes the checker expect.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntryKey {
    pub attnum: u16,
    pub category: Category,
    pub key: Vec<u8>,
}

pub struct IndexBuilder {
    entries: BTreeMap<EntryKey, BTreeSet<ItemPointer>>,
    inline_limit: usize,
    compress_limit: usize,
    leaf_chunk: usize,
    data_fanout: usize,
    compress_data_leaves: bool,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            inline_limit: 32,
            compress_limit: 4,
            leaf_chunk: 512,
            data_fanout: 256,
            compress_data_leaves: true,
        }
    }

    /// Posting lists longer than this spill into a posting tree.
    pub fn inline_limit(mut self, n: usize) -> Self {
        self.inline_limit = n;
        self
    }

    /// Inline lists at least this long use the compressed encoding.
    pub fn compress_limit(mut self, n: usize) -> Self {
        self.compress_limit = n;
        self
    }

    /// Item pointers per posting-tree leaf.
    pub fn leaf_chunk(mut self, n: usize) -> Self {
        self.leaf_chunk = n;
        self
    }

    /// Build posting-tree leaves with the raw encoding.
    pub fn raw_data_leaves(mut self) -> Self {
        self.compress_data_leaves = false;
        self
    }

    pub fn add(&mut self, attnum: u16, key: &[u8], tid: ItemPointer) {
        self.entries
            .entry(EntryKey {
                attnum,
                category: Category::Normal,
                key: key.to_vec(),
            })
            .or_default()
            .insert(tid);
    }

    /// A null-category entry; the key bytes are an empty placeholder.
    pub fn add_special(&mut self, attnum: u16, category: Category, tid: ItemPointer) {
        assert_ne!(category, Category::Normal);
        self.entries
            .entry(EntryKey {
                attnum,
                category,
                key: Vec::new(),
            })
            .or_default()
            .insert(tid);
    }

    pub fn build(&self) -> IndexImage {
        let mut image = IndexImage {
            pages: vec![[0u8; PAGE_SIZE]; 2],
            entry_leaves: Vec::new(),
            entry_internals: Vec::new(),
            data_leaves: Vec::new(),
            data_internals: Vec::new(),
            posting_roots: Vec::new(),
        };

        // Leaf tuples in entry order; oversized lists grow posting trees
        // as a side effect.
        let mut leaf_tuples: Vec<(EntryKey, Vec<u8>)> = Vec::new();
        let mut n_entries = 0u64;
        for (key, tids) in &self.entries {
            n_entries += 1;
            let tids: Vec<ItemPointer> = tids.iter().copied().collect();
            let tuple = if tids.len() > self.inline_limit {
                let root = self.build_posting_tree(&mut image, &tids);
                image.posting_roots.push(root);
                entry_tuple(root, key.attnum, key.category, &key.key, Payload::TreeRef)
            } else if tids.len() >= self.compress_limit {
                entry_tuple(
                    INVALID_BLOCK,
                    key.attnum,
                    key.category,
                    &key.key,
                    Payload::InlineCompressed(&tids),
                )
            } else {
                entry_tuple(
                    INVALID_BLOCK,
                    key.attnum,
                    key.category,
                    &key.key,
                    Payload::InlineRaw(&tids),
                )
            };
            leaf_tuples.push((key.clone(), tuple));
        }

        // Pack tuples into leaves, then build internal levels until one
        // page takes the fixed root block.
        let groups = pack_level(&leaf_tuples);
        if groups.len() <= 1 {
            let tuples: Vec<Vec<u8>> = leaf_tuples.into_iter().map(|(_, t)| t).collect();
            image.pages[1] = entry_page(&tuples, INVALID_BLOCK, true, true);
            image.entry_leaves.push(1);
        } else {
            let mut level = place_level(&mut image.pages, groups, true);
            image
                .entry_leaves
                .extend(level.iter().map(|(blk, _)| *blk));

            loop {
                let downlinks: Vec<(EntryKey, Vec<u8>)> = level
                    .iter()
                    .map(|(blk, key)| {
                        let tuple = entry_tuple(
                            *blk,
                            key.attnum,
                            key.category,
                            &key.key,
                            Payload::Downlink,
                        );
                        (key.clone(), tuple)
                    })
                    .collect();
                let groups = pack_level(&downlinks);
                if groups.len() <= 1 {
                    let tuples: Vec<Vec<u8>> = downlinks.into_iter().map(|(_, t)| t).collect();
                    image.pages[1] = entry_page(&tuples, INVALID_BLOCK, false, true);
                    image.entry_internals.push(1);
                    break;
                }
                level = place_level(&mut image.pages, groups, false);
                image
                    .entry_internals
                    .extend(level.iter().map(|(blk, _)| *blk));
            }
        }

        let n_total = image.pages.len() as u32;
        let n_entry = (image.entry_leaves.len() + image.entry_internals.len()) as u32;
        let n_data = (image.data_leaves.len() + image.data_internals.len()) as u32;
        image.pages[0] = meta_page(MetaPage::new(n_total, n_entry, n_data, n_entries));

        for blkno in 0..image.pages.len() {
            image.reseal(blkno as BlockNumber);
        }
        image
    }

    fn build_posting_tree(&self, image: &mut IndexImage, tids: &[ItemPointer]) -> BlockNumber {
        let chunks: Vec<&[ItemPointer]> = tids.chunks(self.leaf_chunk).collect();
        if chunks.len() == 1 {
            let blk = image.pages.len() as BlockNumber;
            image
                .pages
                .push(data_leaf_page(chunks[0], self.compress_data_leaves, INVALID_BLOCK, true));
            image.data_leaves.push(blk);
            return blk;
        }

        let first = image.pages.len() as BlockNumber;
        for (i, chunk) in chunks.iter().enumerate() {
            let blk = first + i as BlockNumber;
            let rightmost = i == chunks.len() - 1;
            image.pages.push(data_leaf_page(
                chunk,
                self.compress_data_leaves,
                blk + 1,
                rightmost,
            ));
            image.data_leaves.push(blk);
        }

        let mut level: Vec<(ItemPointer, BlockNumber)> = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| (*chunk.last().unwrap(), first + i as BlockNumber))
            .collect();

        while level.len() > 1 {
            let groups: Vec<&[(ItemPointer, BlockNumber)]> =
                level.chunks(self.data_fanout).collect();
            let first = image.pages.len() as BlockNumber;
            for (i, group) in groups.iter().enumerate() {
                let blk = first + i as BlockNumber;
                let rightmost = i == groups.len() - 1;
                image
                    .pages
                    .push(data_internal_page(group, rightmost, blk + 1, rightmost));
                image.data_internals.push(blk);
            }
            level = groups
                .iter()
                .enumerate()
                .map(|(i, group)| (group.last().unwrap().0, first + i as BlockNumber))
                .collect();
        }
        level[0].1
    }
}

/// Greedy packing of (key, tuple) pairs into page-sized groups. Returns the
/// tuple groups with each group's last key.
fn pack_level(tuples: &[(EntryKey, Vec<u8>)]) -> Vec<(Vec<Vec<u8>>, EntryKey)> {
    let mut groups = Vec::new();
    let mut writer_used = 0usize;
    let mut current: Vec<Vec<u8>> = Vec::new();
    let mut last_key: Option<&EntryKey> = None;

    let capacity = SPECIAL_OFFSET - PAGE_HEADER_SIZE;
    for (key, tuple) in tuples {
        let cost = ITEM_ID_SIZE + align_tuple(tuple.len());
        if writer_used + cost > capacity {
            groups.push((
                std::mem::take(&mut current),
                last_key.expect("non-empty group").clone(),
            ));
            writer_used = 0;
        }
        writer_used += cost;
        current.push(tuple.clone());
        last_key = Some(key);
    }
    if let Some(key) = last_key {
        if !current.is_empty() {
            groups.push((current, key.clone()));
        }
    }
    groups
}

/// Appends one level's pages, chained left to right. Returns each page's
/// block and last key.
fn place_level(
    pages: &mut Vec<PageBytes>,
    groups: Vec<(Vec<Vec<u8>>, EntryKey)>,
    leaf: bool,
) -> Vec<(BlockNumber, EntryKey)> {
    let first = pages.len() as BlockNumber;
    let count = groups.len();
    let mut out = Vec::with_capacity(count);
    for (i, (tuples, last_key)) in groups.into_iter().enumerate() {
        let blk = first + i as BlockNumber;
        let rightmost = i == count - 1;
        pages.push(entry_page(&tuples, blk + 1, leaf, rightmost));
        out.push((blk, last_key));
    }
    out
}

// ---------------------------------------------------------------------------
// The built image + surgery
// ---------------------------------------------------------------------------

pub struct IndexImage {
    pub pages: Vec<PageBytes>,
    /// Entry-tree leaves, left to right.
    pub entry_leaves: Vec<BlockNumber>,
    /// Entry-tree internal pages (the fixed root last when it is internal).
    pub entry_internals: Vec<BlockNumber>,
    /// Posting-tree leaves in build order (left to right per tree).
    pub data_leaves: Vec<BlockNumber>,
    /// Posting-tree internal pages in build order.
    pub data_internals: Vec<BlockNumber>,
    /// Posting-tree roots in entry order.
    pub posting_roots: Vec<BlockNumber>,
}

impl IndexImage {
    /// Wraps hand-built pages (block 0 must be a metapage) and checksums
    /// them.
    pub fn manual(pages: Vec<PageBytes>) -> Self {
        let mut image = Self {
            pages,
            entry_leaves: Vec::new(),
            entry_internals: Vec::new(),
            data_leaves: Vec::new(),
            data_internals: Vec::new(),
            posting_roots: Vec::new(),
        };
        for blkno in 0..image.pages.len() {
            image.reseal(blkno as BlockNumber);
        }
        image
    }

    pub fn mem(&self, name: &str) -> MemRelation {
        MemRelation::new(name, self.pages.clone())
    }

    /// Writes the image to a temp file and maps it. The temp file handle
    /// must outlive the relation.
    pub fn file(&self, name: &str) -> (tempfile::NamedTempFile, FileRelation) {
        let mut f = tempfile::NamedTempFile::new().expect("temp file");
        for page in &self.pages {
            f.write_all(page).expect("write page");
        }
        f.flush().expect("flush");
        let rel = FileRelation::open(f.path()).expect("map image").with_name(name);
        (f, rel)
    }

    /// Recomputes the page checksum after surgery.
    pub fn reseal(&mut self, blkno: BlockNumber) {
        let page = &mut self.pages[blkno as usize];
        page[8..12].copy_from_slice(&0u32.to_le_bytes());
        let crc = compute_checksum(page);
        page[8..12].copy_from_slice(&crc.to_le_bytes());
    }

    /// Overwrites bytes at `at` and re-checksums.
    pub fn patch(&mut self, blkno: BlockNumber, at: usize, bytes: &[u8]) {
        self.pages[blkno as usize][at..at + bytes.len()].copy_from_slice(bytes);
        self.reseal(blkno);
    }

    pub fn set_page_flags(&mut self, blkno: BlockNumber, page_flags: u16) {
        self.patch(blkno, SPECIAL_OFFSET + 6, &page_flags.to_le_bytes());
    }

    pub fn page_flags(&self, blkno: BlockNumber) -> u16 {
        let page = &self.pages[blkno as usize];
        u16::from_le_bytes([page[SPECIAL_OFFSET + 6], page[SPECIAL_OFFSET + 7]])
    }

    pub fn add_page_flag(&mut self, blkno: BlockNumber, flag: u16) {
        self.set_page_flags(blkno, self.page_flags(blkno) | flag);
    }

    pub fn clear_page_flag(&mut self, blkno: BlockNumber, flag: u16) {
        self.set_page_flags(blkno, self.page_flags(blkno) & !flag);
    }

    pub fn set_maxoff(&mut self, blkno: BlockNumber, maxoff: u16) {
        self.patch(blkno, SPECIAL_OFFSET + 4, &maxoff.to_le_bytes());
    }

    /// Swaps two item-id slots on an entry page (1-based offsets).
    pub fn swap_entry_items(&mut self, blkno: BlockNumber, a: u16, b: u16) {
        let page = &mut self.pages[blkno as usize];
        let pos = |off: u16| PAGE_HEADER_SIZE + ITEM_ID_SIZE * (off as usize - 1);
        let (pa, pb) = (pos(a), pos(b));
        let tmp: [u8; ITEM_ID_SIZE] = page[pa..pa + ITEM_ID_SIZE].try_into().unwrap();
        let vb: [u8; ITEM_ID_SIZE] = page[pb..pb + ITEM_ID_SIZE].try_into().unwrap();
        page[pa..pa + ITEM_ID_SIZE].copy_from_slice(&vb);
        page[pb..pb + ITEM_ID_SIZE].copy_from_slice(&tmp);
        self.reseal(blkno);
    }

    /// Byte position of the tuple behind item id `off` on an entry page.
    pub fn tuple_pos(&self, blkno: BlockNumber, off: u16) -> usize {
        let page = &self.pages[blkno as usize];
        let at = PAGE_HEADER_SIZE + ITEM_ID_SIZE * (off as usize - 1);
        u16::from_le_bytes([page[at], page[at + 1]]) as usize
    }

    /// Number of item-id slots on an entry page.
    pub fn entry_items(&self, blkno: BlockNumber) -> u16 {
        let page = &self.pages[blkno as usize];
        let lower = u16::from_le_bytes([page[12], page[13]]) as usize;
        ((lower - PAGE_HEADER_SIZE) / ITEM_ID_SIZE) as u16
    }

    /// Replaces the metapage with one carrying a pending list.
    pub fn set_pending(&mut self, head: BlockNumber, n_pages: u32, n_tuples: u64) {
        let stats = MetaPage::read(&self.pages[0]).expect("metapage");
        let meta = MetaPage::new(
            stats.n_total_pages(),
            stats.n_entry_pages(),
            stats.n_data_pages(),
            stats.n_entries(),
        )
        .with_pending(head, n_pages, n_tuples);
        self.pages[0] = meta_page(meta);
        self.reseal(0);
    }
}
