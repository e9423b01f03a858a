//! Read-only mmap-backed index relation.
//!
//! The fork file is a plain concatenation of 8 KiB pages mapped read-only;
//! page views are slices into the map, so a [`PageRef`] costs nothing to
//! acquire or release. Checksums, not the map, defend against torn reads:
//! this relation is meant for offline or snapshot verification where no
//! writer is mutating the file underneath us.

use std::fs::File;
use std::path::Path;

use eyre::{Result, WrapErr};
use memmap2::Mmap;

use super::{IndexRelation, PageRef};
use crate::error::CheckError;
use crate::page::meta::{MetaPage, META_MAGIC};
use crate::page::{BlockNumber, PageHeader, PAGE_SIZE};

#[derive(Debug)]
pub struct FileRelation {
    name: String,
    map: Mmap,
}

impl FileRelation {
    /// Maps `path` read-only. The relation name defaults to the file stem.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open index file '{}'", path.display()))?;
        // Safety: the map is read-only and verification tolerates concurrent
        // file changes by design (checksums + structural checks).
        let map = unsafe { Mmap::map(&file) }
            .wrap_err_with(|| format!("failed to map index file '{}'", path.display()))?;
        eyre::ensure!(
            map.len() % PAGE_SIZE == 0,
            "index file '{}' is {} bytes, not a multiple of the page size",
            path.display(),
            map.len()
        );

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, map })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn page_slice(&self, blkno: BlockNumber) -> Option<&[u8]> {
        let start = blkno as usize * PAGE_SIZE;
        self.map.get(start..start + PAGE_SIZE)
    }
}

impl IndexRelation for FileRelation {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_gin(&self) -> bool {
        self.page_slice(crate::page::META_BLKNO)
            .and_then(|page| MetaPage::read(page).ok().map(|m| m.magic() == META_MAGIC))
            .unwrap_or(false)
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn is_other_session_temp(&self) -> bool {
        false
    }

    fn block_count(&self) -> u32 {
        (self.map.len() / PAGE_SIZE) as u32
    }

    fn read_block(&self, blkno: BlockNumber) -> Result<PageRef<'_>> {
        let Some(bytes) = self.page_slice(blkno) else {
            return Err(CheckError::io(
                &self.name,
                blkno,
                format!("block is past the end of the fork ({} blocks)", self.block_count()),
            )
            .into());
        };
        let lsn = PageHeader::read(bytes)?.lsn();
        Ok(PageRef::new(bytes, lsn, None))
    }
}
