//! Fragment files
//!
//! A fragment is the immutable result of one flush: the staged items of a
//! session, in key order.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::item::ItemRecord;

use super::format::{read_framed, FramedWriter, FRAGMENT_MAGIC};

/// Fragment metadata returned by a finished writer
#[derive(Debug, Clone)]
pub struct FragmentMeta {
    /// Path to the fragment file
    pub path: PathBuf,
    /// Number of items in this fragment
    pub item_count: u64,
    /// File size in bytes
    pub file_size: u64,
}

/// Builds a new fragment file
pub struct FragmentWriter {
    path: PathBuf,
    inner: FramedWriter,
}

impl FragmentWriter {
    /// Start a fragment at `path`; nothing is visible there until `finish()`
    pub fn new(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            inner: FramedWriter::create(path, FRAGMENT_MAGIC)?,
        })
    }

    pub fn add(&mut self, record: &ItemRecord) -> Result<()> {
        let entry = bincode::serialize(record)?;
        self.inner.add(&entry)
    }

    /// Finish writing and atomically publish the fragment
    pub fn finish(self, sync: bool) -> Result<FragmentMeta> {
        let (item_count, file_size) = self.inner.finish(sync)?;
        Ok(FragmentMeta {
            path: self.path,
            item_count,
            file_size,
        })
    }
}

/// Reads fragment files
pub struct FragmentReader;

impl FragmentReader {
    /// Read every item of a fragment, in stored order
    pub fn read(path: &Path) -> Result<Vec<ItemRecord>> {
        read_framed(path, FRAGMENT_MAGIC)?
            .iter()
            .map(|entry| Ok(bincode::deserialize(entry)?))
            .collect()
    }
}
