//! Fragment Manager
//!
//! Owns the on-disk directory of one map.
//!
//! ## Responsibilities
//! - Create the map directory and persist its schema
//! - Discover fragment files, ordered oldest → newest
//! - Build the merged view a session reads from
//! - Write new fragments and consolidate old ones

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{MapError, Result};
use crate::item::{ItemRecord, KeyId};
use crate::schema::MapSchema;

use super::format::{read_framed, sync_dir, FramedWriter, SCHEMA_MAGIC};
use super::{FragmentMeta, FragmentReader, FragmentWriter};

/// Sequence shared by all managers of this process, keeps fragment names
/// unique when two sessions flush within the same clock tick
static FRAGMENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Manages the directory of one map
#[derive(Debug, Clone)]
pub struct FragmentManager {
    /// Map root directory (the uri)
    root: PathBuf,

    /// Directory holding fragment files
    fragments_dir: PathBuf,
}

impl FragmentManager {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const SCHEMA_FILENAME: &'static str = "__schema.fkv";
    const FRAGMENT_DIR: &'static str = "__fragments";
    const FRAGMENT_PREFIX: &'static str = "frag_";
    const FRAGMENT_EXT: &'static str = "fkv";
    /// '_' sorts after '.', so "<stem>_m.fkv" follows "<stem>.fkv"
    const MERGED_SUFFIX: &'static str = "_m";

    /// Whether a map exists at `root`
    pub fn exists(root: &Path) -> bool {
        root.join(Self::SCHEMA_FILENAME).is_file()
    }

    /// Create a new map directory and persist its schema
    ///
    /// Fails with `AlreadyExists` if a schema is already stored at `root`.
    pub fn create(root: &Path, schema: &MapSchema, sync: bool) -> Result<Self> {
        if Self::exists(root) {
            return Err(MapError::AlreadyExists(root.display().to_string()));
        }

        let manager = Self::at(root);
        fs::create_dir_all(&manager.fragments_dir)?;

        let mut writer = FramedWriter::create(&root.join(Self::SCHEMA_FILENAME), SCHEMA_MAGIC)?;
        writer.add(&bincode::serialize(schema)?)?;
        writer.finish(sync)?;

        Ok(manager)
    }

    /// Open an existing map directory
    pub fn open(root: &Path) -> Result<Self> {
        if !Self::exists(root) {
            return Err(MapError::NotFound(root.display().to_string()));
        }
        let manager = Self::at(root);
        fs::create_dir_all(&manager.fragments_dir)?;
        Ok(manager)
    }

    fn at(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            fragments_dir: root.join(Self::FRAGMENT_DIR),
        }
    }

    /// Read the persisted schema
    pub fn load_schema(&self) -> Result<MapSchema> {
        let path = self.root.join(Self::SCHEMA_FILENAME);
        let entries = read_framed(&path, SCHEMA_MAGIC)?;
        match entries.as_slice() {
            [only] => Ok(bincode::deserialize(only)?),
            _ => Err(MapError::Corruption(format!(
                "{}: expected one schema entry, found {}",
                path.display(),
                entries.len()
            ))),
        }
    }

    /// Fragment files currently on disk, oldest first
    pub fn list_fragments(&self) -> Result<Vec<PathBuf>> {
        let mut fragments = Vec::new();
        for entry in fs::read_dir(&self.fragments_dir)? {
            let path = entry?.path();
            if path.is_file() && Self::is_fragment(&path) {
                fragments.push(path);
            }
        }
        // Names start with a zero-padded timestamp
        fragments.sort();
        Ok(fragments)
    }

    /// Merge fragments oldest → newest into one key-ordered view.
    /// Newer values override older ones attribute by attribute.
    pub fn load_view(&self, fragments: &[PathBuf]) -> Result<BTreeMap<KeyId, ItemRecord>> {
        let mut view = BTreeMap::new();
        for path in fragments {
            for record in FragmentReader::read(path)? {
                merge_into(&mut view, record);
            }
        }
        Ok(view)
    }

    /// Write `records` as a new fragment
    pub fn write_fragment<'a, I>(&self, records: I, sync: bool) -> Result<FragmentMeta>
    where
        I: IntoIterator<Item = &'a ItemRecord>,
    {
        let path = self.fragments_dir.join(self.next_fragment_name());
        Self::write_records(&path, records, sync)
    }

    /// Merge every fragment into a single new one and delete the old files.
    /// Returns `None` when there is at most one fragment.
    pub fn consolidate(&self, sync: bool) -> Result<Option<FragmentMeta>> {
        let fragments = self.list_fragments()?;
        if fragments.len() < 2 {
            return Ok(None);
        }
        self.merge_fragments(&fragments, sync).map(Some)
    }

    /// Replace `fragments` (oldest first) with one merged fragment.
    ///
    /// The merged file sorts directly after the newest input, so fragments
    /// written by other handles while merging still override it.
    fn merge_fragments(&self, fragments: &[PathBuf], sync: bool) -> Result<FragmentMeta> {
        let newest = fragments
            .last()
            .and_then(|p| p.file_stem())
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| MapError::Engine("no fragment to consolidate".to_string()))?;
        let path = self.fragments_dir.join(format!(
            "{}{}.{}",
            newest,
            Self::MERGED_SUFFIX,
            Self::FRAGMENT_EXT
        ));

        let view = self.load_view(fragments)?;
        let meta = Self::write_records(&path, view.values(), sync)?;

        for old in fragments {
            fs::remove_file(old)?;
        }
        if sync {
            sync_dir(&self.fragments_dir)?;
        }
        Ok(meta)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// "frag_<nanos:020>_<pid:08x>_<seq:06>.fkv"
    fn next_fragment_name(&self) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let seq = FRAGMENT_SEQ.fetch_add(1, Ordering::SeqCst);
        format!(
            "{}{:020}_{:08x}_{:06}.{}",
            Self::FRAGMENT_PREFIX,
            nanos,
            std::process::id(),
            seq,
            Self::FRAGMENT_EXT
        )
    }

    fn write_records<'a, I>(path: &Path, records: I, sync: bool) -> Result<FragmentMeta>
    where
        I: IntoIterator<Item = &'a ItemRecord>,
    {
        let mut writer = FragmentWriter::new(path)?;
        for record in records {
            writer.add(record)?;
        }
        writer.finish(sync)
    }

    fn is_fragment(path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        name.starts_with(Self::FRAGMENT_PREFIX)
            && path.extension().and_then(|e| e.to_str()) == Some(Self::FRAGMENT_EXT)
    }
}

/// Overlay `record` onto the view entry for its key
pub(crate) fn merge_into(view: &mut BTreeMap<KeyId, ItemRecord>, record: ItemRecord) {
    match view.get_mut(&record.key_id()) {
        Some(existing) => existing.merge(record),
        None => {
            view.insert(record.key_id(), record);
        }
    }
}
