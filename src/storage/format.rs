//! Framed file format shared by schema and fragment files.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{MapError, Result};

/// Magic bytes of a schema file
pub(crate) const SCHEMA_MAGIC: &[u8; 4] = b"FKVS";

/// Magic bytes of a fragment file
pub(crate) const FRAGMENT_MAGIC: &[u8; 4] = b"FKVF";

/// Current format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + EntryCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: DataCRC (4)
pub(crate) const FOOTER_SIZE: u64 = 4;

/// Writes a framed file under a temporary name, renamed into place by `finish`
pub(crate) struct FramedWriter {
    path: PathBuf,
    tmp_path: PathBuf,
    writer: BufWriter<File>,
    entry_count: u64,
    data_hasher: crc32fast::Hasher,
}

impl FramedWriter {
    pub(crate) fn create(path: &Path, magic: &[u8; 4]) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| MapError::Engine(format!("not a file path: {}", path.display())))?;
        let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(file);

        // Entry count is patched in finish()
        writer.write_all(magic)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            writer,
            entry_count: 0,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Append one length-prefixed entry
    pub(crate) fn add(&mut self, entry: &[u8]) -> Result<()> {
        let len_bytes = (entry.len() as u32).to_le_bytes();
        self.writer.write_all(&len_bytes)?;
        self.writer.write_all(entry)?;
        self.data_hasher.update(&len_bytes);
        self.data_hasher.update(entry);
        self.entry_count += 1;
        Ok(())
    }

    /// Write the footer, patch the header and rename into place.
    /// Returns (entry count, file size).
    pub(crate) fn finish(mut self, sync: bool) -> Result<(u64, u64)> {
        let result = self.finish_inner(sync);
        if result.is_err() {
            let _ = fs::remove_file(&self.tmp_path);
        }
        result
    }

    fn finish_inner(&mut self, sync: bool) -> Result<(u64, u64)> {
        let data_crc = self.data_hasher.clone().finalize();
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.flush()?;

        let file = self.writer.get_mut();
        file.seek(SeekFrom::Start(6))?; // After magic + version
        file.write_all(&self.entry_count.to_le_bytes())?;
        if sync {
            file.sync_all()?;
        }
        let file_size = file.metadata()?.len();

        fs::rename(&self.tmp_path, &self.path)?;
        if sync {
            if let Some(dir) = self.path.parent() {
                sync_dir(dir)?;
            }
        }

        Ok((self.entry_count, file_size))
    }
}

/// Read a framed file, validating magic, version and CRC.
/// Returns the entries in write order.
pub(crate) fn read_framed(path: &Path, magic: &[u8; 4]) -> Result<Vec<Vec<u8>>> {
    let data = fs::read(path)?;
    let corrupt = |what: &str| MapError::Corruption(format!("{}: {}", path.display(), what));

    if (data.len() as u64) < HEADER_SIZE + FOOTER_SIZE {
        return Err(corrupt("file too short"));
    }
    if &data[0..4] != magic {
        return Err(corrupt("bad magic"));
    }
    let version = u16::from_le_bytes([data[4], data[5]]);
    if version != VERSION {
        return Err(corrupt(&format!("unsupported version {}", version)));
    }
    let entry_count = read_u64(&data[6..14]);

    let data_end = data.len() - FOOTER_SIZE as usize;
    let body = &data[HEADER_SIZE as usize..data_end];
    let stored_crc = read_u32(&data[data_end..]);
    if crc32fast::hash(body) != stored_crc {
        return Err(corrupt("data CRC mismatch"));
    }

    // Every entry carries at least its 4-byte length prefix
    if entry_count > (body.len() / 4) as u64 {
        return Err(corrupt(&format!("entry count {} exceeds body", entry_count)));
    }

    let mut entries = Vec::new();
    let mut pos = 0;
    while entries.len() < entry_count as usize {
        if pos + 4 > body.len() {
            return Err(corrupt("truncated entry header"));
        }
        let len = read_u32(&body[pos..pos + 4]) as usize;
        pos += 4;
        if pos + len > body.len() {
            return Err(corrupt("truncated entry"));
        }
        entries.push(body[pos..pos + len].to_vec());
        pos += len;
    }
    if pos != body.len() {
        return Err(corrupt("trailing bytes after last entry"));
    }

    Ok(entries)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(raw)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}

/// fsync a directory so renames and removals in it are durable
#[cfg(unix)]
pub(crate) fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
