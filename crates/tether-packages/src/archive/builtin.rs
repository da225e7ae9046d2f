//! Dependency-light zip reader used as the last extraction resort.
//!
//! # Supported
//! - Zip32 (EOCD + central directory).
//! - Entries: stored (method 0) and deflate (method 8), CRC-checked.
//!
//! # Not Supported
//! - Zip64 (sentinel 0xFFFF/0xFFFFFFFF fields).
//! - Multi-disk archives.
//! - Encrypted entries (flag bit 0) abort extraction.
//!
//! Sizes and offsets come from the archive and are validated against its
//! length before use. Entry names that are absolute or climb out of the
//! destination with `..` abort extraction before anything is written.

use anyhow::{anyhow, bail, Context, Result};
use flate2::read::DeflateDecoder;
use flate2::Crc;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::ExtractStrategy;

const SIG_EOCD: u32 = 0x0605_4b50;
const SIG_CDFH: u32 = 0x0201_4b50;
const SIG_LFH: u32 = 0x0403_4b50;

const EOCD_MIN_LEN: usize = 22;
const EOCD_SEARCH_MAX: usize = 66 * 1024; // 64 KiB comment + header margin
const CDFH_LEN: usize = 46;
const LFH_LEN: usize = 30;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinZipStrategy;

impl ExtractStrategy for BuiltinZipStrategy {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        let reader = BuiltinZipReader::open(archive)?;
        let written = reader.extract_all(dest)?;
        debug!("builtin reader wrote {} files from {}", written, archive.display());
        Ok(())
    }
}

/// Central-directory metadata for a single entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub name: String,
    pub flags: u16,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub local_header_offset: u64,
}

impl ZipEntry {
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/') || self.name.ends_with('\\')
    }

    pub fn is_encrypted(&self) -> bool {
        (self.flags & 0x0001) != 0
    }
}

/// In-memory zip archive with a parsed central directory
pub struct BuiltinZipReader {
    data: Vec<u8>,
    entries: Vec<ZipEntry>,
}

impl BuiltinZipReader {
    pub fn open(path: &Path) -> Result<Self> {
        let data =
            fs::read(path).with_context(|| format!("Failed to read archive {}", path.display()))?;
        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let eocd = find_eocd(&data).ok_or_else(|| anyhow!("Not a zip archive"))?;

        let disk_no = le_u16(&data, eocd + 4)?;
        let cd_disk = le_u16(&data, eocd + 6)?;
        let entries_disk = le_u16(&data, eocd + 8)?;
        let entries_total = le_u16(&data, eocd + 10)?;
        let cd_size = le_u32(&data, eocd + 12)?;
        let cd_off = le_u32(&data, eocd + 16)?;

        if disk_no != 0 || cd_disk != 0 || entries_disk != entries_total {
            bail!("Multi-disk zip archives not supported");
        }
        if entries_total == 0xFFFF || cd_size == 0xFFFF_FFFF || cd_off == 0xFFFF_FFFF {
            bail!("Zip64 archives not supported");
        }

        let cd_start = cd_off as usize;
        let cd_end = cd_start
            .checked_add(cd_size as usize)
            .filter(|end| *end <= eocd)
            .ok_or_else(|| anyhow!("Zip archive inconsistent: central directory out of bounds"))?;

        let mut entries = Vec::with_capacity(entries_total as usize);
        let mut pos = cd_start;
        for _ in 0..entries_total {
            if pos + CDFH_LEN > cd_end {
                bail!("Zip archive inconsistent: truncated central directory");
            }
            if le_u32(&data, pos)? != SIG_CDFH {
                bail!("Zip archive inconsistent: bad central directory signature");
            }

            let flags = le_u16(&data, pos + 8)?;
            let method = le_u16(&data, pos + 10)?;
            let crc32 = le_u32(&data, pos + 16)?;
            let compressed_size = le_u32(&data, pos + 20)?;
            let uncompressed_size = le_u32(&data, pos + 24)?;
            let name_len = le_u16(&data, pos + 28)? as usize;
            let extra_len = le_u16(&data, pos + 30)? as usize;
            let comment_len = le_u16(&data, pos + 32)? as usize;
            let local_header_offset = le_u32(&data, pos + 42)?;

            if compressed_size == 0xFFFF_FFFF
                || uncompressed_size == 0xFFFF_FFFF
                || local_header_offset == 0xFFFF_FFFF
            {
                bail!("Zip64 archives not supported");
            }

            let name_start = pos + CDFH_LEN;
            let name_bytes = data
                .get(name_start..name_start + name_len)
                .ok_or_else(|| anyhow!("Zip archive inconsistent: entry name out of bounds"))?;

            entries.push(ZipEntry {
                name: String::from_utf8_lossy(name_bytes).into_owned(),
                flags,
                method,
                crc32,
                compressed_size: compressed_size as u64,
                uncompressed_size: uncompressed_size as u64,
                local_header_offset: local_header_offset as u64,
            });

            pos = name_start + name_len + extra_len + comment_len;
        }

        Ok(Self { data, entries })
    }

    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Decompress one entry and verify its size and CRC
    pub fn read_entry(&self, entry: &ZipEntry) -> Result<Vec<u8>> {
        if entry.is_encrypted() {
            bail!("{}: encrypted entries not supported", entry.name);
        }

        let lfh = entry.local_header_offset as usize;
        if le_u32(&self.data, lfh)? != SIG_LFH {
            bail!("{}: bad local header signature", entry.name);
        }
        let name_len = le_u16(&self.data, lfh + 26)? as usize;
        let extra_len = le_u16(&self.data, lfh + 28)? as usize;
        let start = lfh + LFH_LEN + name_len + extra_len;
        let end = start + entry.compressed_size as usize;
        let payload = self
            .data
            .get(start..end)
            .ok_or_else(|| anyhow!("{}: payload out of bounds", entry.name))?;

        let out = match entry.method {
            METHOD_STORED => payload.to_vec(),
            METHOD_DEFLATE => {
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                DeflateDecoder::new(payload)
                    .take(entry.uncompressed_size + 1)
                    .read_to_end(&mut out)
                    .with_context(|| format!("{}: deflate stream corrupt", entry.name))?;
                out
            }
            other => bail!("{}: compression method {} not supported", entry.name, other),
        };

        if out.len() as u64 != entry.uncompressed_size {
            bail!(
                "{}: expected {} bytes, got {}",
                entry.name,
                entry.uncompressed_size,
                out.len()
            );
        }

        let mut crc = Crc::new();
        crc.update(&out);
        if crc.sum() != entry.crc32 {
            bail!("{}: CRC mismatch", entry.name);
        }

        Ok(out)
    }

    /// Write every entry under `dest`; returns the number of files written
    pub fn extract_all(&self, dest: &Path) -> Result<usize> {
        // Validate every name before touching the filesystem
        let targets = self
            .entries
            .iter()
            .map(|entry| {
                safe_relative_path(&entry.name)
                    .map(|rel| (entry, dest.join(rel)))
                    .ok_or_else(|| anyhow!("Unsafe entry path in archive: {}", entry.name))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut written = 0;
        for (entry, target) in targets {
            if entry.is_dir() {
                fs::create_dir_all(&target)
                    .with_context(|| format!("Failed to create {}", target.display()))?;
                continue;
            }
            let contents = self.read_entry(entry)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&target, contents)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            written += 1;
        }
        Ok(written)
    }
}

/// Scan backward for an EOCD whose comment fits inside the file
fn find_eocd(data: &[u8]) -> Option<usize> {
    if data.len() < EOCD_MIN_LEN {
        return None;
    }
    let floor = data.len().saturating_sub(EOCD_SEARCH_MAX);
    (floor..=data.len() - EOCD_MIN_LEN).rev().find(|&pos| {
        le_u32(data, pos).ok() == Some(SIG_EOCD)
            && le_u16(data, pos + 20)
                .map(|comment| pos + EOCD_MIN_LEN + comment as usize <= data.len())
                .unwrap_or(false)
    })
}

/// Entry name as a relative path that stays under the destination
fn safe_relative_path(name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') {
        return None;
    }
    let mut out = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn le_u16(data: &[u8], at: usize) -> Result<u16> {
    data.get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| anyhow!("Premature EOF"))
}

fn le_u32(data: &[u8], at: usize) -> Result<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| anyhow!("Premature EOF"))
}
