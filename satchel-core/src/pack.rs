//! Build a snapshot from a directory tree, for uploading as a new archive.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::archive::{ArchiveSnapshot, Entry, EntryMeta};
use crate::codec::CodecId;
use crate::engine::now_unix;
use crate::error::{Result, SatchelError};

#[derive(Clone, Debug)]
pub struct PackOptions {
    /// Zero every timestamp so the same tree always packs to the same bytes.
    pub deterministic: bool,
    pub codec: CodecId,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            deterministic: false,
            codec: CodecId::Zstd,
        }
    }
}

/// Walk `root` (sorted, symlinks skipped) and collect its regular files as
/// entries with `/`-separated paths relative to `root`.
pub fn pack_dir(root: &Path, opts: &PackOptions) -> Result<ArchiveSnapshot> {
    let mut files: Vec<PathBuf> = Vec::new();
    for e in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let e = e.map_err(|e| std::io::Error::other(e.to_string()))?;
        if e.file_type().is_file() {
            files.push(e.into_path());
        }
    }

    let entries = files
        .par_iter()
        .map(|p| -> Result<Entry> {
            let md = fs::metadata(p)?;
            let content = fs::read(p)?;
            let mtime = if opts.deterministic { 0 } else { mtime_from(&md) };
            Ok(Entry {
                path: rel_path(root, p)?,
                content,
                meta: EntryMeta {
                    codec: opts.codec,
                    mode: mode_from(&md),
                    mtime,
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let created = if opts.deterministic { 0 } else { now_unix() };
    tracing::debug!(root = %root.display(), entries = entries.len(), "packed directory");
    ArchiveSnapshot::new(entries, created)
}

fn rel_path(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| SatchelError::Encoding(format!("{} is outside {}", path.display(), root.display())))?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

fn mode_from(_md: &fs::Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        _md.permissions().mode()
    }
    #[cfg(not(unix))]
    {
        0o100644
    }
}

fn mtime_from(md: &fs::Metadata) -> i64 {
    md.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
