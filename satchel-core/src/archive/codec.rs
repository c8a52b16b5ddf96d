use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use rayon::prelude::*;

use super::{ArchiveSnapshot, Entry, EntryMeta};
use crate::codec::CodecId;
use crate::container::manifest::{EntryRecord, Manifest, Meta};
use crate::container::superblock::{HEADER_LEN, Superblock, VERSION};
use crate::container::tail::{TAIL_LEN, TailSummary};
use crate::error::{Result, SatchelError};
use crate::policy::Policy;
use crate::util::hash_forward::HashingForward;
use crate::util::sanitize::check_entry_path;

pub const TOOL: &str = concat!("satchel-core/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeOptions {
    pub zstd_level: i32,
    pub policy: Policy,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            zstd_level: 3,
            policy: Policy::default(),
        }
    }
}

/// Writer that refuses to grow past `cap` bytes; guards inflation against
/// frames that expand beyond their declared size.
struct CappedWriter {
    buf: Vec<u8>,
    cap: u64,
}

impl Write for CappedWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        if self.buf.len() as u64 + data.len() as u64 > self.cap {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "frame inflates past declared size",
            ));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn corrupt(msg: impl Into<String>) -> SatchelError {
    SatchelError::CorruptArchive(msg.into())
}

fn read_section<R: Read>(r: &mut R, len: u64, what: &str) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)
        .map_err(|e| corrupt(format!("{what}: {e}")))?;
    Ok(buf)
}

fn inflate(codec: CodecId, frame: &[u8], u_size: u64) -> Result<Vec<u8>> {
    let mut out = CappedWriter {
        buf: Vec::with_capacity(u_size.min(1 << 24) as usize),
        cap: u_size,
    };
    codec.compressor().decompress(&mut &frame[..], &mut out)?;
    Ok(out.buf)
}

fn decode_record(rec: EntryRecord, data: &[u8]) -> Result<Entry> {
    // Paths encode would refuse are refused here too.
    check_entry_path(&rec.path).map_err(|reason| SatchelError::UnsupportedEntry {
        path: rec.path.clone(),
        reason,
    })?;
    let codec = CodecId::try_from(rec.codec).map_err(|raw| SatchelError::UnsupportedEntry {
        path: rec.path.clone(),
        reason: format!("unknown codec id {raw}"),
    })?;
    let end = rec
        .data_off
        .checked_add(rec.c_size)
        .filter(|&end| end <= data.len() as u64)
        .ok_or_else(|| corrupt(format!("{}: frame out of bounds", rec.path)))?;
    let frame = &data[rec.data_off as usize..end as usize];

    let content =
        inflate(codec, frame, rec.u_size).map_err(|e| corrupt(format!("{}: {e}", rec.path)))?;
    if content.len() as u64 != rec.u_size {
        return Err(corrupt(format!(
            "{}: size mismatch (got {}, expected {})",
            rec.path,
            content.len(),
            rec.u_size
        )));
    }
    if blake3::hash(&content).as_bytes() != &rec.blake3 {
        return Err(corrupt(format!("{}: content checksum mismatch", rec.path)));
    }

    Ok(Entry {
        path: rec.path,
        content,
        meta: EntryMeta {
            codec,
            mode: rec.mode,
            mtime: rec.mtime,
        },
    })
}

/// Decode a whole archive from a seekable source.
pub fn decode_from<R: Read + Seek>(mut r: R) -> Result<ArchiveSnapshot> {
    let len = r.seek(SeekFrom::End(0))?;
    if len < HEADER_LEN + TAIL_LEN {
        return Err(corrupt(format!("blob too small ({len} bytes)")));
    }
    r.seek(SeekFrom::Start(0))?;

    let sb = Superblock::read_from(&mut r).map_err(|e| corrupt(format!("superblock: {e}")))?;
    if sb.version != VERSION {
        return Err(corrupt(format!("unsupported format version {}", sb.version)));
    }
    let expected = HEADER_LEN
        .checked_add(sb.manifest_len)
        .and_then(|n| n.checked_add(sb.data_len))
        .and_then(|n| n.checked_add(TAIL_LEN));
    if expected != Some(len) {
        return Err(corrupt("section lengths do not match blob size"));
    }

    let manifest_buf = read_section(&mut r, sb.manifest_len, "manifest")?;
    let data = read_section(&mut r, sb.data_len, "data")?;
    let tail = TailSummary::read_from(&mut r).map_err(|e| corrupt(format!("tail: {e}")))?;

    if blake3::hash(&manifest_buf).as_bytes() != &tail.manifest_blake3 {
        return Err(corrupt("manifest checksum mismatch"));
    }
    if blake3::hash(&data).as_bytes() != &tail.data_blake3 || tail.total_c != sb.data_len {
        return Err(corrupt("data checksum mismatch"));
    }

    let manifest: Manifest = ciborium::de::from_reader(&manifest_buf[..])
        .map_err(|e| corrupt(format!("manifest decode: {e}")))?;

    let entries = manifest
        .entries
        .into_par_iter()
        .map(|rec| decode_record(rec, &data))
        .collect::<Result<Vec<_>>>()?;

    let total_u: u64 = entries.iter().map(|e| e.content.len() as u64).sum();
    if total_u != tail.total_u {
        return Err(corrupt("uncompressed total mismatch"));
    }

    tracing::debug!(
        entries = entries.len(),
        blob_len = len,
        total_u,
        "decoded archive"
    );
    ArchiveSnapshot::new(entries, manifest.meta.created)
}

pub fn decode(blob: &[u8]) -> Result<ArchiveSnapshot> {
    decode_from(Cursor::new(blob))
}

fn check_policy(snapshot: &ArchiveSnapshot, policy: &Policy) -> Result<()> {
    if snapshot.len() as u64 > policy.max_entries {
        return Err(SatchelError::Encoding(format!(
            "{} entries exceed the limit of {}",
            snapshot.len(),
            policy.max_entries
        )));
    }
    for e in snapshot.entries() {
        check_entry_path(&e.path).map_err(SatchelError::Encoding)?;
        if e.path.len() > policy.max_path_len {
            return Err(SatchelError::Encoding(format!(
                "path of {} bytes exceeds the limit of {}",
                e.path.len(),
                policy.max_path_len
            )));
        }
        if e.content.len() as u64 > policy.max_entry_size {
            return Err(SatchelError::Encoding(format!(
                "{}: {} bytes exceed the entry limit of {}",
                e.path,
                e.content.len(),
                policy.max_entry_size
            )));
        }
    }
    Ok(())
}

fn pack_entry(e: &Entry, level: i32) -> Result<Vec<u8>> {
    let mut packed = Vec::with_capacity(e.content.len() / 2 + 64);
    e.meta
        .codec
        .compressor()
        .compress(&mut &e.content[..], &mut packed, level)?;
    Ok(packed)
}

/// Encode a snapshot. Output depends only on the snapshot and `opts`.
pub fn encode_to<W: Write>(snapshot: &ArchiveSnapshot, mut w: W, opts: &EncodeOptions) -> Result<u64> {
    check_policy(snapshot, &opts.policy)?;

    // Frames are compressed in parallel; collect keeps entry order.
    let frames = snapshot
        .entries()
        .par_iter()
        .map(|e| pack_entry(e, opts.zstd_level))
        .collect::<Result<Vec<_>>>()?;

    let mut records = Vec::with_capacity(frames.len());
    let mut data_off = 0u64;
    let mut total_u = 0u64;
    for (e, frame) in snapshot.entries().iter().zip(&frames) {
        records.push(EntryRecord {
            path: e.path.clone(),
            codec: e.meta.codec as u8,
            mode: e.meta.mode,
            mtime: e.meta.mtime,
            u_size: e.content.len() as u64,
            c_size: frame.len() as u64,
            data_off,
            blake3: *blake3::hash(&e.content).as_bytes(),
        });
        data_off += frame.len() as u64;
        total_u += e.content.len() as u64;
    }
    let data_len = data_off;

    let manifest = Manifest {
        entries: records,
        meta: Meta {
            created: snapshot.created(),
            tool: TOOL.to_string(),
        },
    };
    let mut manifest_buf = Vec::new();
    ciborium::ser::into_writer(&manifest, &mut manifest_buf)
        .map_err(|e| SatchelError::Encoding(format!("manifest encode: {e}")))?;
    let manifest_len = manifest_buf.len() as u64;

    Superblock {
        version: VERSION,
        manifest_len,
        data_len,
    }
    .write_to(&mut w)?;
    w.write_all(&manifest_buf)?;

    let mut hw = HashingForward::new(&mut w);
    for frame in &frames {
        hw.write_all(frame)?;
    }
    let (w, data_blake3) = hw.finish();

    TailSummary {
        manifest_blake3: *blake3::hash(&manifest_buf).as_bytes(),
        data_blake3,
        total_u,
        total_c: data_len,
    }
    .write_to(&mut *w)?;
    w.flush()?;

    let written = HEADER_LEN + manifest_len + data_len + TAIL_LEN;
    tracing::debug!(entries = snapshot.len(), written, "encoded archive");
    Ok(written)
}

pub fn encode(snapshot: &ArchiveSnapshot, opts: &EncodeOptions) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_to(snapshot, &mut out, opts)?;
    Ok(out)
}

/// Re-seal an archive after rewriting its manifest, keeping the checksums valid.
#[cfg(test)]
pub(crate) fn reseal(blob: &[u8], edit: impl FnOnce(&mut Manifest)) -> Vec<u8> {
    let sb = Superblock::read_from(blob).unwrap();
    let man_end = (HEADER_LEN + sb.manifest_len) as usize;
    let data = &blob[man_end..man_end + sb.data_len as usize];
    let mut manifest: Manifest =
        ciborium::de::from_reader(&blob[HEADER_LEN as usize..man_end]).unwrap();
    edit(&mut manifest);
    let mut man_buf = Vec::new();
    ciborium::ser::into_writer(&manifest, &mut man_buf).unwrap();
    let old_tail = TailSummary::read_from(&blob[blob.len() - TAIL_LEN as usize..]).unwrap();

    let mut out = Vec::new();
    Superblock {
        version: VERSION,
        manifest_len: man_buf.len() as u64,
        data_len: sb.data_len,
    }
    .write_to(&mut out)
    .unwrap();
    out.extend_from_slice(&man_buf);
    out.extend_from_slice(data);
    TailSummary {
        manifest_blake3: *blake3::hash(&man_buf).as_bytes(),
        ..old_tail
    }
    .write_to(&mut out)
    .unwrap();
    out
}
