use std::io::{BufRead, Read, Write};
use std::path::Path;

use satchel_core::error::Result;
use satchel_core::tools::describe;
use satchel_core::{
    ArchiveMutationEngine, CodecId, Generation, MutationBatch, PackOptions, PlanSummary, ToolBox,
    encode, pack_dir,
};

/// `-` means "read the value from stdin".
fn arg_or_stdin(value: String, stdin: &mut dyn Read) -> Result<String> {
    if value == "-" {
        let mut buf = String::new();
        stdin.read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(value)
    }
}

fn print_summary(out: &mut dyn Write, s: &PlanSummary) -> Result<()> {
    writeln!(
        out,
        "created={} replaced={} appended={} deleted={} noop={} kept={}",
        s.created, s.replaced, s.appended, s.deleted, s.noops, s.entries_kept
    )?;
    Ok(())
}

pub fn handle_pack(
    dir: &Path,
    out_file: &Path,
    deterministic: bool,
    codec: CodecId,
    zstd_level: i32,
    out: &mut dyn Write,
) -> Result<()> {
    let snapshot = pack_dir(dir, &PackOptions { deterministic, codec })?;
    let opts = satchel_core::EncodeOptions {
        zstd_level,
        ..Default::default()
    };
    let blob = encode(&snapshot, &opts)?;
    std::fs::write(out_file, &blob)?;
    writeln!(out, "{} entries, {} bytes -> {}", snapshot.len(), blob.len(), out_file.display())?;
    Ok(())
}

pub fn handle_upload(
    engine: &ArchiveMutationEngine,
    source: &Path,
    deterministic: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let key = if source.is_dir() {
        let opts = PackOptions {
            deterministic,
            codec: engine.config().default_codec,
        };
        engine.publish_snapshot(&pack_dir(source, &opts)?)?
    } else {
        engine.publish_new_archive(&std::fs::read(source)?)?
    };
    writeln!(out, "{key}")?;
    Ok(())
}

pub fn handle_ls(
    engine: &ArchiveMutationEngine,
    key: &str,
    prefix: &str,
    long: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let query = engine.query();
    if long {
        for e in query.list_detailed(key, prefix)? {
            writeln!(
                out,
                "{:>7o}  {:>12}  {:>10}  {:<5}  {}",
                e.mode,
                e.size,
                e.mtime,
                e.codec.name(),
                e.path
            )?;
        }
    } else {
        for p in query.list_entries(key, prefix)? {
            writeln!(out, "{p}")?;
        }
    }
    Ok(())
}

pub fn handle_cat(engine: &ArchiveMutationEngine, key: &str, path: &str, out: &mut dyn Write) -> Result<()> {
    out.write_all(&engine.query().read_entry(key, path)?)?;
    Ok(())
}

pub fn handle_stat(engine: &ArchiveMutationEngine, key: &str, out: &mut dyn Write) -> Result<()> {
    let stats = engine.query().stat(key)?;
    let json = serde_json::to_string_pretty(&stats).map_err(std::io::Error::other)?;
    writeln!(out, "{json}")?;
    Ok(())
}

pub fn handle_apply(
    engine: &ArchiveMutationEngine,
    key: &str,
    batch: String,
    if_match: Option<String>,
    stdin: &mut dyn Read,
    out: &mut dyn Write,
) -> Result<()> {
    let raw = if batch == "-" {
        arg_or_stdin(batch, stdin)?
    } else {
        std::fs::read_to_string(&batch)?
    };
    let batch = MutationBatch::from_json(&raw)?;
    let summary = match if_match {
        Some(generation) => engine.apply_batch_expecting(key, &batch, &Generation::from(generation))?,
        None => engine.apply_batch(key, &batch)?,
    };
    print_summary(out, &summary)
}

/// Which single-entry edit a command maps to.
pub enum EntryEdit {
    Create,
    Replace,
    Append,
    Delete,
}

pub fn handle_entry_edit(
    engine: &ArchiveMutationEngine,
    key: &str,
    path: &str,
    edit: EntryEdit,
    content: String,
    stdin: &mut dyn Read,
    out: &mut dyn Write,
) -> Result<()> {
    let summary = match edit {
        EntryEdit::Create => engine.create_entry(key, path, arg_or_stdin(content, stdin)?)?,
        EntryEdit::Replace => engine.replace_entry(key, path, arg_or_stdin(content, stdin)?)?,
        EntryEdit::Append => engine.append_entry(key, path, arg_or_stdin(content, stdin)?)?,
        EntryEdit::Delete => engine.delete_entry(key, path)?,
    };
    print_summary(out, &summary)
}

pub fn handle_extract(engine: &ArchiveMutationEngine, key: &str, dest: &Path, out: &mut dyn Write) -> Result<()> {
    let n = engine.query().extract_to(key, dest)?;
    writeln!(out, "extracted {n} entries to {}", dest.display())?;
    Ok(())
}

pub fn handle_remove(engine: &ArchiveMutationEngine, key: &str, out: &mut dyn Write) -> Result<()> {
    engine.remove_archive(key)?;
    writeln!(out, "removed {key}")?;
    Ok(())
}

pub fn handle_tools_describe(out: &mut dyn Write) -> Result<()> {
    let json = serde_json::to_string_pretty(&describe()).map_err(std::io::Error::other)?;
    writeln!(out, "{json}")?;
    Ok(())
}

/// One JSON call per input line, one envelope per output line.
pub fn handle_tools_serve(engine: ArchiveMutationEngine, input: &mut dyn BufRead, out: &mut dyn Write) -> Result<()> {
    let toolbox = ToolBox::new(engine);
    let mut served = 0usize;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = toolbox.call_json(&line);
        writeln!(out, "{reply}")?;
        out.flush()?;
        served += 1;
    }
    tracing::info!(served, "tool input closed");
    Ok(())
}
