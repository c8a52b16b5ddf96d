use std::path::{Component, Path, PathBuf};

/// Checks that an entry path is relative, `/`-separated and cannot escape
/// an extraction root. Returns the reason on rejection.
pub fn check_entry_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("empty path".into());
    }
    if path.starts_with('/') {
        return Err(format!("absolute path '{path}'"));
    }
    if path.contains('\\') {
        return Err(format!("backslash in path '{path}'"));
    }
    if path.contains('\0') {
        return Err("NUL byte in path".into());
    }
    if path.split('/').any(|seg| seg == "..") {
        return Err(format!("parent traversal in '{path}'"));
    }
    Ok(())
}

/// Same rules for store keys; keys map onto file names in the local store.
pub fn check_store_key(key: &str) -> Result<(), String> {
    check_entry_path(key)?;
    if key.ends_with('/') {
        return Err(format!("key '{key}' names a directory"));
    }
    Ok(())
}

/// Join an entry path under `root`, refusing anything that is not a plain
/// relative path once parsed by the host.
pub fn safe_join(root: &Path, rel: &str) -> Result<PathBuf, String> {
    check_entry_path(rel)?;
    let p = Path::new(rel);
    if p.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
        return Err(format!("unsafe path: {rel}"));
    }
    Ok(root.join(p))
}
