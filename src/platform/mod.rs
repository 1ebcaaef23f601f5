//! Platform-specific helpers.
//! This module hides OS differences (Unix/Windows) behind a uniform API so
//! the rest of the codebase can remain platform-agnostic.

use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(unix)]
mod unix;
#[cfg(not(unix))]
mod windows;

#[cfg(unix)]
pub use unix::{create_private_new, open_log_file_secure_append, sync_dir};

#[cfg(not(unix))]
pub use windows::{create_private_new, open_log_file_secure_append, sync_dir};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique hidden sibling temp name for atomic writes.
/// Pattern: .pdf_exporter.tmp.<pid>.<nanos>.<seq>
pub fn tmp_sibling_name(target: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = format!(".pdf_exporter.tmp.{pid}.{nanos}.{seq}");
    target.parent().unwrap_or_else(|| Path::new(".")).join(name)
}

/// Atomically replace `path` with `contents`.
///
/// Steps: create a private temp sibling, write, fsync, rename over the
/// destination, fsync the parent directory. On failure the temp file is
/// removed best-effort and the destination is left untouched.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    let tmp = tmp_sibling_name(path);

    let write = || -> Result<()> {
        let mut f = create_private_new(&tmp)
            .with_context(|| format!("create temp '{}'", tmp.display()))?;
        f.write_all(contents).context("write temp")?;
        f.sync_all().context("fsync temp")?;
        Ok(())
    };
    if let Err(e) = write() {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("rename '{}' -> '{}'", tmp.display(), path.display()));
    }

    sync_dir(parent).with_context(|| format!("fsync dir '{}'", parent.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn tmp_names_unique_across_threads() {
        let target = Path::new("dummy.json");
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let t = target.to_path_buf();
                thread::spawn(move || tmp_sibling_name(&t))
            })
            .collect();
        let set: HashSet<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(set.len(), 32);
    }

    #[test]
    fn atomic_write_replaces_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"old").unwrap();
        atomic_write(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
        for entry in fs::read_dir(dir.path()).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().into_owned();
            assert!(!name.starts_with(".pdf_exporter.tmp."), "leftover temp file: {name}");
        }
    }

    #[test]
    fn atomic_write_into_missing_dir_fails_cleanly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("config.json");
        assert!(atomic_write(&path, b"x").is_err());
        assert!(!path.exists());
    }
}
