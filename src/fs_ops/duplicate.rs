//! Destination-name resolution.
//!
//! Policy:
//! - Refuse: the requested name must be free; otherwise the move fails.
//!   Used for destination and waiting moves, where a second copy would be a duplicate.
//! - RenameWithSuffix: pick "<stem> (n).<ext>" when the name is taken.
//!   Used for the error folder, which collects unrenamed originals that may share names.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnCollision {
    Refuse,
    RenameWithSuffix,
}

const MAX_SUFFIX: u32 = 10_000;

/// Full path inside `dst_dir` for `name` under `policy`.
pub fn resolve_destination(dst_dir: &Path, name: &Path, policy: OnCollision) -> io::Result<PathBuf> {
    let candidate = dst_dir.join(name);
    if std::fs::symlink_metadata(&candidate).is_err() {
        return Ok(candidate);
    }
    match policy {
        OnCollision::Refuse => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("'{}' already exists", candidate.display()),
        )),
        OnCollision::RenameWithSuffix => {
            let stem = name
                .file_stem()
                .map(|s| s.to_os_string())
                .unwrap_or_else(|| name.as_os_str().to_os_string());
            let ext = name.extension().map(|e| e.to_os_string());
            for n in 2..=MAX_SUFFIX {
                let mut alt = OsString::new();
                alt.push(&stem);
                alt.push(format!(" ({n})"));
                if let Some(e) = &ext {
                    alt.push(".");
                    alt.push(e);
                }
                let path = dst_dir.join(alt);
                if std::fs::symlink_metadata(&path).is_err() {
                    trace!(path = %path.display(), "picked suffixed name");
                    return Ok(path);
                }
            }
            Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("no free name for '{}'", candidate.display()),
            ))
        }
    }
}
