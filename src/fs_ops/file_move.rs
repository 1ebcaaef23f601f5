//! File move implementation.
//! Attempts an atomic rename; across filesystems (NAS mounts) falls back to
//! copy + fsync + rename + source removal.
//!
//! At no point do two complete copies survive: if the source cannot be removed
//! after a successful copy, the copy is removed again and the move fails.

use anyhow::{anyhow, bail, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use super::atomic::try_atomic_move;
use super::copy::copy_into_place;
use super::duplicate::{resolve_destination, OnCollision};
use super::helpers::io_error_with_help;
use super::util::is_cross_device;

/// Move the file `src` into the existing directory `dst_dir`, keeping its name
/// (subject to `policy`). Returns the final path.
///
/// `dst_dir` is never created here: a missing destination usually means an
/// unmounted share, and creating it would write onto the local mountpoint.
pub fn move_file(src: &Path, dst_dir: &Path, policy: OnCollision) -> Result<PathBuf> {
    let name = src
        .file_name()
        .ok_or_else(|| anyhow!("source has no file name: {}", src.display()))?;

    match fs::metadata(dst_dir) {
        Ok(m) if m.is_dir() => {}
        Ok(_) => bail!("destination '{}' is not a directory", dst_dir.display()),
        Err(e) => return Err(io_error_with_help("reach destination", dst_dir)(e)),
    }

    let dest = resolve_destination(dst_dir, Path::new(name), policy)
        .map_err(io_error_with_help("choose destination name", dst_dir))?;

    match try_atomic_move(src, &dest) {
        Ok(()) => {
            debug!(src = %src.display(), dest = %dest.display(), "Renamed file atomically");
            Ok(dest)
        }
        Err(e) if is_cross_device(&e) => {
            debug!(src = %src.display(), dest = %dest.display(), "Cross-device move; copying");
            copy_into_place(src, &dest).map_err(io_error_with_help("copy to destination", &dest))?;
            if let Err(rm) = fs::remove_file(src) {
                // Keep a single copy: undo the copy rather than leave a duplicate.
                if let Err(undo) = fs::remove_file(&dest) {
                    error!(
                        src = %src.display(),
                        dest = %dest.display(),
                        error = %undo,
                        "Could not remove copy after failing to remove source; file now exists twice"
                    );
                }
                return Err(io_error_with_help("remove source after copy", src)(rm));
            }
            Ok(dest)
        }
        Err(e) => {
            if e.kind() == io::ErrorKind::PermissionDenied {
                warn!(src = %src.display(), dest = %dest.display(), "Permission denied during move");
            }
            Err(anyhow!(e))
        }
    }
}

/// Rename `src` to `new_name` inside its own directory (same volume, atomic).
pub fn rename_in_place(src: &Path, new_name: &str) -> Result<PathBuf> {
    let parent = src
        .parent()
        .ok_or_else(|| anyhow!("source has no parent: {}", src.display()))?;
    let target = parent.join(new_name);
    try_atomic_move(src, &target)?;
    Ok(target)
}
