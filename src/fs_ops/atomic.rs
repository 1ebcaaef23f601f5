//! Atomic rename helper.
//! - Performs a rename with context-rich errors (io::Error kind preserved).
//! - Refuses to replace an existing destination.
//! - On Unix, best-effort fsync of the destination directory after rename.

use std::fs;
use std::io;
use std::path::Path;

use super::helpers::io_error_with_help_io;
use super::util::is_cross_device;

/// Rename `src` to `dst`, failing with `AlreadyExists` if `dst` is present.
///
/// The existence check and the rename are two steps; callers rely on unique
/// names (sequence numbers) so no two movers target the same `dst`.
pub fn try_atomic_move(src: &Path, dst: &Path) -> io::Result<()> {
    if fs::symlink_metadata(dst).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("refusing to replace existing '{}'", dst.display()),
        ));
    }

    fs::rename(src, dst).map_err(|e| {
        // Callers fall back to copying on EXDEV; hand them the raw error.
        if is_cross_device(&e) {
            e
        } else {
            io_error_with_help_io("atomic rename", src)(e)
        }
    })?;

    // Unix: fsync the destination directory to persist the rename (best-effort).
    if let Some(parent) = dst.parent() {
        // Ignore fsync errors to avoid turning a successful rename into a failure.
        let _ = crate::platform::sync_dir(parent);
    }

    Ok(())
}
