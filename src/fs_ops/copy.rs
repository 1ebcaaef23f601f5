//! Cross-device copy helper:
//! - Copies to a temp file in the destination directory (never clobbers)
//! - fsyncs the temp file so data is durable before it becomes visible
//! - Renames temp -> dest, refusing to replace an existing file
//! - Removes the temp file on any failure

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use super::atomic::try_atomic_move;
use super::helpers::io_error_with_help_io;
use super::util;
use crate::platform::create_private_new;

const BUF_SIZE: usize = 1024 * 1024;

/// Copy `src` -> temp in `dest`'s directory, fsync it, then rename it into place.
/// The source is left untouched; the caller removes it.
pub(super) fn copy_into_place(src: &Path, dest: &Path) -> io::Result<u64> {
    let dest_dir = dest.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent")
    })?;
    let tmp = util::unique_temp_path(dest_dir);

    let result = copy_streaming(src, &tmp).and_then(|bytes| {
        try_atomic_move(&tmp, dest)?;
        Ok(bytes)
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn copy_streaming(src: &Path, tmp: &Path) -> io::Result<u64> {
    let input = File::open(src).map_err(io_error_with_help_io("open source", src))?;
    let out = create_private_new(tmp).map_err(io_error_with_help_io("create temp", tmp))?;
    let mut reader = BufReader::with_capacity(BUF_SIZE, input);
    let mut writer = BufWriter::with_capacity(BUF_SIZE, out);
    let bytes = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    let out = writer.into_inner().map_err(|e| e.into_error())?;
    out.sync_all()?;
    Ok(bytes)
}
