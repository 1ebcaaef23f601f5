//! I/O error enrichment.
//!
//! Wraps io::Error with the operation, the path and a short hint, so a log line
//! about a failed move says whether the NAS is down, the disk is full or the
//! permissions are wrong.
//!
//! Usage:
//!   // in functions returning anyhow::Result<_>
//!   fs::create_dir_all(dir).map_err(io_error_with_help("create dir", dir))?;
//!
//!   // in functions returning io::Result<_>
//!   File::open(p).map_err(io_error_with_help_io("open file", p))?;

use anyhow::anyhow;
use std::io;
use std::path::Path;

/// Hint for a raw OS error code, if we know one.
#[cfg(unix)]
fn os_hint(code: i32) -> Option<&'static str> {
    let hint = match code {
        libc::EACCES | libc::EPERM => "permission denied; check ownership and write permissions",
        libc::EXDEV => "cross-filesystem; atomic rename not possible",
        libc::ENOENT => "path not found; verify it exists",
        libc::EEXIST => "already exists; refusing to overwrite",
        libc::ENOSPC => "insufficient space on device",
        libc::EROFS => "read-only filesystem; cannot write here",
        libc::EBUSY => "resource busy; ensure no other process is writing",
        libc::ESTALE => "stale network file handle; the share was remounted",
        libc::ETIMEDOUT => "timed out; the network destination is not responding",
        libc::EHOSTDOWN | libc::EHOSTUNREACH => "host unreachable; the network destination is down",
        libc::ENOTCONN => "transport not connected; the share is disconnected",
        libc::ENAMETOOLONG => "filename or path too long; shorten path segments",
        libc::EMFILE | libc::ENFILE => "too many open files; raise limits",
        _ => return None,
    };
    Some(hint)
}

#[cfg(windows)]
fn os_hint(code: i32) -> Option<&'static str> {
    let hint = match code {
        5 => "access denied; check permissions",               // ERROR_ACCESS_DENIED
        17 => "not same device; cross-filesystem move",        // ERROR_NOT_SAME_DEVICE
        32 => "sharing violation; file is in use",             // ERROR_SHARING_VIOLATION
        2 | 3 => "path not found; verify it exists",           // FILE/PATH NOT FOUND
        80 | 183 => "already exists; refusing to overwrite",   // ERROR_FILE_EXISTS / ALREADY_EXISTS
        112 => "insufficient disk space",                      // ERROR_DISK_FULL
        53 | 67 => "network path not found; the share is down", // BAD_NETPATH / BAD_NET_NAME
        64 => "network name no longer available",              // ERROR_NETNAME_DELETED
        _ => return None,
    };
    Some(hint)
}

fn kind_hint(kind: io::ErrorKind) -> Option<&'static str> {
    match kind {
        io::ErrorKind::PermissionDenied => Some("permission denied; check ownership and write permissions"),
        io::ErrorKind::NotFound => Some("path not found; verify it exists"),
        io::ErrorKind::AlreadyExists => Some("already exists; refusing to overwrite"),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Some("busy/timed out; retry later"),
        _ => None,
    }
}

/// "<op> '<path>': <error> (<hint>) [os code: N]"
fn build_message(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{} '{}': {}", op, path.display(), e);
    let hint = match e.raw_os_error() {
        Some(code) => os_hint(code),
        None => kind_hint(e.kind()),
    };
    if let Some(h) = hint {
        msg.push_str(&format!(" ({h})"));
    }
    if let Some(code) = e.raw_os_error() {
        msg.push_str(&format!(" [os code: {code}]"));
    }
    msg
}

/// Adapter for anyhow::Result code.
/// Returns a closure suitable for `.map_err(...)` that converts io::Error -> anyhow::Error.
pub fn io_error_with_help<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> anyhow::Error + 'a {
    move |e: io::Error| anyhow!(build_message(op, path, &e))
}

/// Adapter for io::Result code: enriches the message while preserving the ErrorKind.
pub fn io_error_with_help_io<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> io::Error + 'a {
    move |e: io::Error| io::Error::new(e.kind(), build_message(op, path, &e))
}
