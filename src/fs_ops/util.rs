use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub(super) fn unique_temp_path(dst_dir: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    dst_dir.join(format!(".pdf_exporter.{pid}.{nanos}.part"))
}

/// True for names the agent writes transiently (copy temps, config temps, probes).
pub(crate) fn is_internal_name(name: &str) -> bool {
    name.starts_with(".pdf_exporter")
}

pub(super) fn is_cross_device(e: &io::Error) -> bool {
    // Enriched errors keep the kind but not the raw OS code.
    if e.kind() == io::ErrorKind::CrossesDevices {
        return true;
    }
    if let Some(code) = e.raw_os_error() {
        #[cfg(unix)]
        {
            if code == libc::EXDEV {
                return true;
            }
        }
        #[cfg(windows)]
        {
            // ERROR_NOT_SAME_DEVICE
            if code == 17 {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_paths_are_internal() {
        let p = unique_temp_path(Path::new("/tmp"));
        let name = p.file_name().unwrap().to_str().unwrap();
        assert!(is_internal_name(name));
        assert!(!is_internal_name("report.pdf"));
    }

    #[cfg(unix)]
    #[test]
    fn exdev_is_cross_device() {
        assert!(is_cross_device(&io::Error::from_raw_os_error(libc::EXDEV)));
        assert!(!is_cross_device(&io::Error::from_raw_os_error(libc::EACCES)));
    }

    #[cfg(unix)]
    #[test]
    fn enriched_exdev_is_still_cross_device() {
        let wrap = super::super::helpers::io_error_with_help_io("atomic rename", Path::new("/tmp/a.pdf"));
        let e = wrap(io::Error::from_raw_os_error(libc::EXDEV));
        assert!(e.raw_os_error().is_none());
        assert!(is_cross_device(&e));
    }
}
