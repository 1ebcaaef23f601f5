//! Startup directory checks.
//! Creates the four folders (with parents) when absent, verifies they are
//! writable directories, and refuses configurations where two folders resolve
//! to the same place.

use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

use super::types::Folders;
use crate::errors::IngestError;

impl Folders {
    /// Create missing folders and verify each is a writable directory.
    pub fn ensure_ready(&self) -> Result<(), IngestError> {
        for (label, path) in self.labelled() {
            ensure_dir_is_or_create(path, label)?;
            ensure_writable(path, label)?;
        }
        ensure_distinct(self)?;
        info!(
            input = %self.input.display(),
            destination = %self.destination.display(),
            waiting = %self.waiting.display(),
            error = %self.error.display(),
            "Folders validated"
        );
        Ok(())
    }
}

fn unavailable(label: &'static str, path: &Path, reason: impl Into<String>) -> IngestError {
    IngestError::DirectoryUnavailable {
        label,
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Ensure directory exists (create if missing). If exists, it must be a directory.
fn ensure_dir_is_or_create(path: &Path, label: &'static str) -> Result<(), IngestError> {
    if path.exists() {
        if !path.is_dir() {
            error!("{label} exists but isn't a directory: {}", path.display());
            return Err(unavailable(label, path, "exists but is not a directory"));
        }
    } else {
        fs::create_dir_all(path)
            .map_err(|e| unavailable(label, path, format!("cannot create: {e}")))?;
        info!("Created {label} directory: {}", path.display());
    }
    Ok(())
}

/// Ensure directory is writable using a non-destructive probe file.
fn ensure_writable(path: &Path, label: &'static str) -> Result<(), IngestError> {
    let probe = path.join(format!(".pdf_exporter_probe_{}.tmp", std::process::id()));
    match fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&probe)
    {
        Ok(_) => {
            let _ = fs::remove_file(&probe);
            debug!("{label} writable: {}", path.display());
            Ok(())
        }
        Err(e) => {
            error!("Cannot write to {label} '{}': {e}", path.display());
            Err(unavailable(label, path, format!("not writable: {e}")))
        }
    }
}

/// No two folders may resolve to the same directory.
fn ensure_distinct(folders: &Folders) -> Result<(), IngestError> {
    let resolved: Vec<_> = folders
        .labelled()
        .into_iter()
        .map(|(label, p)| (label, p, dunce::canonicalize(p).unwrap_or_else(|_| p.clone())))
        .collect();
    for (i, (label_a, path_a, real_a)) in resolved.iter().enumerate() {
        for (label_b, _, real_b) in &resolved[i + 1..] {
            if real_a == real_b {
                return Err(unavailable(
                    *label_a,
                    path_a,
                    format!("resolves to the same directory as {label_b}"),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_folders_with_parents() {
        let root = tempdir().unwrap();
        let f = Folders::new(
            root.path().join("a/in"),
            root.path().join("b/out"),
            root.path().join("c/wait"),
            root.path().join("d/err"),
        );
        f.ensure_ready().unwrap();
        for (_, p) in f.labelled() {
            assert!(p.is_dir(), "{} should exist", p.display());
        }
    }

    #[test]
    fn file_in_place_of_folder_is_rejected() {
        let root = tempdir().unwrap();
        let blocker = root.path().join("out");
        fs::write(&blocker, b"x").unwrap();
        let f = Folders::new(
            root.path().join("in"),
            &blocker,
            root.path().join("wait"),
            root.path().join("err"),
        );
        let err = f.ensure_ready().unwrap_err();
        assert!(matches!(
            err,
            IngestError::DirectoryUnavailable { label: "destination_folder", .. }
        ));
    }

    #[test]
    fn aliased_folders_are_rejected() {
        let root = tempdir().unwrap();
        let same = root.path().join("shared");
        let f = Folders::new(
            root.path().join("in"),
            &same,
            &same,
            root.path().join("err"),
        );
        assert!(f.ensure_ready().is_err());
    }
}
