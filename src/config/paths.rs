//! Default path helpers.
//! Determines where the config file and log file live when not given explicitly.

use dirs::{config_dir, data_dir};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "PDF_EXPORTER_CONFIG";

/// OS-appropriate default config path, honouring `$PDF_EXPORTER_CONFIG`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(explicit) = env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(explicit));
    }
    if let Some(mut base) = config_dir() {
        base.push("pdf_exporter");
        base.push("config.json");
        Some(base)
    } else {
        env::var("HOME").ok().map(|h| {
            PathBuf::from(h)
                .join(".config")
                .join("pdf_exporter")
                .join("config.json")
        })
    }
}

/// Config path to use: the CLI value wins, then the env/OS default.
pub fn resolve_config_path(cli: Option<&Path>) -> Option<PathBuf> {
    cli.map(Path::to_path_buf).or_else(default_config_path)
}

/// OS-appropriate default log file path (data dir).
pub fn default_log_path() -> Option<PathBuf> {
    data_dir()
        .map(|base| base.join("pdf_exporter").join("pdf_exporter.log"))
        .or_else(|| {
            env::var("HOME").ok().map(|h| {
                PathBuf::from(h)
                    .join(".local")
                    .join("share")
                    .join("pdf_exporter")
                    .join("pdf_exporter.log")
            })
        })
}

/// Sidecar file used to serialize counter writes across processes.
pub fn lock_path_for(config: &Path) -> PathBuf {
    let mut name = config
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "config.json".into());
    name.push(".lock");
    config.with_file_name(name)
}
