//! JSON persistence.
//! - `JsonDocument` is the explicit serialization interface every persisted entity implements.
//! - `read_document` / `write_document` are generic over it; writes are atomic.
//!
//! Notes:
//! - Unknown keys cause a hard failure to surface misconfigurations early.
//! - Counter keys are `progressive_number_<YYYY>`; one key per year seen.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::DURATION_MAX;
use super::types::{ConfigRecord, Folders, LogLevel, Options, WatchBackendKind};
use crate::errors::IngestError;
use crate::platform::atomic_write;

/// Prefix of the per-year counter keys.
pub const COUNTER_KEY_PREFIX: &str = "progressive_number_";

/// Conversion to and from a JSON value.
pub trait JsonDocument: Sized {
    fn to_json(&self) -> Value;
    fn from_json(value: Value) -> std::result::Result<Self, String>;
}

/// Read and decode a document. Missing and malformed files map to the startup taxonomy.
pub fn read_document<T: JsonDocument>(path: &Path) -> std::result::Result<T, IngestError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(IngestError::ConfigMissing(path.to_path_buf()));
        }
        Err(e) => {
            return Err(IngestError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: format!("unreadable: {e}"),
            });
        }
    };
    let value: Value = serde_json::from_str(&content).map_err(|e| IngestError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let doc = T::from_json(value).map_err(|reason| IngestError::ConfigInvalid {
        path: path.to_path_buf(),
        reason,
    })?;
    debug!(path = %path.display(), "Loaded JSON document");
    Ok(doc)
}

/// Encode and atomically replace the document at `path`.
pub fn write_document<T: JsonDocument>(path: &Path, doc: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(&doc.to_json())
        .with_context(|| format!("encode {}", path.display()))?;
    bytes.push(b'\n');
    atomic_write(path, &bytes)
}

/// Load the agent configuration.
pub fn load_config(path: &Path) -> std::result::Result<ConfigRecord, IngestError> {
    read_document(path)
}

/// Fixed keys of the record; counters are handled separately.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordFields {
    input_folder: String,
    destination_folder: String,
    waiting_folder: String,
    error_folder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    accepted_extensions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    debounce_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sweep_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    move_timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scan_existing_on_start: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    watch_backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    poll_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log_file: Option<String>,
}

fn non_empty_path(key: &str, raw: &str) -> std::result::Result<PathBuf, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(format!("'{key}' must not be empty"));
    }
    Ok(PathBuf::from(trimmed))
}

/// Reject zero (unless allowed) and anything above [`DURATION_MAX`].
fn bounded(key: &str, value: Duration, allow_zero: bool) -> std::result::Result<Duration, String> {
    if value.is_zero() && !allow_zero {
        return Err(format!("'{key}' must be greater than zero"));
    }
    if value > DURATION_MAX {
        return Err(format!("'{key}' must not exceed {} seconds", DURATION_MAX.as_secs()));
    }
    Ok(value)
}

fn normalize_extensions(raw: Vec<String>) -> std::result::Result<Vec<String>, String> {
    let exts: Vec<String> = raw
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    if exts.is_empty() {
        return Err("'accepted_extensions' must list at least one extension".into());
    }
    Ok(exts)
}

fn parse_counter(key: &str, value: &Value) -> std::result::Result<(i32, u64), String> {
    let year_str = &key[COUNTER_KEY_PREFIX.len()..];
    if year_str.len() != 4 || !year_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("counter key '{key}' must end in a four-digit year"));
    }
    let year: i32 = year_str
        .parse()
        .map_err(|_| format!("counter key '{key}' has an invalid year"))?;
    let count = value
        .as_u64()
        .ok_or_else(|| format!("counter '{key}' must be a non-negative integer"))?;
    Ok((year, count))
}

impl JsonDocument for ConfigRecord {
    fn to_json(&self) -> Value {
        let defaults = Options::default();
        let o = &self.options;
        let fields = RecordFields {
            input_folder: self.folders.input.display().to_string(),
            destination_folder: self.folders.destination.display().to_string(),
            waiting_folder: self.folders.waiting.display().to_string(),
            error_folder: self.folders.error.display().to_string(),
            accepted_extensions: (o.accepted_extensions != defaults.accepted_extensions)
                .then(|| o.accepted_extensions.clone()),
            debounce_seconds: (o.debounce != defaults.debounce).then(|| o.debounce.as_secs()),
            sweep_interval_ms: (o.sweep_interval != defaults.sweep_interval)
                .then(|| o.sweep_interval.as_millis() as u64),
            move_timeout_seconds: (o.move_timeout != defaults.move_timeout)
                .then(|| o.move_timeout.as_secs()),
            scan_existing_on_start: (o.scan_existing_on_start != defaults.scan_existing_on_start)
                .then_some(o.scan_existing_on_start),
            watch_backend: (o.watch_backend != defaults.watch_backend)
                .then(|| o.watch_backend.as_str().to_string()),
            poll_interval_ms: (o.poll_interval != defaults.poll_interval)
                .then(|| o.poll_interval.as_millis() as u64),
            log_level: o.log_level.as_ref().map(|l| l.to_string()),
            log_file: o.log_file.as_ref().map(|p| p.display().to_string()),
        };

        let mut map = match serde_json::to_value(fields) {
            Ok(Value::Object(m)) => m,
            _ => Map::new(),
        };
        for (year, count) in &self.counters {
            map.insert(format!("{COUNTER_KEY_PREFIX}{year}"), Value::from(*count));
        }
        Value::Object(map)
    }

    fn from_json(value: Value) -> std::result::Result<Self, String> {
        let Value::Object(map) = value else {
            return Err("top-level value must be an object".into());
        };

        let mut counters = BTreeMap::new();
        let mut rest = Map::new();
        for (key, value) in map {
            if key.starts_with(COUNTER_KEY_PREFIX) {
                let (year, count) = parse_counter(&key, &value)?;
                counters.insert(year, count);
            } else {
                rest.insert(key, value);
            }
        }

        let fields: RecordFields =
            serde_json::from_value(Value::Object(rest)).map_err(|e| e.to_string())?;

        let folders = Folders {
            input: non_empty_path("input_folder", &fields.input_folder)?,
            destination: non_empty_path("destination_folder", &fields.destination_folder)?,
            waiting: non_empty_path("waiting_folder", &fields.waiting_folder)?,
            error: non_empty_path("error_folder", &fields.error_folder)?,
        };

        let mut options = Options::default();
        if let Some(exts) = fields.accepted_extensions {
            options.accepted_extensions = normalize_extensions(exts)?;
        }
        if let Some(secs) = fields.debounce_seconds {
            options.debounce = bounded("debounce_seconds", Duration::from_secs(secs), true)?;
        }
        if let Some(ms) = fields.sweep_interval_ms {
            options.sweep_interval = bounded("sweep_interval_ms", Duration::from_millis(ms), false)?;
        }
        if let Some(secs) = fields.move_timeout_seconds {
            options.move_timeout = bounded("move_timeout_seconds", Duration::from_secs(secs), false)?;
        }
        if let Some(scan) = fields.scan_existing_on_start {
            options.scan_existing_on_start = scan;
        }
        if let Some(backend) = fields.watch_backend {
            options.watch_backend = WatchBackendKind::parse(&backend)
                .ok_or_else(|| format!("unknown watch_backend '{backend}'"))?;
        }
        if let Some(ms) = fields.poll_interval_ms {
            options.poll_interval = bounded("poll_interval_ms", Duration::from_millis(ms), false)?;
        }
        if let Some(level) = fields.log_level {
            options.log_level = Some(level.parse::<LogLevel>()?);
        }
        options.log_file = fields
            .log_file
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Ok(ConfigRecord {
            folders,
            options,
            counters,
        })
    }
}
