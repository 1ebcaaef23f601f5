use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

use pdf_exporter::config::{read_document, write_document};
use pdf_exporter::{ConfigRecord, Folders, IngestError, SequenceStore};

fn fresh_config(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("config.json");
    let rec = ConfigRecord::new(Folders::new("/in", "/out", "/wait", "/err"));
    write_document(&path, &rec).unwrap();
    path
}

#[test]
fn two_stores_on_one_file_never_share_a_number() {
    // Two stores over the same file behave like two processes.
    let dir = tempdir().unwrap();
    let path = fresh_config(dir.path());
    let a = Arc::new(SequenceStore::open(&path).unwrap());
    let b = Arc::new(SequenceStore::open(&path).unwrap());

    let handles: Vec<_> = [a, b]
        .into_iter()
        .flat_map(|store| {
            (0..3).map(move |_| {
                let s = Arc::clone(&store);
                thread::spawn(move || (0..10).map(|_| s.next(2025).unwrap()).collect::<Vec<_>>())
            })
        })
        .collect();
    let mut all: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    all.sort_unstable();
    assert_eq!(all, (1..=60).collect::<Vec<_>>());

    let on_disk: ConfigRecord = read_document(&path).unwrap();
    assert_eq!(on_disk.counter(2025), 60);
}

#[test]
fn new_year_starts_at_one_and_keeps_old_counter() {
    let dir = tempdir().unwrap();
    let path = fresh_config(dir.path());
    let store = SequenceStore::open(&path).unwrap();
    for _ in 0..3 {
        store.next(2025).unwrap();
    }
    assert_eq!(store.next(2026).unwrap(), 1);

    let reopened = SequenceStore::open(&path).unwrap();
    assert_eq!(reopened.current(2025), 3);
    assert_eq!(reopened.current(2026), 1);
    assert!(matches!(reopened.next(2025), Err(IngestError::StaleYear { .. })));
}

#[test]
fn allocation_preserves_folders_and_options() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
  "input_folder": "/srv/in",
  "destination_folder": "/mnt/nas",
  "waiting_folder": "/srv/wait",
  "error_folder": "/srv/err",
  "debounce_seconds": 2,
  "progressive_number_2025": 41
}"#,
    )
    .unwrap();

    let store = SequenceStore::open(&path).unwrap();
    assert_eq!(store.next(2025).unwrap(), 42);

    let text = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["progressive_number_2025"], 42);
    assert_eq!(value["input_folder"], "/srv/in");
    assert_eq!(value["debounce_seconds"], 2);
}
