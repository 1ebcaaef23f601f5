use chrono::NaiveDate;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{TempDir, tempdir};

use pdf_exporter::{
    ErrorDisposition, FileProcessor, ProcessingOutcome, RetryResender, SequenceStore, WaitingQueue,
};

struct Layout {
    _root: TempDir,
    config: PathBuf,
    input: PathBuf,
    dest: PathBuf,
    waiting: PathBuf,
    error: PathBuf,
}

fn layout() -> Layout {
    let root = tempdir().unwrap();
    let base = root.path().to_path_buf();
    let l = Layout {
        config: base.join("config.json"),
        input: base.join("in"),
        dest: base.join("nas"),
        waiting: base.join("waiting"),
        error: base.join("error"),
        _root: root,
    };
    fs::create_dir_all(&l.input).unwrap();
    fs::create_dir_all(&l.waiting).unwrap();
    write_config(&l, json!({}));
    l
}

fn write_config(l: &Layout, extra: serde_json::Value) {
    let mut doc = json!({
        "input_folder": l.input,
        "destination_folder": l.dest,
        "waiting_folder": l.waiting,
        "error_folder": l.error,
    });
    if let (Some(map), Some(extra)) = (doc.as_object_mut(), extra.as_object()) {
        map.extend(extra.clone());
    }
    fs::write(&l.config, serde_json::to_vec_pretty(&doc).unwrap()).unwrap();
}

fn processor(l: &Layout) -> (Arc<SequenceStore>, FileProcessor) {
    let store = Arc::new(SequenceStore::open(&l.config).unwrap());
    (Arc::clone(&store), FileProcessor::new(store))
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
}

fn names(dir: &Path) -> Vec<String> {
    let mut v: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    v.sort();
    v
}

#[test]
fn unreachable_destination_queues_then_sweep_delivers() {
    let l = layout();
    let (store, p) = processor(&l);
    fs::write(l.input.join("report.pdf"), b"%PDF-1.7").unwrap();

    let outcome = p.process_on(&l.input.join("report.pdf"), day());
    let queued = l.waiting.join("Prog_1_report.pdf_20250307");
    assert_eq!(outcome, ProcessingOutcome::Queued(queued.clone()));
    assert_eq!(store.current(2025), 1);
    assert!(names(&l.input).is_empty());
    assert!(!l.dest.exists(), "destination must not be created by a move");
    assert_eq!(fs::read(&queued).unwrap(), b"%PDF-1.7");

    // The share comes back.
    fs::create_dir_all(&l.dest).unwrap();
    let resender = RetryResender::new(WaitingQueue::new(&l.waiting), &l.dest, Duration::from_secs(10)).unwrap();
    let sweep = resender.sweep_once();
    assert_eq!(sweep.delivered, [l.dest.join("Prog_1_report.pdf_20250307")]);
    assert!(names(&l.waiting).is_empty());
    assert_eq!(names(&l.dest), ["Prog_1_report.pdf_20250307"]);
}

#[test]
fn reachable_destination_delivers_with_consecutive_numbers() {
    let l = layout();
    fs::create_dir_all(&l.dest).unwrap();
    let (store, p) = processor(&l);

    for name in ["a.pdf", "b.PDF"] {
        fs::write(l.input.join(name), name).unwrap();
        let outcome = p.process_on(&l.input.join(name), day());
        assert!(matches!(outcome, ProcessingOutcome::Delivered(_)), "{outcome:?}");
    }
    assert_eq!(store.current(2025), 2);
    assert_eq!(names(&l.dest), ["Prog_1_a.pdf_20250307", "Prog_2_b.PDF_20250307"]);
    assert!(names(&l.waiting).is_empty());
}

#[test]
fn unaccepted_extension_is_left_alone() {
    let l = layout();
    let (store, p) = processor(&l);
    fs::write(l.input.join("notes.txt"), b"hello").unwrap();

    assert_eq!(p.process_on(&l.input.join("notes.txt"), day()), ProcessingOutcome::Rejected);
    assert_eq!(names(&l.input), ["notes.txt"]);
    assert_eq!(store.current(2025), 0);
}

#[test]
fn vanished_file_is_rejected_without_allocating() {
    let l = layout();
    let (store, p) = processor(&l);
    assert_eq!(p.process_on(&l.input.join("gone.pdf"), day()), ProcessingOutcome::Rejected);
    assert_eq!(store.current(2025), 0);
}

#[test]
fn configured_extensions_replace_the_default() {
    let l = layout();
    write_config(&l, json!({ "accepted_extensions": ["tif", ".TIFF"] }));
    fs::create_dir_all(&l.dest).unwrap();
    let (_, p) = processor(&l);

    fs::write(l.input.join("scan.tiff"), b"x").unwrap();
    fs::write(l.input.join("doc.pdf"), b"x").unwrap();
    assert!(matches!(p.process_on(&l.input.join("scan.tiff"), day()), ProcessingOutcome::Delivered(_)));
    assert_eq!(p.process_on(&l.input.join("doc.pdf"), day()), ProcessingOutcome::Rejected);
}

#[test]
fn stale_year_sends_original_to_error_folder() {
    let l = layout();
    fs::create_dir_all(&l.dest).unwrap();
    let (store, p) = processor(&l);
    fs::write(l.input.join("a.pdf"), b"a").unwrap();
    assert!(matches!(p.process_on(&l.input.join("a.pdf"), day()), ProcessingOutcome::Delivered(_)));

    // Clock went backwards into the previous year.
    fs::write(l.input.join("late.pdf"), b"late").unwrap();
    let last_year = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    let outcome = p.process_on(&l.input.join("late.pdf"), last_year);
    assert_eq!(
        outcome,
        ProcessingOutcome::Errored(ErrorDisposition::InErrorFolder(l.error.join("late.pdf")))
    );
    assert_eq!(store.current(2024), 0);
    assert_eq!(store.current(2025), 1);
}

#[test]
fn error_folder_never_overwrites() {
    let l = layout();
    fs::create_dir_all(&l.error).unwrap();
    fs::write(l.error.join("late.pdf"), b"earlier").unwrap();
    let (store, p) = processor(&l);
    store.next(2025).unwrap();

    fs::write(l.input.join("late.pdf"), b"late").unwrap();
    let outcome = p.process_on(&l.input.join("late.pdf"), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    assert_eq!(
        outcome,
        ProcessingOutcome::Errored(ErrorDisposition::InErrorFolder(l.error.join("late (2).pdf")))
    );
    assert_eq!(fs::read(l.error.join("late.pdf")).unwrap(), b"earlier");
}

#[test]
fn both_destinations_unreachable_routes_renamed_file_to_error() {
    let l = layout();
    fs::remove_dir_all(&l.waiting).unwrap();
    let (store, p) = processor(&l);
    fs::write(l.input.join("report.pdf"), b"r").unwrap();

    let outcome = p.process_on(&l.input.join("report.pdf"), day());
    let parked = l.error.join("Prog_1_report.pdf_20250307");
    assert_eq!(outcome, ProcessingOutcome::Errored(ErrorDisposition::InErrorFolder(parked.clone())));
    assert!(parked.exists());
    assert_eq!(store.current(2025), 1);
}

#[test]
fn custody_loss_keeps_file_in_place() {
    let mut l = layout();
    fs::remove_dir_all(&l.waiting).unwrap();
    // An error folder that can never be created: its parent is a regular file.
    let blocker = l.input.parent().unwrap().join("blocker");
    fs::write(&blocker, b"").unwrap();
    l.error = blocker.join("error");
    write_config(&l, json!({}));
    let (_, p) = processor(&l);
    fs::write(l.input.join("report.pdf"), b"r").unwrap();

    let outcome = p.process_on(&l.input.join("report.pdf"), day());
    assert!(outcome.is_custody_loss(), "{outcome:?}");
    let ProcessingOutcome::Errored(ErrorDisposition::CustodyLost { last_known, .. }) = outcome else {
        unreachable!()
    };
    assert_eq!(last_known, l.input.join("Prog_1_report.pdf_20250307"));
    assert_eq!(fs::read(&last_known).unwrap(), b"r");
}
