use std::fs;
use std::time::Duration;
use tempfile::tempdir;

use pdf_exporter::{RetryResender, WaitingQueue};

fn queued_names(n: u64) -> Vec<String> {
    (1..=n).map(|i| format!("Prog_{i}_doc{i}.pdf_20250307")).collect()
}

#[test]
fn reachable_subset_is_delivered_rest_stays_queued() {
    let root = tempdir().unwrap();
    let waiting = root.path().join("waiting");
    let dest = root.path().join("dest");
    fs::create_dir_all(&waiting).unwrap();
    fs::create_dir_all(&dest).unwrap();

    let names = queued_names(5);
    for name in &names {
        fs::write(waiting.join(name), name.as_bytes()).unwrap();
    }
    // Entries 2 and 4 collide with files already at the destination, so their moves fail.
    for blocked in [&names[1], &names[3]] {
        fs::write(dest.join(blocked), b"already there").unwrap();
    }

    let queue = WaitingQueue::new(&waiting);
    let resender = RetryResender::new(queue.clone(), &dest, Duration::from_secs(10)).unwrap();
    let report = resender.sweep_once();

    assert_eq!(report.attempted, 5);
    assert_eq!(report.delivered.len(), 3);
    assert_eq!(report.failed, 2);
    assert_eq!(report.timed_out, 0);

    let left: Vec<_> = queue
        .snapshot()
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(left, [names[1].clone(), names[3].clone()]);
    for blocked in [&names[1], &names[3]] {
        assert_eq!(fs::read(dest.join(blocked)).unwrap(), b"already there");
    }
    for delivered in [&names[0], &names[2], &names[4]] {
        assert_eq!(fs::read(dest.join(delivered)).unwrap(), delivered.as_bytes());
    }
}

#[test]
fn missing_destination_keeps_everything_queued() {
    let root = tempdir().unwrap();
    let waiting = root.path().join("waiting");
    fs::create_dir_all(&waiting).unwrap();
    for name in queued_names(3) {
        fs::write(waiting.join(name), b"x").unwrap();
    }

    let queue = WaitingQueue::new(&waiting);
    let unmounted = root.path().join("unmounted");
    let resender = RetryResender::new(queue.clone(), &unmounted, Duration::from_secs(10)).unwrap();

    for _ in 0..3 {
        let report = resender.sweep_once();
        assert_eq!(report.failed, 3);
        assert!(report.delivered.is_empty());
    }
    assert_eq!(queue.len().unwrap(), 3);
    assert!(!unmounted.exists());
    assert_eq!(resender.in_flight(), 0);
}

#[test]
fn later_sweep_picks_up_recovered_destination() {
    let root = tempdir().unwrap();
    let waiting = root.path().join("waiting");
    let dest = root.path().join("dest");
    fs::create_dir_all(&waiting).unwrap();
    fs::write(waiting.join("Prog_7_a.pdf_20250307"), b"a").unwrap();

    let resender = RetryResender::new(WaitingQueue::new(&waiting), &dest, Duration::from_secs(10)).unwrap();
    assert_eq!(resender.sweep_once().failed, 1);

    fs::create_dir_all(&dest).unwrap();
    let report = resender.sweep_once();
    assert_eq!(report.delivered, [dest.join("Prog_7_a.pdf_20250307")]);
    assert!(fs::read_dir(&waiting).unwrap().next().is_none());
}
