use owo_colors::OwoColorize;

use crate::service::ServiceReport;

/// Small wrapper around stdout/stderr printing to provide consistent, colored
/// user-facing messages. Colors are enabled only when output is a TTY.
fn is_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

pub fn print_info(msg: &str) {
    if is_tty() {
        println!("{} {}", "info:".cyan().bold(), msg);
    } else {
        println!("info: {}", msg);
    }
}

pub fn print_warn(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "warn:".yellow().bold(), msg);
    } else {
        eprintln!("warn: {}", msg);
    }
}

pub fn print_error(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "error:".red().bold(), msg);
    } else {
        eprintln!("error: {}", msg);
    }
}

pub fn print_success(msg: &str) {
    if is_tty() {
        println!("{} {}", "ok:".green().bold(), msg);
    } else {
        println!("ok: {}", msg);
    }
}

/// One-line summary of a run, plus one line per file that lost custody.
pub fn format_report(report: &ServiceReport) -> Vec<String> {
    let mut lines = vec![format!(
        "delivered {}, queued {}, resent {}, rejected {}, errored {}",
        report.delivered, report.queued, report.resent, report.rejected, report.errored
    )];
    lines.extend(
        report
            .custody_lost
            .iter()
            .map(|p| format!("custody lost, last seen at {}", p.display())),
    );
    lines
}

pub fn print_report(report: &ServiceReport) {
    let mut lines = format_report(report).into_iter();
    if let Some(summary) = lines.next() {
        print_info(&summary);
    }
    for line in lines {
        print_error(&line);
    }
}
