//! Plain-text rendering of sync, status, fetch and ledger reports.

use std::path::Path;

use lexmirror_core::{Delivery, Timestamp, format_timestamp};
use lexmirror_store::{Ledger, StatusReport, SyncReport};
use lexmirror_sync::FetchReport;

const LABEL_WIDTH: usize = 10;
const MAX_LISTED: usize = 8;

fn row(label: &str, value: impl std::fmt::Display) {
    println!("  {label:<width$}  {value}", width = LABEL_WIDTH);
}

fn stamp(ts: Option<Timestamp>) -> String {
    ts.as_ref()
        .map(format_timestamp)
        .unwrap_or_else(|| "none".into())
}

fn list(deliveries: &[Delivery]) -> String {
    if deliveries.is_empty() {
        return "none".into();
    }
    let mut shown: Vec<String> = deliveries
        .iter()
        .take(MAX_LISTED)
        .map(|d| d.to_string())
        .collect();
    if deliveries.len() > MAX_LISTED {
        shown.push(format!("... ({} more)", deliveries.len() - MAX_LISTED));
    }
    shown.join(", ")
}

// ── Status ──

pub fn print_status(report: &StatusReport, mirror_dir: &Path) {
    println!("── {} ──", report.corpus);
    row("mirror", mirror_dir.display());
    row(
        "installed",
        format!(
            "{} ({} applied)",
            stamp(report.state.current),
            report.state.history.len()
        ),
    );
    row("flag", report.state.flag.as_deref().unwrap_or("none"));

    let known = &report.resolution.known;
    let cached = match (report.resolution.oldest_known(), report.resolution.newest_known()) {
        (Some(oldest), Some(newest)) => format!(
            "{} deliveries, {} .. {}",
            known.len(),
            format_timestamp(&oldest),
            format_timestamp(&newest)
        ),
        _ => "empty".into(),
    };
    row("cached", cached);
    let chain = match report.resolution.base() {
        Some(base) => format!("{base} + {} patches", report.resolution.chain.len() - 1),
        None => "no base dump".into(),
    };
    row("chain", chain);
    if report.wipe_pending {
        row("wipe", "pending");
    }
    row("pending", list(&report.pending));
    if let Some(blocker) = &report.blocker {
        row("blocked", blocker);
    }
    println!();
}

// ── Sync ──

pub fn print_sync(report: &SyncReport) {
    if report.is_noop() {
        println!(
            "{}: up to date at {}",
            report.corpus,
            stamp(report.current)
        );
        return;
    }
    println!(
        "{}: now at {} (target {})",
        report.corpus,
        stamp(report.current),
        report.target
    );
    if report.wiped {
        row("wiped", "yes");
    }
    if let Some(base) = &report.base {
        row("base", base);
    }
    row("patches", list(&report.applied));
    row("linked", report.links);
}

pub fn print_fetch(report: &FetchReport) {
    println!(
        "{}: {} published, {} downloaded, {} already cached",
        report.corpus,
        report.listed,
        report.downloaded.len(),
        report.fresh
    );
}

// ── Ledger ──

pub fn print_ledger(ledger: &Ledger) {
    println!("{}", ledger.path().display());
    if ledger.records().is_empty() {
        println!("  (empty)");
        return;
    }
    println!(
        "  {:>4}  {:<22}  {:>4}  {:>4}  {:>4}",
        "id", "delivery", "prev", "next", "base"
    );
    let handle = |id: Option<lexmirror_store::RecordId>| {
        id.map(|i| i.0.to_string()).unwrap_or_else(|| "-".into())
    };
    for record in ledger.records() {
        println!(
            "  {:>4}  {:<22}  {:>4}  {:>4}  {:>4}",
            record.id.0,
            record.delivery().to_string(),
            handle(record.previous),
            handle(record.next),
            record.base.0
        );
    }
}
