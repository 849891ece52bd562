//! Derivation of session-level statistics from per-file records
//!
//! Aggregates are never cached across writes: every update recomputes them
//! from whatever file records the snapshot holds at that moment.

use crate::clock::now_millis;
use crate::types::{EpochMillis, FileProgress, FileStatus, SessionStatus, Snapshot};

/// Recompute `overall` (and possibly `status`) using the current time.
pub fn recalc(snapshot: &Snapshot) -> Snapshot {
    recalc_at(snapshot, now_millis())
}

/// Recompute `overall` as of `now`.
///
/// The session status only changes once every file is terminal:
/// - any cancelled file makes the session `Cancelled`
/// - the session is `Error` only when every file failed
/// - otherwise it is `Complete`, including a mix of successes and failures
///
/// An empty session counts as finished and resolves to `Complete`.
pub fn recalc_at(snapshot: &Snapshot, now: EpochMillis) -> Snapshot {
    let files = &snapshot.files;
    let total = files.len();

    let processed = count_status(files, FileStatus::Complete);
    let failed = count_status(files, FileStatus::Error);
    let cancelled = count_status(files, FileStatus::Cancelled);

    let overall_progress = mean_progress(files);
    let total_items_found = files.iter().map(|f| u64::from(f.items_found)).sum();

    let mut next = snapshot.clone();
    let overall = &mut next.overall;
    overall.total_files = total;
    overall.processed_files = processed;
    overall.failed_files = failed;
    overall.cancelled_files = cancelled;
    overall.overall_progress = overall_progress;
    overall.total_items_found = total_items_found;
    overall.average_confidence = average_confidence(files);
    overall.eta_seconds = estimate_eta(overall_progress, overall.started_at, now);
    overall.last_update_at = now;

    if processed + failed + cancelled == total {
        next.status = if cancelled > 0 {
            SessionStatus::Cancelled
        } else if total > 0 && failed == total {
            SessionStatus::Error
        } else {
            SessionStatus::Complete
        };
    }

    next
}

fn count_status(files: &[FileProgress], status: FileStatus) -> usize {
    files.iter().filter(|f| f.status == status).count()
}

/// Rounded mean of per-file progress; 0 for an empty batch.
pub fn mean_progress(files: &[FileProgress]) -> u8 {
    if files.is_empty() {
        return 0;
    }
    let sum: u64 = files.iter().map(|f| u64::from(f.progress.min(100))).sum();
    let mean = sum as f64 / files.len() as f64;
    mean.round().clamp(0.0, 100.0) as u8
}

/// Mean confidence over the files that reported one.
pub fn average_confidence(files: &[FileProgress]) -> Option<f64> {
    let reported: Vec<f64> = files.iter().filter_map(|f| f.confidence).collect();
    if reported.is_empty() {
        None
    } else {
        Some(reported.iter().sum::<f64>() / reported.len() as f64)
    }
}

/// Seconds remaining by linear extrapolation of the progress made so far.
///
/// This assumes the remaining work proceeds at the average rate observed
/// since `started_at`. It is an estimate for display only and will swing
/// when files finish unevenly. Only defined while progress is strictly
/// between 0 and 100 and some time has elapsed.
pub fn estimate_eta(
    overall_progress: u8,
    started_at: EpochMillis,
    now: EpochMillis,
) -> Option<u64> {
    if overall_progress == 0 || overall_progress >= 100 {
        return None;
    }
    let elapsed_ms = now - started_at;
    if elapsed_ms <= 0 {
        return None;
    }

    let progress = f64::from(overall_progress);
    let rate = progress / elapsed_ms as f64;
    let remaining_ms = (100.0 - progress) / rate;
    Some((remaining_ms / 1000.0).round().max(0.0) as u64)
}
