//! Whole-session terminal transitions

use tracing::info;

use crate::aggregate::recalc_at;
use crate::clock::now_millis;
use crate::types::{EpochMillis, FileStatus, SessionStatus, Snapshot};

const DEFAULT_COMPLETE_MESSAGE: &str = "Processing complete";
const DEFAULT_CANCEL_MESSAGE: &str = "Processing cancelled";

/// Finalize a session as complete.
///
/// Aggregates are recomputed first, then progress is pinned to 100 so that
/// rounding can never leave a finished batch showing 99%.
pub fn complete_session(snapshot: &Snapshot, message: Option<&str>) -> Snapshot {
    complete_session_at(snapshot, message, now_millis())
}

pub fn complete_session_at(
    snapshot: &Snapshot,
    message: Option<&str>,
    now: EpochMillis,
) -> Snapshot {
    let mut next = recalc_at(snapshot, now);
    next.status = SessionStatus::Complete;
    next.overall.overall_progress = 100;
    next.overall.eta_seconds = None;
    next.message = message.unwrap_or(DEFAULT_COMPLETE_MESSAGE).to_string();

    info!(
        session_id = %next.session_id,
        processed = next.overall.processed_files,
        failed = next.overall.failed_files,
        items = next.overall.total_items_found,
        "Session completed"
    );
    next
}

/// Mark the whole batch as failed, e.g. when the extraction provider is
/// unavailable. File records are left as they are.
pub fn fail_session(snapshot: &Snapshot, message: &str) -> Snapshot {
    fail_session_at(snapshot, message, now_millis())
}

pub fn fail_session_at(snapshot: &Snapshot, message: &str, now: EpochMillis) -> Snapshot {
    let mut next = snapshot.clone();
    next.status = SessionStatus::Error;
    next.message = message.to_string();
    next.overall.eta_seconds = None;
    next.overall.last_update_at = now;

    info!(session_id = %next.session_id, message, "Session failed");
    next
}

/// Abort the rest of a batch.
///
/// Every file still pending or processing becomes cancelled; files that
/// already finished keep their result. The session ends `Cancelled` only if
/// at least one file was cut short.
pub fn cancel_session(snapshot: &Snapshot, message: Option<&str>) -> Snapshot {
    cancel_session_at(snapshot, message, now_millis())
}

pub fn cancel_session_at(
    snapshot: &Snapshot,
    message: Option<&str>,
    now: EpochMillis,
) -> Snapshot {
    let mut next = snapshot.clone();
    let mut swept = 0usize;

    for file in next.files.iter_mut().filter(|f| !f.status.is_terminal()) {
        file.status = FileStatus::Cancelled;
        file.error_message = None;
        if file.finished_at.is_none() {
            file.finished_at = Some(now);
        }
        swept += 1;
    }

    next.cancel_requested = true;
    next.status = SessionStatus::Cancelled;
    next.message = message.unwrap_or(DEFAULT_CANCEL_MESSAGE).to_string();

    // Every file is terminal now, so the derived status decides: a batch
    // that had already finished keeps its complete or error outcome.
    let mut next = recalc_at(&next, now);
    next.overall.eta_seconds = None;

    info!(session_id = %next.session_id, cancelled_files = swept, "Session cancelled");
    next
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::file_progress::{
        complete_file, complete_file_at, fail_file, fail_file_at, start_file, update_file_stage,
    };
    use crate::session::init_at;
    use crate::types::{CompletionDetails, FileInput, FileStage};

    fn three_files() -> Snapshot {
        let files = ["a.pdf", "b.pdf", "c.pdf"].map(FileInput::new);
        init_at("s1", &files, None, 1_000)
    }

    #[test]
    fn test_complete_session_pins_progress() {
        let snap = three_files();
        let snap = complete_file(&snap, 0usize, 4, CompletionDetails::default(), None);
        let snap = complete_file(&snap, 1usize, 4, CompletionDetails::default(), None);
        let snap = update_file_stage(&snap, 2usize, FileStage::Validating, 97, None);
        // (100 + 100 + 97) / 3 = 99
        assert_eq!(snap.overall.overall_progress, 99);

        let done = complete_session_at(&snap, None, 50_000);
        assert_eq!(done.status, SessionStatus::Complete);
        assert_eq!(done.overall.overall_progress, 100);
        assert_eq!(done.overall.eta_seconds, None);
        assert_eq!(done.message, DEFAULT_COMPLETE_MESSAGE);
    }

    #[test]
    fn test_fail_session_keeps_files() {
        let snap = start_file(&three_files(), 0usize, None);
        let failed = fail_session_at(&snap, "Extraction provider unavailable", 9_000);

        assert_eq!(failed.status, SessionStatus::Error);
        assert_eq!(failed.message, "Extraction provider unavailable");
        assert_eq!(failed.files, snap.files);
        assert_eq!(failed.overall.last_update_at, 9_000);
    }

    #[test]
    fn test_cancel_session_sweeps_unfinished_files() {
        let snap = three_files();
        let snap = complete_file(&snap, 0usize, 2, CompletionDetails::default(), None);
        let snap = fail_file(&snap, 1usize, "unreadable", None);
        let snap = start_file(&snap, 2usize, None);
        let finished_0 = snap.files[0].finished_at;

        let cancelled = cancel_session_at(&snap, None, 99_000);

        assert!(cancelled.cancel_requested);
        assert_eq!(cancelled.status, SessionStatus::Cancelled);
        assert_eq!(cancelled.files[0].status, FileStatus::Complete);
        assert_eq!(cancelled.files[0].finished_at, finished_0);
        assert_eq!(cancelled.files[1].status, FileStatus::Error);
        assert_eq!(cancelled.files[2].status, FileStatus::Cancelled);
        assert_eq!(cancelled.files[2].finished_at, Some(99_000));
        assert_eq!(cancelled.overall.processed_files, 1);
        assert_eq!(cancelled.overall.failed_files, 1);
        assert_eq!(cancelled.overall.cancelled_files, 1);
        assert_eq!(cancelled.message, DEFAULT_CANCEL_MESSAGE);
    }

    #[test]
    fn test_cancel_session_after_all_files_finished() {
        let snap = three_files();
        let snap = complete_file_at(&snap, 0usize, 2, CompletionDetails::default(), None, 2_000);
        let snap = complete_file_at(&snap, 1usize, 3, CompletionDetails::default(), None, 2_500);
        let snap = fail_file_at(&snap, 2usize, "unreadable", None, 2_800);
        assert_eq!(snap.status, SessionStatus::Complete);

        let cancelled = cancel_session_at(&snap, None, 3_000);

        assert!(cancelled.cancel_requested);
        assert_eq!(cancelled.overall.cancelled_files, 0);
        assert_eq!(cancelled.status, SessionStatus::Complete);
        assert_eq!(cancelled.files, snap.files);
    }

    #[test]
    fn test_cancel_session_after_every_file_failed() {
        let snap = three_files();
        let snap = fail_file_at(&snap, 0usize, "unreadable", None, 2_000);
        let snap = fail_file_at(&snap, 1usize, "unreadable", None, 2_000);
        let snap = fail_file_at(&snap, 2usize, "unreadable", None, 2_000);

        let cancelled = cancel_session_at(&snap, None, 3_000);
        assert_eq!(cancelled.status, SessionStatus::Error);
        assert_eq!(cancelled.overall.cancelled_files, 0);
    }

    #[test]
    fn test_cancel_pending_session() {
        let cancelled = cancel_session_at(&three_files(), Some("Stopped by user"), 2_000);
        assert_eq!(cancelled.overall.cancelled_files, 3);
        assert_eq!(cancelled.overall.finished_files(), 3);
        assert_eq!(cancelled.message, "Stopped by user");
    }
}
