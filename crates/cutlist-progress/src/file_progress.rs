//! Per-file progress updates
//!
//! All functions here are pure: they take the current snapshot and return a
//! new one with the file merged and the aggregates recomputed. A reference to
//! a file that does not exist is logged and the snapshot is returned
//! unchanged, so a late or mistaken progress report cannot break ingestion.

use tracing::warn;

use crate::aggregate::recalc_at;
use crate::clock::now_millis;
use crate::types::{
    CompletionDetails, EpochMillis, FileRef, FileStage, FileStatus, FileUpdate, Snapshot,
};

const DEFAULT_ERROR_MESSAGE: &str = "Processing failed";

/// Merge `update` onto one file and recompute the session aggregates.
pub fn update_file(
    snapshot: &Snapshot,
    file: impl Into<FileRef>,
    update: FileUpdate,
    message: Option<&str>,
) -> Snapshot {
    update_file_at(snapshot, file, update, message, now_millis())
}

pub fn update_file_at(
    snapshot: &Snapshot,
    file: impl Into<FileRef>,
    update: FileUpdate,
    message: Option<&str>,
    now: EpochMillis,
) -> Snapshot {
    let file = file.into();
    let Some(index) = snapshot.find_file(&file) else {
        warn!(
            session_id = %snapshot.session_id,
            file = %file,
            "File not found in session, ignoring update"
        );
        return snapshot.clone();
    };

    let mut next = snapshot.clone();
    let target = &mut next.files[index];

    if let Some(status) = update.status {
        target.status = status;
    }
    if let Some(stage) = update.stage {
        target.stage = stage;
    }
    if let Some(progress) = update.progress {
        target.progress = progress.min(100);
    }
    if let Some(items) = update.items_found {
        target.items_found = items;
    }
    if let Some(message) = update.error_message {
        target.error_message = Some(message);
    }
    if let Some(confidence) = update.confidence {
        target.confidence = Some(confidence.clamp(0.0, 1.0));
    }
    if let Some(detected) = update.template_detected {
        target.template_detected = Some(detected);
    }
    if let Some(template_id) = update.template_id {
        target.template_id = Some(template_id);
    }

    // Timestamps are write-once.
    if target.started_at.is_none() {
        target.started_at = update.started_at.or(
            (target.status == FileStatus::Processing).then_some(now),
        );
    }
    if target.finished_at.is_none() {
        target.finished_at = update
            .finished_at
            .or(target.status.is_terminal().then_some(now));
    }

    if target.status == FileStatus::Error {
        if target.error_message.is_none() {
            target.error_message = Some(DEFAULT_ERROR_MESSAGE.to_string());
        }
    } else {
        target.error_message = None;
    }

    if let Some(message) = message {
        next.message = message.to_string();
    }

    recalc_at(&next, now)
}

/// Mark a file as picked up by a worker.
pub fn start_file(snapshot: &Snapshot, file: impl Into<FileRef>, message: Option<&str>) -> Snapshot {
    start_file_at(snapshot, file, message, now_millis())
}

pub fn start_file_at(
    snapshot: &Snapshot,
    file: impl Into<FileRef>,
    message: Option<&str>,
    now: EpochMillis,
) -> Snapshot {
    let update = FileUpdate {
        status: Some(FileStatus::Processing),
        stage: Some(FileStage::Uploading),
        progress: Some(5),
        ..FileUpdate::default()
    };
    update_file_at(snapshot, file, update, message, now)
}

/// Move a file to another stage without changing its status.
pub fn update_file_stage(
    snapshot: &Snapshot,
    file: impl Into<FileRef>,
    stage: FileStage,
    progress: u8,
    message: Option<&str>,
) -> Snapshot {
    update_file_stage_at(snapshot, file, stage, progress, message, now_millis())
}

pub fn update_file_stage_at(
    snapshot: &Snapshot,
    file: impl Into<FileRef>,
    stage: FileStage,
    progress: u8,
    message: Option<&str>,
    now: EpochMillis,
) -> Snapshot {
    let update = FileUpdate {
        stage: Some(stage),
        progress: Some(progress),
        ..FileUpdate::default()
    };
    update_file_at(snapshot, file, update, message, now)
}

pub fn complete_file(
    snapshot: &Snapshot,
    file: impl Into<FileRef>,
    items_found: u32,
    details: CompletionDetails,
    message: Option<&str>,
) -> Snapshot {
    complete_file_at(snapshot, file, items_found, details, message, now_millis())
}

pub fn complete_file_at(
    snapshot: &Snapshot,
    file: impl Into<FileRef>,
    items_found: u32,
    details: CompletionDetails,
    message: Option<&str>,
    now: EpochMillis,
) -> Snapshot {
    let update = FileUpdate {
        status: Some(FileStatus::Complete),
        stage: Some(FileStage::Done),
        progress: Some(100),
        items_found: Some(items_found),
        confidence: details.confidence,
        template_detected: details.template_detected,
        template_id: details.template_id,
        ..FileUpdate::default()
    };
    update_file_at(snapshot, file, update, message, now)
}

/// Record a failure for one file. Sibling files are unaffected.
pub fn fail_file(
    snapshot: &Snapshot,
    file: impl Into<FileRef>,
    error_message: &str,
    message: Option<&str>,
) -> Snapshot {
    fail_file_at(snapshot, file, error_message, message, now_millis())
}

pub fn fail_file_at(
    snapshot: &Snapshot,
    file: impl Into<FileRef>,
    error_message: &str,
    message: Option<&str>,
    now: EpochMillis,
) -> Snapshot {
    let update = FileUpdate {
        status: Some(FileStatus::Error),
        progress: Some(0),
        error_message: Some(error_message.to_string()),
        ..FileUpdate::default()
    };
    update_file_at(snapshot, file, update, message, now)
}

pub fn cancel_file(snapshot: &Snapshot, file: impl Into<FileRef>, message: Option<&str>) -> Snapshot {
    cancel_file_at(snapshot, file, message, now_millis())
}

pub fn cancel_file_at(
    snapshot: &Snapshot,
    file: impl Into<FileRef>,
    message: Option<&str>,
    now: EpochMillis,
) -> Snapshot {
    let update = FileUpdate {
        status: Some(FileStatus::Cancelled),
        ..FileUpdate::default()
    };
    update_file_at(snapshot, file, update, message, now)
}
