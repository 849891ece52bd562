//! Session creation

use tracing::debug;
use uuid::Uuid;

use crate::clock::now_millis;
use crate::types::{
    EpochMillis, FileInput, FileProgress, FileStage, FileStatus, OverallStats, Ownership,
    SessionStatus, Snapshot,
};

/// Generate a session identifier of the form `session_<epoch-ms>_<random>`.
///
/// The store treats session ids as opaque keys; this is only the
/// recommended shape.
pub fn new_session_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", now_millis(), &random[..9])
}

/// Build the initial snapshot for a batch. The caller persists it.
pub fn init(session_id: &str, files: &[FileInput], ownership: Option<Ownership>) -> Snapshot {
    init_at(session_id, files, ownership, now_millis())
}

pub fn init_at(
    session_id: &str,
    files: &[FileInput],
    ownership: Option<Ownership>,
    now: EpochMillis,
) -> Snapshot {
    let records: Vec<FileProgress> = files
        .iter()
        .enumerate()
        .map(|(index, input)| FileProgress {
            file_index: index,
            file_name: input.name.clone(),
            file_size_bytes: input.size,
            status: FileStatus::Pending,
            stage: FileStage::Queued,
            progress: 0,
            items_found: 0,
            started_at: None,
            finished_at: None,
            error_message: None,
            confidence: None,
            template_detected: None,
            template_id: None,
        })
        .collect();

    let ownership = ownership.unwrap_or_default();
    debug!(session_id, files = records.len(), "Session initialized");

    Snapshot {
        session_id: session_id.to_string(),
        status: SessionStatus::Processing,
        message: format!("Preparing {} file(s)", records.len()),
        overall: OverallStats {
            total_files: records.len(),
            processed_files: 0,
            failed_files: 0,
            cancelled_files: 0,
            overall_progress: 0,
            total_items_found: 0,
            started_at: now,
            last_update_at: now,
            eta_seconds: None,
            average_confidence: None,
        },
        files: records,
        cancel_requested: false,
        organization_id: ownership.organization_id,
        user_id: ownership.user_id,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_init_two_files() {
        let files = vec![FileInput::new("a.pdf"), FileInput::with_size("b.pdf", 2048)];
        let snap = init_at("s1", &files, None, 1_000);

        assert_eq!(snap.session_id, "s1");
        assert_eq!(snap.status, SessionStatus::Processing);
        assert_eq!(snap.overall.total_files, 2);
        assert_eq!(snap.overall.overall_progress, 0);
        assert_eq!(snap.overall.started_at, 1_000);
        assert_eq!(snap.overall.last_update_at, 1_000);
        assert!(!snap.cancel_requested);

        for (i, f) in snap.files.iter().enumerate() {
            assert_eq!(f.file_index, i);
            assert_eq!(f.status, FileStatus::Pending);
            assert_eq!(f.stage, FileStage::Queued);
            assert_eq!(f.progress, 0);
            assert_eq!(f.items_found, 0);
        }
        assert_eq!(snap.files[1].file_size_bytes, Some(2048));
    }

    #[test]
    fn test_init_carries_ownership() {
        let owner = Ownership {
            organization_id: Some("org_1".to_string()),
            user_id: Some("user_9".to_string()),
        };
        let snap = init("s2", &[FileInput::new("x.png")], Some(owner));
        assert_eq!(snap.organization_id.as_deref(), Some("org_1"));
        assert_eq!(snap.user_id.as_deref(), Some("user_9"));
    }

    #[test]
    fn test_new_session_id_shape() {
        let id = new_session_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert_ne!(new_session_id(), id);
    }
}
